//! Template expansion applied to raw config file text before it is decoded.
//!
//! The default [`Template`] understands `${name}` and `${name:arg}`, which call
//! the registered function `name` with the optional argument.
//! Use `$$` to escape and produce a literal `$`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::ConfigError;

/// Expands embedded expressions in raw file content.
pub trait TextPreprocessor: Send + Sync + fmt::Debug {
    fn expand(&self, raw: &str) -> Result<String, ConfigError>;
}

/// A function callable from a template expression.
///
/// Receives the trimmed text after the first `:` if there is one. An `Err`
/// message is surfaced as [`ConfigError::TemplateFunction`].
pub type TemplateFunction = Arc<dyn Fn(Option<&str>) -> Result<String, String> + Send + Sync>;

/// The default preprocessor, backed by a registry of named functions.
///
/// Registration goes through a shared reference so a template already handed
/// to nodes can still learn new functions.
pub struct Template {
    functions: RwLock<HashMap<String, TemplateFunction>>,
}

impl Template {
    /// Creates a template with only the built-in `env` function.
    pub fn new() -> Self {
        let template = Self {
            functions: RwLock::new(HashMap::new()),
        };
        template.register("env", env_function);
        template
    }

    /// Registers `function` under `name`, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, function: F) -> &Self
    where
        F: Fn(Option<&str>) -> Result<String, String> + Send + Sync + 'static,
    {
        self.functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(function));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    fn call(&self, expression: &str) -> Result<String, ConfigError> {
        let (name, arg) = match expression.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (expression.trim(), None),
        };
        if name.is_empty() {
            return Err(ConfigError::EmptyExpression);
        }

        // Clone out of the lock so a function may itself register others.
        let function = self
            .functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownTemplateFunction(name.to_owned()))?;

        function(arg).map_err(|message| ConfigError::TemplateFunction {
            name: name.to_owned(),
            message,
        })
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let functions = self.functions.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&String> = functions.keys().collect();
        names.sort();
        f.debug_struct("Template").field("functions", &names).finish()
    }
}

impl TextPreprocessor for Template {
    fn expand(&self, raw: &str) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(start) = rest.find('$') {
            result.push_str(&rest[..start]);
            let after = &rest[start + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                result.push('$');
                rest = tail;
            } else if let Some(body) = after.strip_prefix('{') {
                let end = body.find('}').ok_or(ConfigError::UnclosedExpression)?;
                result.push_str(&self.call(&body[..end])?);
                rest = &body[end + 1..];
            } else {
                result.push('$');
                rest = after;
            }
        }

        result.push_str(rest);
        Ok(result)
    }
}

/// `${env:VAR}` or `${env:VAR:-fallback}`.
fn env_function(arg: Option<&str>) -> Result<String, String> {
    let arg = arg.ok_or("expected a variable name, as in ${env:NAME}")?;
    let (name, fallback) = match arg.split_once(":-") {
        Some((name, fallback)) => (name.trim(), Some(fallback)),
        None => (arg, None),
    };

    match (std::env::var(name), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(fallback)) => Ok(fallback.to_owned()),
        (Err(_), None) => Err(format!("environment variable `{name}` is not set")),
    }
}
