//! Process-wide registry of root configuration nodes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use indexmap::IndexMap;
use tracing::debug;

use crate::config::{ConfigError, Node, Template};
use crate::Error;

/// A cached root node. Lock it to read or mutate.
pub type SharedNode = Arc<Mutex<Node>>;

type CacheKey = (String, PathBuf);

/// Variables consulted, in order, for the default environment name.
pub const ENVIRONMENT_VARS: [&str; 2] = ["APP_ENV", "RUST_ENV"];

/// Variable consulted for the default root directory.
pub const ROOT_VAR: &str = "APP_ROOT";

static GLOBAL: LazyLock<Namespace> = LazyLock::new(Namespace::new);

/// The environment name and root directory used when none is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub environment: String,
    pub root: PathBuf,
}

impl Defaults {
    /// Reads the defaults from the process environment.
    ///
    /// The environment is the first non-empty of [`ENVIRONMENT_VARS`], or the
    /// empty string. The root is [`ROOT_VAR`] if set, otherwise the current
    /// directory.
    pub fn detect() -> Result<Self, Error> {
        let environment = ENVIRONMENT_VARS
            .iter()
            .find_map(|name| non_empty_var(name))
            .unwrap_or_default();

        let root = match non_empty_var(ROOT_VAR) {
            Some(root) => absolute(Path::new(&root))?,
            None => std::env::current_dir().map_err(|source| Error::InvalidRoot {
                path: PathBuf::from("."),
                source,
            })?,
        };

        Ok(Self { environment, root })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn absolute(path: &Path) -> Result<PathBuf, Error> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| Error::InvalidRoot {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(cwd.join(path))
}

/// Maps each (environment, root) pair to a single shared [`Node`].
///
/// Repeated requests for the same pair return the same instance; different
/// pairs never share one. Nodes created here share the namespace's
/// [`Template`], so functions registered through
/// [`template_function`](Self::template_function) are visible to all of them.
///
/// ## Example
///
/// ```no_run
/// use confg::Namespace;
///
/// let namespace = Namespace::new();
/// let config = namespace.configure("production", "/srv/app", |config| {
///     config.load_yaml("database")?;
///     config.load_env()
/// })?;
///
/// let config = config.lock().unwrap();
/// println!("{:?}", config.get_path("database.host"));
/// # Ok::<(), confg::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct Namespace {
    cache: Mutex<IndexMap<CacheKey, SharedNode>>,
    defaults: Mutex<Option<Defaults>>,
    template: Arc<Template>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide namespace behind the crate-level functions.
    pub fn global() -> &'static Namespace {
        &GLOBAL
    }

    /// Display form of a cached pair, as listed by [`keys`](Self::keys).
    pub fn cache_key(environment: &str, root: &Path) -> String {
        format!("{environment}--{}", root.display())
    }

    /// Returns the node for `(environment, root)`, creating it on first request.
    ///
    /// A relative `root` is resolved against the current directory first.
    pub fn config(
        &self,
        environment: impl Into<String>,
        root: impl AsRef<Path>,
    ) -> Result<SharedNode, Error> {
        let environment = environment.into();
        let root = absolute(root.as_ref())?;

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let node = cache.entry((environment, root)).or_insert_with_key(|(environment, root)| {
            debug!(key = %Self::cache_key(environment, root), "creating configuration node");
            Arc::new(Mutex::new(Node::with_preprocessor(
                environment.clone(),
                root.clone(),
                self.template.clone(),
            )))
        });
        Ok(Arc::clone(node))
    }

    /// Like [`config`](Self::config), then runs `f` on the node while holding its lock.
    pub fn configure<F>(
        &self,
        environment: impl Into<String>,
        root: impl AsRef<Path>,
        f: F,
    ) -> Result<SharedNode, Error>
    where
        F: FnOnce(&mut Node) -> Result<(), ConfigError>,
    {
        let node = self.config(environment, root)?;
        f(&mut node.lock().unwrap_or_else(PoisonError::into_inner))?;
        Ok(node)
    }

    /// The node for the detected default environment and root.
    pub fn default_config(&self) -> Result<SharedNode, Error> {
        let Defaults { environment, root } = self.defaults()?;
        self.config(environment, root)
    }

    /// Detected defaults, memoized until [`reset`](Self::reset).
    pub fn defaults(&self) -> Result<Defaults, Error> {
        let mut memo = self.defaults.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(defaults) = memo.as_ref() {
            return Ok(defaults.clone());
        }

        let detected = Defaults::detect()?;
        debug!(
            environment = %detected.environment,
            root = %detected.root.display(),
            "detected configuration defaults"
        );
        *memo = Some(detected.clone());
        Ok(detected)
    }

    pub fn environment(&self) -> Result<String, Error> {
        Ok(self.defaults()?.environment)
    }

    pub fn root(&self) -> Result<PathBuf, Error> {
        Ok(self.defaults()?.root)
    }

    /// Cache keys in creation order.
    pub fn keys(&self) -> Vec<String> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .map(|(environment, root)| Self::cache_key(environment, root))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached node and the memoized defaults.
    pub fn reset(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
        *self.defaults.lock().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("configuration namespace reset");
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Registers a template function for every file loaded through this namespace.
    pub fn template_function<F>(&self, name: impl Into<String>, function: F) -> &Self
    where
        F: Fn(Option<&str>) -> Result<String, String> + Send + Sync + 'static,
    {
        self.template.register(name, function);
        self
    }
}
