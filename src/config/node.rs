use std::fmt;
use std::ops::Index;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value as YamlValue};
use tracing::{debug, trace, warn};

use super::env::{EnvSource, DEFAULT_ENV_PREFIX};
use super::file::{FileSource, LoadOptions};
use super::source::{ConfigEntry, ConfigSource};
use super::template::{Template, TextPreprocessor};
use super::value::{Value, NULL};
use super::ConfigError;

/// A mutable, ordered tree of configuration values.
///
/// Every node carries the environment name and root directory it was created
/// for; children created while assigning nested mappings inherit both, along
/// with the text preprocessor used when loading files.
///
/// ## Merging
///
/// Assigning a mapping never replaces a child node, it merges into it:
///
/// ```
/// use confg::Node;
///
/// let mut config = Node::new("test", "/srv/app");
/// config.set_path("database.port", 5432);
/// config.set("database", serde_yaml::from_str::<serde_yaml::Value>("host: db").unwrap());
///
/// assert_eq!(config["database"]["host"], "db");
/// assert_eq!(config.get_path("database.port").and_then(|v| v.as_i64()), Some(5432));
/// ```
///
/// Any other value (scalars, sequences) replaces whatever was stored.
///
/// ## Strict and permissive reads
///
/// [`get`](Self::get), [`get_path`](Self::get_path) and indexing return an
/// empty result for a missing key. [`fetch`](Self::fetch) and
/// [`attr`](Self::attr) fail with [`ConfigError::MissingKey`].
#[derive(Clone)]
pub struct Node {
    environment: String,
    root: PathBuf,
    data: IndexMap<String, Value>,
    preprocessor: Arc<dyn TextPreprocessor>,
}

/// Result of an attribute-style read, see [`Node::attr`].
#[derive(Debug, Clone, PartialEq)]
pub enum Attr<'a> {
    Value(&'a Value),
    Keys(Vec<&'a str>),
    Values(Vec<&'a Value>),
    Len(usize),
    IsEmpty(bool),
}

impl<'a> Attr<'a> {
    /// The stored value, if the name resolved to a key.
    pub fn value(&self) -> Option<&'a Value> {
        match self {
            Attr::Value(value) => Some(*value),
            _ => None,
        }
    }
}

impl Node {
    pub fn new(environment: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self::with_preprocessor(environment, root, Arc::new(Template::new()))
    }

    pub fn with_preprocessor(
        environment: impl Into<String>,
        root: impl Into<PathBuf>,
        preprocessor: Arc<dyn TextPreprocessor>,
    ) -> Self {
        Self {
            environment: environment.into(),
            root: root.into(),
            data: IndexMap::new(),
            preprocessor,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn spawn_child(&self) -> Node {
        Self::with_preprocessor(
            self.environment.clone(),
            self.root.clone(),
            Arc::clone(&self.preprocessor),
        )
    }

    pub fn contains_key(&self, key: impl AsRef<str>) -> bool {
        self.data.contains_key(key.as_ref())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.data.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Permissive read: `None` if `key` is absent.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&Value> {
        self.data.get(key.as_ref())
    }

    /// Strict read: fails with [`ConfigError::MissingKey`] if `key` is absent.
    pub fn fetch(&self, key: impl AsRef<str>) -> Result<&Value, ConfigError> {
        let key = key.as_ref();
        self.data
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_owned()))
    }

    /// Walks a dotted path through child nodes.
    ///
    /// Returns `None` as soon as a segment is missing or is not a node.
    pub fn get_path(&self, path: impl AsRef<str>) -> Option<&Value> {
        let mut segments = path.as_ref().split('.');
        let first = self.get(segments.next()?)?;
        segments.try_fold(first, |current, segment| current.as_node()?.get(segment))
    }

    /// Stores `value` under `key`.
    ///
    /// Mappings are merged into the child node at `key` (created if needed),
    /// preserving its other keys. Anything else overwrites the slot.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<YamlValue>) {
        self.store(key.as_ref(), value.into());
    }

    fn store(&mut self, key: &str, value: YamlValue) {
        match value {
            YamlValue::Mapping(mapping) => self.open(key, |child| child.merge(mapping)),
            YamlValue::Tagged(tagged) => {
                let TaggedValue { value, .. } = *tagged;
                self.store(key, value);
            }
            other => {
                let value = self.normalize(other);
                self.data.insert(key.to_owned(), value);
            }
        }
    }

    /// Converts a plain decoded value into its stored form.
    fn normalize(&self, value: YamlValue) -> Value {
        match value {
            YamlValue::Mapping(mapping) => {
                let mut child = self.spawn_child();
                child.merge(mapping);
                Value::Node(child)
            }
            YamlValue::Sequence(items) => {
                Value::Sequence(items.into_iter().map(|item| self.normalize(item)).collect())
            }
            YamlValue::Tagged(tagged) => {
                let TaggedValue { value, .. } = *tagged;
                self.normalize(value)
            }
            scalar => Value::Scalar(scalar),
        }
    }

    /// Runs `f` on the child node at `key`, creating it first if the slot is
    /// empty or holds something other than a node.
    pub fn open<R>(&mut self, key: impl AsRef<str>, f: impl FnOnce(&mut Node) -> R) -> R {
        let key = key.as_ref();
        if let Some(Value::Node(child)) = self.data.get_mut(key) {
            return f(child);
        }

        let mut child = self.spawn_child();
        let result = f(&mut child);
        self.data.insert(key.to_owned(), Value::Node(child));
        result
    }

    /// [`set`](Self::set)s every entry of `other`, in order.
    pub fn merge(&mut self, other: impl Into<Mapping>) {
        for (key, value) in other.into() {
            self.store(&key_string(key), value);
        }
    }

    /// Sets `value` at a dotted path, opening intermediate nodes as needed.
    pub fn set_path(&mut self, path: impl AsRef<str>, value: impl Into<YamlValue>) {
        let segments: Vec<&str> = path.as_ref().split('.').collect();
        self.set_segments(segments.as_slice(), value.into());
    }

    fn set_segments<S: AsRef<str>>(&mut self, segments: &[S], value: YamlValue) {
        match segments {
            [] => {}
            [last] => self.store(last.as_ref(), value),
            [first, rest @ ..] => self.open(first.as_ref(), |child| child.set_segments(rest, value)),
        }
    }

    pub fn remove(&mut self, key: impl AsRef<str>) -> Option<Value> {
        self.data.shift_remove(key.as_ref())
    }

    /// Temporarily sets `key` to `value` while `f` runs, then puts the slot
    /// back exactly as it was, also when `f` panics.
    pub fn tmp<R>(
        &mut self,
        key: impl AsRef<str>,
        value: impl Into<YamlValue>,
        f: impl FnOnce(&mut Node) -> R,
    ) -> R {
        let key = key.as_ref();
        let initial = self.data.get(key).cloned();
        self.set(key, value);

        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self)));

        match initial {
            Some(initial) => {
                self.data.insert(key.to_owned(), initial);
            }
            None => {
                self.data.shift_remove(key);
            }
        }
        result.unwrap_or_else(|payload| panic::resume_unwind(payload))
    }

    /// Plain nested mapping snapshot of this node.
    pub fn to_h(&self) -> Mapping {
        self.data
            .iter()
            .map(|(key, value)| (YamlValue::String(key.clone()), value.to_yaml()))
            .collect()
    }

    /// Deserializes a snapshot of this node into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_yaml::from_value(YamlValue::Mapping(self.to_h())).map_err(ConfigError::DeserializeError)
    }

    /// Attribute-style read.
    ///
    /// A stored key wins. Otherwise the mapping built-ins `keys`, `values`,
    /// `len`/`size`/`length` and `is_empty`/`empty?` answer, and any other
    /// name fails with [`ConfigError::MissingKey`].
    pub fn attr(&self, name: &str) -> Result<Attr<'_>, ConfigError> {
        if let Some(value) = self.data.get(name) {
            return Ok(Attr::Value(value));
        }
        match name {
            "keys" => Ok(Attr::Keys(self.keys().collect())),
            "values" => Ok(Attr::Values(self.values().collect())),
            "len" | "size" | "length" => Ok(Attr::Len(self.len())),
            "is_empty" | "empty?" => Ok(Attr::IsEmpty(self.is_empty())),
            _ => Err(ConfigError::MissingKey(name.to_owned())),
        }
    }

    /// Attribute-style write; `name=` and `name` are equivalent.
    pub fn set_attr(&mut self, name: &str, value: impl Into<YamlValue>) {
        self.set(name.strip_suffix('=').unwrap_or(name), value);
    }

    /// Applies every entry produced by `source`.
    ///
    /// Entries with an empty path are merged into this node; the rest are
    /// stored at their path.
    pub fn apply<S: ConfigSource + ?Sized>(&mut self, source: &S) -> Result<(), ConfigError> {
        self.apply_entries(source.entries()?);
        Ok(())
    }

    fn apply_entries(&mut self, entries: Vec<ConfigEntry>) {
        trace!(entries = entries.len(), "applying config entries");

        for ConfigEntry { path, value } in entries {
            if !path.is_empty() {
                self.set_segments(path.as_slice(), value);
                continue;
            }
            match value {
                YamlValue::Mapping(mapping) => self.merge(mapping),
                YamlValue::Null => {}
                other => warn!(value = ?other, "ignoring non-mapping entry without a path"),
            }
        }
    }

    /// Overlays `CONFG_*` environment variables, see [`EnvSource`].
    pub fn load_env(&mut self) -> Result<(), ConfigError> {
        self.load_env_prefixed(DEFAULT_ENV_PREFIX)
    }

    pub fn load_env_prefixed(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let entries = EnvSource::new(prefix).entries()?;
        debug!(prefix, variables = entries.len(), "loading environment overlay");
        self.apply_entries(entries);
        Ok(())
    }

    /// Loads a YAML file relative to this node's root, see [`FileSource`].
    pub fn load_yaml(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.load_yaml_with(path, LoadOptions::new())
    }

    pub fn load_yaml_with(
        &mut self,
        path: impl AsRef<Path>,
        options: LoadOptions,
    ) -> Result<(), ConfigError> {
        let source = FileSource::resolve(
            &self.root,
            path,
            self.environment.clone(),
            options,
            Arc::clone(&self.preprocessor),
        )?;
        match source {
            Some(source) => self.apply(&source),
            None => Ok(()),
        }
    }

    pub fn load_yml(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.load_yaml(path)
    }

    /// Loads the file named after `key` and stores its content under `key`.
    pub fn load_key(&mut self, key: impl AsRef<str>) -> Result<(), ConfigError> {
        let key = key.as_ref();
        self.load_yaml_with(key, LoadOptions::new().key(key))
    }
}

fn key_string(key: YamlValue) -> String {
    match key {
        YamlValue::String(s) => s,
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Null => String::new(),
        YamlValue::Tagged(tagged) => key_string(tagged.value),
        complex => serde_yaml::to_string(&complex)
            .map(|s| s.trim_end().to_owned())
            .unwrap_or_default(),
    }
}

impl<K: AsRef<str>> Index<K> for Node {
    type Output = Value;

    fn index(&self, key: K) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

/// Nodes compare by content only.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.data.iter()).finish()
    }
}

impl From<&Node> for Mapping {
    fn from(node: &Node) -> Self {
        node.to_h()
    }
}

impl From<Node> for Mapping {
    fn from(node: Node) -> Self {
        node.to_h()
    }
}

impl From<Node> for YamlValue {
    fn from(node: Node) -> Self {
        YamlValue::Mapping(node.to_h())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::TempDir;

    fn config() -> Node {
        Node::new("test", "/nonexistent")
    }

    fn yaml(text: &str) -> YamlValue {
        serde_yaml::from_str(text).unwrap()
    }

    fn mapping(text: &str) -> Mapping {
        serde_yaml::from_str(text).unwrap()
    }

    fn fixture_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(
            dir.path().join("config/example.yml"),
            "\
shared: &shared
  foo: foo
production:
  <<: *shared
  env_setting: setting_prod
test:
  <<: *shared
  env_setting: setting_test
",
        )
        .unwrap();
        fs::write(dir.path().join("config/servers.yml"), "- alpha\n- beta\n").unwrap();
        dir
    }

    #[test]
    fn test_simple_keys_can_be_assigned() {
        let mut config = config();
        config.set("foo", "bar");

        assert_eq!(config.get("foo").unwrap(), "bar");
        assert_eq!(config.fetch("foo").unwrap(), "bar");
        assert_eq!(config.to_h(), mapping("foo: bar"));
    }

    #[test]
    fn test_a_child_can_be_opened() {
        let mut config = config();
        config.open("foo", |child| child.set("bar", "baz"));

        assert_eq!(config["foo"]["bar"], "baz");
        assert_eq!(config.to_h(), mapping("foo: {bar: baz}"));
    }

    #[test]
    fn test_open_replaces_non_node_value() {
        let mut config = config();
        config.set("foo", "scalar");
        config.open("foo", |child| child.set("bar", 1));

        assert_eq!(config.to_h(), mapping("foo: {bar: 1}"));
    }

    #[test]
    fn test_open_returns_closure_result() {
        let mut config = config();
        let len = config.open("foo", |child| {
            child.set("a", 1);
            child.set("b", 2);
            child.len()
        });
        assert_eq!(len, 2);
    }

    #[test]
    fn test_a_child_can_be_merged_by_assigning_a_mapping() {
        let mut config = config();
        config.set("foo", yaml("bar: baz"));

        assert!(config["foo"].as_node().is_some());
        assert_eq!(config.to_h(), mapping("foo: {bar: baz}"));
    }

    #[test]
    fn test_assigning_mappings_merges_disjoint_keys() {
        let mut config = config();
        config.set("db", yaml("host: h"));
        config.set("db", yaml("port: 5432"));

        let db = config["db"].as_node().unwrap();
        assert_eq!(db.keys().collect::<Vec<_>>(), vec!["host", "port"]);
    }

    #[test]
    fn test_non_mapping_values_overwrite() {
        let mut config = config();
        config.set("db", yaml("host: h"));
        config.set("db", "plain");
        assert_eq!(config["db"], "plain");

        config.set("list", vec!["a", "b"]);
        config.set("list", 3);
        assert_eq!(config["list"].as_i64(), Some(3));
    }

    #[test]
    fn test_missing_key_is_strict_on_fetch_only() {
        let config = config();

        assert!(matches!(config.fetch("foo"), Err(ConfigError::MissingKey(k)) if k == "foo"));
        assert!(config.get("foo").is_none());
        assert!(config["foo"].is_null());
    }

    #[test]
    fn test_strict_chain_through_values() {
        let mut config = config();
        config.set_path("api.keys.google", "g123");

        let google = config
            .fetch("api")
            .and_then(|api| api.fetch("keys"))
            .and_then(|keys| keys.fetch("google"))
            .unwrap();
        assert_eq!(google, "g123");

        let missing = config.fetch("api").and_then(|api| api.fetch("nope"));
        assert!(matches!(missing, Err(ConfigError::MissingKey(k)) if k == "nope"));
    }

    #[test]
    fn test_paths() {
        let mut config = config();
        config.set_path("a.b.c", "x");

        assert_eq!(config.get_path("a.b.c").unwrap(), "x");
        assert!(config.get_path("a.b.missing").is_none());
        assert!(config.get_path("a.b.c.deeper").is_none());
        assert!(config.get_path("nothing.here").is_none());
        assert_eq!(config.to_h(), mapping("a: {b: {c: x}}"));
    }

    #[test]
    fn test_set_path_preserves_siblings() {
        let mut config = config();
        config.set("a", yaml("b: {keep: 1}\nother: 2"));
        config.set_path("a.b.new", 3);

        assert_eq!(config.to_h(), mapping("a: {b: {keep: 1, new: 3}, other: 2}"));
    }

    #[test]
    fn test_attr_reads_keys_then_builtins() {
        let mut config = config();
        config.set_attr("foo=", "foo_value");
        config.set_attr("bar", "bar_value");

        assert_eq!(config.attr("keys").unwrap(), Attr::Keys(vec!["foo", "bar"]));
        let values: Vec<&str> = match config.attr("values").unwrap() {
            Attr::Values(values) => values.into_iter().filter_map(Value::as_str).collect(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(values, vec!["foo_value", "bar_value"]);
        assert_eq!(config.attr("size").unwrap(), Attr::Len(2));
        assert_eq!(config.attr("foo").unwrap().value().unwrap(), "foo_value");
        assert!(matches!(config.attr("other_var"), Err(ConfigError::MissingKey(_))));

        config.set("keys", yaml("google: g"));
        assert!(config.attr("keys").unwrap().value().unwrap().as_node().is_some());
    }

    #[test]
    fn test_merge_preserves_sibling_keys_at_nested_level() {
        let mut config = config();
        config.set("database", yaml("{host: original_host, port: '5432'}"));
        config.merge(mapping("database: {host: new_host}"));

        assert_eq!(config["database"]["host"], "new_host");
        assert_eq!(config["database"]["port"], "5432");
    }

    #[test]
    fn test_merge_preserves_deeply_nested_sibling_keys() {
        let mut config = config();
        config.set("api", yaml("keys: {google: g123, stripe: s456}"));
        config.merge(mapping("api: {keys: {google: new_google_key}}"));

        assert_eq!(config.get_path("api.keys.google").unwrap(), "new_google_key");
        assert_eq!(config.get_path("api.keys.stripe").unwrap(), "s456");
    }

    #[test]
    fn test_merge_another_node() {
        let mut base = config();
        base.set("db", yaml("{host: h, port: 1}"));
        let mut overlay = config();
        overlay.set_path("db.port", 2);

        base.merge(&overlay);
        assert_eq!(base.to_h(), mapping("db: {host: h, port: 2}"));
    }

    #[test]
    fn test_non_string_keys_are_normalized() {
        let mut config = config();
        config.merge(mapping("1: one\ntrue: yes\n~: nothing"));

        assert_eq!(config["1"], "one");
        assert_eq!(config["true"].as_str(), Some("yes"));
        assert_eq!(config[""], "nothing");
    }

    #[test]
    fn test_mappings_inside_sequences_become_nodes() {
        let mut config = config();
        config.set("servers", yaml("[{name: a}, {name: b}]"));

        let servers = config["servers"].as_sequence().unwrap();
        assert_eq!(servers[1]["name"], "b");
        assert_eq!(servers[0].as_node().unwrap().environment(), "test");
        assert_eq!(config.to_h(), mapping("servers: [{name: a}, {name: b}]"));
    }

    #[test]
    fn test_children_inherit_context() {
        let mut config = Node::new("production", "/srv/app");
        config.set_path("a.b", 1);

        let b_parent = config["a"].as_node().unwrap();
        assert_eq!(b_parent.environment(), "production");
        assert_eq!(b_parent.root(), Path::new("/srv/app"));
    }

    #[test]
    fn test_tmp_restores_previous_value() {
        let mut config = config();
        config.set("db", yaml("{host: h, port: 1}"));

        let seen = config.tmp("db", "temporary", |config| config["db"].as_str().map(str::to_owned));
        assert_eq!(seen.as_deref(), Some("temporary"));
        assert_eq!(config.to_h(), mapping("db: {host: h, port: 1}"));

        config.tmp("flag", true, |config| assert_eq!(config["flag"].as_bool(), Some(true)));
        assert!(!config.contains_key("flag"));
    }

    #[test]
    fn test_tmp_restores_after_panic() {
        let mut config = config();
        config.set("flag", "original");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            config.tmp("flag", "temporary", |_| panic!("failed inside tmp"));
        }));
        assert!(outcome.is_err());
        assert_eq!(config["flag"], "original");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            config.tmp("added", 1, |_| panic!("failed inside tmp"));
        }));
        assert!(outcome.is_err());
        assert!(!config.contains_key("added"));
    }

    #[test]
    fn test_remove() {
        let mut config = config();
        config.set("a", 1);
        config.set("b", 2);

        assert!(config.remove("a").is_some());
        assert!(config.remove("a").is_none());
        assert_eq!(config.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_deserialize_snapshot() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Database {
            host: String,
            port: u16,
        }

        let mut config = config();
        config.set("database", yaml("{host: db, port: 5432}"));

        let db: Database = config["database"].as_node().unwrap().deserialize().unwrap();
        assert_eq!(db, Database { host: "db".into(), port: 5432 });

        let result = config.deserialize::<Database>();
        assert!(matches!(result, Err(ConfigError::DeserializeError(_))));
    }

    #[test]
    fn test_a_yml_file_can_be_loaded_by_env() {
        let root = fixture_root();
        let mut config = Node::new("test", root.path());
        config.load_yaml("example.yml").unwrap();

        assert_eq!(config.to_h(), mapping("{foo: foo, env_setting: setting_test}"));
    }

    #[test]
    fn test_a_yml_file_can_be_loaded_raw() {
        let root = fixture_root();
        let mut config = Node::new("test", root.path());
        config
            .load_yaml_with("example", LoadOptions::new().ignore_env(true))
            .unwrap();

        assert_eq!(
            config.to_h(),
            mapping(
                "\
shared: {foo: foo}
production: {env_setting: setting_prod, foo: foo}
test: {env_setting: setting_test, foo: foo}
"
            )
        );
    }

    #[test]
    fn test_load_key() {
        let root = fixture_root();
        let mut config = Node::new("test", root.path());
        config.load_key("servers").unwrap();

        let servers = config.fetch("servers").unwrap().as_sequence().unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0], "alpha");
    }

    #[test]
    fn test_sequence_without_key_fails() {
        let root = fixture_root();
        let mut config = Node::new("test", root.path());

        let result = config.load_yml("servers");
        assert!(matches!(result, Err(ConfigError::MissingKeyForSequence(_))));
        assert!(config.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let root = fixture_root();
        let mut config = Node::new("test", root.path());

        let result = config.load_yaml("nope");
        assert!(matches!(result, Err(ConfigError::FileNotFound(p)) if p == Path::new("nope")));

        config
            .load_yaml_with("nope", LoadOptions::new().required(false))
            .unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_load_env_applies_env_vars() {
        temp_env::with_vars(
            [("CONFG_DATABASE__HOST", Some("envhost")), ("CONFG_DATABASE__PORT", Some("5432"))],
            || {
                let mut config = config();
                config.load_env().unwrap();

                assert_eq!(config["database"]["host"], "envhost");
                assert_eq!(config["database"]["port"], "5432");
            },
        );
    }

    #[test]
    fn test_load_env_with_custom_prefix() {
        temp_env::with_var("MYAPP_API__KEY", Some("secret"), || {
            let mut config = config();
            config.load_env_prefixed("MYAPP_").unwrap();

            assert_eq!(config.fetch("api").unwrap().fetch("key").unwrap(), "secret");
        });
    }

    #[test]
    fn test_load_env_ignores_unrelated_vars() {
        temp_env::with_var("OTHER_VAR", Some("ignored"), || {
            let mut config = config();
            config.load_env().unwrap();

            assert!(matches!(config.fetch("other_var"), Err(ConfigError::MissingKey(_))));
        });
    }

    #[test]
    fn test_load_env_splits_dotted_names() {
        temp_env::with_var("CONFG_A.B__C", Some("v"), || {
            let mut config = config();
            config.load_env().unwrap();

            assert_eq!(config.get_path("a.b.c").unwrap(), "v");
            assert!(!config.contains_key("a.b"));
        });
    }

    #[test]
    fn test_load_env_deeply_nested() {
        temp_env::with_var("CONFG_API__KEYS__GOOGLE", Some("xyz123"), || {
            let mut config = config();
            config.load_env().unwrap();

            assert_eq!(config.get_path("api.keys.google").unwrap(), "xyz123");
        });
    }

    #[test]
    fn test_load_env_preserves_existing_yaml_config() {
        let root = fixture_root();
        temp_env::with_var("CONFG_FOO", Some("overridden_foo"), || {
            let mut config = Node::new("test", root.path());
            config.load_yaml("example").unwrap();
            config.load_env().unwrap();

            assert_eq!(config["foo"], "overridden_foo");
            assert_eq!(config["env_setting"], "setting_test");
        });
    }

    #[test]
    fn test_load_env_preserves_nested_sibling_keys() {
        temp_env::with_var("CONFG_DATABASE__HOST", Some("env_host"), || {
            let mut config = config();
            config.set("database", yaml("{host: yaml_host, port: '5432', name: mydb}"));
            config.load_env().unwrap();

            assert_eq!(config["database"]["host"], "env_host");
            assert_eq!(config["database"]["port"], "5432");
            assert_eq!(config["database"]["name"], "mydb");
        });
    }

    #[test]
    fn test_custom_preprocessor() {
        #[derive(Debug)]
        struct Upper;

        impl TextPreprocessor for Upper {
            fn expand(&self, raw: &str) -> Result<String, ConfigError> {
                Ok(raw.replace("value", "VALUE"))
            }
        }

        let root = TempDir::new().unwrap();
        fs::write(root.path().join("plain.yml"), "key: value\n").unwrap();

        let mut config = Node::with_preprocessor("", root.path(), Arc::new(Upper));
        config.load_yaml("plain.yml").unwrap();

        assert_eq!(config["key"], "VALUE");
    }
}
