//! Namespaced configuration lookup.
//!
//! A value for `(namespace, key)` comes from the first source that has it:
//! an explicit command-line flag, an environment variable, the config file,
//! then the flag's declared default.

use crate::command::FlagDescriptor;
use crate::config_file::{ConfigFile, DEFAULT_CONTEXT};
use crate::error::{Error, Result};
use serde_yaml::Value as Yaml;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "OCEANCTL";

/// Root-level keys with a fixed environment variable name.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("token", "ACCESS_TOKEN"),
    ("access-token", "ACCESS_TOKEN"),
    ("context", "CONTEXT"),
    ("config", "CONFIG"),
    ("api-url", "API_URL"),
    ("enable-beta", "ENABLE_BETA"),
];

// ============ Environment ============

/// Read access to environment variables.
pub trait Environment: Send + Sync {
    /// Value of `name`. Unset and empty variables are both `None`.
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

/// A fixed set of variables, for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

impl Environment for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.0.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

// ============ Values ============

/// Value kinds a flag can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Bool,
    Int,
    String,
    StringList,
}

impl FlagKind {
    pub fn zero(self) -> Value {
        match self {
            FlagKind::Bool => Value::Bool(false),
            FlagKind::Int => Value::Int(0),
            FlagKind::String => Value::Str(String::new()),
            FlagKind::StringList => Value::List(Vec::new()),
        }
    }
}

/// A raw configuration value before coercion to the requested kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::List(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl Value {
    fn from_yaml(y: &Yaml) -> Option<Value> {
        match y {
            Yaml::Bool(b) => Some(Value::Bool(*b)),
            Yaml::Number(n) => Some(match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Str(n.to_string()),
            }),
            Yaml::String(s) => Some(Value::Str(s.clone())),
            Yaml::Sequence(items) => Some(Value::List(
                items
                    .iter()
                    .filter_map(Value::from_yaml)
                    .map(|v| v.to_string())
                    .collect(),
            )),
            _ => None,
        }
    }

    fn as_string(&self) -> String {
        self.to_string()
    }

    fn as_int(&self, key: &str) -> Result<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::invalid(format!("{}: {:?} is not an integer", key, s))),
            other => Err(Error::invalid(format!(
                "{}: {} is not an integer",
                key, other
            ))),
        }
    }

    fn as_bool(&self, key: &str) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            Value::Str(s) => parse_bool(s)
                .ok_or_else(|| Error::invalid(format!("{}: {:?} is not a boolean", key, s))),
            Value::List(_) => Err(Error::invalid(format!("{}: a list is not a boolean", key))),
        }
    }

    fn as_list(&self) -> Vec<String> {
        match self {
            Value::List(items) => items.clone(),
            Value::Str(s) => split_list(s),
            other => vec![other.to_string()],
        }
    }
}

/// Accepts the same spellings as the usual `strconv` boolean parser.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Split `a,b,c` or `[a,b,c]`, dropping empty items.
pub fn split_list(s: &str) -> Vec<String> {
    let trimmed = s.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(trimmed);
    inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

// ============ Bindings ============

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Source {
    Default,
    File,
    Env,
    Flag,
}

#[derive(Debug, Clone)]
struct Binding {
    kind: FlagKind,
    default: Option<Value>,
    required: bool,
    env_name: String,
    file_path: Vec<String>,
}

/// Namespace path without the root segment: `oceanctl.compute.droplet` → `compute.droplet`.
fn ns_path(ns: &str) -> Vec<String> {
    ns.split('.').skip(1).map(String::from).collect()
}

/// Environment variable name for `key` declared on `decl_ns`.
pub fn env_name(prefix: &str, decl_ns: &str, key: &str) -> String {
    let path = ns_path(decl_ns);
    if path.is_empty() {
        if let Some((_, legacy)) = LEGACY_ENV.iter().find(|(k, _)| *k == key) {
            return format!("{}_{}", prefix, legacy);
        }
    }
    let mut parts = vec![prefix.to_string()];
    parts.extend(path);
    parts.push(key.to_string());
    parts
        .join("_")
        .to_uppercase()
        .replace(['-', '.'], "_")
}

// ============ ConfigResolver ============

/// Typed, namespaced lookup over flags, environment, config file and defaults.
pub struct ConfigResolver {
    root: String,
    prefix: String,
    flags: HashMap<(String, String), Value>,
    bindings: HashMap<(String, String), Binding>,
    env: Arc<dyn Environment>,
    file: ConfigFile,
}

impl ConfigResolver {
    pub fn new(root: impl Into<String>, env: Arc<dyn Environment>, file: ConfigFile) -> Self {
        Self {
            root: root.into(),
            prefix: ENV_PREFIX.to_string(),
            flags: HashMap::new(),
            bindings: HashMap::new(),
            env,
            file,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Bind a flag descriptor, declared on `decl_ns`, so it is visible at `ns`.
    pub fn bind(&mut self, ns: &str, decl_ns: &str, flag: &FlagDescriptor) {
        let mut file_path = ns_path(decl_ns);
        file_path.push(flag.name.clone());
        self.bindings.insert(
            (ns.to_string(), flag.name.clone()),
            Binding {
                kind: flag.kind,
                default: flag.default.clone(),
                required: flag.required,
                env_name: env_name(&self.prefix, decl_ns, &flag.name),
                file_path,
            },
        );
    }

    /// Record an explicit value. Explicit values beat every other source.
    pub fn set(&mut self, ns: &str, key: &str, value: impl Into<Value>) {
        self.flags
            .insert((ns.to_string(), key.to_string()), value.into());
    }

    /// True if a source above the default supplied the value.
    pub fn is_set(&self, ns: &str, key: &str) -> bool {
        matches!(self.resolve(ns, key), Some((_, s)) if s > Source::Default)
    }

    pub fn get_string(&self, ns: &str, key: &str) -> Result<String> {
        Ok(self
            .lookup(ns, key, FlagKind::String)?
            .as_string())
    }

    pub fn get_int(&self, ns: &str, key: &str) -> Result<i64> {
        self.lookup(ns, key, FlagKind::Int)?.as_int(key)
    }

    pub fn get_bool(&self, ns: &str, key: &str) -> Result<bool> {
        self.lookup(ns, key, FlagKind::Bool)?.as_bool(key)
    }

    pub fn get_string_list(&self, ns: &str, key: &str) -> Result<Vec<String>> {
        Ok(self.lookup(ns, key, FlagKind::StringList)?.as_list())
    }

    /// The active auth context: `--context`, `<PREFIX>_CONTEXT`, the file's
    /// `context` key, else `default`.
    pub fn active_context(&self) -> String {
        if let Some(v) = self.flags.get(&(self.root.clone(), "context".to_string())) {
            let s = v.to_string();
            if !s.is_empty() {
                return s;
            }
        }
        if let Some(v) = self.env.var(&format!("{}_CONTEXT", self.prefix)) {
            return v;
        }
        self.file
            .current_context()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CONTEXT)
            .to_string()
    }

    pub fn file(&self) -> &ConfigFile {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut ConfigFile {
        &mut self.file
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn lookup(&self, ns: &str, key: &str, kind: FlagKind) -> Result<Value> {
        let binding = self.bindings.get(&(ns.to_string(), key.to_string()));
        let resolved = self.resolve(ns, key);

        if let Some(b) = binding {
            if b.required && !matches!(resolved, Some((_, s)) if s > Source::Default) {
                return Err(Error::missing_flag(key));
            }
        }

        Ok(resolved
            .map(|(v, _)| v)
            .unwrap_or_else(|| binding.map(|b| b.kind).unwrap_or(kind).zero()))
    }

    fn resolve(&self, ns: &str, key: &str) -> Option<(Value, Source)> {
        if let Some(v) = self.flags.get(&(ns.to_string(), key.to_string())) {
            return Some((v.clone(), Source::Flag));
        }

        let binding = self.bindings.get(&(ns.to_string(), key.to_string()));
        let (env_var, file_path) = match binding {
            Some(b) => (b.env_name.clone(), b.file_path.clone()),
            None => {
                let mut path = ns_path(ns);
                path.push(key.to_string());
                (env_name(&self.prefix, ns, key), path)
            }
        };

        if let Some(v) = self.env.var(&env_var) {
            return Some((Value::Str(v), Source::Env));
        }

        if let Some(v) = self.file_value(&file_path) {
            return Some((v, Source::File));
        }

        binding
            .and_then(|b| b.default.clone())
            .map(|v| (v, Source::Default))
    }

    fn file_value(&self, path: &[String]) -> Option<Value> {
        let context = self.active_context();

        if path.len() == 1 && (path[0] == "access-token" || path[0] == "token") {
            return self.file.token_for(&context).map(Value::from);
        }

        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        let mut scoped = vec!["contexts", context.as_str()];
        scoped.extend(&segments);

        self.file
            .lookup(&scoped)
            .or_else(|| self.file.lookup(&segments))
            .and_then(Value::from_yaml)
    }
}
