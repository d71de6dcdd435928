//! The user's YAML config file: path resolution, lookup and atomic writes.
//!
//! Layout:
//!
//! ```yaml
//! context: staging
//! access-token: dop_v1_default
//! auth-contexts:
//!   staging: dop_v1_staging
//! output: json
//! compute:
//!   droplet:
//!     create:
//!       region: nyc1
//! contexts:
//!   staging:
//!     output: text
//! ```

use crate::config::Environment;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde_yaml::{Mapping, Value as Yaml};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_CONTEXT: &str = "default";
const APP_DIR: &str = "oceanctl";
const FILE_NAME: &str = "config.yaml";

/// Serializes config writes within the process.
static WRITE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Directory holding the config file and the serverless helper.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Resolve the config file path: explicit flag, then `<PREFIX>_CONFIG`, then
/// the per-user default.
pub fn resolve_path(flag: Option<&str>, env: &dyn Environment, prefix: &str) -> PathBuf {
    if let Some(p) = flag.filter(|p| !p.is_empty()) {
        return PathBuf::from(p);
    }
    if let Some(p) = env.var(&format!("{}_CONFIG", prefix)) {
        return PathBuf::from(p);
    }
    default_config_dir().join(FILE_NAME)
}

// ============ ConfigFile ============

#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    doc: Mapping,
}

impl ConfigFile {
    /// An empty document that will be written to `path` on save.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            doc: Mapping::new(),
        }
    }

    /// Load the document at `path`. A missing file is an empty document.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using empty config");
            return Ok(Self::empty(path));
        }
        let data = std::fs::read_to_string(&path)?;
        let doc = parse(&data)
            .map_err(|e| Error::invalid(format!("config file {}: {}", path.display(), e)))?;
        Ok(Self { path, doc })
    }

    pub fn from_yaml(path: impl Into<PathBuf>, data: &str) -> Result<Self> {
        let doc = parse(data).map_err(|e| Error::invalid(format!("config file: {}", e)))?;
        Ok(Self {
            path: path.into(),
            doc,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the config file.
    pub fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_dir)
    }

    /// Walk nested mappings along `segments`.
    pub fn lookup(&self, segments: &[&str]) -> Option<&Yaml> {
        let (last, parents) = segments.split_last()?;
        let mut cur = &self.doc;
        for seg in parents {
            cur = cur.get(*seg)?.as_mapping()?;
        }
        cur.get(*last).filter(|v| !v.is_null())
    }

    /// Set a value, creating intermediate mappings as needed.
    pub fn set(&mut self, segments: &[&str], value: Yaml) {
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut cur = &mut self.doc;
        for seg in parents {
            let key = Yaml::from(*seg);
            let needs_map = !matches!(cur.get(&key), Some(Yaml::Mapping(_)));
            if needs_map {
                cur.insert(key.clone(), Yaml::Mapping(Mapping::new()));
            }
            cur = match cur.get_mut(&key) {
                Some(Yaml::Mapping(m)) => m,
                _ => return,
            };
        }
        cur.insert(Yaml::from(*last), value);
    }

    pub fn remove(&mut self, segments: &[&str]) -> Option<Yaml> {
        let (last, parents) = segments.split_last()?;
        let mut cur = &mut self.doc;
        for seg in parents {
            cur = cur.get_mut(*seg)?.as_mapping_mut()?;
        }
        cur.remove(*last)
    }

    // ============ Auth contexts ============

    /// The `context` key, if present.
    pub fn current_context(&self) -> Option<&str> {
        self.lookup(&["context"]).and_then(Yaml::as_str)
    }

    pub fn set_current_context(&mut self, name: &str) {
        self.set(&["context"], Yaml::from(name));
    }

    /// Token stored for an auth context.
    pub fn token_for(&self, context: &str) -> Option<&str> {
        if context == DEFAULT_CONTEXT {
            self.lookup(&["access-token"]).and_then(Yaml::as_str)
        } else {
            self.lookup(&["auth-contexts", context]).and_then(Yaml::as_str)
        }
    }

    pub fn set_token(&mut self, context: &str, token: &str) {
        if context == DEFAULT_CONTEXT {
            self.set(&["access-token"], Yaml::from(token));
        } else {
            self.set(&["auth-contexts", context], Yaml::from(token));
        }
    }

    /// All known auth contexts, `default` first, the rest sorted.
    pub fn contexts(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lookup(&["auth-contexts"])
            .and_then(Yaml::as_mapping)
            .map(|m| m.keys().filter_map(Yaml::as_str).map(String::from).collect())
            .unwrap_or_default();
        names.retain(|n| n != DEFAULT_CONTEXT);
        names.sort();
        names.insert(0, DEFAULT_CONTEXT.to_string());
        names
    }

    /// Remove a named auth context along with its per-context overrides.
    pub fn remove_context(&mut self, context: &str) -> Result<()> {
        if context == DEFAULT_CONTEXT {
            return Err(Error::invalid("the default context cannot be removed"));
        }
        if self.remove(&["auth-contexts", context]).is_none() {
            return Err(Error::not_found(format!("context {:?}", context)));
        }
        self.remove(&["contexts", context]);
        if self.current_context() == Some(context) {
            self.set_current_context(DEFAULT_CONTEXT);
        }
        Ok(())
    }

    // ============ Persistence ============

    /// Write the document atomically: sibling temp file, fsync, rename.
    pub fn save(&self) -> Result<()> {
        let _guard = WRITE_LOCK
            .lock()
            .map_err(|_| Error::internal("config write lock poisoned"))?;

        let dir = self.dir();
        std::fs::create_dir_all(&dir)?;

        let data = serde_yaml::to_string(&self.doc)
            .map_err(|e| Error::internal(format!("serializing config: {}", e)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(data.as_bytes())?;
        tmp.as_file().sync_all()?;
        set_private(tmp.path())?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(path = %self.path.display(), "config written");
        Ok(())
    }
}

fn parse(data: &str) -> std::result::Result<Mapping, serde_yaml::Error> {
    if data.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Yaml>(data)? {
        Yaml::Mapping(m) => Ok(m),
        Yaml::Null => Ok(Mapping::new()),
        _ => Err(serde::de::Error::custom("top level must be a mapping")),
    }
}

#[cfg(unix)]
fn set_private(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_private(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
