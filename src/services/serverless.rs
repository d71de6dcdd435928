//! The out-of-process serverless helper.
//!
//! The helper is a separately distributed executable unpacked under
//! `<config dir>/serverless`. It prints a JSON envelope on stdout:
//! `{captured, formatted, table, entity, error}`. Per-account credentials
//! live in `serverless/creds/<hash>` where `<hash>` is derived from the
//! access token.

use super::ClientConfig;
use crate::error::{Error, Result};
use crate::output::write_json;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Helper version this client is built against.
pub const MIN_VERSION: &str = "5.0.18";

const HELPER: &str = "sandbox";
const VERSION_FILE: &str = "version";
const CREDS_DIR: &str = "creds";
const CREDENTIALS_FILE: &str = "credentials.json";
const DOWNLOAD_BASE: &str = "https://do-serverless-tools.nyc3.digitaloceanspaces.com";

// ============ Types ============

/// Parsed helper output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerlessOutput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table: Vec<serde_json::Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captured: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formatted: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerlessStatus {
    NotInstalled,
    NeedsUpgrade { found: String },
    NotConnected,
    Ready,
}

impl ServerlessStatus {
    /// Error to report when a command needs a usable helper.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Ready => Ok(()),
            Self::NotInstalled => Err(Error::plugin(
                "serverless support is not installed (use `oceanctl serverless install`)",
            )),
            Self::NeedsUpgrade { found } => Err(Error::plugin(format!(
                "serverless support {} is older than {} (use `oceanctl serverless upgrade`)",
                found, MIN_VERSION
            ))),
            Self::NotConnected => Err(Error::plugin(
                "serverless support is installed but not connected to a functions namespace",
            )),
        }
    }
}

/// Namespace credentials written by the helper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "currentHost", default)]
    pub api_host: String,
    #[serde(rename = "currentNamespace", default)]
    pub namespace: String,
}

/// A prepared helper invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerlessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ServerlessCommand {
    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
        cmd.stdin(Stdio::null());
        cmd
    }
}

pub trait ServerlessService: Send + Sync {
    fn status(&self) -> Result<ServerlessStatus>;

    /// Install the helper, or replace an outdated one when `upgrading`.
    fn install(&self, upgrading: bool) -> Result<()>;

    fn credentials(&self) -> Result<Option<Credentials>>;

    /// Prepare `subcommand` (slash separated, e.g. `functions/list`).
    fn cmd(&self, subcommand: &str, args: &[String]) -> Result<ServerlessCommand>;

    /// Run and capture the JSON envelope.
    fn exec(&self, cmd: &ServerlessCommand) -> Result<ServerlessOutput>;

    /// Run, copying the helper's stdout and stderr straight through.
    fn stream(&self, cmd: &ServerlessCommand, out: &mut dyn Write, err: &mut dyn Write)
        -> Result<()>;
}

// ============ Helpers ============

/// Short, stable directory name for an access token.
pub fn hash_access_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..4])
}

/// Compare dotted numeric versions; non-numeric parts compare as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .trim_start_matches('v')
            .split('.')
            .map(|p| p.parse().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parse(a), parse(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let (x, y) = (
            a.get(i).copied().unwrap_or(0),
            b.get(i).copied().unwrap_or(0),
        );
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Parse helper stdout. A non-empty `error` field becomes an error.
pub fn parse_output(stdout: &[u8]) -> Result<ServerlessOutput> {
    let out: ServerlessOutput = serde_json::from_slice(stdout)
        .map_err(|e| Error::plugin(format!("unreadable helper output: {}", e)))?;
    if !out.error.is_empty() {
        return Err(Error::plugin(out.error));
    }
    Ok(out)
}

/// Print helper output. Text mode prefers formatted lines, then captured
/// lines, then the table, then the entity.
pub fn print_output(out: &mut dyn Write, output: &ServerlessOutput, json: bool) -> Result<()> {
    if json {
        return match (&output.entity, output.table.is_empty()) {
            (Some(entity), _) => write_json(out, entity),
            (None, false) => write_json(out, &output.table),
            (None, true) => write_json(out, &output.captured),
        };
    }
    if !output.formatted.is_empty() {
        for line in &output.formatted {
            writeln!(out, "{}", line)?;
        }
    } else if !output.captured.is_empty() {
        for line in &output.captured {
            writeln!(out, "{}", line)?;
        }
    } else if !output.table.is_empty() {
        write_json(out, &output.table)?;
    } else if let Some(entity) = &output.entity {
        write_json(out, entity)?;
    }
    Ok(())
}

// ============ Live ============

pub struct LiveServerless {
    dir: PathBuf,
    creds_dir: PathBuf,
    token: String,
    user_agent: String,
    download_base: String,
}

impl LiveServerless {
    pub fn new(cfg: &ClientConfig) -> Self {
        let dir = cfg.config_dir.join("serverless");
        Self::with_dir(dir, cfg)
    }

    pub fn with_dir(dir: impl Into<PathBuf>, cfg: &ClientConfig) -> Self {
        let dir = dir.into();
        let creds_dir = dir
            .join(CREDS_DIR)
            .join(hash_access_token(&cfg.access_token));
        Self {
            dir,
            creds_dir,
            token: cfg.access_token.clone(),
            user_agent: format!("{} serverless/{}", cfg.user_agent, MIN_VERSION),
            download_base: DOWNLOAD_BASE.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn credentials_dir(&self) -> &Path {
        &self.creds_dir
    }

    fn helper(&self) -> PathBuf {
        self.dir.join(HELPER)
    }

    fn installed_version(&self) -> Option<String> {
        fs::read_to_string(self.dir.join(VERSION_FILE))
            .ok()
            .map(|v| v.trim().to_string())
    }

    fn download(&self) -> Result<Vec<u8>> {
        let url = format!(
            "{}/oceanctl-serverless-{}.tar.gz",
            self.download_base, MIN_VERSION
        );
        tracing::info!(%url, "downloading serverless helper");
        let resp = reqwest::blocking::get(&url)
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::transport(format!("downloading {}: {}", url, e)))?;
        let bytes = resp
            .bytes()
            .map_err(|e| Error::transport(format!("downloading {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }

    /// Unpack a gzipped tarball as the new helper directory.
    ///
    /// The archive is staged in a sibling temporary directory and renamed
    /// into place; existing credentials carry over.
    pub fn install_archive(&self, archive: impl Read) -> Result<()> {
        let parent = self
            .dir
            .parent()
            .ok_or_else(|| Error::internal("serverless directory has no parent"))?;
        fs::create_dir_all(parent)?;

        let tmp = tempfile::Builder::new()
            .prefix("serverless-install")
            .tempdir_in(parent)?;
        let staged = tmp.path().join("serverless");
        tar::Archive::new(GzDecoder::new(archive))
            .unpack(&staged)
            .map_err(|e| Error::plugin(format!("unpacking helper: {}", e)))?;

        if !staged.join(HELPER).exists() {
            return Err(Error::plugin("archive does not contain the serverless helper"));
        }
        fs::write(staged.join(VERSION_FILE), MIN_VERSION)?;

        let old_creds = self.dir.join(CREDS_DIR);
        if old_creds.exists() {
            fs::rename(&old_creds, staged.join(CREDS_DIR))?;
        }
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        fs::rename(&staged, &self.dir)?;
        tracing::debug!(dir = %self.dir.display(), "serverless helper installed");
        Ok(())
    }
}

impl ServerlessService for LiveServerless {
    fn status(&self) -> Result<ServerlessStatus> {
        if !self.helper().exists() {
            return Ok(ServerlessStatus::NotInstalled);
        }
        let found = self.installed_version().unwrap_or_default();
        if compare_versions(&found, MIN_VERSION) == Ordering::Less {
            return Ok(ServerlessStatus::NeedsUpgrade { found });
        }
        if !self.creds_dir.join(CREDENTIALS_FILE).exists() {
            return Ok(ServerlessStatus::NotConnected);
        }
        Ok(ServerlessStatus::Ready)
    }

    fn install(&self, upgrading: bool) -> Result<()> {
        match (self.status()?, upgrading) {
            (ServerlessStatus::NotInstalled, true) => {
                return Err(Error::invalid(
                    "serverless support is not installed (use `oceanctl serverless install`)",
                ))
            }
            (ServerlessStatus::NeedsUpgrade { .. }, _)
            | (ServerlessStatus::NotInstalled, false) => {}
            (_, true) => {
                return Err(Error::invalid(format!(
                    "serverless support is already at version {}",
                    MIN_VERSION
                )))
            }
            (_, false) => {
                return Err(Error::invalid(
                    "serverless support is already installed (use `oceanctl serverless upgrade`)",
                ))
            }
        }
        let archive = self.download()?;
        self.install_archive(archive.as_slice())
    }

    fn credentials(&self) -> Result<Option<Credentials>> {
        let path = self.creds_dir.join(CREDENTIALS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        let creds = serde_json::from_slice(&data)
            .map_err(|e| Error::plugin(format!("reading {}: {}", path.display(), e)))?;
        Ok(Some(creds))
    }

    fn cmd(&self, subcommand: &str, args: &[String]) -> Result<ServerlessCommand> {
        match self.status()? {
            ServerlessStatus::NotInstalled => ServerlessStatus::NotInstalled.into_result()?,
            s @ ServerlessStatus::NeedsUpgrade { .. } => s.into_result()?,
            _ => {}
        }
        let mut argv: Vec<String> = subcommand
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        argv.extend(args.iter().cloned());
        Ok(ServerlessCommand {
            program: self.helper(),
            args: argv,
            env: vec![
                (
                    "SERVERLESS_CREDS_DIR".into(),
                    self.creds_dir.display().to_string(),
                ),
                ("SERVERLESS_USER_AGENT".into(), self.user_agent.clone()),
                ("SERVERLESS_API_KEY".into(), self.token.clone()),
            ],
        })
    }

    fn exec(&self, cmd: &ServerlessCommand) -> Result<ServerlessOutput> {
        let mut command = cmd.to_command();
        command.arg("--json");
        tracing::debug!(program = %cmd.program.display(), args = ?cmd.args, "exec helper");
        let output = command
            .output()
            .map_err(|e| Error::plugin(format!("running helper: {}", e)))?;

        match parse_output(&output.stdout) {
            Err(Error::Plugin(msg)) if !output.status.success() && output.stdout.is_empty() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(Error::plugin(if stderr.trim().is_empty() {
                    msg
                } else {
                    stderr.trim().to_string()
                }))
            }
            other => other,
        }
    }

    fn stream(
        &self,
        cmd: &ServerlessCommand,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<()> {
        let mut child = cmd
            .to_command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::plugin(format!("running helper: {}", e)))?;

        let stderr_reader = child.stderr.take().map(|mut s| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = s.read_to_end(&mut buf);
                buf
            })
        });
        if let Some(mut stdout) = child.stdout.take() {
            std::io::copy(&mut stdout, out)?;
        }
        let status = child.wait()?;
        if let Some(handle) = stderr_reader {
            let buf = handle
                .join()
                .map_err(|_| Error::internal("stderr reader panicked"))?;
            err.write_all(&buf)?;
        }
        out.flush()?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::plugin(format!("helper exited with {}", status)))
        }
    }
}
