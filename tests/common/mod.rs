#![allow(dead_code)]

use oceanctl::config::MapEnv;
use oceanctl::context::Io;
use oceanctl::App;
use std::io::Cursor;
use std::path::PathBuf;
use tempfile::TempDir;

/// Captured result of one invocation.
#[derive(Debug, PartialEq, Eq)]
pub struct Outcome {
    pub code: i32,
    pub out: String,
    pub err: String,
}

pub fn run(app: &App, argv: &[&str]) -> Outcome {
    run_with_input(app, argv, "", false)
}

pub fn run_with_input(app: &App, argv: &[&str], stdin: &str, interactive: bool) -> Outcome {
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let mut input = Cursor::new(stdin.as_bytes().to_vec());
    let code = app.run(
        argv.iter().copied(),
        Io::new(&mut out, &mut err, &mut input, interactive),
    );
    Outcome {
        code,
        out: String::from_utf8(out).expect("stdout is utf-8"),
        err: String::from_utf8(err).expect("stderr is utf-8"),
    }
}

pub fn config_path(dir: &TempDir) -> PathBuf {
    dir.path().join("config.yaml")
}

/// An environment whose only variable points the config file into `dir`.
pub fn env_in(dir: &TempDir) -> MapEnv {
    MapEnv::new().with("OCEANCTL_CONFIG", config_path(dir).display().to_string())
}

pub fn write_config(dir: &TempDir, yaml: &str) {
    std::fs::write(config_path(dir), yaml).expect("write config");
}
