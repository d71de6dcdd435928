//! oceanctl - command-line client for the cloud API

use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use oceanctl::cancel::CancelToken;
use oceanctl::context::Io;

/// Exit code when interrupted twice.
const INTERRUPTED: i32 = 130;

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cancel = CancelToken::new();
    watch_interrupts(cancel.clone())?;

    let app = oceanctl::cli::app()
        .context("building command tree")?
        .with_cancel(cancel);

    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut input = stdin.lock();
    let mut out = io::stdout().lock();
    let mut err = io::stderr().lock();

    Ok(app.run(
        std::env::args_os(),
        Io::new(&mut out, &mut err, &mut input, interactive),
    ))
}

/// First Ctrl-C cancels the running command; a second one exits at once.
fn watch_interrupts(cancel: CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting signal runtime")?;

    std::thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    if tokio::signal::ctrl_c().await.is_err() {
                        return;
                    }
                    if cancel.is_canceled() {
                        std::process::exit(INTERRUPTED);
                    }
                    cancel.cancel();
                }
            })
        })
        .context("spawning signal watcher")?;
    Ok(())
}
