//! Poll asynchronous actions to a terminal state.

use crate::cancel::CancelToken;
use crate::context::CmdContext;
use crate::error::{Error, Result};
use crate::services::{Action, ActionStatus, ActionsService};
use std::sync::Mutex;
use std::time::Duration;

/// Granularity at which a real sleep checks for cancellation.
const SLICE: Duration = Duration::from_millis(100);

/// Blocks between polls.
pub trait Sleeper: Send + Sync {
    /// Sleep for `dur`. Returns [`Error::Canceled`] early if `cancel` fires.
    fn sleep(&self, dur: Duration, cancel: &CancelToken) -> Result<()>;
}

/// Sleeps on the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, dur: Duration, cancel: &CancelToken) -> Result<()> {
        let mut remaining = dur;
        while !remaining.is_zero() {
            if cancel.is_canceled() {
                return Err(Error::Canceled(None));
            }
            let step = remaining.min(SLICE);
            std::thread::sleep(step);
            remaining -= step;
        }
        if cancel.is_canceled() {
            return Err(Error::Canceled(None));
        }
        Ok(())
    }
}

/// Returns immediately and records every requested duration.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    calls: Mutex<Vec<Duration>>,
    cancel_after: Option<usize>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the cancel token on the `n`th sleep (1-based).
    pub fn cancel_after(n: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            cancel_after: Some(n),
        }
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, dur: Duration, cancel: &CancelToken) -> Result<()> {
        let count = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| Error::internal("sleeper lock poisoned"))?;
            calls.push(dur);
            calls.len()
        };
        if self.cancel_after == Some(count) {
            cancel.cancel();
        }
        if cancel.is_canceled() {
            return Err(Error::Canceled(None));
        }
        Ok(())
    }
}

/// Poll `id` every `poll_seconds` until it is no longer in progress.
///
/// `completed` (and any status this client does not know) returns the
/// record; `errored` returns [`Error::ActionFailed`]; cancellation returns
/// [`Error::Canceled`] carrying the last record seen. Fetch errors are not
/// retried.
pub fn poll_action(
    actions: &dyn ActionsService,
    id: u64,
    poll_seconds: i64,
    sleeper: &dyn Sleeper,
    cancel: &CancelToken,
) -> Result<Action> {
    if poll_seconds < 1 {
        return Err(Error::invalid(format!(
            "poll interval must be at least 1 second, got {}",
            poll_seconds
        )));
    }
    let interval = Duration::from_secs(poll_seconds.unsigned_abs());

    loop {
        let action = actions.get(id)?;
        tracing::debug!(id, status = %action.status, "polled action");

        match action.status {
            ActionStatus::InProgress => {
                if cancel.is_canceled() {
                    return Err(Error::Canceled(Some(Box::new(action))));
                }
                if let Err(e) = sleeper.sleep(interval, cancel) {
                    return Err(match e {
                        Error::Canceled(_) => Error::Canceled(Some(Box::new(action))),
                        other => other,
                    });
                }
            }
            ActionStatus::Errored => return Err(Error::ActionFailed(Box::new(action))),
            _ => return Ok(action),
        }
    }
}

/// [`poll_action`] using the context's actions service, sleeper and cancel token.
pub fn wait_for_action(ctx: &CmdContext<'_>, id: u64, poll_seconds: i64) -> Result<Action> {
    let actions = ctx.actions()?;
    poll_action(
        actions.as_ref(),
        id,
        poll_seconds,
        ctx.sleeper(),
        ctx.cancel_token(),
    )
}
