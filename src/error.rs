//! Error taxonomy shared by every component.
//!
//! Each variant maps to a category and an exit code. The dispatcher in
//! [`crate::app`] is the only place these get rendered for the user.

use crate::services::actions::Action;
use thiserror::Error;

/// Errors surfaced by command dispatch, handlers and collaborators.
#[derive(Error, Debug)]
pub enum Error {
    /// A required flag or positional argument was not supplied.
    #[error("missing required {0}")]
    MissingRequired(String),

    /// A value could not be interpreted as the requested kind.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The backend reports that the addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend rejected the request because of a precondition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The user declined an interactive confirmation.
    #[error("operation aborted")]
    Aborted,

    /// An asynchronous action reached the `errored` state.
    #[error("action {} failed: {}", .0.id, .0.failure_detail())]
    ActionFailed(Box<Action>),

    /// The invocation was interrupted. Carries the last observed action, if any.
    #[error("operation canceled")]
    Canceled(Option<Box<Action>>),

    /// Rendering the output failed (template errors, unknown columns).
    #[error("output error: {0}")]
    OutputFormat(String),

    /// Network or (de)serialization failure talking to the API.
    #[error("transport error: {0}")]
    Transport(String),

    /// Missing or rejected credentials.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The serverless helper failed or reported an error.
    #[error("serverless: {0}")]
    Plugin(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A broken invariant inside the client itself.
    #[error("internal error: {message}")]
    Internal { message: String, stack: String },
}

impl Error {
    pub fn missing_flag(name: &str) -> Self {
        Self::MissingRequired(format!("flag: --{}", name))
    }

    pub fn missing_arg(name: &str) -> Self {
        Self::MissingRequired(format!("argument: <{}>", name))
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn output(msg: impl Into<String>) -> Self {
        Self::OutputFormat(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn plugin(msg: impl Into<String>) -> Self {
        Self::Plugin(msg.into())
    }

    /// Create an internal error, capturing the current stack.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            stack: std::backtrace::Backtrace::force_capture().to_string(),
        }
    }

    /// Error category, in the same vocabulary the exit codes are keyed on.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingRequired(_)
            | Self::InvalidValue(_)
            | Self::Aborted
            | Self::OutputFormat(_) => "in",
            Self::Auth(_) => "auth",
            Self::Canceled(_) => "time",
            Self::Transport(_) => "net",
            Self::NotFound(_) | Self::Conflict(_) | Self::ActionFailed(_) | Self::Plugin(_) => {
                "ext"
            }
            Self::Io(_) | Self::Internal { .. } => "sys",
        }
    }

    /// Process exit code for this error. Never zero.
    pub fn exit_code(&self) -> i32 {
        if matches!(self, Self::Canceled(_)) {
            return 130;
        }
        match self.category() {
            "in" => 1,
            "auth" => 3,
            "time" => 4,
            _ => 2,
        }
    }

    /// Captured stack for internal errors.
    pub fn stack(&self) -> Option<&str> {
        match self {
            Self::Internal { stack, .. } => Some(stack),
            _ => None,
        }
    }

    /// The action record carried by wait failures.
    pub fn action(&self) -> Option<&Action> {
        match self {
            Self::ActionFailed(a) => Some(a),
            Self::Canceled(a) => a.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::missing_flag("name").exit_code(), 1);
        assert_eq!(Error::invalid("x").exit_code(), 1);
        assert_eq!(Error::Aborted.exit_code(), 1);
        assert_eq!(Error::Auth("no token".into()).exit_code(), 3);
        assert_eq!(Error::not_found("droplet 1").exit_code(), 2);
        assert_eq!(Error::transport("reset").exit_code(), 2);
        assert_eq!(Error::Canceled(None).exit_code(), 130);
    }

    #[test]
    fn test_missing_required_names_the_flag() {
        let msg = Error::missing_flag("name").to_string();
        assert!(msg.contains("--name"));
    }

    #[test]
    fn test_aborted_message() {
        assert_eq!(Error::Aborted.to_string(), "operation aborted");
    }

    #[test]
    fn test_internal_keeps_stack() {
        let err = Error::internal("bad state");
        assert!(err.stack().is_some());
        assert!(Error::Aborted.stack().is_none());
    }
}
