//! Asynchronous action records.

use crate::api::ApiClient;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of an action as reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionStatus {
    #[default]
    InProgress,
    Completed,
    Errored,
    /// A status this client does not know about.
    Other(String),
}

impl From<String> for ActionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "in-progress" => Self::InProgress,
            "completed" => Self::Completed,
            "errored" => Self::Errored,
            _ => Self::Other(s),
        }
    }
}

impl From<ActionStatus> for String {
    fn from(s: ActionStatus) -> Self {
        s.to_string()
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => f.write_str("in-progress"),
            Self::Completed => f.write_str("completed"),
            Self::Errored => f.write_str("errored"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: u64,
    pub status: ActionStatus,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resource_id: u64,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub region_slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Action {
    /// Human-readable reason for an `errored` action.
    pub fn failure_detail(&self) -> String {
        match self.error.as_deref() {
            Some(e) if !e.is_empty() => e.to_string(),
            _ => format!(
                "{} on {} {} errored",
                self.kind, self.resource_type, self.resource_id
            ),
        }
    }
}

pub trait ActionsService: Send + Sync {
    fn get(&self, id: u64) -> Result<Action>;
    fn list(&self) -> Result<Vec<Action>>;
}

// ============ Live ============

#[derive(Deserialize)]
struct ActionRoot {
    action: Action,
}

pub struct LiveActions {
    client: ApiClient,
}

impl LiveActions {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl ActionsService for LiveActions {
    fn get(&self, id: u64) -> Result<Action> {
        let root: ActionRoot = self.client.get(&format!("/v2/actions/{}", id))?;
        Ok(root.action)
    }

    fn list(&self) -> Result<Vec<Action>> {
        self.client.list("/v2/actions", "actions")
    }
}
