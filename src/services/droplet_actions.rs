//! Actions that act on a single droplet.

use super::actions::Action;
use crate::api::ApiClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub trait DropletActionsService: Send + Sync {
    fn reboot(&self, droplet_id: u64) -> Result<Action>;
    fn resize(&self, droplet_id: u64, size: &str, resize_disk: bool) -> Result<Action>;
}

#[derive(Serialize)]
struct ActionRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk: Option<bool>,
}

#[derive(Deserialize)]
struct ActionRoot {
    action: Action,
}

pub struct LiveDropletActions {
    client: ApiClient,
}

impl LiveDropletActions {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn post(&self, droplet_id: u64, req: &ActionRequest<'_>) -> Result<Action> {
        let root: ActionRoot = self
            .client
            .post(&format!("/v2/droplets/{}/actions", droplet_id), req)?;
        Ok(root.action)
    }
}

impl DropletActionsService for LiveDropletActions {
    fn reboot(&self, droplet_id: u64) -> Result<Action> {
        self.post(
            droplet_id,
            &ActionRequest {
                kind: "reboot",
                size: None,
                disk: None,
            },
        )
    }

    fn resize(&self, droplet_id: u64, size: &str, resize_disk: bool) -> Result<Action> {
        self.post(
            droplet_id,
            &ActionRequest {
                kind: "resize",
                size: Some(size),
                disk: Some(resize_disk),
            },
        )
    }
}
