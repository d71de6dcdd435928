//! Droplets (virtual machines).

use crate::api::ApiClient;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub distribution: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub ip_address: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Networks {
    #[serde(default)]
    pub v4: Vec<NetworkAddress>,
    #[serde(default)]
    pub v6: Vec<NetworkAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Droplet {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub vcpus: u64,
    #[serde(default)]
    pub disk: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub image: Image,
    #[serde(default)]
    pub size_slug: String,
    #[serde(default)]
    pub networks: Networks,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub volume_ids: Vec<String>,
    #[serde(default)]
    pub vpc_uuid: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Droplet {
    fn address(list: &[NetworkAddress], kind: &str) -> Option<String> {
        list.iter()
            .find(|n| n.kind == kind)
            .map(|n| n.ip_address.clone())
    }

    pub fn public_ipv4(&self) -> Option<String> {
        Self::address(&self.networks.v4, "public")
    }

    pub fn private_ipv4(&self) -> Option<String> {
        Self::address(&self.networks.v4, "private")
    }

    pub fn public_ipv6(&self) -> Option<String> {
        Self::address(&self.networks.v6, "public")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DropletCreateRequest {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

/// A freshly created droplet and the id of the action building it.
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    pub droplet: Droplet,
    pub action_id: Option<u64>,
}

pub trait DropletsService: Send + Sync {
    fn list(&self) -> Result<Vec<Droplet>>;
    fn get(&self, id: u64) -> Result<Droplet>;
    fn create(&self, req: &DropletCreateRequest) -> Result<Created>;
    fn delete(&self, id: u64) -> Result<()>;
}

// ============ Live ============

#[derive(Deserialize)]
struct DropletRoot {
    droplet: Droplet,
    #[serde(default)]
    links: Links,
}

#[derive(Deserialize, Default)]
struct Links {
    #[serde(default)]
    actions: Vec<ActionLink>,
}

#[derive(Deserialize)]
struct ActionLink {
    id: u64,
    #[serde(default)]
    rel: String,
}

pub struct LiveDroplets {
    client: ApiClient,
}

impl LiveDroplets {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl DropletsService for LiveDroplets {
    fn list(&self) -> Result<Vec<Droplet>> {
        self.client.list("/v2/droplets", "droplets")
    }

    fn get(&self, id: u64) -> Result<Droplet> {
        let root: DropletRoot = self.client.get(&format!("/v2/droplets/{}", id))?;
        Ok(root.droplet)
    }

    fn create(&self, req: &DropletCreateRequest) -> Result<Created> {
        let root: DropletRoot = self.client.post("/v2/droplets", req)?;
        let action_id = root
            .links
            .actions
            .iter()
            .find(|l| l.rel == "create")
            .or_else(|| root.links.actions.first())
            .map(|l| l.id);
        Ok(Created {
            droplet: root.droplet,
            action_id,
        })
    }

    fn delete(&self, id: u64) -> Result<()> {
        self.client.delete(&format!("/v2/droplets/{}", id))
    }
}
