//! The authenticated account.

use crate::api::ApiClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub droplet_limit: u64,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
}

pub trait AccountService: Send + Sync {
    fn get(&self) -> Result<Account>;
}

#[derive(Deserialize)]
struct AccountRoot {
    account: Account,
}

pub struct LiveAccount {
    client: ApiClient,
}

impl LiveAccount {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl AccountService for LiveAccount {
    fn get(&self) -> Result<Account> {
        let root: AccountRoot = self.client.get("/v2/account")?;
        Ok(root.account)
    }
}
