//! Backend services used by command handlers.
//!
//! Each resource family is a trait so handlers can be exercised against
//! in-memory doubles. [`ServiceRegistry`] maps a service type to the
//! initializer that builds it; contexts call those initializers lazily.

pub mod account;
pub mod actions;
pub mod droplet_actions;
pub mod droplets;
pub mod serverless;

use crate::api::ApiClient;
use crate::error::Result;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub use account::{Account, AccountService};
pub use actions::{Action, ActionStatus, ActionsService};
pub use droplet_actions::DropletActionsService;
pub use droplets::{Droplet, DropletCreateRequest, DropletsService};
pub use serverless::{ServerlessOutput, ServerlessService, ServerlessStatus};

pub const DEFAULT_API_URL: &str = "https://api.digitalocean.com";

/// Everything a service needs to talk to the backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub access_token: String,
    pub api_url: String,
    pub user_agent: String,
    pub trace: bool,
    pub config_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: user_agent(),
            trace: false,
            config_dir: crate::config_file::default_config_dir(),
        }
    }
}

pub fn user_agent() -> String {
    format!("oceanctl/{}", env!("CARGO_PKG_VERSION"))
}

type Initializer = Arc<dyn Fn(&ClientConfig) -> Result<Box<dyn Any>> + Send + Sync>;

/// Type-keyed set of service initializers.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    inits: HashMap<TypeId, Initializer>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the initializer for service type `S` (usually a `dyn Trait`).
    /// Replaces any earlier registration for the same type.
    pub fn register<S, F>(mut self, init: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ClientConfig) -> Result<Arc<S>> + Send + Sync + 'static,
    {
        let erased: Initializer = Arc::new(move |cfg: &ClientConfig| {
            let svc: Arc<S> = init(cfg)?;
            Ok(Box::new(svc) as Box<dyn Any>)
        });
        self.inits.insert(TypeId::of::<S>(), erased);
        self
    }

    pub fn contains<S: ?Sized + 'static>(&self) -> bool {
        self.inits.contains_key(&TypeId::of::<S>())
    }

    pub(crate) fn initializer<S: ?Sized + 'static>(&self) -> Option<&Initializer> {
        self.inits.get(&TypeId::of::<S>())
    }

    /// Registry backed by the real HTTP API and serverless helper.
    pub fn live() -> Self {
        Self::new()
            .register::<dyn ActionsService, _>(|cfg| {
                Ok(Arc::new(actions::LiveActions::new(ApiClient::new(cfg)?)))
            })
            .register::<dyn DropletsService, _>(|cfg| {
                Ok(Arc::new(droplets::LiveDroplets::new(ApiClient::new(cfg)?)))
            })
            .register::<dyn DropletActionsService, _>(|cfg| {
                Ok(Arc::new(droplet_actions::LiveDropletActions::new(
                    ApiClient::new(cfg)?,
                )))
            })
            .register::<dyn AccountService, _>(|cfg| {
                Ok(Arc::new(account::LiveAccount::new(ApiClient::new(cfg)?)))
            })
            .register::<dyn ServerlessService, _>(|cfg| {
                Ok(Arc::new(serverless::LiveServerless::new(cfg)))
            })
    }
}
