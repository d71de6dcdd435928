//! Per-invocation execution context handed to every command handler.

use crate::cancel::CancelToken;
use crate::config::ConfigResolver;
use crate::error::{Error, Result};
use crate::output::{self, DisplayOptions, Displayable, OutputMode};
use crate::prompt;
use crate::services::{
    AccountService, Action, ActionsService, ClientConfig, DropletActionsService,
    DropletsService, ServerlessService, ServiceRegistry, DEFAULT_API_URL,
};
use crate::waiter::{self, Sleeper};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

/// The streams an invocation reads from and writes to.
pub struct Io<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
    pub input: &'a mut dyn BufRead,
    /// Whether `input` is attached to a terminal.
    pub interactive: bool,
}

impl<'a> Io<'a> {
    pub fn new(
        out: &'a mut dyn Write,
        err: &'a mut dyn Write,
        input: &'a mut dyn BufRead,
        interactive: bool,
    ) -> Self {
        Self {
            out,
            err,
            input,
            interactive,
        }
    }

    /// Borrow the same streams for a shorter lifetime.
    pub fn reborrow(&mut self) -> Io<'_> {
        Io {
            out: &mut *self.out,
            err: &mut *self.err,
            input: &mut *self.input,
            interactive: self.interactive,
        }
    }
}

/// Handler-facing view of one invocation.
pub struct CmdContext<'a> {
    /// Positional arguments left after flag extraction.
    pub args: Vec<String>,
    /// Dot-joined canonical path of the running command.
    pub ns: String,
    config: ConfigResolver,
    io: Io<'a>,
    registry: &'a ServiceRegistry,
    services: RefCell<HashMap<TypeId, Box<dyn Any>>>,
    sleeper: &'a dyn Sleeper,
    cancel: CancelToken,
}

impl<'a> CmdContext<'a> {
    pub fn new(
        ns: impl Into<String>,
        args: Vec<String>,
        config: ConfigResolver,
        io: Io<'a>,
        registry: &'a ServiceRegistry,
        sleeper: &'a dyn Sleeper,
        cancel: CancelToken,
    ) -> Self {
        Self {
            args,
            ns: ns.into(),
            config,
            io,
            registry,
            services: RefCell::new(HashMap::new()),
            sleeper,
            cancel,
        }
    }

    // ============ Configuration ============

    pub fn config(&self) -> &ConfigResolver {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigResolver {
        &mut self.config
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.config.get_string(&self.ns, key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.config.get_int(&self.ns, key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.config.get_bool(&self.ns, key)
    }

    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>> {
        self.config.get_string_list(&self.ns, key)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.config.is_set(&self.ns, key)
    }

    /// The caller's access token: flag, environment, then the token stored
    /// for the active auth context. May be empty.
    pub fn access_token(&self) -> Result<String> {
        let token = self.get_string("access-token")?;
        if !token.is_empty() {
            return Ok(token);
        }
        let context = self.config.active_context();
        Ok(self
            .config
            .file()
            .token_for(&context)
            .unwrap_or_default()
            .to_string())
    }

    /// Settings handed to service initializers.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let api_url = self.get_string("api-url")?;
        Ok(ClientConfig {
            access_token: self.access_token()?,
            api_url: if api_url.is_empty() {
                DEFAULT_API_URL.to_string()
            } else {
                api_url
            },
            trace: self.get_bool("trace")?,
            config_dir: self.config.file().dir(),
            ..ClientConfig::default()
        })
    }

    // ============ Output ============

    pub fn out(&mut self) -> &mut dyn Write {
        &mut *self.io.out
    }

    pub fn err(&mut self) -> &mut dyn Write {
        &mut *self.io.err
    }

    /// Both sinks at once, for collaborators that write to either.
    pub fn streams(&mut self) -> (&mut dyn Write, &mut dyn Write) {
        (&mut *self.io.out, &mut *self.io.err)
    }

    pub fn display_options(&self) -> Result<DisplayOptions> {
        Ok(DisplayOptions {
            mode: OutputMode::resolve(&self.get_string("output")?, &self.get_string("template")?)?,
            columns: self.get_string_list("format")?,
            no_header: self.get_bool("no-header")?,
        })
    }

    /// Render `item` to the output sink in the invocation's output mode.
    pub fn display(&mut self, item: &dyn Displayable) -> Result<()> {
        let opts = self.display_options()?;
        output::display(item, &opts, &mut *self.io.out)
    }

    /// Whether JSON output was requested.
    pub fn json_output(&self) -> Result<bool> {
        Ok(matches!(self.display_options()?.mode, OutputMode::Json))
    }

    // ============ Arguments ============

    pub fn ensure_one_arg(&self) -> Result<&str> {
        self.ensure_n_args(1)?;
        Ok(self.args[0].as_str())
    }

    /// Exactly `n` positional arguments.
    pub fn ensure_n_args(&self, n: usize) -> Result<&[String]> {
        if self.args.len() < n {
            return Err(Error::MissingRequired(format!(
                "argument: expected {} argument(s), got {}",
                n,
                self.args.len()
            )));
        }
        if self.args.len() > n {
            return Err(Error::invalid(format!(
                "too many arguments: expected {}, got {}",
                n,
                self.args.len()
            )));
        }
        Ok(&self.args)
    }

    // ============ Prompts ============

    /// False with `--non-interactive`; otherwise `--interactive` when given,
    /// else whether input is a terminal.
    pub fn is_interactive(&self) -> Result<bool> {
        if self.get_bool("non-interactive")? {
            return Ok(false);
        }
        if self.is_set("interactive") {
            return self.get_bool("interactive");
        }
        Ok(self.io.interactive)
    }

    /// Ask before doing something destructive. `--force` skips the question;
    /// without a terminal the answer is always no.
    pub fn confirm(&mut self, message: &str) -> Result<()> {
        if self.get_bool("force")? {
            return Ok(());
        }
        if !self.is_interactive()? {
            tracing::debug!("not interactive and --force not given");
            return Err(Error::Aborted);
        }
        prompt::ask(&mut *self.io.input, &mut *self.io.err, message)
    }

    pub fn confirm_delete(&mut self, noun: &str, count: usize) -> Result<()> {
        self.confirm(&prompt::delete_message(noun, count))
    }

    /// Ask for a free-form answer. Fails with [`Error::MissingRequired`]
    /// naming `what` when there is no terminal to ask on.
    pub fn prompt_line(&mut self, what: &str, message: &str) -> Result<String> {
        if !self.is_interactive()? {
            return Err(Error::MissingRequired(what.to_string()));
        }
        prompt::read_line(&mut *self.io.input, &mut *self.io.err, message)
    }

    // ============ Waiting ============

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Poll an action until it leaves `in-progress`.
    pub fn wait_for_action(&self, id: u64, poll_seconds: i64) -> Result<Action> {
        waiter::wait_for_action(self, id, poll_seconds)
    }

    // ============ Services ============

    /// The service registered for `S`, built on first use and reused for the
    /// rest of the invocation.
    pub fn service<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>> {
        let key = TypeId::of::<S>();
        if let Some(svc) = self
            .services
            .borrow()
            .get(&key)
            .and_then(|b| b.downcast_ref::<Arc<S>>())
        {
            return Ok(Arc::clone(svc));
        }

        let init = self.registry.initializer::<S>().ok_or_else(|| {
            Error::internal(format!(
                "no service registered for {}",
                std::any::type_name::<S>()
            ))
        })?;
        let built = init(&self.client_config()?)?;
        let svc = built
            .downcast_ref::<Arc<S>>()
            .map(Arc::clone)
            .ok_or_else(|| Error::internal("service initializer returned the wrong type"))?;
        self.services.borrow_mut().insert(key, built);
        Ok(svc)
    }

    pub fn actions(&self) -> Result<Arc<dyn ActionsService>> {
        self.service::<dyn ActionsService>()
    }

    pub fn droplets(&self) -> Result<Arc<dyn DropletsService>> {
        self.service::<dyn DropletsService>()
    }

    pub fn droplet_actions(&self) -> Result<Arc<dyn DropletActionsService>> {
        self.service::<dyn DropletActionsService>()
    }

    pub fn account(&self) -> Result<Arc<dyn AccountService>> {
        self.service::<dyn AccountService>()
    }

    pub fn serverless(&self) -> Result<Arc<dyn ServerlessService>> {
        self.service::<dyn ServerlessService>()
    }
}
