//! Dispatcher: parse argv against the command tree, resolve configuration,
//! run the selected handler and turn its result into an exit code.
//!
//! This is the only place errors are rendered for the user.

use crate::cancel::CancelToken;
use crate::command::{CommandTree, NodeId, ARGS_ID};
use crate::config::{ConfigResolver, Environment, FlagKind, ProcessEnv, Value, ENV_PREFIX};
use crate::config_file::{self, ConfigFile};
use crate::context::{CmdContext, Io};
use crate::error::{Error, Result};
use crate::services::ServiceRegistry;
use crate::waiter::{Sleeper, ThreadSleeper};
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::ArgMatches;
use std::ffi::OsString;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// A built command tree plus the collaborators every invocation shares.
pub struct App {
    tree: CommandTree,
    registry: ServiceRegistry,
    env: Arc<dyn Environment>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancelToken,
}

impl App {
    pub fn new(tree: CommandTree) -> Self {
        Self {
            tree,
            registry: ServiceRegistry::live(),
            env: Arc::new(ProcessEnv),
            sleeper: Arc::new(ThreadSleeper),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_services(mut self, registry: ServiceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_env(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Initialize the tracing subscriber. `RUST_LOG` wins; otherwise
    /// `--trace` and `--verbose` raise the level from `warn`.
    pub fn init_logging(&self, verbose: bool, trace: bool) {
        let filter = match self.env.var("RUST_LOG") {
            Some(spec) => EnvFilter::try_new(spec).unwrap_or_else(|_| EnvFilter::new("warn")),
            None if trace => EnvFilter::new("trace"),
            None if verbose => EnvFilter::new("debug"),
            None => EnvFilter::new("warn"),
        };

        // Ignore error if a subscriber is already set (e.g. in tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run one invocation and return its exit code.
    pub fn run<I, T>(&self, argv: I, mut io: Io<'_>) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = match self.tree.clap().clone().try_get_matches_from(argv) {
            Ok(m) => m,
            Err(e) => return self.parse_failure(e, &mut io),
        };

        let (id, leaf_matches) = self.selected(&matches);
        let node = self.tree.node(id);

        let config = match self.resolver(id, leaf_matches) {
            Ok(c) => c,
            Err(e) => return self.fail(&e, None, false, &mut io),
        };
        let trace = config.get_bool(&node.ns, "trace").unwrap_or(false);
        let verbose = config.get_bool(&node.ns, "verbose").unwrap_or(false);
        self.init_logging(verbose, trace);
        tracing::debug!(ns = %node.ns, "dispatching");

        let Some(handler) = node.handler().cloned() else {
            let help = self.tree.help(id);
            return match write!(io.out, "{}", help) {
                Ok(()) => 0,
                Err(e) => self.fail(&e.into(), None, trace, &mut io),
            };
        };

        let args: Vec<String> = leaf_matches
            .get_many::<String>(ARGS_ID)
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default();

        if let Err(e) = self.check_required(id, &config, &args) {
            return self.fail(&e, Some(id), trace, &mut io);
        }

        let result = {
            let mut ctx = CmdContext::new(
                node.ns.clone(),
                args,
                config,
                io.reborrow(),
                &self.registry,
                self.sleeper.as_ref(),
                self.cancel.clone(),
            );
            handler(&mut ctx)
        };

        match result {
            Ok(()) => 0,
            Err(e) => self.fail(&e, Some(id), trace, &mut io),
        }
    }

    /// Descend the subcommand matches to the selected node.
    fn selected<'m>(&self, matches: &'m ArgMatches) -> (NodeId, &'m ArgMatches) {
        let mut id = self.tree.root();
        let mut current = matches;
        while let Some((name, sub)) = current.subcommand() {
            match self.tree.child(id, name) {
                Some(child) => {
                    id = child;
                    current = sub;
                }
                None => break,
            }
        }
        (id, current)
    }

    /// Build the resolver for node `id`: load the config file, bind every
    /// visible flag and record the values given on the command line.
    fn resolver(&self, id: NodeId, matches: &ArgMatches) -> Result<ConfigResolver> {
        let ns = self.tree.node(id).ns.clone();
        let root_ns = self.tree.node(self.tree.root()).ns.clone();

        let config_flag = command_line_value(matches, "config").and_then(|v| v.first().cloned());
        let path = config_file::resolve_path(config_flag.as_deref(), self.env.as_ref(), ENV_PREFIX);
        let file = ConfigFile::load(path)?;

        let mut resolver = ConfigResolver::new(root_ns, Arc::clone(&self.env), file);
        for (decl, flag) in self.tree.visible_flags(id) {
            let decl_ns = &self.tree.node(decl).ns;
            resolver.bind(&ns, decl_ns, flag);
            if decl_ns != &ns {
                resolver.bind(decl_ns, decl_ns, flag);
            }

            if let Some(values) = command_line_value(matches, &flag.name) {
                let value: Value = match flag.kind {
                    FlagKind::StringList => values.into(),
                    _ => values.join(",").into(),
                };
                if decl_ns != &ns {
                    resolver.set(decl_ns, &flag.name, value.clone());
                }
                resolver.set(&ns, &flag.name, value);
            }
        }
        Ok(resolver)
    }

    /// Required flags and positional arguments, checked before any handler runs.
    fn check_required(&self, id: NodeId, config: &ConfigResolver, args: &[String]) -> Result<()> {
        let node = self.tree.node(id);
        for (_, flag) in self.tree.visible_flags(id) {
            if flag.required && !config.is_set(&node.ns, &flag.name) {
                return Err(Error::missing_flag(&flag.name));
            }
        }
        if node.args_required {
            if let Some(missing) = node.args.get(args.len()) {
                return Err(Error::missing_arg(missing));
            }
        }
        Ok(())
    }

    fn parse_failure(&self, e: clap::Error, io: &mut Io<'_>) -> i32 {
        match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = write!(io.out, "{}", e.render());
                0
            }
            _ => {
                let rendered = e.render().to_string();
                let first = rendered
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .trim_start_matches("error: ");
                let _ = writeln!(io.err, "Error: {}", first);
                let _ = writeln!(io.err, "\nFor more information, try '--help'.");
                1
            }
        }
    }

    /// Render `e` to stderr and return its exit code.
    fn fail(&self, e: &Error, id: Option<NodeId>, trace: bool, io: &mut Io<'_>) -> i32 {
        let _ = writeln!(io.err, "Error: {}", e);
        if let (Error::MissingRequired(_), Some(id)) = (e, id) {
            let _ = write!(io.err, "\n{}", self.tree.help(id));
        }
        if trace {
            if let Some(stack) = e.stack() {
                let _ = writeln!(io.err, "\n{}", stack);
            }
        }
        let _ = io.err.flush();
        e.exit_code()
    }
}

/// Values for `name` that were typed on the command line.
fn command_line_value(matches: &ArgMatches, name: &str) -> Option<Vec<String>> {
    let values = matches.try_get_many::<String>(name).ok().flatten()?;
    (matches.value_source(name) == Some(ValueSource::CommandLine))
        .then(|| values.cloned().collect())
}
