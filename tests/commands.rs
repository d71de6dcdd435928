//! The real command tree driven against in-memory services.

mod common;

use common::{config_path, env_in, run, run_with_input, write_config, Outcome};
use oceanctl::services::droplets::Created;
use oceanctl::services::{
    Account, AccountService, Action, ActionStatus, ActionsService, Droplet, DropletActionsService,
    ClientConfig, DropletCreateRequest, DropletsService, ServerlessService, ServiceRegistry,
};
use oceanctl::waiter::RecordingSleeper;
use oceanctl::{App, Error, Result};
use serde_yaml::Value as Yaml;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ============ Fakes ============

#[derive(Default)]
struct Log(Mutex<Vec<String>>);

impl Log {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

fn droplet(id: u64, name: &str, status: &str) -> Droplet {
    Droplet {
        id,
        name: name.into(),
        status: status.into(),
        ..Droplet::default()
    }
}

fn action(id: u64, status: ActionStatus, kind: &str, completed: Option<&str>) -> Action {
    Action {
        id,
        status,
        kind: kind.into(),
        resource_type: "droplet".into(),
        completed_at: completed.map(|c| c.parse().unwrap()),
        ..Action::default()
    }
}

struct FakeDroplets {
    log: Arc<Log>,
}

impl DropletsService for FakeDroplets {
    fn list(&self) -> Result<Vec<Droplet>> {
        self.log.push("list");
        Ok(vec![droplet(1, "web", "active"), droplet(2, "db", "off")])
    }

    fn get(&self, id: u64) -> Result<Droplet> {
        self.log.push(format!("get {}", id));
        Ok(droplet(id, "web-1", "active"))
    }

    fn create(&self, req: &DropletCreateRequest) -> Result<Created> {
        self.log.push(format!("create {} {}", req.name, req.region));
        Ok(Created {
            droplet: droplet(77, &req.name, "new"),
            action_id: Some(500),
        })
    }

    fn delete(&self, id: u64) -> Result<()> {
        self.log.push(format!("delete {}", id));
        Ok(())
    }
}

struct FakeActions {
    script: Mutex<VecDeque<ActionStatus>>,
    history: Vec<Action>,
}

impl ActionsService for FakeActions {
    fn get(&self, id: u64) -> Result<Action> {
        let status = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ActionStatus::Completed);
        Ok(Action {
            id,
            status,
            ..Action::default()
        })
    }

    fn list(&self) -> Result<Vec<Action>> {
        Ok(self.history.clone())
    }
}

struct FakeDropletActions {
    log: Arc<Log>,
}

impl DropletActionsService for FakeDropletActions {
    fn reboot(&self, droplet_id: u64) -> Result<Action> {
        self.log.push(format!("reboot {}", droplet_id));
        Ok(action(9, ActionStatus::InProgress, "reboot", None))
    }

    fn resize(&self, droplet_id: u64, size: &str, resize_disk: bool) -> Result<Action> {
        self.log
            .push(format!("resize {} {} {}", droplet_id, size, resize_disk));
        Ok(action(10, ActionStatus::InProgress, "resize", None))
    }
}

/// Accepts only the token `good`.
struct FakeAccount {
    token: String,
}

impl AccountService for FakeAccount {
    fn get(&self) -> Result<Account> {
        if self.token != "good" {
            return Err(Error::Auth("401 Unauthorized".into()));
        }
        Ok(Account {
            email: "sammy@example.com".into(),
            status: "active".into(),
            droplet_limit: 25,
            ..Account::default()
        })
    }
}

struct Fixture {
    dir: TempDir,
    log: Arc<Log>,
    tokens: Arc<Log>,
    sleeper: Arc<RecordingSleeper>,
    script: Vec<ActionStatus>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            log: Arc::new(Log::default()),
            tokens: Arc::new(Log::default()),
            sleeper: Arc::new(RecordingSleeper::new()),
            script: Vec::new(),
        }
    }

    fn script(mut self, statuses: &[ActionStatus]) -> Self {
        self.script = statuses.to_vec();
        self
    }

    fn history() -> Vec<Action> {
        vec![
            action(3, ActionStatus::Completed, "resize", Some("2024-03-03T00:00:00Z")),
            action(1, ActionStatus::Errored, "reboot", Some("2024-03-01T00:00:00Z")),
            action(2, ActionStatus::Completed, "reboot", Some("2024-03-02T00:00:00Z")),
            action(4, ActionStatus::InProgress, "create", None),
        ]
    }

    fn registry(&self) -> ServiceRegistry {
        let (log, da_log) = (Arc::clone(&self.log), Arc::clone(&self.log));
        let tokens = Arc::clone(&self.tokens);
        let actions = Arc::new(FakeActions {
            script: Mutex::new(self.script.iter().cloned().collect()),
            history: Self::history(),
        });
        ServiceRegistry::new()
            .register::<dyn DropletsService, _>(move |_| {
                Ok(Arc::new(FakeDroplets {
                    log: Arc::clone(&log),
                }))
            })
            .register::<dyn ActionsService, _>(move |_| {
                Ok(actions.clone() as Arc<dyn ActionsService>)
            })
            .register::<dyn DropletActionsService, _>(move |_| {
                Ok(Arc::new(FakeDropletActions {
                    log: Arc::clone(&da_log),
                }))
            })
            .register::<dyn AccountService, _>(move |cfg| {
                tokens.push(cfg.access_token.clone());
                Ok(Arc::new(FakeAccount {
                    token: cfg.access_token.clone(),
                }))
            })
    }

    fn app(&self) -> App {
        oceanctl::cli::app()
            .unwrap()
            .with_services(self.registry())
            .with_env(Arc::new(env_in(&self.dir)))
            .with_sleeper(self.sleeper.clone())
    }

    fn run(&self, argv: &[&str]) -> Outcome {
        let mut full = vec!["oceanctl"];
        full.extend_from_slice(argv);
        run(&self.app(), &full)
    }

    fn saved(&self) -> Yaml {
        let data = std::fs::read_to_string(config_path(&self.dir)).unwrap();
        serde_yaml::from_str(&data).unwrap()
    }
}

// ------------------------------------------------------------------------
// Tree-wide properties
// ------------------------------------------------------------------------

/// An initializer that counts calls and always fails.
fn counting<S: ?Sized + 'static>(
    built: &Arc<AtomicUsize>,
) -> impl Fn(&ClientConfig) -> Result<Arc<S>> + Send + Sync + 'static {
    let built = Arc::clone(built);
    move |_| {
        built.fetch_add(1, Ordering::SeqCst);
        Err(Error::internal("service built before validation"))
    }
}

#[test]
fn test_help_for_every_command() {
    let fx = Fixture::new();
    let app = fx.app();
    let tree = app.tree();
    for id in tree.ids() {
        let node = tree.node(id);
        let mut argv = vec!["oceanctl"];
        argv.extend(tree.path(id));
        argv.push("--help");

        let res = run(&app, &argv);
        assert_eq!(res.code, 0, "{}: {}", node.ns, res.err);
        assert!(res.out.contains(node.short.as_str()), "{} help:\n{}", node.ns, res.out);
        if !node.long.is_empty() {
            assert!(res.out.contains(node.long.as_str()), "{} help:\n{}", node.ns, res.out);
        }
    }
}

#[test]
fn test_required_inputs_checked_before_any_service() {
    let built = Arc::new(AtomicUsize::new(0));
    let registry = ServiceRegistry::new()
        .register::<dyn DropletsService, _>(counting(&built))
        .register::<dyn ActionsService, _>(counting(&built))
        .register::<dyn DropletActionsService, _>(counting(&built))
        .register::<dyn AccountService, _>(counting(&built))
        .register::<dyn ServerlessService, _>(counting(&built));

    let dir = TempDir::new().unwrap();
    let app = oceanctl::cli::app()
        .unwrap()
        .with_services(registry)
        .with_env(Arc::new(env_in(&dir)));
    let tree = app.tree();

    let mut checked = 0;
    for id in tree.ids() {
        let node = tree.node(id);
        let needs_args = node.args_required && !node.args.is_empty();
        let needs_flags = node.flags.iter().any(|f| f.required);
        if !node.is_leaf() || !(needs_args || needs_flags) {
            continue;
        }
        let mut argv = vec!["oceanctl"];
        argv.extend(tree.path(id));

        let res = run(&app, &argv);
        assert_eq!(res.code, 1, "{}", node.ns);
        assert!(res.err.starts_with("Error: missing required"), "{}: {}", node.ns, res.err);
        assert!(res.err.contains("Usage:"), "{} prints help", node.ns);
        checked += 1;
    }
    assert!(checked >= 7);
    assert_eq!(built.load(Ordering::SeqCst), 0);
}

#[test]
fn test_create_names_the_missing_flag() {
    let fx = Fixture::new();
    let res = fx.run(&["compute", "droplet", "create", "web", "--size", "s", "--image", "i"]);
    assert_eq!(res.code, 1);
    assert!(res.err.contains("--region"));
    assert!(fx.log.entries().is_empty());
}

// ------------------------------------------------------------------------
// Actions
// ------------------------------------------------------------------------

#[test]
fn test_action_list_filters_and_sorts() {
    let fx = Fixture::new();
    let res = fx.run(&[
        "compute", "action", "list", "--action-type", "reboot", "--format", "ID,Status",
        "--no-header",
    ]);
    assert_eq!(res.code, 0, "{}", res.err);
    assert_eq!(res.out, "1\terrored\n2\tcompleted\n");
}

#[test]
fn test_action_list_time_window_json() {
    let fx = Fixture::new();
    let res = fx.run(&[
        "compute",
        "action",
        "list",
        "--after",
        "2024-03-02T00:00:00Z",
        "-o",
        "json",
    ]);
    assert_eq!(res.code, 0, "{}", res.err);
    let parsed: serde_json::Value = serde_json::from_str(&res.out).unwrap();
    let ids: Vec<u64> = parsed
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn test_action_list_bad_time() {
    let fx = Fixture::new();
    let res = fx.run(&["compute", "action", "list", "--before", "yesterday"]);
    assert_eq!(res.code, 1);
    assert!(res.err.contains("before"));
}

#[test]
fn test_action_wait_uses_poll_timeout() {
    let fx = Fixture::new().script(&[ActionStatus::InProgress, ActionStatus::Completed]);
    let res = fx.run(&["compute", "action", "w", "12", "--poll-timeout", "2", "--format", "ID"]);
    assert_eq!(res.code, 0, "{}", res.err);
    assert_eq!(res.out, "ID\n12\n");
    assert_eq!(fx.sleeper.calls(), vec![std::time::Duration::from_secs(2)]);
}

// ------------------------------------------------------------------------
// Droplets
// ------------------------------------------------------------------------

#[test]
fn test_droplet_delete_force_many() {
    let fx = Fixture::new();
    let res = fx.run(&["compute", "d", "rm", "1", "2", "-f"]);
    assert_eq!(res.code, 0, "{}", res.err);
    assert_eq!(fx.log.entries(), vec!["delete 1", "delete 2"]);
}

#[test]
fn test_droplet_delete_confirmed_on_terminal() {
    let fx = Fixture::new();
    let res = run_with_input(
        &fx.app(),
        &["oceanctl", "compute", "droplet", "delete", "1", "2"],
        "y\n",
        true,
    );
    assert_eq!(res.code, 0, "{}", res.err);
    assert!(res.err.contains("2 Droplets"), "{}", res.err);
    assert_eq!(fx.log.entries(), vec!["delete 1", "delete 2"]);
}

#[test]
fn test_droplet_delete_bad_id() {
    let fx = Fixture::new();
    let res = fx.run(&["compute", "droplet", "delete", "web", "--force"]);
    assert_eq!(res.code, 1);
    assert!(res.err.contains("\"web\""));
    assert!(fx.log.entries().is_empty());
}

#[test]
fn test_droplet_create_wait_refetches() {
    let fx = Fixture::new().script(&[ActionStatus::InProgress, ActionStatus::Completed]);
    let res = fx.run(&[
        "compute", "droplet", "create", "web-1", "--region", "nyc1", "--size", "s-1vcpu-1gb",
        "--image", "ubuntu", "--wait", "--format", "ID,Status", "--no-header",
    ]);
    assert_eq!(res.code, 0, "{}", res.err);
    assert_eq!(res.out, "77\tactive\n");
    assert_eq!(fx.log.entries(), vec!["create web-1 nyc1", "get 77"]);
    assert_eq!(fx.sleeper.calls().len(), 1);
}

#[test]
fn test_droplet_create_without_wait() {
    let fx = Fixture::new();
    let res = fx.run(&[
        "compute", "droplet", "c", "web-1", "--region", "nyc1", "--size", "s", "--image", "i",
        "--format", "Status", "--no-header",
    ]);
    assert_eq!(res.code, 0, "{}", res.err);
    assert_eq!(res.out, "new\n");
    assert!(fx.sleeper.calls().is_empty());
}

#[test]
fn test_droplet_list_region_filter_from_env() {
    let fx = Fixture::new();
    let res = fx.run(&["compute", "droplet", "ls", "--format", "Name", "--no-header"]);
    assert_eq!(res.out, "web\ndb\n");

    let app = fx.app().with_env(Arc::new(
        env_in(&fx.dir).with("OCEANCTL_COMPUTE_DROPLET_LIST_REGION", "sfo3"),
    ));
    let res = run(&app, &["oceanctl", "compute", "droplet", "ls", "--no-header"]);
    assert_eq!(res.code, 0);
    assert!(res.out.is_empty());
}

// ------------------------------------------------------------------------
// Droplet actions
// ------------------------------------------------------------------------

#[test]
fn test_reboot_wait_prints_notice() {
    let fx = Fixture::new().script(&[ActionStatus::Completed]);
    let res = fx.run(&["compute", "da", "reboot", "5", "--wait", "--format", "ID,Status"]);
    assert_eq!(res.code, 0, "{}", res.err);
    assert!(res.err.contains("Notice: action 9 completed"));
    assert!(res.out.contains("completed"));
    assert_eq!(fx.log.entries(), vec!["reboot 5"]);
}

#[test]
fn test_resize_errored_action() {
    let fx = Fixture::new().script(&[ActionStatus::Errored]);
    let res = fx.run(&[
        "compute", "droplet-action", "resize", "5", "--size", "big", "--resize-disk", "--wait",
    ]);
    assert_eq!(res.code, 2);
    assert!(res.err.contains("action 10 failed"));
    assert_eq!(fx.log.entries(), vec!["resize 5 big true"]);
}

// ------------------------------------------------------------------------
// Auth contexts
// ------------------------------------------------------------------------

#[test]
fn test_auth_init_named_context() {
    let fx = Fixture::new();
    let res = fx.run(&["auth", "init", "--access-token", "good", "--context", "staging"]);
    assert_eq!(res.code, 0, "{}", res.err);
    assert!(res.err.contains("Validating token... OK"));

    let saved = fx.saved();
    assert_eq!(saved["auth-contexts"]["staging"], Yaml::from("good"));
    assert_eq!(saved["context"], Yaml::from("staging"));
}

#[test]
fn test_auth_init_reads_token_from_terminal() {
    let fx = Fixture::new();
    let res = run_with_input(&fx.app(), &["oceanctl", "auth", "init"], "good\n", true);
    assert_eq!(res.code, 0, "{}", res.err);
    assert!(res.err.contains("Enter your access token"));
    assert_eq!(fx.saved()["access-token"], Yaml::from("good"));
}

#[test]
fn test_auth_init_rejected_token() {
    let fx = Fixture::new();
    let res = fx.run(&["auth", "init", "--access-token", "nope"]);
    assert_eq!(res.code, 3);
    assert!(res.err.contains("rejected"));
    assert!(!config_path(&fx.dir).exists());
}

#[test]
fn test_auth_init_without_terminal_needs_token() {
    let fx = Fixture::new();
    let res = fx.run(&["auth", "init"]);
    assert_eq!(res.code, 1);
    assert!(res.err.contains("access-token"));
}

#[test]
fn test_auth_list_marks_current() {
    let fx = Fixture::new();
    write_config(
        &fx.dir,
        "access-token: a\ncontext: staging\nauth-contexts:\n  staging: b\n  prod: c\n",
    );
    let res = fx.run(&["auth", "ls", "-o", "json"]);
    assert_eq!(res.code, 0, "{}", res.err);
    let parsed: serde_json::Value = serde_json::from_str(&res.out).unwrap();
    assert_eq!(parsed[0]["name"], "default");
    assert_eq!(parsed[1]["name"], "prod");
    assert_eq!(parsed[2]["name"], "staging");
    assert_eq!(parsed[2]["current"], true);
    assert_eq!(parsed[0]["current"], false);
}

#[test]
fn test_auth_switch() {
    let fx = Fixture::new();
    write_config(&fx.dir, "auth-contexts:\n  staging: b\n");
    let res = fx.run(&["auth", "switch", "--context", "staging"]);
    assert_eq!(res.code, 0, "{}", res.err);
    assert_eq!(fx.saved()["context"], Yaml::from("staging"));

    let res = fx.run(&["auth", "switch", "--context", "missing"]);
    assert_eq!(res.code, 2);
    assert!(res.err.contains("not found"));
}

#[test]
fn test_auth_remove() {
    let fx = Fixture::new();
    write_config(&fx.dir, "auth-contexts:\n  staging: b\n");
    let res = fx.run(&["auth", "remove"]);
    assert_eq!(res.code, 1);
    assert!(res.err.contains("--context"));

    write_config(
        &fx.dir,
        "context: staging\nauth-contexts:\n  staging: b\ncontexts:\n  staging:\n    output: json\n",
    );

    let res = fx.run(&["auth", "rm", "--context", "staging"]);
    assert_eq!(res.code, 0, "{}", res.err);
    let saved = fx.saved();
    assert!(saved["auth-contexts"].get("staging").is_none());
    assert!(saved.get("contexts").and_then(|c| c.get("staging")).is_none());
    assert_eq!(saved["context"], Yaml::from("default"));
}

// ------------------------------------------------------------------------
// Account, version, credentials
// ------------------------------------------------------------------------

#[test]
fn test_account_get_template() {
    let fx = Fixture::new();
    write_config(&fx.dir, "access-token: good\n");
    let res = fx.run(&["account", "get", "--template", "{{.Email}}"]);
    assert_eq!(res.code, 0, "{}", res.err);
    assert_eq!(res.out, "sammy@example.com\n");
}

#[test]
fn test_account_get_without_valid_token() {
    let fx = Fixture::new();
    let res = fx.run(&["account", "g"]);
    assert_eq!(res.code, 3);
    assert!(res.out.is_empty());
}

#[test]
fn test_token_comes_from_active_context() {
    let fx = Fixture::new();
    write_config(&fx.dir, "access-token: tok-default\nauth-contexts:\n  staging: tok-staging\n");
    fx.run(&["account", "get"]);
    fx.run(&["account", "get", "--context", "staging"]);
    fx.run(&["account", "get", "-t", "tok-flag", "--context", "staging"]);
    assert_eq!(
        fx.tokens.entries(),
        vec!["tok-default", "tok-staging", "tok-flag"]
    );
}

#[test]
fn test_version() {
    let fx = Fixture::new();
    let res = fx.run(&["version"]);
    assert_eq!(res.code, 0);
    assert_eq!(
        res.out,
        format!("oceanctl version {}\n", env!("CARGO_PKG_VERSION"))
    );

    let res = fx.run(&["version", "-o", "json"]);
    let parsed: serde_json::Value = serde_json::from_str(&res.out).unwrap();
    assert_eq!(parsed["name"], "oceanctl");
}

#[test]
fn test_group_without_subcommand_prints_help() {
    let fx = Fixture::new();
    let res = fx.run(&["compute"]);
    assert_eq!(res.code, 0);
    assert!(res.out.contains("droplet-action"));
}

// ------------------------------------------------------------------------
// Serverless
// ------------------------------------------------------------------------

mod serverless {
    use super::*;
    use oceanctl::services::serverless::{Credentials, ServerlessCommand};
    use oceanctl::services::{ServerlessOutput, ServerlessStatus};
    use std::io::Write;
    use std::path::PathBuf;

    struct FakeHelper {
        state: ServerlessStatus,
        calls: Arc<Log>,
    }

    impl ServerlessService for FakeHelper {
        fn status(&self) -> Result<ServerlessStatus> {
            Ok(self.state.clone())
        }

        fn install(&self, upgrading: bool) -> Result<()> {
            self.calls.push(format!("install upgrading={}", upgrading));
            Ok(())
        }

        fn credentials(&self) -> Result<Option<Credentials>> {
            Ok(Some(Credentials {
                api_host: "https://faas.example.com".into(),
                namespace: "fn-123".into(),
            }))
        }

        fn cmd(&self, subcommand: &str, args: &[String]) -> Result<ServerlessCommand> {
            let mut all = subcommand
                .split('/')
                .map(String::from)
                .collect::<Vec<_>>();
            all.extend_from_slice(args);
            Ok(ServerlessCommand {
                program: PathBuf::from("sandbox"),
                args: all,
                env: Vec::new(),
            })
        }

        fn exec(&self, cmd: &ServerlessCommand) -> Result<ServerlessOutput> {
            self.calls.push(cmd.args.join(" "));
            Ok(ServerlessOutput {
                formatted: vec!["hello Sammy".into()],
                entity: Some(serde_json::json!({"body": "hello Sammy"})),
                ..ServerlessOutput::default()
            })
        }

        fn stream(
            &self,
            cmd: &ServerlessCommand,
            out: &mut dyn Write,
            err: &mut dyn Write,
        ) -> Result<()> {
            self.calls.push(format!("stream {}", cmd.args.join(" ")));
            writeln!(out, "Watching {}", cmd.args[2])?;
            writeln!(err, "Deployed sample/hello")?;
            Ok(())
        }
    }

    fn run_with(state: ServerlessStatus, argv: &[&str]) -> (Outcome, Vec<String>) {
        let fx = Fixture::new();
        let calls = Arc::new(Log::default());
        let seen = Arc::clone(&calls);
        let registry = fx.registry().register::<dyn ServerlessService, _>(move |_| {
            Ok(Arc::new(FakeHelper {
                state: state.clone(),
                calls: Arc::clone(&seen),
            }))
        });
        let app = oceanctl::cli::app()
            .unwrap()
            .with_services(registry)
            .with_env(Arc::new(env_in(&fx.dir)));
        let mut full = vec!["oceanctl"];
        full.extend_from_slice(argv);
        let res = run(&app, &full);
        (res, calls.entries())
    }

    #[test]
    fn test_status_ready() {
        let (res, _) = run_with(ServerlessStatus::Ready, &["serverless", "status"]);
        assert_eq!(res.code, 0, "{}", res.err);
        assert!(res.out.contains("'fn-123'"));
        assert!(res.out.contains("Serverless software version is"));
    }

    #[test]
    fn test_status_not_installed() {
        let (res, _) = run_with(ServerlessStatus::NotInstalled, &["sls", "status"]);
        assert_eq!(res.code, 2);
        assert!(res.err.contains("oceanctl serverless install"));
    }

    #[test]
    fn test_status_version_needing_upgrade() {
        let (res, _) = run_with(
            ServerlessStatus::NeedsUpgrade {
                found: "4.2.0".into(),
            },
            &["serverless", "status", "--version"],
        );
        assert_eq!(res.code, 0, "{}", res.err);
        assert!(res.out.starts_with("Current: 4.2.0, required:"));
    }

    #[test]
    fn test_install_and_upgrade_follow_status() {
        let (res, calls) = run_with(ServerlessStatus::NotInstalled, &["serverless", "install"]);
        assert_eq!(res.code, 0, "{}", res.err);
        assert_eq!(calls, vec!["install upgrading=false"]);

        let (res, calls) = run_with(ServerlessStatus::Ready, &["serverless", "upgrade"]);
        assert_eq!(res.code, 0);
        assert!(calls.is_empty());
        assert!(res.out.contains("No action needed"));

        let (_, calls) = run_with(
            ServerlessStatus::NeedsUpgrade {
                found: "1.0.0".into(),
            },
            &["serverless", "upgrade"],
        );
        assert_eq!(calls, vec!["install upgrading=true"]);
    }

    #[test]
    fn test_functions_list_forwards_flags() {
        let (res, calls) = run_with(
            ServerlessStatus::Ready,
            &["sls", "fn", "ls", "sample", "--limit", "5", "--name-sort"],
        );
        assert_eq!(res.code, 0, "{}", res.err);
        assert_eq!(calls, vec!["function list sample --limit 5 --name-sort"]);
        assert_eq!(res.out, "hello Sammy\n");
    }

    #[test]
    fn test_functions_list_count_and_format_conflict() {
        let (res, calls) = run_with(
            ServerlessStatus::Ready,
            &["serverless", "functions", "list", "--count", "--format", "Name"],
        );
        assert_eq!(res.code, 1);
        assert!(calls.is_empty());
    }

    #[test]
    fn test_invoke_params_and_json() {
        let (res, calls) = run_with(
            ServerlessStatus::Ready,
            &[
                "serverless", "functions", "invoke", "sample/hello", "-p", "name:Sammy", "-o",
                "json",
            ],
        );
        assert_eq!(res.code, 0, "{}", res.err);
        assert_eq!(calls, vec!["action invoke sample/hello --param name Sammy"]);
        let parsed: serde_json::Value = serde_json::from_str(&res.out).unwrap();
        assert_eq!(parsed["body"], "hello Sammy");
    }

    #[test]
    fn test_invoke_bad_param() {
        let (res, calls) = run_with(
            ServerlessStatus::Ready,
            &["serverless", "functions", "invoke", "f", "--param", "novalue"],
        );
        assert_eq!(res.code, 1);
        assert!(res.err.contains("key:value"));
        assert!(calls.is_empty());
    }

    #[test]
    fn test_watch_streams_helper_output() {
        let (res, calls) = run_with(
            ServerlessStatus::Ready,
            &["serverless", "watch", "proj", "--exclude", "web", "--remote-build"],
        );
        assert_eq!(res.code, 0, "{}", res.err);
        assert_eq!(calls, vec!["stream nocapture watch proj --remote-build --exclude web"]);
        assert_eq!(res.out, "Watching proj\n");
        assert_eq!(res.err, "Deployed sample/hello\n");
    }

    #[test]
    fn test_watch_requires_connection() {
        let (res, calls) =
            run_with(ServerlessStatus::NotConnected, &["serverless", "watch", "proj"]);
        assert_eq!(res.code, 2);
        assert!(calls.is_empty());
    }

    #[test]
    fn test_invoke_requires_connection() {
        let (res, calls) = run_with(
            ServerlessStatus::NotConnected,
            &["serverless", "functions", "invoke", "f"],
        );
        assert_eq!(res.code, 2);
        assert!(calls.is_empty());
    }
}
