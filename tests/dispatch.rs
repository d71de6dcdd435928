//! End-to-end dispatch through a small `widget` command family backed by
//! in-memory services.

mod common;

use common::{env_in, run, run_with_input, write_config};
use oceanctl::command::{CommandNode, CommandTree, FlagDescriptor};
use oceanctl::context::CmdContext;
use oceanctl::output::{write_json, Displayable, Row};
use oceanctl::services::{Action, ActionStatus, ActionsService, ServiceRegistry};
use oceanctl::waiter::RecordingSleeper;
use oceanctl::{App, Error, Result};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ============ Fakes ============

#[derive(Debug, Clone, Serialize, PartialEq)]
struct Widget {
    id: String,
    name: String,
}

trait WidgetService: Send + Sync {
    fn get(&self, id: &str) -> Result<Widget>;
    fn list(&self) -> Result<Vec<Widget>>;
    fn create(&self, name: &str, region: &str) -> Result<Widget>;
    fn delete(&self, id: &str) -> Result<()>;
    fn resize(&self, id: &str, size: &str) -> Result<u64>;
}

#[derive(Default)]
struct FakeWidgets {
    calls: Mutex<Vec<String>>,
}

impl FakeWidgets {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl WidgetService for FakeWidgets {
    fn get(&self, id: &str) -> Result<Widget> {
        self.record(format!("get {}", id));
        Ok(Widget {
            id: id.into(),
            name: "w".into(),
        })
    }

    fn list(&self) -> Result<Vec<Widget>> {
        self.record("list".into());
        Ok(vec![
            Widget {
                id: "abc".into(),
                name: "w".into(),
            },
            Widget {
                id: "defgh".into(),
                name: "second".into(),
            },
        ])
    }

    fn create(&self, name: &str, region: &str) -> Result<Widget> {
        self.record(format!("create {} {}", name, region));
        Ok(Widget {
            id: "new".into(),
            name: name.into(),
        })
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.record(format!("delete {}", id));
        Ok(())
    }

    fn resize(&self, id: &str, size: &str) -> Result<u64> {
        self.record(format!("resize {} {}", id, size));
        Ok(42)
    }
}

/// Replays a fixed sequence of statuses for every `get`.
struct ScriptedActions {
    script: Mutex<VecDeque<ActionStatus>>,
    polls: AtomicUsize,
}

impl ScriptedActions {
    fn new(script: &[ActionStatus]) -> Self {
        Self {
            script: Mutex::new(script.iter().cloned().collect()),
            polls: AtomicUsize::new(0),
        }
    }
}

impl ActionsService for ScriptedActions {
    fn get(&self, id: u64) -> Result<Action> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let status = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::not_found(format!("action {}", id)))?;
        Ok(Action {
            id,
            status,
            ..Action::default()
        })
    }

    fn list(&self) -> Result<Vec<Action>> {
        Ok(Vec::new())
    }
}

struct Widgets(Vec<Widget>);

impl Displayable for Widgets {
    fn cols(&self) -> Vec<&'static str> {
        vec!["ID", "Name"]
    }

    fn col_map(&self) -> HashMap<&'static str, &'static str> {
        HashMap::from([("ID", "ID"), ("Name", "Name")])
    }

    fn kv(&self) -> Vec<Row> {
        self.0
            .iter()
            .map(|w| Row::new().with("ID", w.id.as_str()).with("Name", w.name.as_str()))
            .collect()
    }

    fn json(&self, out: &mut dyn Write) -> Result<()> {
        write_json(out, &self.0)
    }
}

// ============ Tree ============

fn widgets(ctx: &CmdContext<'_>) -> Result<Arc<dyn WidgetService>> {
    ctx.service::<dyn WidgetService>()
}

fn widget_tree() -> CommandNode {
    CommandNode::group("widget", "Manage widgets", "")
        .subcommand(
            CommandNode::command("get <id>", "Get a widget", "", |ctx| {
                let id = ctx.ensure_one_arg()?.to_string();
                let w = widgets(ctx)?.get(&id)?;
                ctx.display(&Widgets(vec![w]))
            })
            .required(),
        )
        .subcommand(
            CommandNode::command("list", "List widgets", "", |ctx| {
                let ws = widgets(ctx)?.list()?;
                ctx.display(&Widgets(ws))
            })
            .alias(&["ls"])
            .flag(FlagDescriptor::string("region", "D", "Region filter")),
        )
        .subcommand(
            CommandNode::command("region", "Print the resolved region", "", |ctx| {
                let region = ctx.get_string("region")?;
                writeln!(ctx.out(), "{}", region)?;
                Ok(())
            })
            .flag(FlagDescriptor::string("region", "D", "Region")),
        )
        .subcommand(
            CommandNode::command("create", "Create a widget", "", |ctx| {
                let name = ctx.get_string("name")?;
                let region = ctx.get_string("region")?;
                let w = widgets(ctx)?.create(&name, &region)?;
                ctx.display(&Widgets(vec![w]))
            })
            .flag(FlagDescriptor::string("name", "", "Widget name").required())
            .flag(FlagDescriptor::string("region", "", "Region").required()),
        )
        .subcommand(
            CommandNode::command("delete <id>", "Delete a widget", "", |ctx| {
                let id = ctx.ensure_one_arg()?.to_string();
                ctx.confirm_delete("widget", 1)?;
                widgets(ctx)?.delete(&id)
            })
            .required()
            .flag(FlagDescriptor::bool("force", false, "Skip confirmation").short('f')),
        )
        .subcommand(
            CommandNode::command("resize <id>", "Resize a widget", "", |ctx| {
                let id = ctx.ensure_one_arg()?.to_string();
                let size = ctx.get_string("size")?;
                let action_id = widgets(ctx)?.resize(&id, &size)?;
                if ctx.get_bool("wait")? {
                    let action = ctx.wait_for_action(action_id, 1)?;
                    writeln!(ctx.out(), "Notice: action {} completed", action.id)?;
                }
                Ok(())
            })
            .required()
            .flag(FlagDescriptor::string("size", "", "New size").required())
            .flag(FlagDescriptor::bool("wait", false, "Wait for completion")),
        )
        .subcommand(
            CommandNode::command("purge", "Purge widget caches", "", |ctx| {
                writeln!(ctx.out(), "purged")?;
                Ok(())
            })
            .hidden(),
        )
}

struct Fixture {
    dir: TempDir,
    widgets: Arc<FakeWidgets>,
    actions: Arc<ScriptedActions>,
    sleeper: Arc<RecordingSleeper>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_script(&[])
    }

    fn with_script(script: &[ActionStatus]) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            widgets: Arc::new(FakeWidgets::default()),
            actions: Arc::new(ScriptedActions::new(script)),
            sleeper: Arc::new(RecordingSleeper::new()),
        }
    }

    fn app(&self) -> App {
        self.app_with_env(env_in(&self.dir))
    }

    fn app_with_env(&self, env: oceanctl::config::MapEnv) -> App {
        let widgets = Arc::clone(&self.widgets);
        let actions = Arc::clone(&self.actions);
        let registry = ServiceRegistry::new()
            .register::<dyn WidgetService, _>(move |_| {
                Ok(widgets.clone() as Arc<dyn WidgetService>)
            })
            .register::<dyn ActionsService, _>(move |_| {
                Ok(actions.clone() as Arc<dyn ActionsService>)
            });
        let root = oceanctl::cli::root().subcommand(widget_tree());
        App::new(CommandTree::new(root).unwrap())
            .with_services(registry)
            .with_env(Arc::new(env))
            .with_sleeper(self.sleeper.clone())
    }
}

// ------------------------------------------------------------------------
// Scenarios
// ------------------------------------------------------------------------

#[test]
fn test_get_single_resource_selected_columns() {
    let fx = Fixture::new();
    let res = run(
        &fx.app(),
        &["oceanctl", "widget", "get", "abc", "--format", "ID,Name", "--no-header"],
    );
    assert_eq!(res.code, 0, "{}", res.err);
    assert_eq!(res.out, "abc\tw\n");
}

#[test]
fn test_hidden_command_runs_but_is_not_listed() {
    let fx = Fixture::new();
    let res = run(&fx.app(), &["oceanctl", "widget", "--help"]);
    assert_eq!(res.code, 0, "{}", res.err);
    assert!(res.out.contains("resize"));
    assert!(!res.out.contains("purge"), "{}", res.out);

    let res = run(&fx.app(), &["oceanctl", "widget", "purge"]);
    assert_eq!(res.code, 0, "{}", res.err);
    assert_eq!(res.out, "purged\n");
}

#[test]
fn test_missing_required_flag_never_calls_service() {
    let fx = Fixture::new();
    let res = run(&fx.app(), &["oceanctl", "widget", "create", "--region", "nyc1"]);
    assert_ne!(res.code, 0);
    assert!(res.err.contains("name"));
    assert!(res.err.contains("Create a widget"), "help follows the error");
    assert!(fx.widgets.calls().is_empty());
}

#[test]
fn test_delete_with_force_skips_prompt() {
    let fx = Fixture::new();
    let res = run_with_input(
        &fx.app(),
        &["oceanctl", "widget", "delete", "abc", "--force"],
        "n\n",
        true,
    );
    assert_eq!(res.code, 0, "{}", res.err);
    assert!(res.err.is_empty());
    assert_eq!(fx.widgets.calls(), vec!["delete abc"]);
}

#[test]
fn test_delete_declined() {
    let fx = Fixture::new();
    let res = run_with_input(&fx.app(), &["oceanctl", "widget", "delete", "abc"], "n\n", true);
    assert_ne!(res.code, 0);
    assert!(res.err.contains("aborted"));
    assert!(fx.widgets.calls().is_empty());
}

#[test]
fn test_delete_without_terminal_requires_force() {
    let fx = Fixture::new();
    let res = run_with_input(&fx.app(), &["oceanctl", "widget", "delete", "abc"], "y\n", false);
    assert_ne!(res.code, 0);
    assert!(res.err.contains("aborted"));
    assert!(fx.widgets.calls().is_empty());
}

#[test]
fn test_wait_on_action() {
    let fx = Fixture::with_script(&[
        ActionStatus::InProgress,
        ActionStatus::InProgress,
        ActionStatus::Completed,
    ]);
    let res = run(
        &fx.app(),
        &["oceanctl", "widget", "resize", "abc", "--size", "large", "--wait"],
    );
    assert_eq!(res.code, 0, "{}", res.err);
    assert_eq!(fx.actions.polls.load(Ordering::SeqCst), 3);
    assert_eq!(fx.sleeper.calls().len(), 2);
    assert!(res.out.contains("action 42 completed"));
}

#[test]
fn test_errored_action_fails_invocation() {
    let fx = Fixture::with_script(&[ActionStatus::InProgress, ActionStatus::Errored]);
    let res = run(
        &fx.app(),
        &["oceanctl", "widget", "resize", "abc", "--size", "large", "--wait"],
    );
    assert_eq!(res.code, 2);
    assert!(res.err.contains("action 42 failed"));
}

#[test]
fn test_alias_transparency() {
    let fx = Fixture::new();
    let app = fx.app();
    let canonical = run(&app, &["oceanctl", "widget", "list"]);
    let alias = run(&app, &["oceanctl", "widget", "ls"]);
    assert_eq!(canonical.code, 0);
    assert_eq!(canonical, alias);
    assert_eq!(canonical.out, "ID\tName\nabc\tw\ndefgh\tsecond\n");
}

// ------------------------------------------------------------------------
// Output modes
// ------------------------------------------------------------------------

#[test]
fn test_json_output_is_underlying_collection() {
    let fx = Fixture::new();
    let res = run(&fx.app(), &["oceanctl", "widget", "list", "-o", "json"]);
    let parsed: serde_json::Value = serde_json::from_str(&res.out).unwrap();
    assert_eq!(parsed[1]["name"], "second");
    assert!(res.out.contains("\n  {"), "two-space indent");
}

#[test]
fn test_no_header_one_line_per_row() {
    let fx = Fixture::new();
    let res = run(&fx.app(), &["oceanctl", "widget", "list", "--no-header"]);
    assert_eq!(res.out.lines().count(), 2);
}

#[test]
fn test_template_output() {
    let fx = Fixture::new();
    let res = run(
        &fx.app(),
        &["oceanctl", "widget", "list", "--template", "{{.ID}}={{.Name}}"],
    );
    assert_eq!(res.code, 0, "{}", res.err);
    assert_eq!(res.out, "abc=w\ndefgh=second\n");
}

#[test]
fn test_bad_template_writes_nothing() {
    let fx = Fixture::new();
    let res = run(
        &fx.app(),
        &["oceanctl", "widget", "list", "--template", "{{.Missing}}"],
    );
    assert_ne!(res.code, 0);
    assert!(res.out.is_empty());
    assert!(res.err.contains("output error"));
}

#[test]
fn test_unknown_format_column() {
    let fx = Fixture::new();
    let res = run(&fx.app(), &["oceanctl", "widget", "list", "--format", "ID,Size"]);
    assert_eq!(res.code, 1);
    assert!(res.out.is_empty());
    assert!(res.err.contains("Size"));
}

// ------------------------------------------------------------------------
// Config precedence
// ------------------------------------------------------------------------

fn region(fx: &Fixture, env: oceanctl::config::MapEnv, extra: &[&str]) -> String {
    let mut argv = vec!["oceanctl", "widget", "region"];
    argv.extend_from_slice(extra);
    let res = run(&fx.app_with_env(env), &argv);
    assert_eq!(res.code, 0, "{}", res.err);
    res.out.trim().to_string()
}

#[test]
fn test_precedence_grid() {
    let fx = Fixture::new();
    assert_eq!(region(&fx, env_in(&fx.dir), &[]), "D");

    write_config(&fx.dir, "widget:\n  region:\n    region: F\n");
    assert_eq!(region(&fx, env_in(&fx.dir), &[]), "F");

    let env = env_in(&fx.dir).with("OCEANCTL_WIDGET_REGION_REGION", "E");
    assert_eq!(region(&fx, env.clone(), &[]), "E");
    assert_eq!(region(&fx, env, &["--region", "V"]), "V");
}

#[test]
fn test_context_section_overrides_top_level() {
    let fx = Fixture::new();
    write_config(
        &fx.dir,
        "context: staging\n\
         widget:\n  region:\n    region: top\n\
         contexts:\n  staging:\n    widget:\n      region:\n        region: scoped\n",
    );
    assert_eq!(region(&fx, env_in(&fx.dir), &[]), "scoped");
    assert_eq!(region(&fx, env_in(&fx.dir), &["--context", "default"]), "top");
}

#[test]
fn test_root_flag_from_env_and_file() {
    let fx = Fixture::new();
    write_config(&fx.dir, "output: json\n");
    let res = run(&fx.app(), &["oceanctl", "widget", "list"]);
    assert!(res.out.starts_with('['));

    let env = env_in(&fx.dir).with("OCEANCTL_OUTPUT", "text");
    let res = run(&fx.app_with_env(env), &["oceanctl", "widget", "list"]);
    assert!(res.out.starts_with("ID"));
}
