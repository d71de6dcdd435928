//! Action history commands: get, list, wait.

use chrono::{DateTime, Utc};

use super::parse_id;
use crate::command::{CommandNode, FlagDescriptor};
use crate::context::CmdContext;
use crate::displayers::Actions;
use crate::error::{Error, Result};
use crate::services::Action;

const DETAILS: &str = "Details shown: the action ID, status, type, start and completion \
times (RFC3339), the ID and type of the affected resource, and its region.";

pub fn node() -> CommandNode {
    CommandNode::group(
        "action",
        "Retrieve resource action history",
        "The subcommands of `oceanctl compute action` retrieve the history of actions \
         taken on your resources, or a single action by ID.",
    )
    .subcommand(
        CommandNode::command(
            "get <action-id>",
            "Retrieve details about a specific action",
            DETAILS,
            get,
        )
        .alias(&["g"])
        .required()
        .displayer_type(Actions::COLUMNS)
        .doc_category(&["action"])
        .example("oceanctl compute action get 123456 --format ID,Status"),
    )
    .subcommand(
        CommandNode::command("list", "List recent actions taken on your resources", DETAILS, list)
            .alias(&["ls"])
            .displayer_type(Actions::COLUMNS)
            .doc_category(&["action"])
            .flag(FlagDescriptor::string("resource-type", "", "Action resource type"))
            .flag(FlagDescriptor::string("region", "", "Action region"))
            .flag(FlagDescriptor::string("after", "", "Action completed after, in RFC3339 format"))
            .flag(FlagDescriptor::string(
                "before",
                "",
                "Action completed before, in RFC3339 format",
            ))
            .flag(FlagDescriptor::string("status", "", "Action status"))
            .flag(FlagDescriptor::string("action-type", "", "Action type"))
            .example("oceanctl compute action list --resource-type droplet --status errored"),
    )
    .subcommand(
        CommandNode::command(
            "wait <action-id>",
            "Block until an action completes",
            "Polls the action until it leaves the in-progress state. Exits non-zero \
             if the action errored.",
            wait,
        )
        .alias(&["w"])
        .required()
        .displayer_type(Actions::COLUMNS)
        .flag(FlagDescriptor::int("poll-timeout", 5, "Re-poll time in seconds"))
        .example("oceanctl compute action wait 123456 --poll-timeout 10"),
    )
}

// ============ Filtering ============

/// Criteria for `action list`. Empty fields match everything.
#[derive(Debug, Default, Clone)]
pub struct ActionFilter {
    pub resource_type: String,
    pub region: String,
    pub status: String,
    pub action_type: String,
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
}

impl ActionFilter {
    fn from_context(ctx: &CmdContext<'_>) -> Result<Self> {
        Ok(Self {
            resource_type: ctx.get_string("resource-type")?,
            region: ctx.get_string("region")?,
            status: ctx.get_string("status")?,
            action_type: ctx.get_string("action-type")?,
            before: parse_time("before", &ctx.get_string("before")?)?,
            after: parse_time("after", &ctx.get_string("after")?)?,
        })
    }

    /// Actions that never completed are always excluded.
    fn matches(&self, a: &Action) -> bool {
        let Some(done) = a.completed_at else {
            return false;
        };
        let eq = |want: &str, have: &str| want.is_empty() || want == have;
        eq(&self.resource_type, &a.resource_type)
            && eq(&self.region, &a.region_slug)
            && eq(&self.status, &a.status.to_string())
            && eq(&self.action_type, &a.kind)
            && self.before.map_or(true, |b| done <= b)
            && self.after.map_or(true, |t| done >= t)
    }
}

fn parse_time(flag: &str, value: &str) -> Result<Option<DateTime<Utc>>> {
    if value.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| Error::invalid(format!("--{}: {:?} is not RFC3339: {}", flag, value, e)))
}

/// Apply `filter` and order by completion time.
pub fn filter_actions(actions: Vec<Action>, filter: &ActionFilter) -> Vec<Action> {
    let mut out: Vec<Action> = actions.into_iter().filter(|a| filter.matches(a)).collect();
    out.sort_by_key(|a| a.completed_at);
    out
}

// ============ Commands ============

fn get(ctx: &mut CmdContext<'_>) -> Result<()> {
    let id = parse_id(ctx.ensure_one_arg()?, "action")?;
    let action = ctx.actions()?.get(id)?;
    ctx.display(&Actions(vec![action]))
}

fn list(ctx: &mut CmdContext<'_>) -> Result<()> {
    let filter = ActionFilter::from_context(ctx)?;
    let actions = ctx.actions()?.list()?;
    let actions = filter_actions(actions, &filter);
    ctx.display(&Actions(actions))
}

fn wait(ctx: &mut CmdContext<'_>) -> Result<()> {
    let id = parse_id(ctx.ensure_one_arg()?, "action")?;
    let poll = ctx.get_int("poll-timeout")?;
    let action = ctx.wait_for_action(id, poll)?;
    ctx.display(&Actions(vec![action]))
}
