//! Actions performed on a single Droplet: reboot, resize.


use super::parse_id;
use crate::command::{CommandNode, FlagDescriptor};
use crate::context::CmdContext;
use crate::displayers::Actions;
use crate::error::Result;
use crate::services::{Action, DropletActionsService};

const WAIT_POLL_SECONDS: i64 = 5;

pub fn node() -> CommandNode {
    CommandNode::group(
        "droplet-action",
        "Perform actions on Droplets",
        "Droplet actions are tasks executed on a Droplet, such as rebooting or resizing. \
         Each returns an action record; with --wait the command blocks until it finishes.",
    )
    .alias(&["da"])
    .subcommand(
        CommandNode::command("reboot <droplet-id>", "Reboot a Droplet", "", reboot)
            .required()
            .displayer_type(Actions::COLUMNS)
            .doc_category(&["droplet-action"])
            .flag(FlagDescriptor::bool("wait", false, "Wait for the action to complete"))
            .example("oceanctl compute droplet-action reboot 386734086 --wait"),
    )
    .subcommand(
        CommandNode::command(
            "resize <droplet-id>",
            "Resize a Droplet",
            "Resizes a Droplet to a new size slug. Use --resize-disk to grow the disk too; \
             a disk resize cannot be undone.",
            resize,
        )
        .required()
        .displayer_type(Actions::COLUMNS)
        .doc_category(&["droplet-action"])
        .flag(FlagDescriptor::string("size", "", "New size slug").required())
        .flag(FlagDescriptor::bool("resize-disk", false, "Resize the disk as well"))
        .flag(FlagDescriptor::bool("wait", false, "Wait for the action to complete"))
        .example("oceanctl compute droplet-action resize 386734086 --size s-2vcpu-4gb --wait"),
    )
}

/// Run `f` against the droplet actions service, optionally wait, then print
/// the resulting action.
fn perform<F>(ctx: &mut CmdContext<'_>, f: F) -> Result<()>
where
    F: FnOnce(&dyn DropletActionsService, u64) -> Result<Action>,
{
    let id = parse_id(ctx.ensure_one_arg()?, "droplet")?;
    let service = ctx.droplet_actions()?;
    let mut action = f(service.as_ref(), id)?;

    if ctx.get_bool("wait")? {
        action = ctx.wait_for_action(action.id, WAIT_POLL_SECONDS)?;
        writeln!(ctx.err(), "Notice: action {} completed", action.id)?;
    }
    ctx.display(&Actions(vec![action]))
}

// ============ Commands ============

fn reboot(ctx: &mut CmdContext<'_>) -> Result<()> {
    perform(ctx, |svc, id| svc.reboot(id))
}

fn resize(ctx: &mut CmdContext<'_>) -> Result<()> {
    let size = ctx.get_string("size")?;
    let disk = ctx.get_bool("resize-disk")?;
    perform(ctx, |svc, id| svc.resize(id, &size, disk))
}
