//! Droplet commands: list, get, create, delete.

use super::parse_id;
use crate::command::{CommandNode, FlagDescriptor};
use crate::context::CmdContext;
use crate::displayers::Droplets;
use crate::error::{Error, Result};
use crate::services::{Droplet, DropletCreateRequest};

/// Seconds between polls when `--wait` is given.
const WAIT_POLL_SECONDS: i64 = 5;

pub fn node() -> CommandNode {
    CommandNode::group(
        "droplet",
        "Manage virtual machines (Droplets)",
        "Use the subcommands of `oceanctl compute droplet` to list, create and delete Droplets.",
    )
    .alias(&["d"])
    .subcommand(
        CommandNode::command("list", "List Droplets on your account", "", list)
            .alias(&["ls"])
            .displayer_type(Droplets::COLUMNS)
            .doc_category(&["droplet"])
            .flag(FlagDescriptor::string("region", "", "Only Droplets in this region"))
            .flag(FlagDescriptor::string("tag-name", "", "Only Droplets with this tag"))
            .example("oceanctl compute droplet list --format ID,Name,PublicIPv4"),
    )
    .subcommand(
        CommandNode::command("get <droplet-id>", "Retrieve information about a Droplet", "", get)
            .alias(&["g"])
            .required()
            .displayer_type(Droplets::COLUMNS)
            .doc_category(&["droplet"])
            .example("oceanctl compute droplet get 386734086 --output json"),
    )
    .subcommand(
        CommandNode::command(
            "create <droplet-name>",
            "Create a new Droplet",
            "Creates a Droplet. With --wait the command returns once the Droplet is active.",
            create,
        )
        .alias(&["c"])
        .required()
        .displayer_type(Droplets::COLUMNS)
        .doc_category(&["droplet"])
        .flag(FlagDescriptor::string("region", "", "Region slug, e.g. nyc1").required())
        .flag(FlagDescriptor::string("size", "", "Size slug, e.g. s-1vcpu-1gb").required())
        .flag(FlagDescriptor::string("image", "", "Image ID or slug").required())
        .flag(FlagDescriptor::string_list("ssh-keys", "SSH key IDs or fingerprints"))
        .flag(FlagDescriptor::string_list("tag-name", "Tags to apply"))
        .flag(FlagDescriptor::string("user-data", "", "User data for cloud-init"))
        .flag(FlagDescriptor::bool("wait", false, "Wait for the Droplet to become active"))
        .example(
            "oceanctl compute droplet create web-1 --region nyc1 --size s-1vcpu-1gb \
             --image ubuntu-24-04-x64 --wait",
        ),
    )
    .subcommand(
        CommandNode::command("delete <droplet-id>...", "Permanently delete Droplets", "", delete)
            .alias(&["d", "rm", "del"])
            .required()
            .doc_category(&["droplet"])
            .flag(
                FlagDescriptor::bool("force", false, "Delete without a confirmation prompt")
                    .short('f'),
            )
            .example("oceanctl compute droplet delete 386734086 --force"),
    )
}

// ============ Commands ============

fn list(ctx: &mut CmdContext<'_>) -> Result<()> {
    let region = ctx.get_string("region")?;
    let tag = ctx.get_string("tag-name")?;

    let droplets: Vec<Droplet> = ctx
        .droplets()?
        .list()?
        .into_iter()
        .filter(|d| region.is_empty() || d.region.slug == region)
        .filter(|d| tag.is_empty() || d.tags.iter().any(|t| *t == tag))
        .collect();
    ctx.display(&Droplets(droplets))
}

fn get(ctx: &mut CmdContext<'_>) -> Result<()> {
    let id = parse_id(ctx.ensure_one_arg()?, "droplet")?;
    let droplet = ctx.droplets()?.get(id)?;
    ctx.display(&Droplets(vec![droplet]))
}

fn create(ctx: &mut CmdContext<'_>) -> Result<()> {
    let name = ctx.ensure_one_arg()?.to_string();
    let user_data = ctx.get_string("user-data")?;
    let req = DropletCreateRequest {
        name,
        region: ctx.get_string("region")?,
        size: ctx.get_string("size")?,
        image: ctx.get_string("image")?,
        ssh_keys: ctx.get_string_list("ssh-keys")?,
        tags: ctx.get_string_list("tag-name")?,
        user_data: (!user_data.is_empty()).then_some(user_data),
    };

    let service = ctx.droplets()?;
    let created = service.create(&req)?;
    tracing::info!(id = created.droplet.id, "droplet created");

    let droplet = if ctx.get_bool("wait")? {
        let action_id = created.action_id.ok_or_else(|| {
            Error::internal(format!(
                "droplet {} was created without a create action",
                created.droplet.id
            ))
        })?;
        ctx.wait_for_action(action_id, WAIT_POLL_SECONDS)?;
        service.get(created.droplet.id)?
    } else {
        created.droplet
    };
    ctx.display(&Droplets(vec![droplet]))
}

fn delete(ctx: &mut CmdContext<'_>) -> Result<()> {
    let ids = ctx
        .args
        .iter()
        .map(|raw| parse_id(raw, "droplet"))
        .collect::<Result<Vec<u64>>>()?;

    ctx.confirm_delete("Droplet", ids.len())?;

    let service = ctx.droplets()?;
    for id in ids {
        service.delete(id)?;
        tracing::debug!(id, "droplet deleted");
    }
    Ok(())
}
