//! Account information.

use crate::command::CommandNode;
use crate::context::CmdContext;
use crate::displayers::AccountView;
use crate::error::Result;

pub fn node() -> CommandNode {
    CommandNode::group(
        "account",
        "Display commands that retrieve account details",
        "",
    )
    .subcommand(
        CommandNode::command(
            "get",
            "Retrieve account profile details",
            "Shows the email address, team, Droplet limit, verification state and status \
             of the account the access token belongs to.",
            get,
        )
        .alias(&["g"])
        .displayer_type(AccountView::COLUMNS)
        .doc_category(&["account"])
        .example("oceanctl account get --format Email,Status"),
    )
}

fn get(ctx: &mut CmdContext<'_>) -> Result<()> {
    let account = ctx.account()?.get()?;
    ctx.display(&AccountView(account))
}
