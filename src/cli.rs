//! The `oceanctl` command tree: global flags plus every command family.

use crate::app::App;
use crate::command::{CommandNode, CommandTree, FlagDescriptor};
use crate::commands;
use crate::error::Result;

/// Root command name, also the root of every config namespace.
pub const ROOT: &str = "oceanctl";

const ABOUT: &str = "oceanctl is a command line interface (CLI) for the cloud API.";

/// The root node with the flags every command inherits.
pub fn root() -> CommandNode {
    CommandNode::new_root(ROOT, ABOUT)
        .flag(FlagDescriptor::string("access-token", "", "API V2 access token").short('t'))
        .flag(
            FlagDescriptor::string("output", "text", "Desired output format [text|json]")
                .short('o'),
        )
        .flag(FlagDescriptor::string(
            "context",
            "",
            "Specify a custom authentication context name",
        ))
        .flag(FlagDescriptor::string("config", "", "Specify a custom config file").short('c'))
        .flag(FlagDescriptor::bool("verbose", false, "Enable verbose output").short('v'))
        .flag(FlagDescriptor::bool("trace", false, "Show a log of network activity"))
        .flag(FlagDescriptor::bool(
            "interactive",
            false,
            "Enable interactive behavior (defaults to whether input is a terminal)",
        ))
        .flag(FlagDescriptor::bool(
            "non-interactive",
            false,
            "Never prompt; destructive commands then need --force",
        ))
        .flag(FlagDescriptor::string_list(
            "format",
            "Columns for output in a comma-separated list",
        ))
        .flag(FlagDescriptor::bool("no-header", false, "Return raw data with no headers"))
        .flag(FlagDescriptor::string(
            "template",
            "",
            "Go-style template applied to each row, e.g. {{.ID}}",
        ))
        .flag(FlagDescriptor::string("api-url", "", "Override default API endpoint").hidden())
        .example("oceanctl auth init")
        .example("oceanctl compute droplet list --format ID,Name,PublicIPv4")
        .example("oceanctl compute action wait 123456")
}

fn compute() -> CommandNode {
    CommandNode::group(
        "compute",
        "Display commands that manage infrastructure",
        "The subcommands under `oceanctl compute` manage Droplets and inspect the \
         actions taken on them.",
    )
    .subcommand(commands::actions::node())
    .subcommand(commands::droplets::node())
    .subcommand(commands::droplet_actions::node())
}

/// Build and validate the full command tree.
pub fn build_tree() -> Result<CommandTree> {
    let root = root()
        .subcommand(commands::account::node())
        .subcommand(commands::auth::node())
        .subcommand(compute())
        .subcommand(commands::serverless::node())
        .subcommand(commands::version::node());
    CommandTree::new(root)
}

/// The application with live services.
pub fn app() -> Result<App> {
    Ok(App::new(build_tree()?))
}
