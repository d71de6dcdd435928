//! Serverless support: status, install, upgrade and the `functions`
//! subcommands, all backed by the out-of-process helper.

use crate::command::{CommandNode, FlagDescriptor};
use crate::context::CmdContext;
use crate::error::{Error, Result};
use crate::services::serverless::{print_output, MIN_VERSION};
use crate::services::ServerlessStatus;

/// Helper subcommand that runs its arguments without capturing output.
const NO_CAPTURE: &str = "nocapture";

pub fn node() -> CommandNode {
    CommandNode::group(
        "serverless",
        "Develop, test, and deploy serverless functions",
        "Serverless support is provided by a helper that is downloaded on demand. \
         Install it with `oceanctl serverless install`.",
    )
    .alias(&["sls"])
    .subcommand(
        CommandNode::command("status", "Show the state of serverless support", "", status)
            .doc_category(&["serverless"])
            .flag(FlagDescriptor::bool("version", false, "Only show the helper version")),
    )
    .subcommand(
        CommandNode::command(
            "install",
            "Install serverless support",
            "Downloads the serverless helper and unpacks it under the config directory.",
            install,
        )
        .doc_category(&["serverless"]),
    )
    .subcommand(
        CommandNode::command(
            "upgrade",
            "Upgrade serverless support to the version this client needs",
            "",
            upgrade,
        )
        .doc_category(&["serverless"]),
    )
    .subcommand(
        CommandNode::command(
            "watch <directory>",
            "Watch a functions project and deploy changes as they are saved",
            "The helper's output is passed through as it is produced.",
            watch,
        )
        .required()
        .doc_category(&["serverless"])
        .flag(FlagDescriptor::string("exclude", "", "Packages or functions to skip"))
        .flag(FlagDescriptor::bool("remote-build", false, "Build on the server"))
        .flag(FlagDescriptor::bool("verbose-build", false, "Show build output")),
    )
    .subcommand(functions())
}

fn functions() -> CommandNode {
    CommandNode::group(
        "functions",
        "Work with the functions in your functions namespace",
        "",
    )
    .alias(&["fn"])
    .subcommand(
        CommandNode::command(
            "list [<package>]",
            "List the functions in your functions namespace",
            "",
            list,
        )
        .alias(&["ls"])
        .doc_category(&["serverless"])
        .flag(FlagDescriptor::int("limit", 0, "Return at most this many functions"))
        .flag(FlagDescriptor::int("skip", 0, "Skip this many of the most recent functions"))
        .flag(FlagDescriptor::bool("count", false, "Only show the number of functions"))
        .flag(FlagDescriptor::bool("name-sort", false, "Sort results by name"))
        .example("oceanctl serverless functions list sample --limit 5"),
    )
    .subcommand(
        CommandNode::command("invoke <function>", "Invoke a function", "", invoke)
            .required()
            .doc_category(&["serverless"])
            .flag(
                FlagDescriptor::string_list("param", "Parameters as key:value pairs")
                    .short('p'),
            )
            .flag(FlagDescriptor::bool(
                "full",
                false,
                "Show the complete activation record, not just the result",
            ))
            .flag(FlagDescriptor::bool(
                "no-wait",
                false,
                "Return the activation id without waiting for the result",
            ))
            .example("oceanctl serverless functions invoke sample/hello -p name:Sammy"),
    )
}

// ============ Commands ============

fn status(ctx: &mut CmdContext<'_>) -> Result<()> {
    let sls = ctx.serverless()?;
    let state = sls.status()?;

    if ctx.get_bool("version")? {
        return match state {
            ServerlessStatus::NotInstalled => state.into_result(),
            ServerlessStatus::NeedsUpgrade { found } => {
                writeln!(ctx.out(), "Current: {}, required: {}", found, MIN_VERSION)?;
                Ok(())
            }
            _ => {
                writeln!(ctx.out(), "{}", MIN_VERSION)?;
                Ok(())
            }
        };
    }

    state.into_result()?;
    if let Some(creds) = sls.credentials()? {
        writeln!(
            ctx.out(),
            "Connected to functions namespace '{}' on API host '{}'",
            creds.namespace,
            creds.api_host
        )?;
    }
    writeln!(ctx.out(), "Serverless software version is {}", MIN_VERSION)?;
    Ok(())
}

fn install(ctx: &mut CmdContext<'_>) -> Result<()> {
    let sls = ctx.serverless()?;
    match sls.status()? {
        ServerlessStatus::NotInstalled => {}
        ServerlessStatus::NeedsUpgrade { .. } => {
            writeln!(
                ctx.out(),
                "Serverless support is already installed, but needs an upgrade \
                 for this version of oceanctl.\n\
                 Use `oceanctl serverless upgrade` to upgrade the support."
            )?;
            return Ok(());
        }
        ServerlessStatus::NotConnected | ServerlessStatus::Ready => {
            writeln!(
                ctx.out(),
                "Serverless support is already installed at an appropriate version. \
                 No action needed."
            )?;
            return Ok(());
        }
    }
    writeln!(ctx.err(), "Downloading and installing serverless support...")?;
    sls.install(false)?;
    writeln!(ctx.out(), "Serverless support installed ({})", MIN_VERSION)?;
    Ok(())
}

fn upgrade(ctx: &mut CmdContext<'_>) -> Result<()> {
    let sls = ctx.serverless()?;
    match sls.status()? {
        ServerlessStatus::NeedsUpgrade { .. } => {}
        ServerlessStatus::NotInstalled => {
            writeln!(
                ctx.out(),
                "Serverless support was never installed. Use `oceanctl serverless install`."
            )?;
            return Ok(());
        }
        ServerlessStatus::NotConnected | ServerlessStatus::Ready => {
            writeln!(
                ctx.out(),
                "Serverless support is already installed at an appropriate version. \
                 No action needed."
            )?;
            return Ok(());
        }
    }
    writeln!(ctx.err(), "Upgrading serverless support...")?;
    sls.install(true)?;
    writeln!(ctx.out(), "Serverless support upgraded to {}", MIN_VERSION)?;
    Ok(())
}

fn list(ctx: &mut CmdContext<'_>) -> Result<()> {
    if ctx.args.len() > 1 {
        return Err(Error::invalid(format!(
            "too many arguments: expected at most 1, got {}",
            ctx.args.len()
        )));
    }
    let count = ctx.get_bool("count")?;
    if count && ctx.is_set("format") {
        return Err(Error::invalid("the --count and --format flags are mutually exclusive"));
    }

    let mut args: Vec<String> = ctx.args.clone();
    for key in ["limit", "skip"] {
        let n = ctx.get_int(key)?;
        if n > 0 {
            args.push(format!("--{}", key));
            args.push(n.to_string());
        }
    }
    for key in ["count", "name-sort"] {
        if ctx.get_bool(key)? {
            args.push(format!("--{}", key));
        }
    }
    run_captured(ctx, "function/list", args)
}

fn invoke(ctx: &mut CmdContext<'_>) -> Result<()> {
    let name = ctx.ensure_one_arg()?.to_string();
    let mut args = vec![name];
    for pair in ctx.get_string_list("param")? {
        let (key, value) = pair.split_once(':').ok_or_else(|| {
            Error::invalid(format!("--param {:?}: expected key:value", pair))
        })?;
        args.extend(["--param".to_string(), key.to_string(), value.to_string()]);
    }
    if ctx.get_bool("full")? {
        args.push("--full".into());
    }
    if ctx.get_bool("no-wait")? {
        args.push("--no-wait".into());
    }
    run_captured(ctx, "action/invoke", args)
}

fn watch(ctx: &mut CmdContext<'_>) -> Result<()> {
    let dir = ctx.ensure_one_arg()?.to_string();
    let mut args = vec!["watch".to_string(), dir];
    for key in ["remote-build", "verbose-build"] {
        if ctx.get_bool(key)? {
            args.push(format!("--{}", key));
        }
    }
    let exclude = ctx.get_string("exclude")?;
    if !exclude.is_empty() {
        args.extend(["--exclude".to_string(), exclude]);
    }

    let sls = ctx.serverless()?;
    sls.status()?.into_result()?;
    let cmd = sls.cmd(NO_CAPTURE, &args)?;
    let (out, err) = ctx.streams();
    sls.stream(&cmd, out, err)
}

/// Run a connected helper subcommand and print its envelope.
fn run_captured(ctx: &mut CmdContext<'_>, subcommand: &str, args: Vec<String>) -> Result<()> {
    let sls = ctx.serverless()?;
    sls.status()?.into_result()?;
    let cmd = sls.cmd(subcommand, &args)?;
    let output = sls.exec(&cmd)?;
    let json = ctx.json_output()?;
    print_output(ctx.out(), &output, json)
}
