//! Auth context management: init, list, switch, remove.
//!
//! Tokens live in the config file. The `default` context keeps its token
//! under `access-token`; every other context under `auth-contexts.<name>`.


use crate::command::CommandNode;
use crate::context::CmdContext;
use crate::displayers::{ContextEntry, Contexts};
use crate::error::{Error, Result};

const TOKEN_PROMPT: &str = "Please authenticate oceanctl for use with your account. \
You can generate a token in the control panel under API.\n\nEnter your access token: ";

pub fn node() -> CommandNode {
    CommandNode::group(
        "auth",
        "Manage authentication contexts",
        "An auth context is a named access token stored in the config file. \
         Select one for a single command with --context, or make it current with \
         `oceanctl auth switch`.",
    )
    .subcommand(
        CommandNode::command(
            "init",
            "Initialize oceanctl to use an access token",
            "Stores an access token for the selected context after checking it against \
             the API. The token comes from --access-token or is read from the terminal.",
            init,
        )
        .doc_category(&["auth"])
        .example("oceanctl auth init --context staging"),
    )
    .subcommand(
        CommandNode::command("list", "List available auth contexts", "", list)
            .alias(&["ls"])
            .displayer_type(Contexts::COLUMNS)
            .doc_category(&["auth"]),
    )
    .subcommand(
        CommandNode::command(
            "switch",
            "Make the context given by --context the current one",
            "",
            switch,
        )
        .doc_category(&["auth"])
        .example("oceanctl auth switch --context staging"),
    )
    .subcommand(
        CommandNode::command("remove", "Remove the context given by --context", "", remove)
            .alias(&["rm"])
            .doc_category(&["auth"])
            .example("oceanctl auth remove --context staging"),
    )
}

// ============ Commands ============

fn init(ctx: &mut CmdContext<'_>) -> Result<()> {
    let context = ctx.config().active_context();

    let mut token = ctx.get_string("access-token")?;
    if token.is_empty() {
        token = ctx.prompt_line("flag: --access-token", TOKEN_PROMPT)?;
    }
    if token.is_empty() {
        return Err(Error::missing_flag("access-token"));
    }

    // Services read the token through the resolver.
    let ns = ctx.ns.clone();
    ctx.config_mut().set(&ns, "access-token", token.as_str());

    write!(ctx.err(), "Validating token... ")?;
    let account = ctx.account()?.get().map_err(|e| match e {
        Error::Auth(_) | Error::NotFound(_) => Error::Auth("the token was rejected".into()),
        other => other,
    })?;
    writeln!(ctx.err(), "OK")?;
    tracing::info!(context = %context, email = %account.email, "token validated");

    let file = ctx.config_mut().file_mut();
    file.set_token(&context, &token);
    if file.current_context().is_none() {
        file.set_current_context(&context);
    }
    file.save()
}

fn list(ctx: &mut CmdContext<'_>) -> Result<()> {
    let current = ctx.config().active_context();
    let entries = ctx
        .config()
        .file()
        .contexts()
        .into_iter()
        .map(|name| ContextEntry {
            current: name == current,
            name,
        })
        .collect();
    ctx.display(&Contexts(entries))
}

fn switch(ctx: &mut CmdContext<'_>) -> Result<()> {
    let context = ctx.config().active_context();
    let file = ctx.config_mut().file_mut();
    if !file.contexts().contains(&context) {
        return Err(Error::not_found(format!(
            "context {:?} (run `oceanctl auth init --context {}` first)",
            context, context
        )));
    }
    file.set_current_context(&context);
    file.save()?;
    writeln!(ctx.err(), "Now using context {:?}", context)?;
    Ok(())
}

fn remove(ctx: &mut CmdContext<'_>) -> Result<()> {
    if !ctx.is_set("context") {
        return Err(Error::missing_flag("context"));
    }
    let context = ctx.config().active_context();
    let file = ctx.config_mut().file_mut();
    file.remove_context(&context)?;
    file.save()
}
