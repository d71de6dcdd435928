//! `oceanctl version`.


use serde::Serialize;

use crate::command::CommandNode;
use crate::context::CmdContext;
use crate::error::Result;
use crate::output::write_json;

#[derive(Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
}

const INFO: VersionInfo = VersionInfo {
    name: "oceanctl",
    version: env!("CARGO_PKG_VERSION"),
};

pub fn node() -> CommandNode {
    CommandNode::command("version", "Show the current version", "", run)
        .doc_category(&["admin"])
}

fn run(ctx: &mut CmdContext<'_>) -> Result<()> {
    if ctx.json_output()? {
        return write_json(ctx.out(), &INFO);
    }
    writeln!(ctx.out(), "{} version {}", INFO.name, INFO.version)?;
    Ok(())
}
