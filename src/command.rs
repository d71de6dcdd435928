//! Declarative command tree.
//!
//! Nodes are described with [`CommandNode`] and frozen into a [`CommandTree`],
//! which validates names and flags, assigns every node its config namespace
//! and lowers the whole tree to a `clap::Command` once.

use crate::config::{FlagKind, Value};
use crate::context::CmdContext;
use crate::error::{Error, Result};
use clap::{Arg, ArgAction, ColorChoice};
use std::collections::HashSet;
use std::sync::Arc;

/// Name of the hidden positional that collects a leaf's arguments.
pub(crate) const ARGS_ID: &str = "__args";

/// Flag names clap reserves for itself.
const RESERVED_LONG: &[&str] = &["help"];
const RESERVED_SHORT: &[char] = &['h'];

/// A command handler. Receives the per-invocation context.
pub type Handler = Arc<dyn Fn(&mut CmdContext<'_>) -> Result<()> + Send + Sync>;

// ============ Flags ============

#[derive(Debug, Clone)]
pub struct FlagDescriptor {
    pub name: String,
    pub short: Option<char>,
    pub kind: FlagKind,
    pub default: Option<Value>,
    pub description: String,
    pub required: bool,
    pub hidden: bool,
}

impl FlagDescriptor {
    fn new(name: &str, kind: FlagKind, default: Option<Value>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            short: None,
            kind,
            default,
            description: description.to_string(),
            required: false,
            hidden: false,
        }
    }

    pub fn bool(name: &str, default: bool, description: &str) -> Self {
        Self::new(name, FlagKind::Bool, Some(Value::Bool(default)), description)
    }

    pub fn int(name: &str, default: i64, description: &str) -> Self {
        Self::new(name, FlagKind::Int, Some(Value::Int(default)), description)
    }

    pub fn string(name: &str, default: &str, description: &str) -> Self {
        let default = (!default.is_empty()).then(|| Value::from(default));
        Self::new(name, FlagKind::String, default, description)
    }

    pub fn string_list(name: &str, description: &str) -> Self {
        Self::new(name, FlagKind::StringList, None, description)
    }

    pub fn short(mut self, c: char) -> Self {
        self.short = Some(c);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    fn help_text(&self) -> String {
        let mut help = self.description.clone();
        match &self.default {
            Some(Value::Bool(false)) | Some(Value::Int(0)) | None => {}
            Some(v) => help.push_str(&format!(" (default {})", v)),
        }
        if self.required {
            help.push_str(" (required)");
        }
        help
    }

    fn to_arg(&self, global: bool) -> Arg {
        let mut arg = Arg::new(self.name.clone())
            .long(self.name.clone())
            .help(self.help_text())
            .hide(self.hidden)
            .global(global);
        if let Some(c) = self.short {
            arg = arg.short(c);
        }
        match self.kind {
            FlagKind::Bool => arg
                .action(ArgAction::Set)
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true"),
            FlagKind::Int | FlagKind::String => arg.action(ArgAction::Set).num_args(1),
            FlagKind::StringList => arg
                .action(ArgAction::Append)
                .num_args(1)
                .value_delimiter(','),
        }
    }
}

// ============ Builder ============

/// Builder for one node of the command tree.
pub struct CommandNode {
    name: String,
    args: Vec<String>,
    aliases: Vec<String>,
    short: String,
    long: String,
    examples: Vec<String>,
    flags: Vec<FlagDescriptor>,
    children: Vec<CommandNode>,
    handler: Option<Handler>,
    args_required: bool,
    hidden: bool,
    doc_categories: Vec<String>,
    columns: Vec<&'static str>,
}

impl CommandNode {
    fn blank(usage: &str, short: &str, long: &str) -> Self {
        let mut words = usage.split_whitespace();
        let name = words.next().unwrap_or_default().to_string();
        let args = words
            .map(|w| {
                w.trim_start_matches(['<', '['])
                    .trim_end_matches("...")
                    .trim_end_matches(['>', ']'])
                    .to_string()
            })
            .collect();
        Self {
            name,
            args,
            aliases: Vec::new(),
            short: short.to_string(),
            long: long.to_string(),
            examples: Vec::new(),
            flags: Vec::new(),
            children: Vec::new(),
            handler: None,
            args_required: false,
            hidden: false,
            doc_categories: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// The program's root node.
    pub fn new_root(name: &str, help: &str) -> Self {
        Self::blank(name, help, "")
    }

    /// An intermediate node that only groups subcommands.
    pub fn group(name: &str, short: &str, long: &str) -> Self {
        Self::blank(name, short, long)
    }

    /// A leaf. `usage` is the name followed by positional argument names,
    /// e.g. `get <action-id>`.
    pub fn command<F>(usage: &str, short: &str, long: &str, handler: F) -> Self
    where
        F: Fn(&mut CmdContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let mut node = Self::blank(usage, short, long);
        node.handler = Some(Arc::new(handler));
        node
    }

    pub fn alias(mut self, names: &[&str]) -> Self {
        self.aliases.extend(names.iter().map(|s| s.to_string()));
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Positional arguments named in the usage line must all be supplied.
    pub fn required(mut self) -> Self {
        self.args_required = true;
        self
    }

    /// Columns the command's output offers, listed in help.
    pub fn displayer_type(mut self, columns: &[&'static str]) -> Self {
        self.columns = columns.to_vec();
        self
    }

    /// Documentation categories, listed at the end of help.
    pub fn doc_category(mut self, tags: &[&str]) -> Self {
        self.doc_categories
            .extend(tags.iter().map(|s| s.to_string()));
        self
    }

    pub fn example(mut self, text: &str) -> Self {
        self.examples.push(text.to_string());
        self
    }

    pub fn flag(mut self, flag: FlagDescriptor) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn subcommand(mut self, child: CommandNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn add_flag(&mut self, flag: FlagDescriptor) -> &mut Self {
        self.flags.push(flag);
        self
    }

    /// Attach `child` and return it for further configuration.
    pub fn add_subcommand(&mut self, child: CommandNode) -> &mut CommandNode {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }
}

// ============ Tree ============

pub type NodeId = usize;

/// A frozen node. Read-only once the tree is built.
pub struct Node {
    pub name: String,
    pub aliases: Vec<String>,
    pub short: String,
    pub long: String,
    pub examples: Vec<String>,
    pub flags: Vec<FlagDescriptor>,
    pub args: Vec<String>,
    pub args_required: bool,
    pub hidden: bool,
    pub doc_categories: Vec<String>,
    pub columns: Vec<&'static str>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub ns: String,
    handler: Option<Handler>,
}

impl Node {
    pub fn handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    pub fn is_leaf(&self) -> bool {
        self.handler.is_some()
    }

    fn answers_to(&self, token: &str) -> bool {
        self.name == token || self.aliases.iter().any(|a| a == token)
    }
}

/// The whole command tree plus its clap lowering.
pub struct CommandTree {
    nodes: Vec<Node>,
    clap: clap::Command,
}

impl CommandTree {
    pub fn new(root: CommandNode) -> Result<Self> {
        let mut nodes = Vec::new();
        flatten(root, None, &mut nodes);

        let mut tree = Self {
            nodes,
            clap: clap::Command::new(""),
        };
        tree.validate()?;
        tree.clap = tree
            .lower(0)
            .color(ColorChoice::Never)
            .disable_version_flag(true);
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clap(&self) -> &clap::Command {
        &self.clap
    }

    /// Child of `id` answering to `token` by name or alias.
    pub fn child(&self, id: NodeId, token: &str) -> Option<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[*c].answers_to(token))
    }

    /// Resolve a path of names or aliases from the root.
    pub fn find(&self, path: &[&str]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root(), |id, token| self.child(id, token))
    }

    /// `id` and all its ancestors, root first.
    pub fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut cur = id;
        while let Some(p) = self.nodes[cur].parent {
            chain.push(p);
            cur = p;
        }
        chain.reverse();
        chain
    }

    /// Every flag visible at `id` with the node that declares it.
    pub fn visible_flags(&self, id: NodeId) -> Vec<(NodeId, &FlagDescriptor)> {
        self.lineage(id)
            .into_iter()
            .flat_map(|n| self.nodes[n].flags.iter().map(move |f| (n, f)))
            .collect()
    }

    /// Canonical names from below the root down to `id`.
    pub fn path(&self, id: NodeId) -> Vec<&str> {
        self.lineage(id)
            .into_iter()
            .skip(1)
            .map(|n| self.nodes[n].name.as_str())
            .collect()
    }

    /// All node ids, depth first.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len()
    }

    /// Rendered help for `id`, with inherited flags included.
    pub fn help(&self, id: NodeId) -> String {
        let mut cmd = self.clap.clone();
        cmd.build();
        render_at(&mut cmd, &self.path(id))
    }

    fn validate(&self) -> Result<()> {
        for (id, node) in self.nodes.iter().enumerate() {
            if node.name.is_empty() || node.name.contains('.') {
                return Err(Error::internal(format!(
                    "invalid command name {:?}",
                    node.name
                )));
            }
            if node.handler.is_some() && !node.children.is_empty() {
                return Err(Error::internal(format!(
                    "{}: a command with a handler cannot have subcommands",
                    node.ns
                )));
            }

            let mut seen = HashSet::new();
            for child in &node.children {
                let c = &self.nodes[*child];
                for token in std::iter::once(&c.name).chain(c.aliases.iter()) {
                    if !seen.insert(token.as_str()) {
                        return Err(Error::internal(format!(
                            "{}: duplicate subcommand name or alias {:?}",
                            node.ns, token
                        )));
                    }
                }
            }

            let inherited = self.visible_flags(id);
            let mut longs: HashSet<&str> = RESERVED_LONG.iter().copied().collect();
            let mut shorts: HashSet<char> = RESERVED_SHORT.iter().copied().collect();
            for (_, flag) in &inherited {
                if !longs.insert(flag.name.as_str()) {
                    return Err(Error::internal(format!(
                        "{}: flag --{} collides with another flag",
                        node.ns, flag.name
                    )));
                }
                if let Some(c) = flag.short {
                    if !shorts.insert(c) {
                        return Err(Error::internal(format!(
                            "{}: short flag -{} collides with another flag",
                            node.ns, c
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn lower(&self, id: NodeId) -> clap::Command {
        let node = &self.nodes[id];
        let leaf = node.is_leaf();

        let mut cmd = clap::Command::new(node.name.clone())
            .about(node.short.clone())
            .hide(node.hidden)
            .disable_help_subcommand(true)
            .visible_aliases(node.aliases.clone());
        if !node.long.is_empty() {
            cmd = cmd.long_about(format!("{}\n\n{}", node.short, node.long));
        }
        if let Some(after) = after_help(node) {
            cmd = cmd.after_help(after);
        }

        for flag in &node.flags {
            cmd = cmd.arg(flag.to_arg(!leaf));
        }

        if leaf {
            let mut positional = Arg::new(ARGS_ID)
                .num_args(0..)
                .action(ArgAction::Append);
            if !node.args.is_empty() {
                positional = positional.value_name(node.args.join(" "));
            } else {
                positional = positional.hide(true);
            }
            cmd = cmd.arg(positional);
        }

        for child in &node.children {
            cmd = cmd.subcommand(self.lower(*child));
        }
        cmd
    }
}

fn render_at(cmd: &mut clap::Command, path: &[&str]) -> String {
    match path.split_first() {
        Some((name, rest)) => match cmd.find_subcommand_mut(name) {
            Some(sub) => render_at(sub, rest),
            None => cmd.render_help().to_string(),
        },
        None => cmd.render_help().to_string(),
    }
}

fn after_help(node: &Node) -> Option<String> {
    let mut sections = Vec::new();
    if !node.examples.is_empty() {
        let lines: Vec<String> = node
            .examples
            .iter()
            .map(|e| format!("  {}", e))
            .collect();
        sections.push(format!("Examples:\n{}", lines.join("\n")));
    }
    if !node.columns.is_empty() {
        sections.push(format!(
            "Columns (for --format):\n  {}",
            node.columns.join(", ")
        ));
    }
    if !node.doc_categories.is_empty() {
        sections.push(format!("Categories:\n  {}", node.doc_categories.join(", ")));
    }
    (!sections.is_empty()).then(|| sections.join("\n\n"))
}

fn flatten(node: CommandNode, parent: Option<NodeId>, out: &mut Vec<Node>) -> NodeId {
    let id = out.len();
    let ns = match parent {
        Some(p) => format!("{}.{}", out[p].ns, node.name),
        None => node.name.clone(),
    };
    out.push(Node {
        name: node.name,
        aliases: node.aliases,
        short: node.short,
        long: node.long,
        examples: node.examples,
        flags: node.flags,
        args: node.args,
        args_required: node.args_required,
        hidden: node.hidden,
        doc_categories: node.doc_categories,
        columns: node.columns,
        parent,
        children: Vec::new(),
        ns,
        handler: node.handler,
    });
    for child in node.children {
        let child_id = flatten(child, Some(id), out);
        out[id].children.push(child_id);
    }
    id
}
