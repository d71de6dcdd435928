//! Displayer pipeline: text tables, JSON and templates.
//!
//! - text: tab-aligned columns, header row unless `--no-header`
//! - json: the underlying collection, pretty printed
//! - template: a template rendered once per row
//!
//! Everything is rendered into a buffer first so a failure never leaves
//! partial output behind.

use crate::error::{Error, Result};
use crate::tabwriter::TabWriter;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

// ============ Cells & Rows ============

/// A single formattable table value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
    Empty,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Int(n) => write!(f, "{}", n),
            Cell::UInt(n) => write!(f, "{}", n),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::List(items) => f.write_str(&items.join(",")),
            Cell::Empty => Ok(()),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Cell::Text(v) => s.serialize_str(v),
            Cell::Int(v) => s.serialize_i64(*v),
            Cell::UInt(v) => s.serialize_u64(*v),
            Cell::Float(v) => s.serialize_f64(*v),
            Cell::Bool(v) => s.serialize_bool(*v),
            Cell::List(v) => v.serialize(s),
            Cell::Empty => s.serialize_str(""),
        }
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<u64> for Cell {
    fn from(v: u64) -> Self {
        Cell::UInt(v)
    }
}

impl From<u32> for Cell {
    fn from(v: u32) -> Self {
        Cell::UInt(v.into())
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl From<Vec<String>> for Cell {
    fn from(v: Vec<String>) -> Self {
        Cell::List(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Empty)
    }
}

/// One row: column key to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(HashMap<&'static str, Cell>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<Cell>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Cell> {
        self.0.get(key)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ============ Displayable ============

/// Anything that can be rendered by [`display`].
pub trait Displayable {
    /// Canonical column keys, in display order.
    fn cols(&self) -> Vec<&'static str>;

    /// Header label for each column key.
    fn col_map(&self) -> HashMap<&'static str, &'static str>;

    /// One row per item, keyed by column.
    fn kv(&self) -> Vec<Row>;

    /// Serialize the underlying collection.
    fn json(&self, out: &mut dyn Write) -> Result<()>;
}

/// Pretty-print `value` with a trailing newline.
pub fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)
        .map_err(|e| Error::output(format!("encoding json: {}", e)))?;
    out.write_all(b"\n")?;
    Ok(())
}

// ============ Options ============

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
    Template(String),
}

impl OutputMode {
    /// Pick the mode from `--output` and `--template`. A template wins.
    pub fn resolve(output: &str, template: &str) -> Result<Self> {
        if !template.is_empty() {
            return Ok(OutputMode::Template(template.to_string()));
        }
        match output {
            "" | "text" => Ok(OutputMode::Text),
            "json" => Ok(OutputMode::Json),
            other => Err(Error::invalid(format!(
                "unknown output type {:?}, expected text or json",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisplayOptions {
    pub mode: OutputMode,
    /// Column keys from `--format`. Empty means the declared order.
    pub columns: Vec<String>,
    pub no_header: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::Text,
            columns: Vec::new(),
            no_header: false,
        }
    }
}

// ============ Rendering ============

/// Render `item` according to `opts` and write it to `out` in one piece.
pub fn display(item: &dyn Displayable, opts: &DisplayOptions, out: &mut dyn Write) -> Result<()> {
    let mut buf = Vec::new();
    match &opts.mode {
        OutputMode::Json => item.json(&mut buf)?,
        OutputMode::Text => render_text(item, opts, &mut buf)?,
        OutputMode::Template(src) => render_template(item, src, &mut buf)?,
    }
    out.write_all(&buf)?;
    out.flush()?;
    Ok(())
}

fn selected_columns(item: &dyn Displayable, requested: &[String]) -> Result<Vec<&'static str>> {
    let declared = item.cols();
    if requested.is_empty() {
        return Ok(declared);
    }
    requested
        .iter()
        .map(|want| {
            declared
                .iter()
                .find(|c| **c == want.trim())
                .copied()
                .ok_or_else(|| {
                    Error::output(format!(
                        "unknown column {:?}, valid columns: {}",
                        want,
                        declared.join(", ")
                    ))
                })
        })
        .collect()
}

fn render_text(item: &dyn Displayable, opts: &DisplayOptions, buf: &mut Vec<u8>) -> Result<()> {
    let cols = selected_columns(item, &opts.columns)?;
    let labels = item.col_map();

    let mut tw = TabWriter::new(buf);
    if !opts.no_header {
        let header: Vec<&str> = cols
            .iter()
            .map(|c| labels.get(c).copied().unwrap_or(*c))
            .collect();
        writeln!(tw, "{}", header.join("\t"))?;
    }
    for row in item.kv() {
        let values: Vec<String> = cols
            .iter()
            .map(|c| row.get(c).map(ToString::to_string).unwrap_or_default())
            .collect();
        writeln!(tw, "{}", values.join("\t"))?;
    }
    tw.flush()?;
    Ok(())
}

/// Accept `{{.Field}}` as well as `{{ Field }}`.
fn normalize_template(src: &str) -> String {
    src.replace("{{.", "{{ ").replace("{{ .", "{{ ")
}

fn render_template(item: &dyn Displayable, src: &str, buf: &mut Vec<u8>) -> Result<()> {
    let src = normalize_template(src);
    let mut env = minijinja::Environment::new();
    env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
    let tmpl = env
        .template_from_str(&src)
        .map_err(|e| Error::output(format!("parsing template: {}", e)))?;

    for row in item.kv() {
        let rendered = tmpl
            .render(&row)
            .map_err(|e| Error::output(format!("rendering template: {}", e)))?;
        buf.extend_from_slice(rendered.as_bytes());
        buf.push(b'\n');
    }
    Ok(())
}
