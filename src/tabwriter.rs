//! Elastic tab stops for text-mode tables.
//!
//! Input is buffered until [`Write::flush`]. Each line is split into cells on
//! `\t`; the last cell of a line is trailing text and is never padded. Every
//! other column is widened to its widest cell plus `padding`. With a `\t`
//! pad character the width is rounded up to a multiple of `tab_width` and the
//! gap is filled with tabs, so `abc\tw` stays `abc\tw`.

use std::io::{self, Write};
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub min_width: usize,
    pub tab_width: usize,
    pub padding: usize,
    pub pad_char: char,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_width: 0,
            tab_width: 8,
            padding: 1,
            pad_char: '\t',
        }
    }
}

pub struct TabWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
    settings: Settings,
}

impl<W: Write> TabWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_settings(inner, Settings::default())
    }

    pub fn with_settings(inner: W, settings: Settings) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            settings,
        }
    }

    /// Flush and return the wrapped writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }

    fn format(&self, text: &str) -> String {
        let lines: Vec<Vec<&str>> = text.split_inclusive('\n').map(split_cells).collect();

        let columns = lines.iter().map(|l| l.len().saturating_sub(1)).max().unwrap_or(0);
        let mut widths = vec![self.settings.min_width; columns];
        for line in &lines {
            for (j, cell) in line.iter().take(line.len().saturating_sub(1)).enumerate() {
                let w = cell.width() + self.settings.padding;
                if w > widths[j] {
                    widths[j] = w;
                }
            }
        }

        let mut out = String::with_capacity(text.len() * 2);
        for line in &lines {
            let last = line.len().saturating_sub(1);
            for (j, cell) in line.iter().enumerate() {
                out.push_str(cell);
                if j < last {
                    self.pad(&mut out, cell.width(), widths[j]);
                }
            }
        }
        out
    }

    fn pad(&self, out: &mut String, text_width: usize, cell_width: usize) {
        let Settings {
            tab_width,
            pad_char,
            ..
        } = self.settings;

        if pad_char == '\t' {
            if tab_width == 0 {
                return;
            }
            let cell_width = cell_width.div_ceil(tab_width) * tab_width;
            let n = cell_width.saturating_sub(text_width);
            out.extend(std::iter::repeat('\t').take(n.div_ceil(tab_width)));
        } else {
            let n = cell_width.saturating_sub(text_width);
            out.extend(std::iter::repeat(pad_char).take(n));
        }
    }
}

/// Split a line into cells, keeping the newline on the trailing cell.
fn split_cells(line: &str) -> Vec<&str> {
    line.split('\t').collect()
}

impl<W: Write> Write for TabWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let text = String::from_utf8(std::mem::take(&mut self.buf))
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let formatted = self.format(&text);
            self.inner.write_all(formatted.as_bytes())?;
        }
        self.inner.flush()
    }
}
