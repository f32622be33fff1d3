// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Format-preserving edits of block-style YAML text.
//!
//! [`splice`] applies the difference between a parsed document and its merged
//! successor to the source text of the former. Only lines that hold changed
//! values are rewritten. Comments, blank lines, quoting and key order
//! everywhere else stay byte-for-byte as found, and a rewritten scalar keeps
//! its quote style and trailing comment.
//!
//! The scanner understands block mappings and block sequences. Anything else
//! on the path to a change (flow collections, anchors, multi-document
//! streams) makes [`splice`] return `None`, and so does any result that does
//! not parse back to the merged document.

use serde_yaml::{Mapping, Value};

use crate::descriptor::{YamlLayout, is_block, scalar_text};

/// Rewrites `text` so that it parses to `after`, touching only the lines of
/// values that differ from `before`.
///
/// Returns `None` when the change cannot be expressed as a line splice.
pub(crate) fn splice(text: &str, before: &Value, after: &Value, layout: &YamlLayout,) -> Option<String,>
{
    let (Value::Mapping(old,), Value::Mapping(new,),) = (before, after,) else {
        return None;
    };

    let source = Source::parse(text,)?;
    let root = source.root()?;

    let mut edits = Vec::new();
    source.diff_mapping(root, old, new, layout, &mut edits,)?;
    let spliced = source.apply(edits,)?;

    let reparsed: Value = serde_yaml::from_str(&spliced,).ok()?;
    (reparsed == *after).then_some(spliced,)
}

/// Half-open range of line indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
struct Region
{
    start: usize,
    end:   usize,
}

/// Replacement of the lines `start..end` by `text` (complete lines). An
/// insertion has `start == end`.
#[derive(Debug, Clone, PartialEq, Eq,)]
struct Edit
{
    start: usize,
    end:   usize,
    text:  String,
}

/// Key line split into its parts.
#[derive(Debug, Clone, Copy,)]
struct Entry<'t,>
{
    /// Key text including indentation, up to and excluding the colon.
    key:     &'t str,
    /// Whitespace between the colon and the inline value.
    gap:     &'t str,
    /// Inline value with surrounding whitespace removed.
    inline:  &'t str,
    /// Trailing comment including its leading whitespace, or empty.
    comment: &'t str,
}

#[derive(Debug,)]
struct Source<'t,>
{
    lines:            Vec<&'t str,>,
    trailing_newline: bool,
}

impl<'t,> Source<'t,>
{
    fn parse(text: &'t str,) -> Option<Self,>
    {
        if text.contains('\r',) || text.contains('\t',) {
            return None;
        }

        let trailing_newline = text.ends_with('\n',);
        let body = text.strip_suffix('\n',).unwrap_or(text,);
        Some(Self {
            lines: body.split('\n',).collect(),
            trailing_newline,
        },)
    }

    /// Lines of the root mapping, after an optional `---` marker.
    fn root(&self,) -> Option<Region,>
    {
        let mut start = 0;
        if let Some(first,) = self.lines.iter().position(|line| !is_blank_or_comment(line,),) {
            let line = self.lines[first].trim_end();
            if line.starts_with('%',) || line.starts_with("--- ",) {
                return None;
            }
            if line == "---" {
                start = first + 1;
            }
        }

        let stream_marker = self.lines[start..].iter().any(|line| matches!(line.trim_end(), "---" | "..."),);
        if stream_marker {
            return None;
        }

        Some(Region {
            start,
            end: self.lines.len(),
        },)
    }

    fn first_content(&self, region: Region,) -> Option<usize,>
    {
        (region.start..region.end).find(|&index| !is_blank_or_comment(self.lines[index],),)
    }

    /// Index after the last non-comment line of `region`, or its start.
    fn content_end(&self, region: Region,) -> usize
    {
        (region.start..region.end)
            .rev()
            .find(|&index| !is_blank_or_comment(self.lines[index],),)
            .map_or(region.start, |index| index + 1,)
    }

    fn mapping_column(&self, region: Region,) -> Option<usize,>
    {
        let line = self.lines[self.first_content(region,)?];
        let column = indent_of(line,);
        (!is_sequence_item(&line[column..],)).then_some(column,)
    }

    fn sequence_column(&self, region: Region,) -> Option<usize,>
    {
        let line = self.lines[self.first_content(region,)?];
        let column = indent_of(line,);
        is_sequence_item(&line[column..],).then_some(column,)
    }

    fn find_key(&self, region: Region, column: usize, key: &Value,) -> Option<usize,>
    {
        (region.start..region.end).find(|&index| {
            let line = self.lines[index];
            if is_blank_or_comment(line,) || indent_of(line,) != column {
                return false;
            }
            split_key(&line[column..],)
                .and_then(|(text, _,)| serde_yaml::from_str::<Value,>(text,).ok(),)
                .is_some_and(|parsed| parsed == *key,)
        },)
    }

    /// Index after the last line belonging to the value of the key on `line`.
    fn value_end(&self, line: usize, column: usize, limit: usize,) -> usize
    {
        let mut end = line + 1;
        for index in line + 1..limit {
            let text = self.lines[index];
            if is_blank_or_comment(text,) {
                continue;
            }
            let indent = indent_of(text,);
            if indent > column || (indent == column && is_sequence_item(&text[indent..],)) {
                end = index + 1;
            } else {
                break;
            }
        }
        end
    }

    fn entry(&self, line: usize, column: usize,) -> Option<Entry<'t,>,>
    {
        let text = self.lines[line];
        let (key, rest,) = split_key(&text[column..],)?;
        let key = &text[..column + key.len()];
        let value = rest.trim_start();
        let gap = &rest[..rest.len() - value.len()];
        let (inline, comment,) = split_comment(value,);
        let comment = if inline.is_empty() { rest.trim_end() } else { comment };
        Some(Entry {
            key,
            gap,
            inline,
            comment,
        },)
    }

    fn diff_mapping(
        &self,
        region: Region,
        old: &Mapping,
        new: &Mapping,
        layout: &YamlLayout,
        edits: &mut Vec<Edit,>,
    ) -> Option<(),>
    {
        let column = self.mapping_column(region,)?;
        let mut additions = Mapping::new();

        for (key, value,) in new {
            match old.get(key,) {
                Some(previous,) if previous == value => {}
                Some(previous,) => {
                    let line = self.find_key(region, column, key,)?;
                    self.diff_value(line, column, region.end, previous, value, layout, edits,)?;
                }
                None => {
                    additions.insert(key.clone(), value.clone(),);
                }
            }
        }

        if !additions.is_empty() {
            let at = self.content_end(region,);
            let text = layout.render_entries(&additions, column,).ok()?;
            edits.push(Edit {
                start: at,
                end: at,
                text,
            },);
        }

        Some((),)
    }

    #[allow(clippy::too_many_arguments)]
    fn diff_value(
        &self,
        line: usize,
        column: usize,
        limit: usize,
        previous: &Value,
        value: &Value,
        layout: &YamlLayout,
        edits: &mut Vec<Edit,>,
    ) -> Option<(),>
    {
        let end = self.value_end(line, column, limit,);
        let entry = self.entry(line, column,)?;
        let children = Region {
            start: line + 1,
            end,
        };

        match (previous, value,) {
            (Value::Mapping(old,), Value::Mapping(new,),) if !old.is_empty() && entry.inline.is_empty() => {
                self.diff_mapping(children, old, new, layout, edits,)
            }
            (Value::Sequence(old,), Value::Sequence(new,),)
                if !old.is_empty() && entry.inline.is_empty() && new.starts_with(old,) =>
            {
                let dash_column = self.sequence_column(children,)?;
                let at = self.content_end(children,);
                let text = layout.render_items(&new[old.len()..], dash_column,).ok()?;
                edits.push(Edit {
                    start: at,
                    end: at,
                    text,
                },);
                Some((),)
            }
            _ => {
                let text = replace_value(&entry, value, column, end == line + 1, layout,)?;
                edits.push(Edit {
                    start: line,
                    end,
                    text,
                },);
                Some((),)
            }
        }
    }

    fn apply(&self, mut edits: Vec<Edit,>,) -> Option<String,>
    {
        edits.sort_by_key(|edit| edit.start,);

        let mut out = String::new();
        let mut cursor = 0;
        for edit in edits {
            if edit.start < cursor {
                return None;
            }
            for line in &self.lines[cursor..edit.start] {
                out.push_str(line,);
                out.push('\n',);
            }
            out.push_str(&edit.text,);
            cursor = edit.end;
        }
        for line in &self.lines[cursor..] {
            out.push_str(line,);
            out.push('\n',);
        }

        if !self.trailing_newline {
            out.pop();
        }
        Some(out,)
    }
}

/// Renders the new key line (and child lines) for a replaced value.
fn replace_value(
    entry: &Entry<'_,>,
    value: &Value,
    column: usize,
    single_line: bool,
    layout: &YamlLayout,
) -> Option<String,>
{
    if single_line && !is_block(value,) {
        if let Some(scalar,) = styled_scalar(value, entry.inline, column,) {
            let gap = if entry.gap.is_empty() { " " } else { entry.gap };
            return Some(format!("{}:{gap}{scalar}{}\n", entry.key, entry.comment),);
        }
    }

    let child = layout.render_child(value, column,).ok()?;
    if child.starts_with('\n',) {
        Some(format!("{}:{}{child}", entry.key, entry.comment),)
    } else {
        Some(format!("{}:{child}", entry.key),)
    }
}

/// Single-line rendering of a scalar in the quote style of `previous`.
fn styled_scalar(value: &Value, previous: &str, column: usize,) -> Option<String,>
{
    if let Value::String(text,) = value {
        if previous.starts_with('\'',) && !text.contains('\n',) {
            return Some(format!("'{}'", text.replace('\'', "''",)),);
        }
        if previous.starts_with('"',) {
            return serde_json::to_string(text,).ok();
        }
    }

    let rendered = scalar_text(value, column,).ok()?;
    (!rendered.contains('\n',)).then_some(rendered,)
}

fn indent_of(line: &str,) -> usize
{
    line.len() - line.trim_start_matches(' ',).len()
}

fn is_blank_or_comment(line: &str,) -> bool
{
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#',)
}

fn is_sequence_item(content: &str,) -> bool
{
    content == "-" || content.starts_with("- ",)
}

/// Splits `key: rest` at the mapping colon. Quoted keys may contain colons.
fn split_key(content: &str,) -> Option<(&str, &str,),>
{
    if is_sequence_item(content,) || content.starts_with(['?', '#', '[', '{', '&', '*', '!', '|', '>',],) {
        return None;
    }

    let colon = match *content.as_bytes().first()? {
        b'\'' | b'"' => {
            let close = closing_quote(content,)?;
            let after = &content[close + 1..];
            close + 1 + after.len() - after.trim_start_matches(' ',).len()
        }
        _ => content
            .char_indices()
            .find(|&(index, ch,)| {
                ch == ':' && matches!(content[index + 1..].chars().next(), None | Some(' ',))
            },)
            .map(|(index, _,)| index,)?,
    };

    if !content[colon..].starts_with(':',) {
        return None;
    }
    let rest = &content[colon + 1..];
    if !(rest.is_empty() || rest.starts_with(' ',)) {
        return None;
    }
    Some((content[..colon].trim_end(), rest,),)
}

/// Byte index of the quote closing the quoted scalar that opens `content`.
fn closing_quote(content: &str,) -> Option<usize,>
{
    let mut chars = content.char_indices();
    let (_, quote,) = chars.next()?;

    while let Some((index, ch,),) = chars.next() {
        match (quote, ch,) {
            ('"', '\\',) => {
                chars.next();
            }
            ('\'', '\'',) if content[index + 1..].starts_with('\'',) => {
                chars.next();
            }
            (quote, ch,) if quote == ch => return Some(index,),
            _ => {}
        }
    }
    None
}

/// Splits an inline value from its trailing comment.
fn split_comment(value: &str,) -> (&str, &str,)
{
    let search_from = if value.starts_with(['\'', '"',],) {
        match closing_quote(value,) {
            Some(close,) => close + 1,
            None => return (value.trim_end(), "",),
        }
    } else {
        0
    };

    let comment = value[search_from..]
        .find(" #",)
        .map(|offset| search_from + offset,)
        .or_else(|| value.starts_with('#',).then_some(0,),);

    match comment {
        Some(index,) => {
            let inline = value[..index].trim_end();
            (inline, &value[inline.len()..],)
        }
        None => (value.trim_end(), "",),
    }
}
