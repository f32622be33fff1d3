// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Patcher for `serverless.yml` deployment descriptors.
//!
//! Updates are deep-merged into the parsed descriptor with
//! [`merge`](crate::merge::merge). The result is written back by splicing
//! only the changed values into the original text, so comments, quoting and
//! blank lines survive. New keys and items are rendered with the
//! [`YamlLayout`] owned by the patcher. Descriptors the splicer cannot edit
//! in place are rewritten whole with the same layout.

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::{
    edit::FileEdit,
    error::Error,
    merge::{join_path, merge},
    splice::splice,
};

/// Repository-relative location of the descriptor.
pub const SERVERLESS_YML_PATH: &str = "serverless.yml";

/// Indentation rules applied when a descriptor is written back.
///
/// The defaults indent nested mappings by two columns and place sequence
/// dashes two columns inside their parent with item content four columns in:
///
/// ```yaml
/// plugins:
///   - sls-apb
/// custom:
///   sls_apb:
///     logging: true
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize,)]
pub struct YamlLayout
{
    /// Columns added for each nested mapping level.
    pub mapping_indent:       usize,
    /// Columns between the parent and the content of a sequence item.
    pub sequence_indent:      usize,
    /// Columns between the parent and the dash of a sequence item.
    pub sequence_dash_offset: usize,
    /// Whether to start the document with `---`.
    pub explicit_start:       bool,
}

impl Default for YamlLayout
{
    fn default() -> Self
    {
        Self {
            mapping_indent: 2, sequence_indent: 4, sequence_dash_offset: 2, explicit_start: false,
        }
    }
}

impl YamlLayout
{
    /// Serializes `document` using this layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when a scalar cannot be serialized and
    /// [`Error::Validation`] for mapping keys that are not scalars.
    pub fn render(&self, document: &Value,) -> Result<String, Error,>
    {
        let mut out = String::new();
        if self.explicit_start {
            out.push_str("---\n",);
        }

        match document {
            Value::Mapping(map,) if !map.is_empty() => self.write_mapping(&mut out, map, 0, false,)?,
            Value::Sequence(items,) if !items.is_empty() => {
                self.write_sequence(&mut out, items, 0, false,)?
            }
            scalar => {
                out.push_str(&scalar_text(scalar, 0,)?,);
                out.push('\n',);
            }
        }

        Ok(out,)
    }

    /// Renders `map` as block entries whose keys sit at `column`.
    pub(crate) fn render_entries(&self, map: &Mapping, column: usize,) -> Result<String, Error,>
    {
        let mut out = String::new();
        self.write_mapping(&mut out, map, column, false,)?;
        Ok(out,)
    }

    /// Renders `items` as block sequence entries with dashes at `dash_column`.
    pub(crate) fn render_items(&self, items: &[Value], dash_column: usize,) -> Result<String, Error,>
    {
        let mut out = String::new();
        self.write_sequence(&mut out, items, dash_column, false,)?;
        Ok(out,)
    }

    /// Renders the text following `key:` for a key at `column`.
    pub(crate) fn render_child(&self, value: &Value, column: usize,) -> Result<String, Error,>
    {
        let mut out = String::new();
        self.write_child(&mut out, value, column,)?;
        Ok(out,)
    }

    fn dash_gap(&self,) -> usize
    {
        self.sequence_indent.saturating_sub(self.sequence_dash_offset,).max(2,)
    }

    fn write_mapping(
        &self,
        out: &mut String,
        map: &Mapping,
        column: usize,
        inline_first: bool,
    ) -> Result<(), Error,>
    {
        for (index, (key, value,),) in map.iter().enumerate() {
            if index > 0 || !inline_first {
                push_indent(out, column,);
            }
            out.push_str(&key_text(key,)?,);
            out.push(':',);
            self.write_child(out, value, column,)?;
        }
        Ok((),)
    }

    fn write_sequence(
        &self,
        out: &mut String,
        items: &[Value],
        dash_column: usize,
        inline_first: bool,
    ) -> Result<(), Error,>
    {
        let gap = self.dash_gap();
        let content_column = dash_column + gap;

        for (index, item,) in items.iter().enumerate() {
            if index > 0 || !inline_first {
                push_indent(out, dash_column,);
            }
            out.push('-',);

            match item {
                Value::Mapping(map,) if !map.is_empty() => {
                    push_indent(out, gap - 1,);
                    self.write_mapping(out, map, content_column, true,)?;
                }
                Value::Sequence(nested,) if !nested.is_empty() => {
                    push_indent(out, gap - 1,);
                    self.write_sequence(out, nested, content_column, true,)?;
                }
                Value::Tagged(tagged,) if is_block(&tagged.value,) => {
                    out.push(' ',);
                    out.push_str(&tagged.tag.to_string(),);
                    self.write_child(out, &tagged.value, content_column,)?;
                }
                scalar => {
                    // Block scalar indentation is measured from the dash.
                    push_indent(out, gap - 1,);
                    out.push_str(&scalar_text(scalar, dash_column,)?,);
                    out.push('\n',);
                }
            }
        }
        Ok((),)
    }

    /// Writes the node following a `key:` or `- !Tag` indicator owned by a
    /// node at `column`.
    fn write_child(&self, out: &mut String, value: &Value, column: usize,) -> Result<(), Error,>
    {
        match value {
            Value::Mapping(map,) if !map.is_empty() => {
                out.push('\n',);
                self.write_mapping(out, map, column + self.mapping_indent, false,)
            }
            Value::Sequence(items,) if !items.is_empty() => {
                out.push('\n',);
                self.write_sequence(out, items, column + self.sequence_dash_offset, false,)
            }
            Value::Tagged(tagged,) if is_block(&tagged.value,) => {
                out.push(' ',);
                out.push_str(&tagged.tag.to_string(),);
                self.write_child(out, &tagged.value, column,)
            }
            scalar => {
                out.push(' ',);
                out.push_str(&scalar_text(scalar, column,)?,);
                out.push('\n',);
                Ok((),)
            }
        }
    }
}

pub(crate) fn is_block(value: &Value,) -> bool
{
    match value {
        Value::Mapping(map,) => !map.is_empty(),
        Value::Sequence(items,) => !items.is_empty(),
        _ => false,
    }
}

fn push_indent(out: &mut String, width: usize,)
{
    out.extend(std::iter::repeat_n(' ', width,),);
}

/// Serializes a scalar (or empty collection) and re-indents continuation
/// lines of block scalars under `column`, the indentation of the enclosing
/// block collection.
pub(crate) fn scalar_text(value: &Value, column: usize,) -> Result<String, Error,>
{
    let rendered = serde_yaml::to_string(value,)?;
    let trimmed = rendered.strip_suffix('\n',).unwrap_or(&rendered,);
    // Keep-chomped block scalars are followed by a document end marker.
    let trimmed = trimmed.strip_suffix("\n...",).unwrap_or(trimmed,);

    let mut lines = trimmed.split('\n',);
    let mut text = lines.next().unwrap_or_default().to_owned();
    for line in lines {
        text.push('\n',);
        if !line.is_empty() {
            push_indent(&mut text, column,);
            text.push_str(line,);
        }
    }
    Ok(text,)
}

fn key_text(key: &Value,) -> Result<String, Error,>
{
    if matches!(key, Value::Mapping(_) | Value::Sequence(_) | Value::Tagged(_)) {
        return Err(Error::validation("descriptor mapping keys must be scalars",),);
    }

    let text = scalar_text(key, 0,)?;
    if text.contains('\n',) {
        return Err(Error::validation("descriptor mapping keys must fit on one line",),);
    }
    Ok(text,)
}

/// Compares two descriptors semantically.
///
/// # Errors
///
/// Returns [`Error::Parse`] when either text is not valid YAML.
pub fn descriptors_equal(first: &str, second: &str,) -> Result<bool, Error,>
{
    let first: Value = serde_yaml::from_str(first,)?;
    let second: Value = serde_yaml::from_str(second,)?;
    Ok(first == second,)
}

/// Collects dotted paths of leaves that differ between two documents.
pub fn changed_paths(before: &Value, after: &Value,) -> Vec<String,>
{
    let mut paths = Vec::new();
    collect_changed(before, after, "", &mut paths,);
    paths
}

fn collect_changed(before: &Value, after: &Value, prefix: &str, paths: &mut Vec<String,>,)
{
    match (before, after,) {
        (Value::Mapping(old,), Value::Mapping(new,),) => {
            for (key, value,) in new {
                let path = join_path(prefix, key,);
                match old.get(key,) {
                    Some(previous,) => collect_changed(previous, value, &path, paths,),
                    None => paths.push(path,),
                }
            }
        }
        _ if before != after => {
            let path = if prefix.is_empty() { "<root>".to_owned() } else { prefix.to_owned() };
            paths.push(path,);
        }
        _ => {}
    }
}

/// Merges descriptor updates and writes the result with its own layout.
#[derive(Debug, Clone, Default, Serialize,)]
pub struct DescriptorPatcher
{
    layout:   YamlLayout,
    add_keys: bool,
}

impl DescriptorPatcher
{
    /// Creates a patcher. `add_keys` controls whether update keys absent
    /// from the descriptor are introduced.
    pub fn new(layout: YamlLayout, add_keys: bool,) -> Self
    {
        Self {
            layout,
            add_keys,
        }
    }

    /// Layout used when writing descriptors.
    pub fn layout(&self,) -> &YamlLayout
    {
        &self.layout
    }

    /// Whether update keys absent from the descriptor are introduced.
    pub fn add_keys(&self,) -> bool
    {
        self.add_keys
    }

    /// Merges `updates` into the descriptor text and reports whether a commit
    /// is needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for invalid YAML, [`Error::TypeConflict`]
    /// when the update disagrees with the descriptor on a value kind, and
    /// [`Error::Validation`] when a whole-file rewrite would change values.
    pub fn edit(&self, text: &str, updates: &Value,) -> Result<FileEdit, Error,>
    {
        let original: Value = serde_yaml::from_str(text,)?;
        let merged = merge(&original, updates, self.add_keys,)?;

        if merged == original {
            return Ok(FileEdit::unchanged(SERVERLESS_YML_PATH, text,),);
        }

        let content = match splice(text, &original, &merged, &self.layout,) {
            Some(spliced,) => spliced,
            None => {
                warn!("Cannot edit {SERVERLESS_YML_PATH} in place, rewriting the whole file");
                self.render_checked(&merged,)?
            }
        };
        let keys = changed_paths(&original, &merged,);
        let message = format!("update {SERVERLESS_YML_PATH}: {}", keys.join(", "));
        Ok(FileEdit::changed(SERVERLESS_YML_PATH, content, message,),)
    }

    fn render_checked(&self, document: &Value,) -> Result<String, Error,>
    {
        let rendered = self.layout.render(document,)?;
        let reparsed: Value = serde_yaml::from_str(&rendered,)?;
        if reparsed != *document {
            return Err(Error::validation(format!(
                "rendered {SERVERLESS_YML_PATH} does not parse back to the merged document"
            ),),);
        }
        Ok(rendered,)
    }
}

#[cfg(test)]
mod tests
{
    use proptest::prelude::*;
    use serde_yaml::{
        Mapping, Value,
        value::{Tag, TaggedValue},
    };

    use super::{DescriptorPatcher, YamlLayout, changed_paths, descriptors_equal};

    const DESCRIPTOR: &str = "\
service: socless-example
plugins:
  - sls-apb
  - serverless-python-requirements
custom:
  sls_apb:
    logging: true
  tags:
    - team: security
      owner: soc
provider:
  name: aws
  role: !GetAtt LambdaRole.Arn
";

    fn yaml(text: &str,) -> Value
    {
        serde_yaml::from_str(text,).expect("valid yaml",)
    }

    #[test]
    fn default_layout_indents_sequences_inside_parent()
    {
        let rendered = YamlLayout::default().render(&yaml(DESCRIPTOR,),).expect("render failed",);
        assert_eq!(rendered, DESCRIPTOR);
    }

    #[test]
    fn rendered_output_parses_back_to_same_document()
    {
        let document = yaml("a:\n  - - 1\n    - 2\n  - {}\n  - []\nb: \"multi\\nline\"\nc: '123'\n",);
        let rendered = YamlLayout::default().render(&document,).expect("render failed",);
        assert_eq!(yaml(&rendered,), document);
    }

    #[test]
    fn indented_multiline_strings_in_sequences_round_trip()
    {
        let document = yaml("a:\n  - \"  lead\\nx\"\n  - - \"  deeper\\n  y\"\n  - k: \"  key\\nz\"\n",);
        let rendered = YamlLayout::default().render(&document,).expect("render failed",);
        assert_eq!(yaml(&rendered,), document, "{rendered}");

        let wide = YamlLayout {
            mapping_indent: 4, sequence_indent: 6, sequence_dash_offset: 0, explicit_start: false,
        };
        let rendered = wide.render(&document,).expect("render failed",);
        assert_eq!(yaml(&rendered,), document, "{rendered}");
    }

    #[test]
    fn trailing_newlines_survive_rendering()
    {
        let document = yaml("a: \"x\\n\\n\"\nb:\n  - \"\\n\"\nc: 1\n",);
        let rendered = YamlLayout::default().render(&document,).expect("render failed",);
        assert!(!rendered.contains("..."), "{rendered}");
        assert_eq!(yaml(&rendered,), document, "{rendered}");
    }

    #[test]
    fn explicit_start_and_compact_sequences()
    {
        let layout = YamlLayout {
            mapping_indent: 4, sequence_indent: 2, sequence_dash_offset: 0, explicit_start: true,
        };
        let rendered = layout.render(&yaml("a:\n  b: [x, y]",),).expect("render failed",);
        assert_eq!(rendered, "---\na:\n    b:\n    - x\n    - y\n");
    }

    #[test]
    fn existing_keys_are_updated_without_adding_new_ones()
    {
        let patcher = DescriptorPatcher::default();
        let edit = patcher
            .edit(DESCRIPTOR, &yaml("custom:\n  sls_apb:\n    logging: false\n    new_key: x",),)
            .expect("edit failed",);

        assert!(edit.changed);
        let patched = yaml(&edit.new_content,);
        assert_eq!(patched["custom"]["sls_apb"]["logging"], Value::Bool(false));
        assert!(patched["custom"]["sls_apb"].get("new_key").is_none());
        assert_eq!(edit.commit_message, "update serverless.yml: custom.sls_apb.logging");
    }

    #[test]
    fn new_keys_are_added_when_allowed()
    {
        let patcher = DescriptorPatcher::new(YamlLayout::default(), true,);
        let edit = patcher
            .edit(DESCRIPTOR, &yaml("custom:\n  sls_apb:\n    new_key: new_value",),)
            .expect("edit failed",);

        let patched = yaml(&edit.new_content,);
        assert_eq!(patched["custom"]["sls_apb"]["new_key"], Value::String("new_value".to_owned()));
        assert_eq!(patched["custom"]["sls_apb"]["logging"], Value::Bool(true));
    }

    #[test]
    fn commented_descriptor_keeps_comments_after_change()
    {
        let text = "\
# deployment
service: alerts # inline
provider:
  runtime: 'python3.7'
custom:
  sls_apb:
    logging: true
";
        let edit = DescriptorPatcher::default()
            .edit(text, &yaml("custom:\n  sls_apb:\n    logging: false",),)
            .expect("edit failed",);

        assert!(edit.changed);
        assert_eq!(edit.new_content, text.replace("logging: true", "logging: false"));
        assert!(edit.new_content.contains("# deployment"));
        assert!(edit.new_content.contains("service: alerts # inline"));
        assert!(edit.new_content.contains("runtime: 'python3.7'"));
    }

    #[test]
    fn appended_plugin_keeps_surrounding_comments()
    {
        let text = "service: alerts\n\nplugins: # build\n  - sls-apb # first\n\n# provider settings\nprovider:\n  name: aws\n";
        let edit = DescriptorPatcher::default()
            .edit(text, &yaml("plugins:\n  - socless-plugin",),)
            .expect("edit failed",);

        assert_eq!(
            edit.new_content,
            "service: alerts\n\nplugins: # build\n  - sls-apb # first\n  - socless-plugin\n\n# provider settings\nprovider:\n  name: aws\n"
        );
        assert_eq!(edit.commit_message, "update serverless.yml: plugins");
    }

    #[test]
    fn descriptors_with_aliases_are_rewritten_whole()
    {
        let text = "base: &memory 128\nother: *memory\n";
        let edit = DescriptorPatcher::default()
            .edit(text, &yaml("base: 256",),)
            .expect("edit failed",);

        assert!(edit.changed);
        assert_eq!(yaml(&edit.new_content,), yaml("base: 256\nother: 128"));
    }

    #[test]
    fn noop_update_keeps_original_text()
    {
        let patcher = DescriptorPatcher::default();
        let edit = patcher
            .edit(DESCRIPTOR, &yaml("plugins:\n  - sls-apb\nprovider:\n  name: aws",),)
            .expect("edit failed",);
        assert!(!edit.changed);
        assert_eq!(edit.new_content, DESCRIPTOR);
    }

    #[test]
    fn conflicting_update_is_rejected()
    {
        let patcher = DescriptorPatcher::default();
        let error = patcher
            .edit(DESCRIPTOR, &yaml("custom:\n  sls_apb: enabled",),)
            .expect_err("expected conflict",);
        assert!(matches!(error, crate::Error::TypeConflict { .. }));
    }

    #[test]
    fn semantic_equality_ignores_formatting()
    {
        assert!(descriptors_equal("a: [1, 2]", "a:\n  - 1\n  - 2\n").expect("valid yaml"));
        assert!(!descriptors_equal("a: 1", "a: 2").expect("valid yaml"));
    }

    #[test]
    fn changed_paths_lists_new_and_modified_leaves()
    {
        let paths = changed_paths(&yaml("a: 1\nb:\n  c: 2",), &yaml("a: 1\nb:\n  c: 3\n  d: 4",),);
        assert_eq!(paths, ["b.c", "b.d"]);
    }

    fn text() -> impl Strategy<Value = String,>
    {
        proptest::collection::vec(
            prop_oneof![
                Just(" "),
                Just("  "),
                Just("\n"),
                Just("ab"),
                Just("x1"),
                Just(":"),
                Just(": "),
                Just("#"),
                Just(" #"),
                Just("'"),
                Just("\""),
                Just("- "),
                Just("yes"),
                Just("0"),
                Just("\\"),
            ],
            0..6,
        )
        .prop_map(|parts| parts.concat())
    }

    fn scalar() -> impl Strategy<Value = Value,>
    {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|number| Value::Number(number.into())),
            text().prop_map(Value::String),
            text().prop_map(|inner| {
                Value::Tagged(Box::new(TaggedValue {
                    tag:   Tag::new("Ref"),
                    value: Value::String(inner),
                }))
            }),
        ]
    }

    fn mapping(entries: Vec<(String, Value,),>,) -> Value
    {
        let mut map = Mapping::new();
        for (key, value,) in entries {
            map.insert(Value::String(key,), value,);
        }
        Value::Mapping(map,)
    }

    fn node() -> impl Strategy<Value = Value,>
    {
        scalar().prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Sequence),
                proptest::collection::vec(("[a-z]{1,3}", inner), 0..4).prop_map(mapping),
            ]
        })
    }

    fn document() -> impl Strategy<Value = Value,>
    {
        proptest::collection::vec(("[a-z]{1,3}", node()), 1..5).prop_map(mapping)
    }

    fn layout() -> impl Strategy<Value = YamlLayout,>
    {
        (1usize..5, 0usize..3, 2usize..7, any::<bool>()).prop_map(
            |(mapping_indent, sequence_dash_offset, sequence_indent, explicit_start)| YamlLayout {
                mapping_indent,
                sequence_indent,
                sequence_dash_offset,
                explicit_start,
            },
        )
    }

    proptest! {
        #[test]
        fn rendered_documents_parse_back(document in document(), layout in layout()) {
            let rendered = layout.render(&document).expect("render failed");
            let reparsed: Value = serde_yaml::from_str(&rendered).expect("rendered YAML must parse");
            prop_assert_eq!(reparsed, document, "{}", rendered);
        }

        #[test]
        fn edits_parse_back_to_merged_document(
            base in document(),
            overlay in document(),
            add_keys in any::<bool>(),
        ) {
            let text = YamlLayout::default().render(&base).expect("render failed");
            let patcher = DescriptorPatcher::new(YamlLayout::default(), add_keys);
            if let (Ok(edit), Ok(merged)) = (patcher.edit(&text, &overlay), crate::merge::merge(&base, &overlay, add_keys)) {
                let reparsed: Value = serde_yaml::from_str(&edit.new_content).expect("edited YAML must parse");
                prop_assert_eq!(reparsed, merged, "{}", edit.new_content);
            }
        }
    }
}
