// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Structural deep merge of nested YAML documents.
//!
//! An overlay document is folded into a base document key by key. Nested
//! mappings are merged recursively, sequences are extended with elements they
//! do not contain yet, and scalars are replaced. Overlapping keys whose values
//! have different kinds are rejected with [`Error::TypeConflict`].
//!
//! A base value that is *empty or zero* (null, `false`, `0`, `0.0`, `""`,
//! `[]`, `{}`) counts as absent and is overwritten by the overlay regardless
//! of kinds. This is intentional: descriptors routinely carry placeholder
//! values that updates are expected to fill in.

use serde_yaml::{Mapping, Value};

use crate::error::Error;

const ROOT_KEY: &str = "<root>";

/// Kind of a YAML value as seen by the merge type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub enum ValueKind
{
    /// `~` or an absent value.
    Null,
    /// `true` / `false`.
    Bool,
    /// Integral number.
    Integer,
    /// Floating point number.
    Float,
    /// Text scalar.
    String,
    /// Ordered sequence.
    Sequence,
    /// Nested mapping.
    Mapping,
    /// Value carrying an explicit tag such as `!Ref`.
    Tagged,
}

impl ValueKind
{
    /// Classifies the provided value.
    pub fn of(value: &Value,) -> Self
    {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_,) => Self::Bool,
            Value::Number(number,) if number.is_f64() => Self::Float,
            Value::Number(_,) => Self::Integer,
            Value::String(_,) => Self::String,
            Value::Sequence(_,) => Self::Sequence,
            Value::Mapping(_,) => Self::Mapping,
            Value::Tagged(_,) => Self::Tagged,
        }
    }

    /// Human readable name used in conflict messages.
    pub const fn name(self,) -> &'static str
    {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
            Self::Tagged => "tagged",
        }
    }
}

/// Returns `true` when the value counts as absent for merging purposes.
///
/// | kind     | empty when        |
/// |----------|-------------------|
/// | null     | always            |
/// | bool     | `false`           |
/// | integer  | `0`               |
/// | float    | `0.0`             |
/// | string   | `""`              |
/// | sequence | no elements       |
/// | mapping  | no entries        |
/// | tagged   | inner value empty |
pub fn is_empty_or_zero(value: &Value,) -> bool
{
    match value {
        Value::Null => true,
        Value::Bool(flag,) => !flag,
        Value::Number(number,) => {
            if let Some(integer,) = number.as_i64() {
                integer == 0
            } else if let Some(unsigned,) = number.as_u64() {
                unsigned == 0
            } else {
                number.as_f64().is_some_and(|float| float == 0.0,)
            }
        }
        Value::String(text,) => text.is_empty(),
        Value::Sequence(items,) => items.is_empty(),
        Value::Mapping(entries,) => entries.is_empty(),
        Value::Tagged(tagged,) => is_empty_or_zero(&tagged.value,),
    }
}

/// Merges `overlay` into a copy of `base`.
///
/// When `add_new_keys` is `false`, overlay keys missing from `base` are
/// dropped at every nesting level before merging.
///
/// # Errors
///
/// Returns [`Error::TypeConflict`] when an overlapping key holds values of
/// different kinds, or when either root is not a mapping.
///
/// # Examples
///
/// ```
/// use socless_repo_updater::merge;
///
/// let base: serde_yaml::Value = serde_yaml::from_str("tags: [x, y]",)?;
/// let overlay: serde_yaml::Value = serde_yaml::from_str("tags: [y, z]",)?;
/// let merged = merge(&base, &overlay, true,)?;
/// let expected: serde_yaml::Value = serde_yaml::from_str("tags: [x, y, z]",)?;
/// assert_eq!(merged, expected);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn merge(base: &Value, overlay: &Value, add_new_keys: bool,) -> Result<Value, Error,>
{
    let base_map = root_mapping(base, overlay,)?;
    let overlay_map = root_mapping(overlay, base,)?;

    let merged = merge_mappings(base_map.clone(), overlay_map, add_new_keys, "",)?;
    Ok(Value::Mapping(merged,),)
}

/// Folds [`merge`] over a sequence of overlays, left to right.
///
/// # Errors
///
/// Propagates the first [`Error::TypeConflict`] encountered.
pub fn merge_all<'a, I,>(base: &Value, overlays: I, add_new_keys: bool,) -> Result<Value, Error,>
where
    I: IntoIterator<Item = &'a Value,>,
{
    overlays
        .into_iter()
        .try_fold(base.clone(), |current, overlay| merge(&current, overlay, add_new_keys,),)
}

fn root_mapping<'v,>(value: &'v Value, other: &Value,) -> Result<&'v Mapping, Error,>
{
    match value {
        Value::Mapping(map,) => Ok(map,),
        _ => Err(Error::TypeConflict {
            key:      ROOT_KEY.to_owned(),
            existing: ValueKind::of(value,).name(),
            incoming: ValueKind::of(other,).name(),
        },),
    }
}

fn merge_mappings(
    mut base: Mapping,
    overlay: &Mapping,
    add_new_keys: bool,
    path: &str,
) -> Result<Mapping, Error,>
{
    for (key, incoming) in overlay {
        if !add_new_keys && !base.contains_key(key,) {
            continue;
        }

        let key_path = join_path(path, key,);
        let existing = base.get_mut(key,);

        match existing {
            Some(current,) if !is_empty_or_zero(current,) => {
                merge_value(current, incoming, add_new_keys, &key_path,)?;
            }
            Some(current,) => {
                *current = incoming.clone();
            }
            None => {
                base.insert(key.clone(), incoming.clone(),);
            }
        }
    }

    Ok(base,)
}

fn merge_value(
    current: &mut Value,
    incoming: &Value,
    add_new_keys: bool,
    path: &str,
) -> Result<(), Error,>
{
    let existing_kind = ValueKind::of(current,);
    let incoming_kind = ValueKind::of(incoming,);
    if existing_kind != incoming_kind || !same_tag(current, incoming,) {
        return Err(Error::TypeConflict {
            key:      path.to_owned(),
            existing: existing_kind.name(),
            incoming: incoming_kind.name(),
        },);
    }

    match (current, incoming,) {
        (Value::Mapping(target,), Value::Mapping(source,),) => {
            let merged = merge_mappings(std::mem::take(target,), source, add_new_keys, path,)?;
            *target = merged;
        }
        (Value::Sequence(target,), Value::Sequence(source,),) => {
            for element in source {
                if !target.contains(element,) {
                    target.push(element.clone(),);
                }
            }
        }
        (target, source,) => {
            *target = source.clone();
        }
    }

    Ok((),)
}

fn same_tag(left: &Value, right: &Value,) -> bool
{
    match (left, right,) {
        (Value::Tagged(left,), Value::Tagged(right,),) => left.tag == right.tag,
        _ => true,
    }
}

pub(crate) fn join_path(prefix: &str, key: &Value,) -> String
{
    let segment = match key {
        Value::String(text,) => text.clone(),
        Value::Number(number,) => number.to_string(),
        Value::Bool(flag,) => flag.to_string(),
        other => format!("{other:?}"),
    };

    if prefix.is_empty() { segment } else { format!("{prefix}.{segment}") }
}
