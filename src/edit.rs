// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Outcome record shared by the file patchers.
//!
//! Each patcher compares its output against the fetched content and reports
//! whether a commit is needed. The update driver consumes the record and only
//! writes to the repository host when [`FileEdit::changed`] is `true`.

use serde::Serialize;

/// Result of applying one patcher to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct FileEdit
{
    /// Repository-relative path of the edited file.
    pub path:           String,
    /// Whether the new content differs from the fetched content.
    pub changed:        bool,
    /// Content to commit. Equals the fetched content when unchanged.
    pub new_content:    String,
    /// Commit message naming the changed identifiers.
    pub commit_message: String,
}

impl FileEdit
{
    /// Builds a record for content that needs to be committed.
    pub fn changed(
        path: impl Into<String,>,
        new_content: String,
        commit_message: String,
    ) -> Self
    {
        Self {
            path: path.into(),
            changed: true,
            new_content,
            commit_message,
        }
    }

    /// Builds a no-op record that keeps the fetched content.
    pub fn unchanged(path: impl Into<String,>, content: &str,) -> Self
    {
        Self {
            path:           path.into(),
            changed:        false,
            new_content:    content.to_owned(),
            commit_message: String::new(),
        }
    }
}
