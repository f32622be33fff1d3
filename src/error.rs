#![allow(non_shorthand_field_patterns)]
#![doc = "Error handling primitives shared across the updater crate."]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! The derive emitted by [`masterror::Error`] expands pattern matches that
//! trigger the `non_shorthand_field_patterns` lint. The lint is disabled for
//! the module to keep the generated implementations warning-free.

use std::path::{Path, PathBuf};

/// Unified error type returned by the patchers, the update driver and the
/// CLI.
///
/// The first five variants are the domain failures of a repository update.
/// Per-repository failures are captured by the batch orchestrator and never
/// abort the batch; pre-batch failures (plan validation, release resolution)
/// do.
#[derive(Debug, masterror::Error)]
pub enum Error {
    /// Structural merge found an overlapping key whose values have different
    /// kinds.
    #[error(
        "overlapping key '{key}' has different types: original is {existing}, new value is {incoming}"
    )]
    TypeConflict {
        /// Dotted path of the conflicting key.
        key:      String,
        /// Kind of the value already present in the document.
        existing: &'static str,
        /// Kind of the value supplied by the update.
        incoming: &'static str
    },
    /// A target path resolved to a directory instead of a file.
    #[error("path {path} on branch {branch} points to a directory")]
    NotAFile {
        /// Repository-relative path that was requested.
        path:   String,
        /// Branch the lookup was performed against.
        branch: String
    },
    /// The fetched file carries no content.
    #[error("file {path} on branch {branch} has no content")]
    MissingFileContent {
        /// Repository-relative path that was requested.
        path:   String,
        /// Branch the lookup was performed against.
        branch: String
    },
    /// The requested release tag does not exist upstream.
    #[error("release {tag} not found for {repository}")]
    ReleaseNotFound {
        /// Release tag that was requested.
        tag:        String,
        /// Repository the release was looked up in.
        repository: String
    },
    /// A pinned-package bump was requested without a version.
    #[error(
        "no version specified for {package} (use 'latest' for the most recent release)"
    )]
    NoVersionSpecified {
        /// Package whose version is missing.
        package: String
    },
    /// Wraps I/O errors that occur while reading the update plan.
    #[error("failed to read update plan from {path:?}: {source}")]
    Io {
        /// Location of the plan file.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error
    },
    /// Wraps YAML decoding and encoding errors.
    #[error("failed to process YAML: {source}")]
    Parse {
        /// Source error from serde_yaml.
        source: serde_yaml::Error
    },
    /// Wraps JSON decoding and encoding errors.
    #[error("failed to process JSON: {source}")]
    Json {
        /// Source error from serde_json.
        source: serde_json::Error
    },
    /// Remote content could not be decoded into UTF-8 text.
    #[error("failed to decode {path}: {message}")]
    Decode {
        /// Path of the file being decoded.
        path:    String,
        /// Human readable description of the decoding failure.
        message: String
    },
    /// Returned when a document or the plan violates invariants.
    #[error("invalid input: {message}")]
    Validation {
        /// Human readable message describing the validation problem.
        message: String
    },
    /// Service errors when interacting with the repository host.
    #[error("service error: {message}")]
    Service {
        /// Human readable message describing the service error.
        message: String
    }
}

impl Error {
    /// Constructs a validation error from the provided displayable value.
    pub fn validation<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Validation {
            message: message.into()
        }
    }

    /// Constructs a service error from the provided displayable value.
    pub fn service<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Service {
            message: message.into()
        }
    }

    /// Formats the error for diagnostics without the variant name.
    ///
    /// Intended for CLI contexts and batch summaries. The returned string
    /// matches the [`std::fmt::Display`] implementation.
    pub fn to_display_string(&self) -> String {
        format!("{self}")
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Parse {
            source
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Json {
            source
        }
    }
}

impl From<masterror::AppError> for Error {
    fn from(error: masterror::AppError) -> Self {
        Self::Service {
            message: error.to_string()
        }
    }
}

/// Creates an [`Error::Io`] variant capturing the failing path and source.
///
/// # Parameters
///
/// * `path` - Location of the plan file that triggered the error.
/// * `source` - I/O error reported by the operating system.
pub fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source
    }
}
