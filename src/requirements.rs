// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Patcher for the pinned `socless_python` line of `requirements.txt`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::{edit::FileEdit, error::Error};

/// Repository-relative location of the requirements file.
pub const REQUIREMENTS_PATH: &str = "functions/requirements.txt";
/// Upstream repository hosting the pinned package.
pub const SOCLESS_PYTHON_REPOSITORY: &str = "twilio-labs/socless_python";

const SOCLESS_PYTHON_PIP_PATTERN: &str = r"(.+socless_python\.git)(@[.\d]+#)(egg=socless)";

static PIP_LINE: LazyLock<Regex,> = LazyLock::new(|| {
    Regex::new(SOCLESS_PYTHON_PIP_PATTERN,).expect("pip pattern is a valid regex",)
},);

/// Rewrites the pinned `socless_python` requirement to `release`.
///
/// Only the `@<ref>#` segment changes; the URL prefix and the `egg=socless`
/// suffix are kept as found. Input may be raw UTF-8 bytes or text. When no
/// line matches, the text is returned unchanged.
///
/// # Errors
///
/// Returns [`Error::Decode`] when the input is not valid UTF-8.
///
/// # Examples
///
/// ```
/// use socless_repo_updater::patch_requirement;
///
/// let text = "git+https://github.com/twilio-labs/socless_python.git@1.0.0#egg=socless\n";
/// let patched = patch_requirement(text, "2.0.0",)?;
/// assert_eq!(
///     patched,
///     "git+https://github.com/twilio-labs/socless_python.git@2.0.0#egg=socless\n"
/// );
/// # Ok::<(), socless_repo_updater::Error>(())
/// ```
pub fn patch_requirement<T,>(requirements: T, release: &str,) -> Result<String, Error,>
where
    T: AsRef<[u8],>,
{
    let text = decode(requirements.as_ref(),)?;
    let patched = PIP_LINE.replace_all(text, |captures: &Captures<'_,>| {
        format!("{}@{release}#{}", &captures[1], &captures[3])
    },);
    Ok(patched.into_owned(),)
}

/// Compares two requirement files after decoding both to text.
///
/// Undecodable input never compares equal.
pub fn requirements_equal<A, B,>(first: A, second: B,) -> bool
where
    A: AsRef<[u8],>,
    B: AsRef<[u8],>,
{
    match (decode(first.as_ref(),), decode(second.as_ref(),),) {
        (Ok(first,), Ok(second,),) => first == second,
        _ => false,
    }
}

fn decode(bytes: &[u8],) -> Result<&str, Error,>
{
    std::str::from_utf8(bytes,).map_err(|error| Error::Decode {
        path:    REQUIREMENTS_PATH.to_owned(),
        message: error.to_string(),
    },)
}

/// Patches requirements text and reports whether a commit is needed.
///
/// # Errors
///
/// Returns [`Error::Decode`] when the input is not valid UTF-8.
pub fn edit_requirements<T,>(requirements: T, release: &str,) -> Result<FileEdit, Error,>
where
    T: AsRef<[u8],>,
{
    let original = decode(requirements.as_ref(),)?;
    let patched = patch_requirement(original, release,)?;

    if requirements_equal(original, &patched,) {
        return Ok(FileEdit::unchanged(REQUIREMENTS_PATH, original,),);
    }

    Ok(FileEdit::changed(REQUIREMENTS_PATH, patched, format!("update socless_python to {release}"),),)
}
