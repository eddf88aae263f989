//! Statement filename construction and collision-free path resolution.
//!
//! Statements are named `<Street> (<Number>) - Property Tax (<Year>).pdf`.
//! When that name is taken, a lowercase suffix is appended to the stem:
//! `a` through `z`, then `aa` through `zz`. Existing files are never
//! overwritten; if every suffix is taken resolution fails instead.

use chrono::{Datelike, Local, NaiveDate};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest suffix tried before giving up (`zz`).
pub const MAX_SUFFIX_LEN: u32 = 2;

const DOCUMENT_EXTENSION: &str = "pdf";

#[derive(Error, Debug)]
pub enum OutputPathError {
    #[error("No free filename left for '{stem}' in {dir}: all suffixes up to '{last}' are taken")]
    Exhausted {
        dir: PathBuf,
        stem: String,
        last: String,
    },
}

/// Tax year a statement downloaded on `date` belongs to.
pub fn tax_year_for(date: NaiveDate) -> i32 {
    date.year() - 1
}

/// Tax year for statements downloaded today (local time).
pub fn current_tax_year() -> i32 {
    tax_year_for(Local::now().date_naive())
}

/// Title-case a string: the first letter of every run of letters is upper-cased,
/// the rest lower-cased. Non-letters pass through and start a new run.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_is_letter = false;

    for c in input.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }

    out
}

/// Filename stem (no suffix, no extension) for a statement.
pub fn document_stem(street_name: &str, street_number: &str, tax_year: i32) -> String {
    title_case(&format!(
        "{} ({}) - Property Tax ({})",
        street_name, street_number, tax_year
    ))
}

/// The `n`th collision suffix, 1-based: 1 → `a`, 26 → `z`, 27 → `aa`, 702 → `zz`.
///
/// Returns `None` once `n` needs more than [`MAX_SUFFIX_LEN`] letters.
pub fn collision_suffix(n: u32) -> Option<String> {
    if n == 0 {
        return None;
    }

    let mut letters = Vec::new();
    let mut rest = n;
    while rest > 0 {
        rest -= 1;
        letters.push((b'a' + (rest % 26) as u8) as char);
        rest /= 26;
    }

    if letters.len() as u32 > MAX_SUFFIX_LEN {
        return None;
    }

    Some(letters.iter().rev().collect())
}

/// Resolve a destination path in `dir` that does not exist yet.
///
/// Calling this twice without creating the returned file yields the same path.
pub fn resolve_document_path(
    dir: &Path,
    street_name: &str,
    street_number: &str,
    tax_year: i32,
) -> Result<PathBuf, OutputPathError> {
    let stem = document_stem(street_name, street_number, tax_year);

    let base = dir.join(format!("{}.{}", stem, DOCUMENT_EXTENSION));
    if !base.exists() {
        return Ok(base);
    }

    let mut n = 1;
    while let Some(suffix) = collision_suffix(n) {
        let candidate = dir.join(format!("{}{}.{}", stem, suffix, DOCUMENT_EXTENSION));
        if !candidate.exists() {
            return Ok(candidate);
        }
        n += 1;
    }

    Err(OutputPathError::Exhausted {
        dir: dir.to_path_buf(),
        stem,
        last: collision_suffix(n - 1).unwrap_or_default(),
    })
}
