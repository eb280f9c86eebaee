//! Associating acquired data files with the angles they were taken at.
//!
//! The spectrometer software names its output
//! `<prefix>_<sequence>.txt`, where the sequence number increases with
//! every acquisition and the prefix carries the file's role (`reference`
//! or `sample`). Downstream analysis needs the angle instead, so after a
//! scan each file's sequence token is replaced with the `<x>,<y>` angle
//! pair from the executed plan, pairing files with plan entries in
//! sequence order.
//!
//! That pairing is only valid when sequence order equals execution order;
//! the matcher validates everything it can (counts per role, parseable and
//! unique sequence numbers) before it renames anything, and refuses the
//! whole directory on a mismatch. A silent misalignment would corrupt every
//! later analysis step, so guessing is never an option.

use crate::error::{ArspecError, Result};
use crate::scan::ScanPlan;
use log::info;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// The identifying role of a data file within a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Mirror/reference spectrum.
    Reference,
    /// Sample spectrum.
    Sample,
}

impl Role {
    /// Classifies a filename. Anything without a `reference` marker is
    /// treated as a sample; the acquisition software offers no stronger
    /// sample identifier.
    pub fn of_filename(name: &str) -> Role {
        if name.contains("reference") {
            Role::Reference
        } else {
            Role::Sample
        }
    }

    /// Lowercase label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Reference => "reference",
            Role::Sample => "sample",
        }
    }
}

/// A discovered, not-yet-tagged data file.
#[derive(Debug, Clone)]
pub struct ScanFileRecord {
    /// Full path of the file.
    pub path: PathBuf,
    /// Role parsed from the filename.
    pub role: Role,
    /// Acquisition sequence number parsed from the filename.
    pub sequence: u64,
}

/// Summary of a tagging run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TagReport {
    /// Files renamed across all roles.
    pub renamed: usize,
}

/// How the final underscore token of a filename stem parses.
enum Tail {
    Sequence(u64),
    AngleTag,
}

// The patterns are fixed; construction cannot fail.
#[allow(clippy::unwrap_used)]
fn sequence_pattern() -> Regex {
    Regex::new(r"^\d+$").unwrap()
}

#[allow(clippy::unwrap_used)]
fn angle_tag_pattern() -> Regex {
    Regex::new(r"^-?\d+(\.\d+)?,-?\d+(\.\d+)?$").unwrap()
}

fn classify_tail(token: &str, sequence: &Regex, tag: &Regex) -> Option<Tail> {
    if tag.is_match(token) {
        return Some(Tail::AngleTag);
    }
    if sequence.is_match(token) {
        return token.parse().ok().map(Tail::Sequence);
    }
    None
}

/// Lists a role's untagged data files, sorted by acquisition sequence.
///
/// Only `.txt` files are considered. Files already carrying a two-angle tag
/// are skipped (tagging is idempotent); a file whose trailing token is
/// neither a sequence number nor a tag makes the whole listing fail, since
/// its position in the acquisition order cannot be known.
pub fn list_role_files(dir: &Path, role: Role) -> Result<Vec<ScanFileRecord>> {
    let sequence = sequence_pattern();
    let tag = angle_tag_pattern();
    let mut records = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stem) = name.strip_suffix(".txt") else {
            continue;
        };
        if Role::of_filename(&name) != role {
            continue;
        }

        let Some((_, token)) = stem.rsplit_once('_') else {
            return Err(ArspecError::ProvenanceMismatch {
                role: role.label().to_string(),
                detail: format!("'{name}' has no sequence token"),
            });
        };
        match classify_tail(token, &sequence, &tag) {
            Some(Tail::AngleTag) => continue,
            Some(Tail::Sequence(sequence)) => records.push(ScanFileRecord {
                path: entry.path(),
                role,
                sequence,
            }),
            None => {
                return Err(ArspecError::ProvenanceMismatch {
                    role: role.label().to_string(),
                    detail: format!("cannot parse acquisition sequence from '{name}'"),
                });
            }
        }
    }

    records.sort_by_key(|record| record.sequence);
    for pair in records.windows(2) {
        if pair[0].sequence == pair[1].sequence {
            return Err(ArspecError::ProvenanceMismatch {
                role: role.label().to_string(),
                detail: format!(
                    "duplicate sequence number {} ({} and {})",
                    pair[0].sequence,
                    pair[0].path.display(),
                    pair[1].path.display()
                ),
            });
        }
    }
    Ok(records)
}

/// Renames every untagged data file in `dir` to embed its plan angles.
///
/// Files are paired with plan entries index-for-index in sequence order,
/// separately per role. All validation happens before the first rename: a
/// count mismatch against the plan, an unparseable sequence, or a name
/// collision aborts with nothing renamed. Roles with no untagged files are
/// skipped, so a second run over the same directory is a no-op.
pub fn tag_directory(dir: &Path, plan: &ScanPlan) -> Result<TagReport> {
    let mut renames: Vec<(PathBuf, PathBuf)> = Vec::new();

    for role in [Role::Reference, Role::Sample] {
        let files = list_role_files(dir, role)?;
        if files.is_empty() {
            continue;
        }
        if files.len() != plan.len() {
            return Err(ArspecError::ProvenanceMismatch {
                role: role.label().to_string(),
                detail: format!(
                    "{} untagged file(s) vs {} plan entries",
                    files.len(),
                    plan.len()
                ),
            });
        }
        for (record, &(x, y)) in files.iter().zip(plan.entries()) {
            let target = tagged_path(&record.path, x, y).ok_or_else(|| {
                ArspecError::ProvenanceMismatch {
                    role: role.label().to_string(),
                    detail: format!("cannot derive tagged name for {}", record.path.display()),
                }
            })?;
            if target.exists() {
                return Err(ArspecError::ProvenanceMismatch {
                    role: role.label().to_string(),
                    detail: format!("tag target {} already exists", target.display()),
                });
            }
            renames.push((record.path.clone(), target));
        }
    }

    let mut report = TagReport::default();
    for (from, to) in &renames {
        fs::rename(from, to)?;
        info!("Tagged {} -> {}", from.display(), to.display());
        report.renamed += 1;
    }
    Ok(report)
}

/// Replaces the trailing sequence token with the angle tag.
fn tagged_path(path: &Path, x: f64, y: f64) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy();
    let stem = name.strip_suffix(".txt")?;
    let (prefix, _) = stem.rsplit_once('_')?;
    Some(path.with_file_name(format!("{prefix}_{x},{y}.txt")))
}
