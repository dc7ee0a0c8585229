//! Plans and their application.
//!
//! A plan is an ordered list of renames plus an ordered list of deletes.
//! Renames always run first so reparented files are in place before their
//! old ancestors disappear. Destination names are distinct by
//! construction (each encodes a distinct `(mp, sid, type)`), so any
//! application order would be safe; the plan order makes rollback
//! deterministic.

use crate::error::{DeletedReport, RollbackReport, ServiceError};
use crate::ports::ProjectDir;
use crate::CancelToken;
use lm_fname::Mp;

// ---------------------------------------------------------------------------
// Plan shapes
// ---------------------------------------------------------------------------

/// One planned rename, old name to new name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePair {
    pub from: String,
    pub to: String,
}

impl RenamePair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        RenamePair { from: from.into(), to: to.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeletePlan {
    pub renames: Vec<RenamePair>,
    pub deletes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CompactPlan {
    pub renames: Vec<RenamePair>,
}

#[derive(Debug, Clone)]
pub struct RenamePlan {
    pub old_title: Option<String>,
    pub new_title: String,
    pub renames: Vec<RenamePair>,
}

/// Render every file of a node subtree under a new position.
pub fn rebased_renames(
    files: impl Iterator<Item = lm_fname::ParsedFile>,
    old_prefix: &Mp,
    new_prefix: &Mp,
) -> Vec<RenamePair> {
    let mut renames = Vec::new();
    for f in files {
        let new_mp = f.mp.rebase(old_prefix, new_prefix);
        let to = lm_fname::file_name(&new_mp, &f.sid, f.doc_type.as_deref(), f.slug.as_deref());
        if to != f.name {
            renames.push(RenamePair::new(f.name, to));
        }
    }
    renames
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Apply renames in plan order. On the first failure (or cancellation)
/// the completed prefix is re-renamed in reverse; reversal failures are
/// reported inside the returned error, never dropped.
pub(crate) fn apply_renames(
    dir: &dyn ProjectDir,
    renames: &[RenamePair],
    cancel: &CancelToken,
) -> Result<(), ServiceError> {
    let mut done: Vec<&RenamePair> = Vec::new();
    for pair in renames {
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled {
                rollback: roll_back(dir, &done),
                deleted: DeletedReport::default(),
            });
        }
        match dir.rename(&pair.from, &pair.to) {
            Ok(()) => done.push(pair),
            Err(source) => {
                return Err(ServiceError::Rename {
                    from: pair.from.clone(),
                    to: pair.to.clone(),
                    source,
                    rollback: roll_back(dir, &done),
                });
            }
        }
    }
    Ok(())
}

fn roll_back(dir: &dyn ProjectDir, done: &[&RenamePair]) -> RollbackReport {
    let mut failures = Vec::new();
    for pair in done.iter().rev() {
        if let Err(e) = dir.rename(&pair.to, &pair.from) {
            failures.push(format!("{} -> {}: {e}", pair.to, pair.from));
        }
    }
    RollbackReport { reversed: done.len() - failures.len(), failures }
}

/// Apply deletes in plan order. Deletes run only after every rename
/// succeeded; a failure reports what is already gone and undoes nothing
/// (the identifiers survive through their reservation markers).
pub(crate) fn apply_deletes(
    dir: &dyn ProjectDir,
    deletes: &[String],
    cancel: &CancelToken,
) -> Result<(), ServiceError> {
    let mut deleted = Vec::new();
    for name in deletes {
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled {
                rollback: RollbackReport::default(),
                deleted: DeletedReport(deleted),
            });
        }
        match dir.delete(name) {
            Ok(()) => deleted.push(name.clone()),
            Err(source) => {
                return Err(ServiceError::Delete {
                    name: name.clone(),
                    source,
                    deleted: DeletedReport(deleted),
                });
            }
        }
    }
    Ok(())
}
