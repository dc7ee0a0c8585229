use std::fmt;
use std::io;

use lm_fm::FmError;
use lm_fname::NumberError;
use lm_outline::ResolveError;

// ---------------------------------------------------------------------------
// Rollback reporting
// ---------------------------------------------------------------------------

/// What happened to already-completed renames after a mid-apply failure.
/// Rollback failures are never swallowed; they ride along in the error.
#[derive(Debug, Clone, Default)]
pub struct RollbackReport {
    /// Renames successfully reversed.
    pub reversed: usize,
    /// Reversals that themselves failed, rendered `new -> old: cause`.
    pub failures: Vec<String>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RollbackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.failures.is_empty() {
            write!(
                f,
                "; rollback failed, the filesystem may be inconsistent: {}",
                self.failures.join("; ")
            )
        } else if self.reversed > 0 {
            write!(f, "; {} completed rename(s) rolled back", self.reversed)
        } else {
            Ok(())
        }
    }
}

/// Files removed before a delete pass failed. Deletes are not undone;
/// the list is the diagnostic for manual recovery.
#[derive(Debug, Clone, Default)]
pub struct DeletedReport(pub Vec<String>);

impl fmt::Display for DeletedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            Ok(())
        } else {
            write!(f, "; already deleted: {}", self.0.join(", "))
        }
    }
}

// ---------------------------------------------------------------------------
// Error surface
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("another writer holds the project lock")]
    AlreadyLocked,
    #[error("no node matches selector `{0}`")]
    NodeNotFound(String),
    #[error("selector `{0}` matches more than one node")]
    AmbiguousSelector(String),
    #[error("node {0} has children; delete recursively or promote them first")]
    NodeHasChildren(String),
    #[error("cannot promote {needed} children: only {available} sibling slots are free")]
    InsufficientGaps { needed: usize, available: usize },
    #[error("cannot move {moved} under {target}: the target lies within the moved subtree")]
    CycleDetected { moved: String, target: String },
    #[error(transparent)]
    NoSlot(#[from] NumberError),
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("invalid document type `{0}`: expected lowercase letters and digits")]
    InvalidDocType(String),
    #[error(transparent)]
    Frontmatter(#[from] FmError),
    #[error("read {name}: {source}")]
    Read { name: String, source: io::Error },
    #[error("write {name}: {source}")]
    Write { name: String, source: io::Error },
    #[error("rename {from} -> {to}: {source}{rollback}")]
    Rename { from: String, to: String, source: io::Error, rollback: RollbackReport },
    #[error("delete {name}: {source}{deleted}")]
    Delete { name: String, source: io::Error, deleted: DeletedReport },
    #[error("operation cancelled{rollback}{deleted}")]
    Cancelled { rollback: RollbackReport, deleted: DeletedReport },
}

impl ServiceError {
    pub(crate) fn cancelled() -> Self {
        ServiceError::Cancelled {
            rollback: RollbackReport::default(),
            deleted: DeletedReport::default(),
        }
    }

    pub(crate) fn read(name: impl Into<String>, source: io::Error) -> Self {
        ServiceError::Read { name: name.into(), source }
    }

    pub(crate) fn write(name: impl Into<String>, source: io::Error) -> Self {
        ServiceError::Write { name: name.into(), source }
    }
}

impl From<ResolveError> for ServiceError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound(s) => ServiceError::NodeNotFound(s),
            ResolveError::Ambiguous(s) => ServiceError::AmbiguousSelector(s),
        }
    }
}

impl From<lm_ident::IdentError> for ServiceError {
    fn from(e: lm_ident::IdentError) -> Self {
        match e {
            lm_ident::IdentError::ByteSource(io) => ServiceError::read("identifier source", io),
            lm_ident::IdentError::SourceExhausted => ServiceError::read(
                "identifier source",
                io::Error::new(io::ErrorKind::UnexpectedEof, "byte source exhausted"),
            ),
        }
    }
}
