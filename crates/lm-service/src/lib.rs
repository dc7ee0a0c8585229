//! The outline coordination engine.
//!
//! Every mutation follows the same skeleton: take the writer lock, read
//! and parse the project directory, compute a plan as a pure function of
//! what was found, then apply the plan with renames first and deletes
//! last, rolling completed renames back if anything fails mid-flight.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lm_outline::{Finding, Node, Outline, Selector};

mod add;
mod check;
mod compact;
mod delete;
mod doctypes;
mod error;
mod fs;
mod move_op;
mod plan;
mod ports;
mod rename;

pub use add::{AddOutcome, AddRequest};
pub use check::RepairOutcome;
pub use compact::CompactRequest;
pub use delete::{DeleteMode, DeleteRequest};
pub use doctypes::{TypeChange, TypeRequest};
pub use error::{DeletedReport, RollbackReport, ServiceError};
pub use fs::{FsLock, FsProjectDir, FsReservations, find_project_root, init_project};
pub use move_op::{MovePlan, MoveRequest};
pub use plan::{CompactPlan, DeletePlan, RenamePair, RenamePlan};
pub use ports::{LockState, ProjectDir, ReservationStore, WriterLock};
pub use rename::RenameRequest;

#[cfg(test)]
mod testutil;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation signal, checked on operation entry and before
/// every filesystem effect. Cancelling mid-apply triggers the same
/// rollback path as an in-flight failure.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<(), ServiceError> {
        if self.is_cancelled() {
            Err(ServiceError::cancelled())
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// The coordinator. Owns handles to the project directory, the writer
/// lock, the identifier byte source, and (optionally) the reservation
/// store; everything else it needs is pure.
pub struct OutlineService {
    dir: Box<dyn ProjectDir>,
    lock: Box<dyn WriterLock>,
    sid_source: Box<dyn Read>,
    reservations: Option<Box<dyn ReservationStore>>,
}

impl OutlineService {
    pub fn new(
        dir: Box<dyn ProjectDir>,
        lock: Box<dyn WriterLock>,
        sid_source: Box<dyn Read>,
    ) -> Self {
        OutlineService { dir, lock, sid_source, reservations: None }
    }

    /// Attach a reservation store; without one, markers are neither
    /// written nor checked.
    pub fn with_reservations(mut self, store: Box<dyn ReservationStore>) -> Self {
        self.reservations = Some(store);
        self
    }

    /// Read and parse the whole project directory, filling in node titles
    /// from the drafts that have one. Lock-free.
    pub fn load(&self, cancel: &CancelToken) -> Result<(Outline, Vec<Finding>), ServiceError> {
        cancel.check()?;
        let (mut outline, findings) = self.load_outline()?;
        for node in outline.nodes_mut() {
            cancel.check()?;
            let Some(name) = node.draft_file().map(|f| f.name.clone()) else {
                continue;
            };
            let content = self.dir.read(&name).map_err(|e| ServiceError::read(&name, e))?;
            if let Ok(title) = lm_fm::get_title(&content) {
                node.title = title;
            }
        }
        Ok((outline, findings))
    }

    /// Resolve a selector to a node without holding the lock.
    pub fn resolve(&self, selector: &str, cancel: &CancelToken) -> Result<Node, ServiceError> {
        cancel.check()?;
        let (outline, _) = self.load_outline()?;
        resolve_node(&outline, selector).map(|n| n.clone())
    }

    fn load_outline(&self) -> Result<(Outline, Vec<Finding>), ServiceError> {
        let names = self
            .dir
            .list()
            .map_err(|e| ServiceError::Read { name: "project directory".into(), source: e })?;
        let (files, mut findings) = lm_outline::parse_entries(&names);
        let (outline, mut structural) = lm_outline::build(files);
        findings.append(&mut structural);
        Ok((outline, findings))
    }

    /// Run a mutation under the writer lock, releasing it on every exit
    /// path.
    fn with_lock<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        match self.lock.try_lock() {
            Ok(LockState::Acquired) => {}
            Ok(LockState::Busy) => return Err(ServiceError::AlreadyLocked),
            Err(e) => {
                return Err(ServiceError::Read { name: "writer lock".into(), source: e });
            }
        }
        let out = f(self);
        let _ = self.lock.unlock();
        out
    }
}

fn resolve_node<'a>(outline: &'a Outline, selector: &str) -> Result<&'a Node, ServiceError> {
    lm_outline::resolve(outline, &Selector::parse(selector)).map_err(ServiceError::from)
}
