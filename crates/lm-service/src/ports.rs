//! The filesystem-facing seams the coordinator is wired with. Production
//! adapters live in [`crate::fs`]; tests substitute in-memory recorders.

use std::io;

/// Outcome of a non-blocking lock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Acquired,
    Busy,
}

/// A flat directory of outline documents, addressed by bare filename.
pub trait ProjectDir {
    /// Names of the `.md` entries currently on disk.
    fn list(&self) -> io::Result<Vec<String>>;
    fn read(&self, name: &str) -> io::Result<String>;
    fn write(&self, name: &str, contents: &str) -> io::Result<()>;
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;
    fn delete(&self, name: &str) -> io::Result<()>;
}

/// Single-writer gate for a project. `unlock` is called exactly once on
/// every exit path of a locked operation.
pub trait WriterLock {
    fn try_lock(&self) -> io::Result<LockState>;
    fn unlock(&self) -> io::Result<()>;
}

/// Persistent issued-identifier markers; presence is the only signal.
pub trait ReservationStore {
    fn reserve(&self, sid: &str) -> io::Result<()>;
    fn contains(&self, sid: &str) -> io::Result<bool>;
}
