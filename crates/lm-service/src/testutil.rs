//! In-memory doubles for the service's ports, with recorded calls and
//! injectable failures.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::rc::Rc;

use crate::ports::{LockState, ProjectDir, ReservationStore, WriterLock};
use crate::{CancelToken, OutlineService};

// ---------------------------------------------------------------------------
// Directory stub
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemDir {
    pub files: RefCell<BTreeMap<String, String>>,
    /// Mutation log: `write X`, `rename A -> B`, `delete X`.
    pub log: RefCell<Vec<String>>,
    fail_renames: RefCell<Vec<String>>,
    fail_write_names: RefCell<Vec<String>>,
    fail_delete_names: RefCell<Vec<String>>,
    cancel_on_rename: RefCell<Option<(String, CancelToken)>>,
}

impl MemDir {
    pub fn with_files(entries: &[(&str, &str)]) -> Self {
        let dir = MemDir::default();
        dir.files
            .borrow_mut()
            .extend(entries.iter().map(|(n, c)| (n.to_string(), c.to_string())));
        dir
    }

    pub fn names(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }

    pub fn contents(&self, name: &str) -> Option<String> {
        self.files.borrow().get(name).cloned()
    }

    /// Make the rename whose destination is `to` fail.
    pub fn fail_rename_to(&self, to: &str) {
        self.fail_renames.borrow_mut().push(to.to_string());
    }

    /// Alias that reads better when stacking a second failure.
    pub fn fail_rename_to_also(&self, to: &str) {
        self.fail_rename_to(to);
    }

    pub fn fail_write(&self, name: &str) {
        self.fail_write_names.borrow_mut().push(name.to_string());
    }

    pub fn fail_delete(&self, name: &str) {
        self.fail_delete_names.borrow_mut().push(name.to_string());
    }

    /// Cancel `token` right after the rename landing at `to` succeeds.
    pub fn cancel_after_rename(&self, to: &str, token: CancelToken) {
        *self.cancel_on_rename.borrow_mut() = Some((to.to_string(), token));
    }
}

impl ProjectDir for MemDir {
    fn list(&self) -> io::Result<Vec<String>> {
        Ok(self.names())
    }

    fn read(&self, name: &str) -> io::Result<String> {
        self.contents(name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))
    }

    fn write(&self, name: &str, contents: &str) -> io::Result<()> {
        if self.fail_write_names.borrow().iter().any(|n| n == name) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected write failure"));
        }
        self.log.borrow_mut().push(format!("write {name}"));
        self.files.borrow_mut().insert(name.to_string(), contents.to_string());
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        if self.fail_renames.borrow().iter().any(|n| n == to) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected rename failure"));
        }
        let contents = self
            .files
            .borrow_mut()
            .remove(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, from.to_string()))?;
        self.files.borrow_mut().insert(to.to_string(), contents);
        self.log.borrow_mut().push(format!("rename {from} -> {to}"));
        if let Some((watched, token)) = self.cancel_on_rename.borrow().as_ref() {
            if watched == to {
                token.cancel();
            }
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        if self.fail_delete_names.borrow().iter().any(|n| n == name) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected delete failure"));
        }
        self.files
            .borrow_mut()
            .remove(name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))?;
        self.log.borrow_mut().push(format!("delete {name}"));
        Ok(())
    }
}

impl<T: ProjectDir + ?Sized> ProjectDir for Rc<T> {
    fn list(&self) -> io::Result<Vec<String>> {
        (**self).list()
    }
    fn read(&self, name: &str) -> io::Result<String> {
        (**self).read(name)
    }
    fn write(&self, name: &str, contents: &str) -> io::Result<()> {
        (**self).write(name, contents)
    }
    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        (**self).rename(from, to)
    }
    fn delete(&self, name: &str) -> io::Result<()> {
        (**self).delete(name)
    }
}

// ---------------------------------------------------------------------------
// Lock stub
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemLock {
    pub busy: Cell<bool>,
    pub held: Cell<bool>,
    pub acquired: Cell<usize>,
    pub released: Cell<usize>,
}

impl WriterLock for MemLock {
    fn try_lock(&self) -> io::Result<LockState> {
        if self.busy.get() || self.held.get() {
            return Ok(LockState::Busy);
        }
        self.held.set(true);
        self.acquired.set(self.acquired.get() + 1);
        Ok(LockState::Acquired)
    }

    fn unlock(&self) -> io::Result<()> {
        self.held.set(false);
        self.released.set(self.released.get() + 1);
        Ok(())
    }
}

impl<T: WriterLock + ?Sized> WriterLock for Rc<T> {
    fn try_lock(&self) -> io::Result<LockState> {
        (**self).try_lock()
    }
    fn unlock(&self) -> io::Result<()> {
        (**self).unlock()
    }
}

// ---------------------------------------------------------------------------
// Reservation stub
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemStore {
    pub sids: RefCell<BTreeSet<String>>,
    pub fail_reserve: Cell<bool>,
}

impl ReservationStore for MemStore {
    fn reserve(&self, sid: &str) -> io::Result<()> {
        if self.fail_reserve.get() {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected reserve failure"));
        }
        self.sids.borrow_mut().insert(sid.to_string());
        Ok(())
    }

    fn contains(&self, sid: &str) -> io::Result<bool> {
        Ok(self.sids.borrow().contains(sid))
    }
}

impl<T: ReservationStore + ?Sized> ReservationStore for Rc<T> {
    fn reserve(&self, sid: &str) -> io::Result<()> {
        (**self).reserve(sid)
    }
    fn contains(&self, sid: &str) -> io::Result<bool> {
        (**self).contains(sid)
    }
}

// ---------------------------------------------------------------------------
// Wiring helpers
// ---------------------------------------------------------------------------

/// Bytes that drive the identifier generator to emit exactly `sids`.
pub fn sid_bytes(sids: &[&str]) -> Vec<u8> {
    fn index(c: u8) -> u8 {
        match c {
            b'A'..=b'Z' => c - b'A',
            b'a'..=b'z' => c - b'a' + 26,
            b'0'..=b'9' => c - b'0' + 52,
            _ => panic!("not a base-62 character: {}", c as char),
        }
    }
    sids.iter().flat_map(|sid| sid.bytes().map(index)).collect()
}

/// A service over in-memory ports, seeded with `files`; the identifier
/// source is empty (fine for operations that never allocate).
pub fn service_with(
    files: &[(&str, &str)],
) -> (OutlineService, Rc<MemDir>, Rc<MemLock>, Rc<MemStore>) {
    service_with_sids(files, &[])
}

/// Like [`service_with`], with a scripted identifier source.
pub fn service_with_sids(
    files: &[(&str, &str)],
    sids: &[&str],
) -> (OutlineService, Rc<MemDir>, Rc<MemLock>, Rc<MemStore>) {
    let dir = Rc::new(MemDir::with_files(files));
    let lock = Rc::new(MemLock::default());
    let store = Rc::new(MemStore::default());
    let source = std::io::Cursor::new(sid_bytes(sids));
    let svc = OutlineService::new(
        Box::new(Rc::clone(&dir)),
        Box::new(Rc::clone(&lock)),
        Box::new(source),
    )
    .with_reservations(Box::new(Rc::clone(&store)));
    (svc, dir, lock, store)
}
