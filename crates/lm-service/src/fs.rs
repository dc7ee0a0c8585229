//! Production adapters: a real project directory, the fs2-backed advisory
//! lock, and the on-disk reservation store, all rooted at a project
//! directory containing a `.linemark/` metadata dir.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::ports::{LockState, ProjectDir, ReservationStore, WriterLock};

/// Metadata directory marking a project root.
pub const META_DIR: &str = ".linemark";
const LOCK_FILE: &str = "lock";
const IDS_DIR: &str = "ids";

// ---------------------------------------------------------------------------
// Project discovery
// ---------------------------------------------------------------------------

/// Walk upward from `start`; the first ancestor containing a `.linemark/`
/// directory is the project root.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start.ancestors().find(|p| p.join(META_DIR).is_dir()).map(Path::to_path_buf)
}

/// Create the `.linemark/` metadata layout under `root`.
pub fn init_project(root: &Path) -> io::Result<PathBuf> {
    let meta = root.join(META_DIR);
    std::fs::create_dir_all(meta.join(IDS_DIR))?;
    Ok(meta)
}

// ---------------------------------------------------------------------------
// Directory adapter
// ---------------------------------------------------------------------------

/// The flat document directory at the project root.
pub struct FsProjectDir {
    root: PathBuf,
}

impl FsProjectDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsProjectDir { root: root.into() }
    }
}

impl ProjectDir for FsProjectDir {
    fn list(&self) -> io::Result<Vec<String>> {
        let pattern = format!("{}/*.md", self.root.display());
        let paths = glob::glob(&pattern).map_err(io::Error::other)?;
        let mut names = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| e.into_error())?;
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> io::Result<String> {
        std::fs::read_to_string(self.root.join(name))
    }

    fn write(&self, name: &str, contents: &str) -> io::Result<()> {
        std::fs::write(self.root.join(name), contents)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        std::fs::rename(self.root.join(from), self.root.join(to))
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        std::fs::remove_file(self.root.join(name))
    }
}

// ---------------------------------------------------------------------------
// Advisory lock
// ---------------------------------------------------------------------------

/// Exclusive advisory lock on `.linemark/lock`. Guards concurrent
/// invocations on one host; it is not a cross-machine guarantee.
pub struct FsLock {
    path: PathBuf,
    handle: RefCell<Option<File>>,
}

impl FsLock {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        FsLock {
            path: project_root.into().join(META_DIR).join(LOCK_FILE),
            handle: RefCell::new(None),
        }
    }
}

impl WriterLock for FsLock {
    fn try_lock(&self) -> io::Result<LockState> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().read(true).write(true).create(true).open(&self.path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                *self.handle.borrow_mut() = Some(file);
                Ok(LockState::Acquired)
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Ok(LockState::Busy)
            }
            Err(e) => Err(e),
        }
    }

    fn unlock(&self) -> io::Result<()> {
        if let Some(file) = self.handle.borrow_mut().take() {
            FileExt::unlock(&file)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reservation store
// ---------------------------------------------------------------------------

/// Zero-byte marker files under `.linemark/ids/`, one per issued SID.
/// Markers outlive their nodes: deletion never removes them.
pub struct FsReservations {
    dir: PathBuf,
}

impl FsReservations {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        FsReservations { dir: project_root.into().join(META_DIR).join(IDS_DIR) }
    }
}

impl ReservationStore for FsReservations {
    fn reserve(&self, sid: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(sid), b"")
    }

    fn contains(&self, sid: &str) -> io::Result<bool> {
        Ok(self.dir.join(sid).exists())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
