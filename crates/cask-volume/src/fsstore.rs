//! Namespaced filesystem store with an advisory lock.
//!
//! An [`FsStore`] behaves like a map from entry name to an opaque directory
//! tree. Every public operation runs under the store's `flock` unless the
//! calling thread already holds it through [`FsStore::lock`]; that lets
//! callers bracket several operations into one critical section.
//!
//! The lock holder is a thread. A handle shared between threads serializes
//! them: every acquisition opens its own file description, so `flock` blocks
//! other threads exactly as it blocks other processes.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use cask_common::{CaskError, CaskResult};
use parking_lot::Mutex;
use rustix::fs::{FlockOperation, flock};

/// Name of the advisory lock file inside the store directory.
const LOCK_FILE: &str = ".lock";

/// Poll interval used by [`FsStore::lock_timeout`].
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A directory-backed key to blob-tree store.
#[derive(Debug)]
pub struct FsStore {
    /// Absolute path of the store directory.
    dir: PathBuf,
    /// The lock file and the thread holding it.
    held: Mutex<Option<Holder>>,
}

#[derive(Debug)]
struct Holder {
    file: File,
    thread: ThreadId,
}

/// Releases the store lock when dropped.
///
/// The guard stays on the thread that acquired the lock.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    store: &'a FsStore,
    _not_send: PhantomData<*const ()>,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.store.unlock() {
            tracing::warn!(%err, dir = %self.store.dir.display(), "Failed to release store lock");
        }
    }
}

impl FsStore {
    /// Open (and create if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> CaskResult<Self> {
        let dir = std::path::absolute(dir.as_ref())?;
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            held: Mutex::new(None),
        })
    }

    /// The store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns true if the calling thread currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.held
            .lock()
            .as_ref()
            .is_some_and(|holder| holder.thread == thread::current().id())
    }

    /// Acquire the lock, blocking until it is available.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidState`] if the calling thread already
    /// holds the lock, or an I/O error if the lock file cannot be opened.
    pub fn lock(&self) -> CaskResult<()> {
        if self.is_locked() {
            return Err(self.already_locked());
        }

        let file = self.open_lock_file()?;
        flock(&file, FlockOperation::LockExclusive).map_err(|e| CaskError::Io(e.into()))?;
        self.record_holder(file);
        Ok(())
    }

    /// Acquire the lock, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error of kind `WouldBlock` when the deadline passes,
    /// and [`CaskError::InvalidState`] if the calling thread already holds
    /// the lock.
    pub fn lock_timeout(&self, timeout: Duration) -> CaskResult<()> {
        if self.is_locked() {
            return Err(self.already_locked());
        }

        let file = self.open_lock_file()?;
        let deadline = Instant::now() + timeout;
        loop {
            match flock(&file, FlockOperation::NonBlockingLockExclusive) {
                Ok(()) => break,
                Err(errno) if errno == rustix::io::Errno::WOULDBLOCK => {
                    if Instant::now() >= deadline {
                        return Err(CaskError::Io(std::io::Error::new(
                            std::io::ErrorKind::WouldBlock,
                            format!("timed out waiting for lock on {}", self.dir.display()),
                        )));
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(errno) => return Err(CaskError::Io(errno.into())),
            }
        }
        self.record_holder(file);
        Ok(())
    }

    /// Release the lock.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidState`] if the calling thread does not
    /// hold the lock.
    pub fn unlock(&self) -> CaskResult<()> {
        let file = {
            let mut held = self.held.lock();
            match held.take() {
                Some(holder) if holder.thread == thread::current().id() => holder.file,
                other => {
                    *held = other;
                    return Err(CaskError::invalid_state(format!(
                        "store {} is not locked by this thread",
                        self.dir.display()
                    )));
                }
            }
        };
        flock(&file, FlockOperation::Unlock).map_err(|e| CaskError::Io(e.into()))?;
        tracing::debug!(dir = %self.dir.display(), "Released store lock");
        Ok(())
    }

    /// Acquire the lock and return a guard that releases it on drop.
    ///
    /// # Errors
    ///
    /// Same as [`FsStore::lock`].
    pub fn guard(&self) -> CaskResult<LockGuard<'_>> {
        self.lock()?;
        Ok(self.new_guard())
    }

    /// Like [`FsStore::guard`], giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Same as [`FsStore::lock_timeout`].
    pub fn guard_timeout(&self, timeout: Duration) -> CaskResult<LockGuard<'_>> {
        self.lock_timeout(timeout)?;
        Ok(self.new_guard())
    }

    /// Run `f` with the lock held, releasing it on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the locking error, or whatever `f` returns.
    pub fn with_lock<T>(&self, f: impl FnOnce() -> CaskResult<T>) -> CaskResult<T> {
        let _guard = self.guard()?;
        f()
    }

    /// Run `f` under the lock, unless the calling thread already holds it.
    pub(crate) fn auto_lock<T>(&self, f: impl FnOnce() -> CaskResult<T>) -> CaskResult<T> {
        if self.is_locked() {
            f()
        } else {
            self.with_lock(f)
        }
    }

    /// Check whether `name` (and optionally a path below it) exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed or the parent is unreadable.
    pub fn exists(&self, name: &str, subpath: &[&str]) -> CaskResult<bool> {
        self.auto_lock(|| {
            let path = self.entry_path(name, subpath)?;
            Ok(path.try_exists()?)
        })
    }

    /// Read `file` inside entry `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::NotFound`] if the entry or the file is missing.
    pub fn get(&self, name: &str, file: &str) -> CaskResult<Vec<u8>> {
        self.auto_lock(|| {
            let path = self.entry_path(name, &[file])?;
            fs::read(&path).map_err(|err| not_found_or_io(err, name, file))
        })
    }

    /// Atomically replace `file` inside entry `name` with `data`.
    ///
    /// The content is written to a temporary sibling and renamed into place,
    /// so readers see either the old or the new content in full.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed or the write fails.
    pub fn set(&self, data: &[u8], name: &str, file: &str) -> CaskResult<()> {
        self.auto_lock(|| {
            let target = self.entry_path(name, &[file])?;
            let parent = self.entry_path(name, &[])?;
            fs::create_dir_all(&parent)?;

            let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
            tmp.write_all(data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target).map_err(|err| CaskError::Io(err.error))?;
            Ok(())
        })
    }

    /// Idempotently create the directory `name/subdir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed or creation fails.
    pub fn group_ensure(&self, name: &str, subdir: &str) -> CaskResult<()> {
        self.auto_lock(|| {
            let path = self.entry_path(name, &[subdir])?;
            fs::create_dir_all(&path)?;
            Ok(())
        })
    }

    /// Absolute path of `name/subdir`.
    ///
    /// # Errors
    ///
    /// Returns an error if a component is malformed.
    pub fn location(&self, name: &str, subdir: &str) -> CaskResult<PathBuf> {
        self.entry_path(name, &[subdir])
    }

    /// Sum of the sizes of every regular file below `name/subdir`.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::NotFound`] if the directory is missing.
    pub fn group_size(&self, name: &str, subdir: &str) -> CaskResult<u64> {
        self.auto_lock(|| {
            let root = self.entry_path(name, &[subdir])?;
            if !root.try_exists()? {
                return Err(CaskError::NotFound {
                    what: format!("{name}/{subdir}"),
                });
            }

            let mut total = 0u64;
            for entry in walkdir::WalkDir::new(&root) {
                let entry = entry.map_err(std::io::Error::from)?;
                if entry.file_type().is_file() {
                    total += entry.metadata().map_err(std::io::Error::from)?.len();
                }
            }
            Ok(total)
        })
    }

    /// Names of all entries, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store directory cannot be read.
    pub fn list(&self) -> CaskResult<Vec<String>> {
        self.auto_lock(|| {
            let mut names = Vec::new();
            for entry in fs::read_dir(&self.dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                if let Ok(name) = entry.file_name().into_string() {
                    if !name.starts_with('.') {
                        names.push(name);
                    }
                }
            }
            Ok(names)
        })
    }

    /// Recursively delete entry `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::NotFound`] if the entry does not exist.
    pub fn delete(&self, name: &str) -> CaskResult<()> {
        self.auto_lock(|| {
            let path = self.entry_path(name, &[])?;
            fs::remove_dir_all(&path).map_err(|err| not_found_or_io(err, name, ""))
        })
    }

    fn entry_path(&self, name: &str, subpath: &[&str]) -> CaskResult<PathBuf> {
        check_component(name)?;
        // Dot-prefixed names are reserved for the lock file and temp files.
        if name.starts_with('.') {
            return Err(CaskError::invalid_argument(format!(
                "invalid store key {name:?}"
            )));
        }

        let mut path = self.dir.join(name);
        for part in subpath {
            check_component(part)?;
            path.push(part);
        }
        Ok(path)
    }

    fn open_lock_file(&self) -> CaskResult<File> {
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_FILE))?)
    }

    const fn new_guard(&self) -> LockGuard<'_> {
        LockGuard {
            store: self,
            _not_send: PhantomData,
        }
    }

    // Only one thread can own the flock, so the slot is empty here.
    fn record_holder(&self, file: File) {
        tracing::debug!(dir = %self.dir.display(), "Acquired store lock");
        *self.held.lock() = Some(Holder {
            file,
            thread: thread::current().id(),
        });
    }

    fn already_locked(&self) -> CaskError {
        CaskError::invalid_state(format!("store {} is already locked", self.dir.display()))
    }
}

fn check_component(part: &str) -> CaskResult<()> {
    if part.is_empty()
        || part == "."
        || part == ".."
        || part.contains(['/', '\\', '\0'])
    {
        return Err(CaskError::invalid_argument(format!(
            "invalid store key {part:?}"
        )));
    }
    Ok(())
}

fn not_found_or_io(err: std::io::Error, name: &str, file: &str) -> CaskError {
    if err.kind() == std::io::ErrorKind::NotFound {
        let what = if file.is_empty() {
            name.to_string()
        } else {
            format!("{name}/{file}")
        };
        CaskError::NotFound { what }
    } else {
        CaskError::Io(err)
    }
}
