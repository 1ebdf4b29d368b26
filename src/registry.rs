//! Instance registry backed by a PID file
//!
//! The server writes its pid to `<tmp>/<name>.pid` at startup. A record
//! whose process no longer exists is stale and may be reclaimed; a live one
//! means another server owns the channel.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rustix::io::Errno;
use rustix::process::{test_kill_process, Pid};
use tracing::{debug, info, warn};

use crate::error::{DstatError, Result};

/// Outcome of inspecting the PID record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// A live process owns the record
    Running(i32),
    /// No record, an unreadable record, or a dead owner
    NotRunning,
}

/// Outcome of a server trying to claim the record
#[derive(Debug)]
pub enum Acquisition {
    /// The record now holds our pid; released when the lock drops
    Acquired(InstanceLock),
    /// Another live server holds the record
    AlreadyRunning(i32),
}

/// Inspect the record at `path`
///
/// Never fails: anything that is not a parsable pid of a live process reads
/// as [`Probe::NotRunning`].
pub fn probe(path: &Path) -> Probe {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                debug!("Cannot read pid file {}: {}", path.display(), e);
            }
            return Probe::NotRunning;
        }
    };

    let Some(pid) = contents.trim().parse::<i32>().ok().filter(|pid| *pid > 0) else {
        debug!("Ignoring unparsable pid file {}", path.display());
        return Probe::NotRunning;
    };

    if process_alive(pid) {
        Probe::Running(pid)
    } else {
        debug!("Pid file {} names dead process {}", path.display(), pid);
        Probe::NotRunning
    }
}

/// Claim the record for the current process
///
/// The record is only ever created with `O_EXCL`. A stale record is removed
/// and creation retried once, so of two servers reclaiming the same stale
/// record at most one succeeds.
pub fn acquire(path: &Path) -> Result<Acquisition> {
    acquire_with(path, || {})
}

fn acquire_with(path: &Path, after_release: impl FnOnce()) -> Result<Acquisition> {
    let pid = std::process::id();

    if create_record(path, pid)? {
        return Ok(Acquisition::Acquired(InstanceLock::new(path)));
    }
    if let Probe::Running(owner) = probe(path) {
        return Ok(Acquisition::AlreadyRunning(owner));
    }

    warn!("Reclaiming stale pid file {}", path.display());
    release(path);
    after_release();

    if create_record(path, pid)? {
        return Ok(Acquisition::Acquired(InstanceLock::new(path)));
    }
    // someone else reclaimed it between our release and create
    match probe(path) {
        Probe::Running(owner) => Ok(Acquisition::AlreadyRunning(owner)),
        Probe::NotRunning => Err(pid_error(
            path,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "pid file was recreated while reclaiming it",
            ),
        )),
    }
}

/// Create the record exclusively; `false` when it already exists
fn create_record(path: &Path, pid: u32) -> Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            write_pid(&mut file, pid).map_err(|source| pid_error(path, source))?;
            info!("Registered pid {} in {}", pid, path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(source) => Err(pid_error(path, source)),
    }
}

/// Remove the record; an absent record is not an error
pub fn release(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed pid file {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove pid file {}: {}", path.display(), e),
    }
}

/// Ownership of the PID record for the lifetime of the server
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Path of the owned record
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        release(&self.path);
    }
}

fn process_alive(pid: i32) -> bool {
    let Some(pid) = Pid::from_raw(pid) else {
        return false;
    };
    match test_kill_process(pid) {
        Ok(()) => true,
        // exists but belongs to someone else
        Err(Errno::PERM) => true,
        Err(_) => false,
    }
}

fn write_pid(file: &mut fs::File, pid: u32) -> io::Result<()> {
    writeln!(file, "{}", pid)?;
    file.flush()
}

fn pid_error(path: &Path, source: io::Error) -> DstatError {
    DstatError::PidFile {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // above any kernel pid_max
    const DEAD_PID: i32 = i32::MAX;

    fn own_pid() -> i32 {
        std::process::id() as i32
    }

    #[test]
    fn test_probe_missing_record() {
        let dir = TempDir::new().unwrap();
        assert_eq!(probe(&dir.path().join("dstat.pid")), Probe::NotRunning);
    }

    #[test]
    fn test_acquire_fresh_writes_own_pid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dstat.pid");

        let lock = match acquire(&path).unwrap() {
            Acquisition::Acquired(lock) => lock,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(lock.path(), path);
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), own_pid().to_string());
        assert_eq!(probe(&path), Probe::Running(own_pid()));

        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_record_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dstat.pid");
        fs::write(&path, format!("{}\n", DEAD_PID)).unwrap();

        assert_eq!(probe(&path), Probe::NotRunning);
        let acquired = acquire(&path).unwrap();
        assert!(matches!(acquired, Acquisition::Acquired(_)));
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), own_pid().to_string());
    }

    #[test]
    fn test_reclaim_loses_to_concurrent_owner() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dstat.pid");
        fs::write(&path, format!("{}\n", DEAD_PID)).unwrap();

        // another server recreates the record right after our removal
        let acquired = acquire_with(&path, || {
            fs::write(&path, format!("{}\n", own_pid())).unwrap();
        })
        .unwrap();
        match acquired {
            Acquisition::AlreadyRunning(pid) => assert_eq!(pid, own_pid()),
            other => panic!("unexpected {:?}", other),
        }
        // the other owner's record is left alone
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), own_pid().to_string());
    }

    #[test]
    fn test_reclaim_refuses_half_written_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dstat.pid");
        fs::write(&path, format!("{}\n", DEAD_PID)).unwrap();

        let result = acquire_with(&path, || fs::write(&path, "").unwrap());
        assert!(matches!(result, Err(DstatError::PidFile { .. })));
        assert!(path.exists());
    }

    #[test]
    fn test_live_record_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dstat.pid");

        let first = acquire(&path).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        match acquire(&path).unwrap() {
            Acquisition::AlreadyRunning(pid) => assert_eq!(pid, own_pid()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        drop(first);
    }

    #[test]
    fn test_garbage_record_reads_not_running() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dstat.pid");

        for contents in ["", "not a pid", "-12", "0"] {
            fs::write(&path, contents).unwrap();
            assert_eq!(probe(&path), Probe::NotRunning, "contents {:?}", contents);
        }
    }

    #[test]
    fn test_release_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dstat.pid");
        fs::write(&path, "1").unwrap();

        release(&path);
        release(&path);
        assert!(!path.exists());
    }

    #[test]
    fn test_acquire_in_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("dstat.pid");
        assert!(matches!(acquire(&path), Err(DstatError::PidFile { .. })));
    }
}
