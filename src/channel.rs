//! FIFO channel between clients and the server
//!
//! The server owns a named pipe at `<tmp>/<name>`, opened read/write and
//! non-blocking so it never sees end-of-file and never stalls a tick.
//! Clients open the same path write-only and push exactly one frame.

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rustix::event::{poll, PollFd, PollFlags};
use rustix::fd::OwnedFd;
use rustix::fs::{mknodat, open, FileType, Mode, OFlags, CWD};
use rustix::io::{read, write, Errno};
use tracing::{debug, info, warn};

use crate::codec::MAX_FRAME_LEN;
use crate::error::{DstatError, Result};

/// Result of one bounded read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were read into the buffer
    Data(usize),
    /// Nothing arrived before the timeout
    Empty,
}

/// Server (reader) side of the channel
#[derive(Debug)]
pub struct ServerChannel {
    fd: OwnedFd,
    path: PathBuf,
}

impl ServerChannel {
    /// Ensure a FIFO exists at `path` and open it for polling
    ///
    /// Anything else occupying the path is replaced.
    pub fn create(path: &Path) -> Result<Self> {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_fifo() => {
                debug!("Reusing existing channel {}", path.display());
            }
            Ok(meta) => {
                warn!("Replacing non-FIFO object at {}", path.display());
                let removed = if meta.is_dir() {
                    fs::remove_dir(path)
                } else {
                    fs::remove_file(path)
                };
                removed.map_err(|source| create_error(path, source))?;
                make_fifo(path)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => make_fifo(path)?,
            Err(source) => return Err(create_error(path, source)),
        }

        let fd = open(
            path,
            OFlags::RDWR | OFlags::NONBLOCK | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .map_err(|e| DstatError::ChannelOpen {
            path: path.to_path_buf(),
            source: e.into(),
        })?;

        info!("Listening on channel {}", path.display());
        Ok(Self {
            fd,
            path: path.to_path_buf(),
        })
    }

    /// Wait up to `timeout` for bytes and read what is available
    ///
    /// A timeout, a zero-byte read and an interrupted wait all come back as
    /// [`ReadOutcome::Empty`]; only genuine I/O failures are errors.
    pub fn poll_read(&self, buf: &mut [u8], timeout: Duration) -> io::Result<ReadOutcome> {
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let mut fds = [PollFd::new(&self.fd, PollFlags::IN)];

        match poll(&mut fds, timeout_ms) {
            Ok(0) => return Ok(ReadOutcome::Empty),
            Ok(_) => {}
            Err(Errno::INTR) => return Ok(ReadOutcome::Empty),
            Err(e) => return Err(e.into()),
        }

        match read(&self.fd, buf) {
            Ok(0) => Ok(ReadOutcome::Empty),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(Errno::AGAIN) | Err(Errno::INTR) => Ok(ReadOutcome::Empty),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the FIFO
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ServerChannel {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed channel {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove channel {}: {}", self.path.display(), e),
        }
    }
}

/// Client (writer) side of the channel
#[derive(Debug)]
pub struct ClientChannel {
    fd: OwnedFd,
    path: PathBuf,
}

impl ClientChannel {
    /// Open an existing FIFO for writing
    ///
    /// Fails with [`DstatError::Unreachable`] when the path is missing, is
    /// not a FIFO, or has no reader attached.
    pub fn connect(path: &Path) -> Result<Self> {
        let meta = fs::symlink_metadata(path).map_err(|source| unreachable(path, source))?;
        if !meta.file_type().is_fifo() {
            return Err(unreachable(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "not a FIFO"),
            ));
        }

        // O_NONBLOCK makes the open fail with ENXIO instead of hanging when
        // no server holds the read end
        let fd = open(
            path,
            OFlags::WRONLY | OFlags::NONBLOCK | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .map_err(|e| unreachable(path, e.into()))?;

        Ok(Self {
            fd,
            path: path.to_path_buf(),
        })
    }

    /// Write one frame in a single atomic write
    pub fn send(&self, frame: &[u8]) -> Result<()> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(DstatError::FrameTooLarge {
                max: MAX_FRAME_LEN,
                got: frame.len(),
            });
        }

        loop {
            match write(&self.fd, frame) {
                Ok(n) if n == frame.len() => return Ok(()),
                Ok(n) => {
                    return Err(unreachable(
                        &self.path,
                        io::Error::new(
                            io::ErrorKind::WriteZero,
                            format!("short write: {} of {} bytes", n, frame.len()),
                        ),
                    ))
                }
                Err(Errno::INTR) => continue,
                Err(e) => return Err(unreachable(&self.path, e.into())),
            }
        }
    }
}

fn make_fifo(path: &Path) -> Result<()> {
    mknodat(CWD, path, FileType::Fifo, Mode::RUSR | Mode::WUSR, 0)
        .map_err(|e| create_error(path, e.into()))?;
    debug!("Created channel {}", path.display());
    Ok(())
}

fn create_error(path: &Path, source: io::Error) -> DstatError {
    DstatError::ChannelCreate {
        path: path.to_path_buf(),
        source,
    }
}

fn unreachable(path: &Path, source: io::Error) -> DstatError {
    DstatError::Unreachable {
        path: path.to_path_buf(),
        source,
    }
}
