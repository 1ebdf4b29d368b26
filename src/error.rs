//! Error types for dstat

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for dstat operations
pub type Result<T> = std::result::Result<T, DstatError>;

/// Process exit code for usage errors and refused startups
pub const EXIT_FAILURE: i32 = 1;

/// Process exit code when the display program is missing or fails
pub const EXIT_DISPLAY: i32 = 2;

/// Process exit code when a server is running but its channel cannot be written
pub const EXIT_UNREACHABLE: i32 = 3;

/// Errors that can occur in dstat operations
#[derive(Debug, Error)]
pub enum DstatError {
    /// Another live server owns the PID record
    #[error("Server already running with pid {pid} (see '{}')", path.display())]
    AlreadyRunning { pid: i32, path: PathBuf },

    /// No live server owns the PID record
    #[error("Server is not active (no live pid in '{}')", path.display())]
    NotRunning { path: PathBuf },

    /// Failed to write or read the PID record
    #[error("Failed to access pid file '{}': {source}", path.display())]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create the FIFO
    #[error("Failed to create channel '{}': {source}", path.display())]
    ChannelCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to open the FIFO for reading
    #[error("Failed to open channel '{}': {source}", path.display())]
    ChannelOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Server is running but the FIFO could not be written
    #[error("Could not contact the server through '{}': {source}", path.display())]
    Unreachable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Frame exceeds the atomic pipe write size
    #[error("Message too long: max {max} bytes encoded, got {got} bytes")]
    FrameTooLarge { max: usize, got: usize },

    /// Display program not found on PATH
    #[error("Display program '{program}' not found on PATH")]
    DisplayMissing { program: String },

    /// Display program failed to run or exited non-zero
    #[error("Failed to update display: {0}")]
    Display(#[source] io::Error),

    /// Logging could not be initialised
    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

impl DstatError {
    /// Exit code reported when this error ends the process
    pub fn exit_code(&self) -> i32 {
        match self {
            DstatError::DisplayMissing { .. } | DstatError::Display(_) => EXIT_DISPLAY,
            DstatError::Unreachable { .. } | DstatError::FrameTooLarge { .. } => EXIT_UNREACHABLE,
            _ => EXIT_FAILURE,
        }
    }
}
