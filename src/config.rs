//! Runtime configuration
//!
//! A [`Config`] is built once at startup and handed by reference to every
//! component. Nothing reads configuration from ambient global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default program basename, used when argv[0] is unusable
pub const DEFAULT_PROGRAM_NAME: &str = "dstat";

/// Default progress bar width in slots
const DEFAULT_BAR_WIDTH: usize = 12;

/// Default tick period
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Default channel poll timeout
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Initial override duration in seconds
const DEFAULT_IDLE_SECS: u64 = 5;

/// How the server treats new traffic while an override is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrideMode {
    /// Sleep through the whole override without polling the channel
    #[default]
    Blocking,
    /// Keep polling; a new message or terminate cuts the override short
    Interruptible,
}

/// Server and client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Basename shared by the pid record and the channel
    pub program_name: String,
    /// Directory holding the pid record and the channel
    pub runtime_dir: PathBuf,
    /// Width of each progress bar in slots
    pub bar_width: usize,
    /// Period of the server loop
    pub tick_interval: Duration,
    /// Upper bound on each channel poll
    pub poll_timeout: Duration,
    /// Override duration used until a message carries a valid delay
    pub default_idle: u64,
    /// Mixer control passed to amixer
    pub volume_device: String,
    /// Process name whose presence means the screen locker is armed
    pub lock_process: String,
    /// File holding the sleep daemon status
    pub sleep_status_file: PathBuf,
    /// strftime format of the clock segment
    pub clock_format: String,
    /// Override scheduling policy
    pub override_mode: OverrideMode,
    /// Mount point of procfs
    pub proc_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM_NAME, std::env::temp_dir())
    }
}

impl Config {
    /// Configuration with defaults for the given basename and runtime directory
    pub fn new(program_name: &str, runtime_dir: PathBuf) -> Self {
        let sleep_status_file = runtime_dir.join(format!("{program_name}.sleep"));
        Self {
            program_name: program_name.to_string(),
            runtime_dir,
            bar_width: DEFAULT_BAR_WIDTH,
            tick_interval: DEFAULT_TICK_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            default_idle: DEFAULT_IDLE_SECS,
            volume_device: "Master".into(),
            lock_process: "xautolock".into(),
            sleep_status_file,
            clock_format: "%a %d %b %H:%M".into(),
            override_mode: OverrideMode::default(),
            proc_root: PathBuf::from("/proc"),
        }
    }

    /// Set the tick interval, keeping the poll timeout strictly below it
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self.poll_timeout = clamp_poll_timeout(self.poll_timeout, interval);
        self
    }

    /// `<runtime_dir>/<name>.pid`
    pub fn pid_path(&self) -> PathBuf {
        self.runtime_dir.join(format!("{}.pid", self.program_name))
    }

    /// `<runtime_dir>/<name>`
    pub fn channel_path(&self) -> PathBuf {
        self.runtime_dir.join(&self.program_name)
    }
}

/// Basename of an invocation path, falling back to the default name
pub fn program_name_from(argv0: Option<&Path>) -> String {
    argv0
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_PROGRAM_NAME)
        .to_string()
}

fn clamp_poll_timeout(timeout: Duration, interval: Duration) -> Duration {
    // status must still refresh with no client traffic
    timeout.min(interval / 4)
}
