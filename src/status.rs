//! Status line assembly
//!
//! A [`StatusSnapshot`] is rebuilt from scratch every tick and never stored.

use std::collections::HashSet;
use std::fmt::{self, Write as _};
use std::path::PathBuf;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::format::{self, PERCENT_WIDTH, UNAVAILABLE};
use crate::metrics::{MetricsProvider, Volume};
use crate::readouts;

/// One rendered status line, split by segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub cpu: String,
    pub memory: String,
    pub volume: String,
    pub lock: String,
    pub sleep: String,
    pub clock: String,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.cpu, self.memory, self.volume, self.lock, self.sleep, self.clock
        )
    }
}

/// Tracks which collaborators are failing so each outage logs once
#[derive(Debug, Default)]
pub struct Availability {
    failing: HashSet<&'static str>,
}

impl Availability {
    /// Record the state of `source` this tick
    pub fn observe(&mut self, source: &'static str, available: bool, detail: &dyn fmt::Display) {
        if available {
            if self.failing.remove(source) {
                info!("{} available again", source);
            }
        } else if self.failing.insert(source) {
            warn!("{} unavailable: {}", source, detail);
        } else {
            debug!("{} still unavailable: {}", source, detail);
        }
    }

    /// Whether `source` failed on its last observation
    pub fn is_failing(&self, source: &str) -> bool {
        self.failing.contains(source)
    }
}

/// Builds snapshots from a metrics provider and the auxiliary readouts
pub struct StatusCollector<P> {
    provider: P,
    bar_width: usize,
    proc_root: PathBuf,
    lock_process: String,
    sleep_status_file: PathBuf,
    clock_format: String,
    availability: Availability,
}

impl<P: MetricsProvider> StatusCollector<P> {
    pub fn new(provider: P, config: &Config) -> Self {
        Self {
            provider,
            bar_width: config.bar_width,
            proc_root: config.proc_root.clone(),
            lock_process: config.lock_process.clone(),
            sleep_status_file: config.sleep_status_file.clone(),
            clock_format: config.clock_format.clone(),
            availability: Availability::default(),
        }
    }

    /// Sample every source and render the segments
    pub fn snapshot(&mut self) -> StatusSnapshot {
        let cpu = self
            .provider
            .cpu_loads()
            .and_then(|loads| format::cpu_average(&loads))
            .map(format::round1);
        self.availability.observe("cpu", cpu.is_some(), &"no per-core figures");

        let memory = self.provider.memory_percent().map(format::round1);
        self.availability.observe("memory", memory.is_some(), &"no meminfo");

        let volume = self.provider.volume();
        self.availability.observe("volume", volume.is_some(), &"amixer gave no reading");

        let lock = readouts::process_running(&self.proc_root, &self.lock_process);
        let sleep = readouts::sleep_status(&self.sleep_status_file);

        StatusSnapshot {
            cpu: format::metric_field("CPU", cpu, self.bar_width),
            memory: format::metric_field("MEM", memory, self.bar_width),
            volume: volume_field(volume, self.bar_width),
            lock: readouts::lock_indicator(lock),
            sleep: readouts::sleep_indicator(sleep.as_deref()),
            clock: self.clock(),
        }
    }

    fn clock(&self) -> String {
        let mut out = String::new();
        // an invalid strftime item surfaces as fmt::Error, not a panic
        if write!(out, "{}", Local::now().format(&self.clock_format)).is_err() {
            return UNAVAILABLE.to_string();
        }
        out
    }

    /// Collaborator availability as of the last snapshot
    pub fn availability(&self) -> &Availability {
        &self.availability
    }
}

fn volume_field(volume: Option<Volume>, width: usize) -> String {
    match volume {
        Some(Volume {
            percent,
            muted: true,
        }) => format!(
            "VOL {:>w$}{}",
            "mute",
            format::progress_bar(f32::from(percent), width),
            w = PERCENT_WIDTH
        ),
        Some(Volume { percent, .. }) => format::metric_field("VOL", Some(f32::from(percent)), width),
        None => format::metric_field("VOL", None, width),
    }
}
