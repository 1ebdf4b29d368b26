//! Metrics provider: CPU, memory and volume readings
//!
//! Every reading is an `Option`; `None` means the source was unavailable
//! this tick and the field renders as a marker instead of failing the tick.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// Volume and mute state of a mixer control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume {
    pub percent: u8,
    pub muted: bool,
}

/// Source of point-in-time system metrics
pub trait MetricsProvider {
    /// Per-core utilisation percentages since the previous call
    fn cpu_loads(&mut self) -> Option<Vec<f32>>;

    /// Used memory as a percentage of total
    fn memory_percent(&mut self) -> Option<f32>;

    /// Volume of the configured mixer control
    fn volume(&mut self) -> Option<Volume>;
}

/// Jiffy counters of one `cpuN` line in /proc/stat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    user: u64,
    nice: u64,
    system: u64,
    idle: u64,
    iowait: u64,
    irq: u64,
    softirq: u64,
}

impl CpuTimes {
    fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle + self.iowait + self.irq + self.softirq
    }

    fn active(&self) -> u64 {
        self.user + self.nice + self.system + self.irq + self.softirq
    }

    /// Utilisation between `prev` and `self`
    fn usage_since(&self, prev: &CpuTimes) -> f32 {
        let total = self.total().saturating_sub(prev.total());
        let active = self.active().saturating_sub(prev.active());
        if total == 0 {
            0.0
        } else {
            (active as f32 / total as f32) * 100.0
        }
    }
}

/// Per-core counters from /proc/stat text; the aggregate `cpu` line is skipped
pub fn parse_proc_stat(text: &str) -> Vec<CpuTimes> {
    text.lines()
        .filter(|line| line.starts_with("cpu") && !line.starts_with("cpu "))
        .filter_map(|line| {
            let fields: Vec<u64> = line
                .split_whitespace()
                .skip(1)
                .map(|f| f.parse().unwrap_or(0))
                .collect();
            if fields.len() < 7 {
                return None;
            }
            Some(CpuTimes {
                user: fields[0],
                nice: fields[1],
                system: fields[2],
                idle: fields[3],
                iowait: fields[4],
                irq: fields[5],
                softirq: fields[6],
            })
        })
        .collect()
}

/// Used memory percentage from /proc/meminfo text
pub fn parse_meminfo(text: &str) -> Option<f32> {
    let field = |name: &str| -> Option<u64> {
        text.lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|value| value.parse().ok())
    };

    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available);
    Some((used as f64 / total as f64 * 100.0) as f32)
}

/// Volume from `amixer get` output
///
/// Uses the first channel line carrying a `[NN%]` figure; `[off]` on that
/// line means muted.
pub fn parse_amixer(output: &str) -> Option<Volume> {
    output.lines().find_map(|line| {
        let start = line.find('[')?;
        let rest = &line[start + 1..];
        let end = rest.find("%]")?;
        let percent = rest[..end].parse::<u8>().ok()?;
        Some(Volume {
            percent: percent.min(100),
            muted: line.contains("[off]"),
        })
    })
}

/// Metrics read from procfs and amixer
#[derive(Debug)]
pub struct ProcMetrics {
    proc_root: PathBuf,
    volume_device: String,
    prev_cpu: Vec<CpuTimes>,
}

impl ProcMetrics {
    pub fn new(proc_root: &Path, volume_device: &str) -> Self {
        Self {
            proc_root: proc_root.to_path_buf(),
            volume_device: volume_device.to_string(),
            prev_cpu: Vec::new(),
        }
    }

    fn read_proc(&self, name: &str) -> Option<String> {
        let path = self.proc_root.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("Cannot read {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl MetricsProvider for ProcMetrics {
    fn cpu_loads(&mut self) -> Option<Vec<f32>> {
        let curr = parse_proc_stat(&self.read_proc("stat")?);
        if curr.is_empty() {
            return None;
        }

        // first call (or hotplug) measures since boot
        if self.prev_cpu.len() != curr.len() {
            self.prev_cpu = vec![CpuTimes::default(); curr.len()];
        }

        let loads = curr
            .iter()
            .zip(&self.prev_cpu)
            .map(|(now, prev)| now.usage_since(prev))
            .collect();
        self.prev_cpu = curr;
        Some(loads)
    }

    fn memory_percent(&mut self) -> Option<f32> {
        parse_meminfo(&self.read_proc("meminfo")?)
    }

    fn volume(&mut self) -> Option<Volume> {
        let output = Command::new("amixer")
            .arg("get")
            .arg(&self.volume_device)
            .output();
        match output {
            Ok(out) if out.status.success() => parse_amixer(&String::from_utf8_lossy(&out.stdout)),
            Ok(out) => {
                debug!("amixer exited with {}", out.status);
                None
            }
            Err(e) => {
                debug!("Cannot run amixer: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STAT_T0: &str = "\
cpu  200 0 100 700 0 0 0 0 0 0
cpu0 100 0 50 350 0 0 0 0 0 0
cpu1 100 0 50 350 0 0 0 0 0 0
intr 12345
ctxt 678
";

    const STAT_T1: &str = "\
cpu  400 0 200 1400 0 0 0 0 0 0
cpu0 190 0 60 450 0 0 0 0 0 0
cpu1 110 0 50 440 0 0 0 0 0 0
intr 12399
";

    const MEMINFO: &str = "\
MemTotal:       16000000 kB
MemFree:         2000000 kB
MemAvailable:    4000000 kB
Buffers:          500000 kB
";

    const AMIXER_ON: &str = "\
Simple mixer control 'Master',0
  Capabilities: pvolume pswitch pswitch-joined
  Playback channels: Front Left - Front Right
  Limits: Playback 0 - 65536
  Mono:
  Front Left: Playback 49152 [75%] [on]
  Front Right: Playback 49152 [75%] [on]
";

    #[test]
    fn test_parse_proc_stat_skips_aggregate() {
        let cores = parse_proc_stat(STAT_T0);
        assert_eq!(cores.len(), 2);
        assert_eq!(cores[0].total(), 500);
        assert_eq!(cores[0].active(), 150);
    }

    #[test]
    fn test_cpu_loads_use_deltas() {
        let dir = TempDir::new().unwrap();
        let mut metrics = ProcMetrics::new(dir.path(), "Master");

        fs::write(dir.path().join("stat"), STAT_T0).unwrap();
        let since_boot = metrics.cpu_loads().unwrap();
        assert_eq!(since_boot, vec![30.0, 30.0]);

        fs::write(dir.path().join("stat"), STAT_T1).unwrap();
        let loads = metrics.cpu_loads().unwrap();
        // cpu0: 100 active of 200; cpu1: 10 active of 100
        assert_eq!(loads, vec![50.0, 10.0]);
    }

    #[test]
    fn test_cpu_loads_unavailable_without_procfs() {
        let dir = TempDir::new().unwrap();
        let mut metrics = ProcMetrics::new(&dir.path().join("absent"), "Master");
        assert_eq!(metrics.cpu_loads(), None);
        assert_eq!(metrics.memory_percent(), None);
    }

    #[test]
    fn test_parse_meminfo() {
        assert_eq!(parse_meminfo(MEMINFO), Some(75.0));
        assert_eq!(parse_meminfo("MemTotal: 100 kB\n"), None);
        assert_eq!(parse_meminfo("MemTotal: 0 kB\nMemAvailable: 0 kB\n"), None);
    }

    #[test]
    fn test_parse_amixer() {
        assert_eq!(
            parse_amixer(AMIXER_ON),
            Some(Volume {
                percent: 75,
                muted: false
            })
        );

        let muted = AMIXER_ON.replace("[on]", "[off]");
        assert_eq!(parse_amixer(&muted).map(|v| v.muted), Some(true));

        assert_eq!(parse_amixer("amixer: Unable to find simple control\n"), None);
    }
}
