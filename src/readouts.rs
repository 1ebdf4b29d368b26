//! Auxiliary indicators: screen locker and sleep daemon

use std::fs;
use std::path::Path;

use crate::format::UNAVAILABLE;

/// Whether any process under `proc_root` has `comm` equal to `name`
pub fn process_running(proc_root: &Path, name: &str) -> Option<bool> {
    let entries = fs::read_dir(proc_root).ok()?;
    let found = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|pid| pid.bytes().all(|b| b.is_ascii_digit()))
        })
        .any(|entry| {
            fs::read_to_string(entry.path().join("comm"))
                .map(|comm| comm.trim_end() == name)
                .unwrap_or(false)
        });
    Some(found)
}

/// First line of the sleep status file, trimmed
pub fn sleep_status(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let line = text.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// `LCK:on`, `LCK:off` or `LCK:N/A`
pub fn lock_indicator(running: Option<bool>) -> String {
    match running {
        Some(true) => "LCK:on".into(),
        Some(false) => "LCK:off".into(),
        None => format!("LCK:{}", UNAVAILABLE),
    }
}

/// `SLP:<status>` or `SLP:N/A`
pub fn sleep_indicator(status: Option<&str>) -> String {
    format!("SLP:{}", status.unwrap_or(UNAVAILABLE))
}
