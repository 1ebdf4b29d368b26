//! Pure formatting helpers for metric values
//!
//! No state and no I/O: every function maps numbers to strings.

/// Glyph for a filled bar slot
const FILLED: char = '|';

/// Glyph for an empty bar slot
const EMPTY: char = ' ';

/// Glyph used in every slot when the metric is unavailable
const UNKNOWN: char = '?';

/// Marker rendered in place of an unavailable value
pub const UNAVAILABLE: &str = "N/A";

/// Width of a right-aligned percentage field
pub const PERCENT_WIDTH: usize = 5;

/// ASCII progress bar, e.g. `[||||        ]`
///
/// Slot `i` (0-based) is filled when its lower edge `i * 100 / width` lies
/// strictly below `percent`, so any non-zero load lights at least one slot
/// and 50% of a 12-slot bar fills exactly 6.
pub fn progress_bar(percent: f32, width: usize) -> String {
    let percent = f64::from(percent.clamp(0.0, 100.0));
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    for slot in 0..width {
        // compare in integer-scaled space to avoid drift at slot edges
        let lower_edge = (slot * 100) as f64;
        bar.push(if lower_edge < percent * width as f64 {
            FILLED
        } else {
            EMPTY
        });
    }
    bar.push(']');
    bar
}

/// Bar of `?` glyphs for an unavailable metric
pub fn unknown_bar(width: usize) -> String {
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.extend(std::iter::repeat(UNKNOWN).take(width));
    bar.push(']');
    bar
}

/// Mean of per-core loads; `None` for an empty set
pub fn cpu_average(loads: &[f32]) -> Option<f32> {
    if loads.is_empty() {
        return None;
    }
    Some(loads.iter().sum::<f32>() / loads.len() as f32)
}

/// Round to one decimal place
pub fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Right-aligned one-decimal percentage, or the unavailable marker
pub fn pad_percent(value: Option<f32>) -> String {
    match value {
        Some(v) => format!("{:>width$.1}", v, width = PERCENT_WIDTH),
        None => format!("{:>width$}", UNAVAILABLE, width = PERCENT_WIDTH),
    }
}

/// `LABEL pct[bar]`, degrading to the unavailable marker
pub fn metric_field(label: &str, value: Option<f32>, width: usize) -> String {
    let bar = match value {
        Some(v) => progress_bar(v, width),
        None => unknown_bar(width),
    };
    format!("{} {}{}", label, pad_percent(value), bar)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(bar: &str) -> usize {
        bar.chars().filter(|&c| c == FILLED).count()
    }

    #[test]
    fn test_progress_bar_empty_at_zero() {
        assert_eq!(progress_bar(0.0, 12), "[            ]");
    }

    #[test]
    fn test_progress_bar_full_at_hundred() {
        assert_eq!(progress_bar(100.0, 12), "[||||||||||||]");
    }

    #[test]
    fn test_progress_bar_half() {
        let bar = progress_bar(50.0, 12);
        assert_eq!(filled(&bar), 6);
        assert_eq!(bar, "[||||||      ]");
    }

    #[test]
    fn test_progress_bar_rounds_partial_slots_up() {
        // 100 / 12 = 8.33 per slot
        assert_eq!(filled(&progress_bar(0.1, 12)), 1);
        assert_eq!(filled(&progress_bar(8.33, 12)), 1);
        assert_eq!(filled(&progress_bar(8.34, 12)), 2);
        assert_eq!(filled(&progress_bar(99.9, 12)), 12);
    }

    #[test]
    fn test_progress_bar_clamps_out_of_range() {
        assert_eq!(progress_bar(250.0, 4), "[||||]");
        assert_eq!(progress_bar(-3.0, 4), "[    ]");
        assert_eq!(progress_bar(f32::NAN, 4), "[    ]");
    }

    #[test]
    fn test_progress_bar_zero_width() {
        assert_eq!(progress_bar(50.0, 0), "[]");
    }

    #[test]
    fn test_cpu_average() {
        assert_eq!(cpu_average(&[10.0, 20.0, 30.0, 40.0]), Some(25.0));
        assert_eq!(cpu_average(&[]), None);
    }

    #[test]
    fn test_pad_percent() {
        assert_eq!(pad_percent(Some(7.24)), "  7.2");
        assert_eq!(pad_percent(Some(100.0)), "100.0");
        assert_eq!(pad_percent(None), "  N/A");
    }

    #[test]
    fn test_metric_field_keeps_width_when_unavailable() {
        let ok = metric_field("CPU", Some(42.0), 12);
        let missing = metric_field("CPU", None, 12);
        assert_eq!(ok.len(), missing.len());
        assert_eq!(missing, "CPU   N/A[????????????]");
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(12.345), 12.3);
        assert_eq!(round1(0.06), 0.1);
    }
}
