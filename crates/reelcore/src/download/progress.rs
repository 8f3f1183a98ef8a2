//! yt-dlp progress parsing and edit throttling

use std::time::{Duration, Instant};

/// One progress sample parsed from yt-dlp output
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    pub percent: u8,
    pub speed_bytes_sec: Option<f64>,
    pub eta_seconds: Option<u64>,
    pub current_size: Option<u64>,
    pub total_size: Option<u64>,
    /// 1-based index of the stream being fetched (video first, then audio)
    pub part: u8,
}

/// Parses progress from a yt-dlp output line.
///
/// Example: "[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10"
/// Estimated totals ("of ~  97.45MiB") and "Unknown" speed/ETA are accepted.
pub fn parse_progress(line: &str) -> Option<ProgressInfo> {
    if !line.contains("[download]") || !line.contains('%') {
        return None;
    }

    let mut percent = None;
    let mut speed_bytes_sec = None;
    let mut eta_seconds = None;
    let mut total_size = None;

    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if percent.is_none() && part.ends_with('%') {
            if let Ok(p) = part.trim_end_matches('%').parse::<f32>() {
                // Clamp so that garbage never jumps the bar to 100%
                percent = Some(p.clamp(0.0, 100.0) as u8);
            }
        }

        match *part {
            "of" => {
                let mut next = parts.get(i + 1).copied();
                if next == Some("~") {
                    next = parts.get(i + 2).copied();
                }
                total_size = next.and_then(|s| parse_size(s.trim_start_matches('~')));
            }
            "at" => {
                speed_bytes_sec = parts.get(i + 1).and_then(|s| parse_size(s)).map(|b| b as f64);
            }
            "ETA" => {
                eta_seconds = parts.get(i + 1).and_then(|s| parse_eta(s));
            }
            _ => {}
        }
    }

    let percent = percent?;
    let current_size = total_size.map(|total| (total as f64 * (percent as f64 / 100.0)) as u64);

    Some(ProgressInfo {
        percent,
        speed_bytes_sec,
        eta_seconds,
        current_size,
        total_size,
        part: 1,
    })
}

/// Parses a size like "10.00MiB", "500.00KiB/s" or "812B".
fn parse_size(size_str: &str) -> Option<u64> {
    let size_str = size_str.trim_end_matches("/s");
    let units: [(&str, f64); 5] = [
        ("TiB", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("GiB", 1024.0 * 1024.0 * 1024.0),
        ("MiB", 1024.0 * 1024.0),
        ("KiB", 1024.0),
        ("B", 1.0),
    ];
    for (suffix, factor) in units {
        if let Some(number) = size_str.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|n| (n * factor) as u64);
        }
    }
    None
}

/// Parses an ETA like "00:10", "1:23" or "01:02:03".
fn parse_eta(eta_str: &str) -> Option<u64> {
    let mut total = 0u64;
    let mut fields = 0;
    for field in eta_str.split(':') {
        total = total * 60 + field.parse::<u64>().ok()?;
        fields += 1;
    }
    (2..=3).contains(&fields).then_some(total)
}

/// Decides which progress samples turn into a status message edit.
///
/// Edits are at least `min_interval` apart, never move backwards within a
/// stream, and need at least `min_step` points of progress. A new stream
/// (`part` changes) starts counting from zero again.
#[derive(Debug)]
pub struct ProgressThrottle {
    min_interval: Duration,
    min_step: u8,
    last_emit: Option<Instant>,
    last_percent: u8,
    last_part: u8,
}

impl ProgressThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            min_step: 1,
            last_emit: None,
            last_percent: 0,
            last_part: 1,
        }
    }

    /// Throttle that treats `now` as the moment of the last edit
    /// (the status message was just sent).
    pub fn starting_at(min_interval: Duration, now: Instant) -> Self {
        Self {
            last_emit: Some(now),
            ..Self::new(min_interval)
        }
    }

    pub fn with_min_step(mut self, min_step: u8) -> Self {
        self.min_step = min_step;
        self
    }

    /// Returns the sample to display if an edit is due at `now`.
    pub fn admit(&mut self, info: &ProgressInfo, now: Instant) -> Option<ProgressInfo> {
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.min_interval {
                return None;
            }
        }

        let new_part = info.part != self.last_part;
        let percent = if new_part {
            info.percent
        } else {
            info.percent.max(self.last_percent)
        };

        if !new_part && self.last_emit.is_some() && percent.saturating_sub(self.last_percent) < self.min_step {
            return None;
        }

        self.last_emit = Some(now);
        self.last_percent = percent;
        self.last_part = info.part;

        Some(ProgressInfo {
            percent,
            ..info.clone()
        })
    }
}
