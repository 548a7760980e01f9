//! Parser for the engine's `-progress` key/value stream.
//!
//! The engine writes blocks of `key=value` lines, each terminated by a
//! `progress=continue` or `progress=end` line:
//!
//! ```text
//! frame=250
//! out_time_us=10000000
//! out_time=00:00:10.000000
//! speed=2.01x
//! progress=continue
//! ```
//!
//! Unrecognized keys and malformed values are ignored.

use std::time::Duration;

use serde::Serialize;

/// State accumulated from one progress block.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSample {
    /// Media time written so far, in seconds.
    pub out_time_secs: f64,
    /// Encoding speed relative to real time.
    pub speed: Option<f64>,
    pub frame: Option<u64>,
    /// True for the final `progress=end` block.
    pub finished: bool,
}

/// Line-oriented parser; emits a sample at each block boundary.
#[derive(Debug, Default)]
pub struct ProgressParser {
    out_time_secs: Option<f64>,
    speed: Option<f64>,
    frame: Option<u64>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns a sample when the line closes a block.
    pub fn feed(&mut self, line: &str) -> Option<ProgressSample> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key.trim() {
            // `out_time_ms` is also in microseconds.
            "out_time_us" | "out_time_ms" => {
                if let Some(secs) = value
                    .parse::<i64>()
                    .ok()
                    .filter(|us| *us >= 0)
                    .map(|us| us as f64 / 1_000_000.0)
                {
                    self.out_time_secs = Some(secs);
                }
            }
            "out_time" => {
                if let Some(secs) = parse_clock_time(value) {
                    self.out_time_secs = Some(secs);
                }
            }
            "speed" => {
                self.speed = value
                    .trim_end_matches('x')
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|s| s.is_finite() && *s >= 0.0);
            }
            "frame" => {
                if let Ok(frame) = value.parse::<u64>() {
                    self.frame = Some(frame);
                }
            }
            "progress" => {
                return Some(ProgressSample {
                    out_time_secs: self.out_time_secs.unwrap_or(0.0),
                    speed: self.speed,
                    frame: self.frame,
                    finished: value == "end",
                });
            }
            _ => {}
        }
        None
    }
}

/// Parse `HH:MM:SS[.frac]` into seconds.
pub fn parse_clock_time(text: &str) -> Option<f64> {
    let mut parts = text.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some((hours * 3600 + minutes * 60) as f64 + seconds)
}

/// A caller-visible progress update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Completed fraction in `[0, 1]`, never decreasing within a job.
    pub ratio: f64,
    pub out_time_secs: f64,
    pub speed: Option<f64>,
    /// Estimated time remaining, when the ratio is known.
    pub eta_secs: Option<f64>,
}

/// Turns samples into monotonic progress events.
#[derive(Debug)]
pub struct ProgressTracker {
    total_secs: Option<f64>,
    last_ratio: f64,
    last_out_time: f64,
}

impl ProgressTracker {
    /// `expected` is the media duration used as the denominator; without it
    /// the ratio stays at zero until the job finishes.
    pub fn new(expected: Option<Duration>) -> Self {
        Self {
            total_secs: expected
                .map(|d| d.as_secs_f64())
                .filter(|secs| *secs > 0.0),
            last_ratio: 0.0,
            last_out_time: 0.0,
        }
    }

    pub fn ratio(&self) -> f64 {
        self.last_ratio
    }

    pub fn update(&mut self, sample: &ProgressSample, elapsed: Duration) -> ProgressEvent {
        let raw = if sample.finished {
            1.0
        } else {
            match self.total_secs {
                Some(total) => (sample.out_time_secs / total).clamp(0.0, 1.0),
                None => 0.0,
            }
        };
        self.last_ratio = self.last_ratio.max(raw);
        self.last_out_time = self.last_out_time.max(sample.out_time_secs);

        let elapsed = elapsed.as_secs_f64();
        let eta_secs = (self.last_ratio > 0.0 && self.last_ratio < 1.0)
            .then(|| (elapsed / self.last_ratio - elapsed).max(0.0));

        ProgressEvent {
            ratio: self.last_ratio,
            out_time_secs: self.last_out_time,
            speed: sample.speed,
            eta_secs,
        }
    }

    /// The closing 1.0 event, unless one was already produced.
    pub fn finish(&mut self) -> Option<ProgressEvent> {
        if self.last_ratio >= 1.0 {
            return None;
        }
        self.last_ratio = 1.0;
        Some(ProgressEvent {
            ratio: 1.0,
            out_time_secs: self.last_out_time,
            speed: None,
            eta_secs: Some(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut ProgressParser, text: &str) -> Vec<ProgressSample> {
        text.lines().filter_map(|line| parser.feed(line)).collect()
    }

    #[test]
    fn test_block_boundaries() {
        let mut parser = ProgressParser::new();
        let samples = feed_all(
            &mut parser,
            "frame=10\nout_time_us=400000\nspeed=1.5x\nprogress=continue\n\
             frame=20\nout_time_ms=800000\nspeed=N/A\nprogress=end\n",
        );
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].out_time_secs, 0.4);
        assert_eq!(samples[0].speed, Some(1.5));
        assert_eq!(samples[0].frame, Some(10));
        assert!(!samples[0].finished);
        assert_eq!(samples[1].out_time_secs, 0.8);
        assert_eq!(samples[1].speed, None);
        assert!(samples[1].finished);
    }

    #[test]
    fn test_ignores_noise_and_bad_values() {
        let mut parser = ProgressParser::new();
        let samples = feed_all(
            &mut parser,
            "garbage line\nout_time_us=N/A\nout_time=-00:00:00.000000\nbitrate=N/A\nprogress=continue\n",
        );
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].out_time_secs, 0.0);
    }

    #[test]
    fn test_clock_time_parsing() {
        assert_eq!(parse_clock_time("01:02:03.5"), Some(3723.5));
        assert_eq!(parse_clock_time("00:00:10.000000"), Some(10.0));
        assert_eq!(parse_clock_time("00:61:00"), None);
        assert_eq!(parse_clock_time("N/A"), None);
    }

    #[test]
    fn test_tracker_is_monotonic_and_clamped() {
        let mut tracker = ProgressTracker::new(Some(Duration::from_secs(10)));
        let sample = |secs: f64| ProgressSample {
            out_time_secs: secs,
            speed: None,
            frame: None,
            finished: false,
        };
        let elapsed = Duration::from_secs(1);

        assert_eq!(tracker.update(&sample(5.0), elapsed).ratio, 0.5);
        assert_eq!(tracker.update(&sample(3.0), elapsed).ratio, 0.5);
        assert_eq!(tracker.update(&sample(25.0), elapsed).ratio, 1.0);
        assert!(tracker.finish().is_none());
    }

    #[test]
    fn test_tracker_without_duration_finishes_at_one() {
        let mut tracker = ProgressTracker::new(None);
        let event = tracker.update(
            &ProgressSample {
                out_time_secs: 4.0,
                speed: Some(2.0),
                frame: None,
                finished: false,
            },
            Duration::from_secs(2),
        );
        assert_eq!(event.ratio, 0.0);
        assert_eq!(event.eta_secs, None);
        assert_eq!(tracker.finish().unwrap().ratio, 1.0);
        assert!(tracker.finish().is_none());
    }

    #[test]
    fn test_eta_estimate() {
        let mut tracker = ProgressTracker::new(Some(Duration::from_secs(100)));
        let event = tracker.update(
            &ProgressSample {
                out_time_secs: 25.0,
                speed: None,
                frame: None,
                finished: false,
            },
            Duration::from_secs(10),
        );
        assert_eq!(event.eta_secs, Some(30.0));
    }
}
