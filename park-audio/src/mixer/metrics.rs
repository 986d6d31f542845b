//! Mixer health monitoring

use std::time::{Duration, Instant};

use tracing::debug;

/// Counters gathered by the mix tick.
///
/// Per-interval counters reset each time they are logged; `curve_updates`
/// and `total_ticks` accumulate for the lifetime of the mixer.
#[derive(Debug, Clone)]
pub struct MixerMetrics {
    /// Ticks in the current interval
    pub ticks: u64,
    /// Output frames produced in the current interval
    pub frames_mixed: u64,
    /// Channel mixes performed in the current interval
    pub channels_mixed: u64,
    /// Channels evicted in the current interval
    pub channels_evicted: u64,
    /// Channels skipped after a conversion or resample failure
    pub dsp_skips: u64,
    /// Live channels after the most recent tick
    pub live_channels: usize,
    /// Average tick time over the current interval (microseconds)
    pub avg_tick_time_us: f64,
    /// Times the category volume curves were recomputed
    pub curve_updates: u64,
    /// Ticks since creation
    pub total_ticks: u64,
    last_log_time: Instant,
}

impl Default for MixerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MixerMetrics {
    pub fn new() -> Self {
        Self {
            ticks: 0,
            frames_mixed: 0,
            channels_mixed: 0,
            channels_evicted: 0,
            dsp_skips: 0,
            live_channels: 0,
            avg_tick_time_us: 0.0,
            curve_updates: 0,
            total_ticks: 0,
            last_log_time: Instant::now(),
        }
    }

    /// Record one finished tick
    pub(crate) fn record_tick(&mut self, frames: usize, live_channels: usize, elapsed: Duration) {
        self.ticks += 1;
        self.total_ticks += 1;
        self.frames_mixed += frames as u64;
        self.live_channels = live_channels;

        let us = elapsed.as_secs_f64() * 1_000_000.0;
        self.avg_tick_time_us += (us - self.avg_tick_time_us) / self.ticks as f64;
    }

    /// Log metrics if enough time has passed (every 1 second)
    pub fn maybe_log(&mut self) {
        if self.last_log_time.elapsed().as_secs() < 1 {
            return;
        }

        debug!(
            "MIXER METRICS [tid={:?}]: ticks={}, frames={}, live={}, mixed={}, evicted={}, \
             dsp_skips={}, avg_tick={:.2}μs",
            std::thread::current().id(),
            self.ticks,
            self.frames_mixed,
            self.live_channels,
            self.channels_mixed,
            self.channels_evicted,
            self.dsp_skips,
            self.avg_tick_time_us
        );

        // Reset counters for next interval (show per-second rates)
        self.ticks = 0;
        self.frames_mixed = 0;
        self.channels_mixed = 0;
        self.channels_evicted = 0;
        self.dsp_skips = 0;
        self.avg_tick_time_us = 0.0;
        self.last_log_time = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tick_averages() {
        let mut metrics = MixerMetrics::new();
        metrics.record_tick(100, 3, Duration::from_micros(10));
        metrics.record_tick(100, 2, Duration::from_micros(30));
        assert_eq!(metrics.ticks, 2);
        assert_eq!(metrics.total_ticks, 2);
        assert_eq!(metrics.frames_mixed, 200);
        assert_eq!(metrics.live_channels, 2);
        assert!((metrics.avg_tick_time_us - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_maybe_log_waits_for_interval() {
        let mut metrics = MixerMetrics::new();
        metrics.record_tick(10, 1, Duration::from_micros(5));
        metrics.maybe_log();
        assert_eq!(metrics.ticks, 1);
    }
}
