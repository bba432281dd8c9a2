use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Lowest value on the gauge scale.
pub const DECIBEL_FLOOR: f32 = 0.0;
/// Highest value on the gauge scale.
pub const DECIBEL_CEILING: f32 = 60.0;

/// Full-scale amplitude of 16-bit PCM.
const PCM_FULL_SCALE: f64 = 32767.0;
/// Shift applied to dBFS so quiet rooms land near the bottom of the gauge.
const PCM_OFFSET_DB: f64 = 90.0;

/// Root-mean-square amplitude of a PCM buffer.
pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
    (sum_squares / samples.len() as f64).sqrt()
}

/// Decibel estimate of a PCM buffer on the 0–60 gauge scale.
///
/// `20 * log10(rms / 32767) + 90`, clamped. Buffers at or below one LSB of
/// RMS read as silence.
pub fn pcm_decibel(samples: &[i16]) -> f32 {
    let rms = rms(samples);
    if rms <= 1.0 {
        return DECIBEL_FLOOR;
    }
    let db = 20.0 * (rms / PCM_FULL_SCALE).log10() + PCM_OFFSET_DB;
    (db as f32).clamp(DECIBEL_FLOOR, DECIBEL_CEILING)
}

/// Rolling decibel readings with an optional retention limit.
#[derive(Debug, Clone, Default)]
pub struct DecibelMeter {
    readings: VecDeque<f32>,
    capacity: Option<usize>,
}

impl DecibelMeter {
    /// Keep at most `capacity` readings, or all of them when `None`.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            readings: VecDeque::with_capacity(capacity.unwrap_or(0)),
            capacity,
        }
    }

    /// Record a reading and return the new average.
    pub fn push(&mut self, reading: f32) -> f32 {
        self.readings.push_back(reading);
        if let Some(capacity) = self.capacity {
            while self.readings.len() > capacity {
                self.readings.pop_front();
            }
        }
        self.average()
    }

    /// Arithmetic mean of the retained readings.
    pub fn average(&self) -> f32 {
        if self.readings.is_empty() {
            return DECIBEL_FLOOR;
        }
        let sum: f64 = self.readings.iter().map(|&r| r as f64).sum();
        (sum / self.readings.len() as f64) as f32
    }
}

/// Result of a timed noise check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiseCheckOutcome {
    pub average_db: f32,
    /// True when the room is quiet enough to record.
    pub passed: bool,
}

impl NoiseCheckOutcome {
    pub fn evaluate(average_db: f32, max_average_db: f32) -> Self {
        Self {
            average_db,
            passed: average_db < max_average_db,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0, 0, 0]), 0.0);
        assert!((rms(&[3, -3, 3, -3]) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_silence_reads_zero() {
        assert_eq!(pcm_decibel(&[]), 0.0);
        assert_eq!(pcm_decibel(&[0; 441]), 0.0);
        assert_eq!(pcm_decibel(&[1, -1, 1, -1]), 0.0);
    }

    #[test]
    fn test_full_scale_clamps_to_ceiling() {
        let square: Vec<i16> = (0..441).map(|i| if i % 2 == 0 { 32767 } else { -32767 }).collect();
        assert_eq!(pcm_decibel(&square), DECIBEL_CEILING);
    }

    #[test]
    fn test_mid_scale() {
        // rms 33 is about -60 dBFS, i.e. ~30 on the gauge
        let db = pcm_decibel(&[33; 100]);
        assert!((db - 30.0).abs() < 0.2, "got {db}");
    }

    #[test]
    fn test_meter_average_is_bounded() {
        let mut meter = DecibelMeter::new(Some(100));
        for _ in 0..100 {
            meter.push(10.0);
        }
        for _ in 0..100 {
            meter.push(50.0);
        }
        assert!((meter.average() - 50.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_meter_unbounded() {
        let mut meter = DecibelMeter::new(None);
        assert_eq!(meter.average(), 0.0);
        meter.push(10.0);
        let avg = meter.push(20.0);
        assert!((avg - 15.0).abs() < f32::EPSILON);
        for _ in 0..200 {
            meter.push(15.0);
        }
        assert!((meter.average() - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_noise_check_outcome() {
        assert!(NoiseCheckOutcome::evaluate(35.0, 40.0).passed);
        assert!(!NoiseCheckOutcome::evaluate(40.0, 40.0).passed);
        assert!(!NoiseCheckOutcome::evaluate(45.0, 40.0).passed);
    }
}
