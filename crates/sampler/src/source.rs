//! Raw Analog Input

use crate::InputResolution;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::time::Duration;

/// Source of raw ADC counts, read once per fine tick
pub trait AnalogSource: Send {
    fn read(&mut self) -> i32;
}

impl<F> AnalogSource for F
where
    F: FnMut() -> i32 + Send,
{
    fn read(&mut self) -> i32 {
        self()
    }
}

/// Synthetic waveform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Signal frequency in Hz
    pub frequency_hz: f64,
    /// Peak amplitude in ADC counts
    pub amplitude: f64,
    /// DC offset in ADC counts
    pub offset: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 50.0,
            amplitude: 1200.0,
            offset: 2048.0,
        }
    }
}

/// Deterministic sine generator standing in for an ADC pin
#[derive(Debug, Clone)]
pub struct SineSource {
    config: SourceConfig,
    full_scale: i32,
    /// Phase advance per sample, in radians
    step: f64,
    phase: f64,
}

impl SineSource {
    /// Create a generator sampled once per `sample_period`
    pub fn new(config: SourceConfig, resolution: InputResolution, sample_period: Duration) -> Self {
        let step = TAU * config.frequency_hz * sample_period.as_secs_f64();
        Self {
            config,
            full_scale: resolution.full_scale(),
            step,
            phase: 0.0,
        }
    }
}

impl AnalogSource for SineSource {
    fn read(&mut self) -> i32 {
        let value = self.config.offset + self.config.amplitude * self.phase.sin();
        self.phase = (self.phase + self.step) % TAU;
        (value.round() as i32).clamp(0, self.full_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_stays_in_range() {
        let mut source = SineSource::new(
            SourceConfig {
                amplitude: 5000.0,
                ..Default::default()
            },
            InputResolution::Adc12Bit,
            Duration::from_micros(400),
        );
        for _ in 0..1000 {
            let raw = source.read();
            assert!((0..=4095).contains(&raw));
        }
    }

    #[test]
    fn test_sine_period() {
        // 50Hz at 400us per sample: 50 samples per cycle
        let mut source = SineSource::new(
            SourceConfig::default(),
            InputResolution::Adc12Bit,
            Duration::from_micros(400),
        );
        let first: Vec<i32> = (0..50).map(|_| source.read()).collect();
        let second: Vec<i32> = (0..50).map(|_| source.read()).collect();
        assert_eq!(first[0], 2048);
        for (a, b) in first.iter().zip(&second) {
            assert!((a - b).abs() <= 1);
        }
    }

    #[test]
    fn test_closure_source() {
        let mut n = 0;
        let mut source = move || {
            n += 1;
            n
        };
        assert_eq!(AnalogSource::read(&mut source), 1);
        assert_eq!(AnalogSource::read(&mut source), 2);
    }
}
