//! Windowed Reduction of Raw Samples

use serde::{Deserialize, Serialize};
use tracing::debug;

/// ADC resolution of the raw input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputResolution {
    Adc10Bit,
    Adc12Bit,
}

impl InputResolution {
    /// Largest raw count the ADC can report
    pub fn full_scale(self) -> i32 {
        match self {
            InputResolution::Adc10Bit => 1023,
            InputResolution::Adc12Bit => 4095,
        }
    }
}

/// Whether the DC component is removed before reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineRemoval {
    On,
    Off,
}

/// Whether acquisition continues after the first window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Continuous,
    Single,
}

/// Accumulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorSettings {
    /// Value of a full-scale input after reduction
    pub scale_factor: f32,
    /// Samples per reduction window
    pub window_size: usize,
    pub resolution: InputResolution,
    pub baseline_removal: BaselineRemoval,
    pub scan_mode: ScanMode,
}

impl Default for AccumulatorSettings {
    fn default() -> Self {
        Self {
            // 340V mains through a 5V -> 3.3V divider
            scale_factor: 340.0 * (5.0 / 3.3),
            window_size: 125,
            resolution: InputResolution::Adc12Bit,
            baseline_removal: BaselineRemoval::On,
            scan_mode: ScanMode::Continuous,
        }
    }
}

/// Reduces a stream of raw samples to one value per window.
///
/// The sampler only relies on this surface; how the value is computed is up
/// to the implementation.
pub trait Accumulator: Send {
    /// Apply settings and reset any partial window
    fn configure(&mut self, settings: AccumulatorSettings);

    /// Begin (or restart) acquisition
    fn start(&mut self);

    /// Absorb one raw sample
    fn update(&mut self, raw: i32);

    /// Finalize the most recent completed window into [`Accumulator::last_published`]
    fn publish(&mut self);

    /// Value produced by the last [`Accumulator::publish`]
    fn last_published(&self) -> f32;
}

/// True-RMS reduction over fixed windows
#[derive(Debug, Clone)]
pub struct RmsAccumulator {
    settings: AccumulatorSettings,
    acquiring: bool,
    count: usize,
    sum: f64,
    sum_squares: f64,
    /// Normalized RMS of the last completed window, not yet published
    completed: Option<f64>,
    published: f32,
}

impl RmsAccumulator {
    /// Create an accumulator with the given settings (not yet started)
    pub fn new(settings: AccumulatorSettings) -> Self {
        Self {
            settings,
            acquiring: false,
            count: 0,
            sum: 0.0,
            sum_squares: 0.0,
            completed: None,
            published: 0.0,
        }
    }

    /// Whether samples are currently being absorbed
    pub fn is_acquiring(&self) -> bool {
        self.acquiring
    }

    fn reset_window(&mut self) {
        self.count = 0;
        self.sum = 0.0;
        self.sum_squares = 0.0;
    }

    fn close_window(&mut self) {
        let n = self.count as f64;
        let mean = self.sum / n;
        let mean_square = self.sum_squares / n;
        let variance = match self.settings.baseline_removal {
            BaselineRemoval::On => mean_square - mean * mean,
            BaselineRemoval::Off => mean_square,
        };
        // Rounding can push a flat signal's variance just below zero
        self.completed = Some(variance.max(0.0).sqrt());
        self.reset_window();

        if self.settings.scan_mode == ScanMode::Single {
            self.acquiring = false;
        }
    }
}

impl Default for RmsAccumulator {
    fn default() -> Self {
        Self::new(AccumulatorSettings::default())
    }
}

impl Accumulator for RmsAccumulator {
    fn configure(&mut self, settings: AccumulatorSettings) {
        debug!("Configuring RMS accumulator: {:?}", settings);
        self.settings = settings;
        self.reset_window();
        self.completed = None;
    }

    fn start(&mut self) {
        self.reset_window();
        self.acquiring = true;
    }

    fn update(&mut self, raw: i32) {
        if !self.acquiring {
            return;
        }
        let full_scale = self.settings.resolution.full_scale();
        let x = f64::from(raw.clamp(0, full_scale)) / f64::from(full_scale);

        self.sum += x;
        self.sum_squares += x * x;
        self.count += 1;

        if self.count >= self.settings.window_size.max(1) {
            self.close_window();
        }
    }

    fn publish(&mut self) {
        if let Some(rms) = self.completed.take() {
            self.published = (rms * f64::from(self.settings.scale_factor)) as f32;
        }
    }

    fn last_published(&self) -> f32 {
        self.published
    }
}
