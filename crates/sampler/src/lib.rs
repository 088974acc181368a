//! Real-Time Sampler
//!
//! Reads one raw sample per fine tick, reduces windows of samples through an
//! [`Accumulator`] and appends one [`ring_buffer::Reading`] every K ticks.

mod accumulator;
mod clock;
mod error;
mod sampler;
mod schedule;
mod source;

pub use accumulator::{
    Accumulator, AccumulatorSettings, BaselineRemoval, InputResolution, RmsAccumulator, ScanMode,
};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::SamplerError;
pub use sampler::{Sampler, SamplerConfig, SamplerHandle, SamplerStats, SamplerStatsSnapshot};
pub use schedule::{PeriodicSchedule, TickTiming};
pub use source::{AnalogSource, SineSource, SourceConfig};
