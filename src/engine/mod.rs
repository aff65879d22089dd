pub mod aggregate;
pub mod cycle;
pub mod overlay;
pub mod spike;
pub mod window;

pub use aggregate::{aggregate, ChartRow, TopicCounts};
pub use cycle::{EngineHandle, EngineParams, EngineSettings, PulseBundle, RefreshEngine};
pub use overlay::{align, Marker};
pub use spike::{spike_state, SpikeState, SpikeThresholds};
pub use window::{cutoff, cutoff_at};
