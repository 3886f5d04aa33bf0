//! Parameter definitions with physical units and documented semantics.
//!
//! All policy constants are extracted here with:
//! - Units (milliseconds, BPM, Hz, pixels)
//! - Documented ranges and meanings
//! - Serde defaults so a partial config file only overrides what it names

mod audio;
mod filter;
mod sync;
mod transport;
mod visual;

// Re-export all types
pub use audio::{audio_constants, AudioParams, RecordingConfig};
pub use filter::FilterParams;
pub use sync::{DropoutParams, SyncParams};
pub use transport::TransportParams;
pub use visual::{AnimationParams, ColorBands, SpatialParams};
