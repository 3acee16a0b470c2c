//! jitterbug: audio-reactive skeletal dancer animation core.
//!
//! The real-time pipeline from raw PCM to joint positions:
//!
//! ```text
//! PCM -> SpectralAnalyzer -> band magnitudes -> aggregate
//!     -> (bass, mid, treble) -> ControlBus -> SkeletonDancer -> joints
//! ```
//!
//! Everything here runs synchronously on the caller's animation thread;
//! audio capture and glyph rendering live outside the crate behind the
//! [`audio::SharedSampleBuffer`] and [`dancer::Canvas`] seams. Within a
//! frame the order is fixed: analyzer, aggregator, bus, dancer.
//!
//! ```no_run
//! use jitterbug::audio::{aggregate, SpectralAnalyzer, SpectralConfig};
//! use jitterbug::control::ControlBus;
//! use jitterbug::dancer::SkeletonDancer;
//!
//! # fn main() -> jitterbug::Result<()> {
//! let mut analyzer = SpectralAnalyzer::new(SpectralConfig::default())?;
//! let mut bus = ControlBus::new();
//! let mut dancer = SkeletonDancer::new(25, 13)?;
//!
//! // Per frame, with `samples` drained from the capture buffer:
//! # let samples: Vec<f32> = Vec::new();
//! # let dt = 1.0 / 60.0;
//! let bands = aggregate(analyzer.execute(&samples));
//! bus.update(bands.bass, bands.mid, bands.treble, dt);
//! let snap = bus.snapshot();
//! dancer.update_with_phase(snap.bass, snap.mid, snap.treble, dt, snap.beat_phase, snap.bpm);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod control;
pub mod dancer;
pub mod error;

pub use audio::{aggregate, FrequencyBands, SharedSampleBuffer, SpectralAnalyzer, SpectralConfig};
pub use control::{ControlBus, ControlBusConfig, ControlSnapshot, SmoothingPreset};
pub use dancer::{
    BodyBounds, Canvas, DancerConfig, MusicStyle, Pose, PoseCategory, PoseLibrary, SkeletonDancer,
};
pub use error::{Error, Result};
