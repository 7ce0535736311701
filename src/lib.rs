//! Streaming dual-threshold spike detection for multi-channel extracellular
//! recordings.
//!
//! Filtered voltage goes in one chunk at a time; spike events come out, each
//! anchored at a (sub-)sample time with a per-channel confidence mask and a
//! waveform snippet for downstream clustering. Detection finds connected
//! components of weak-threshold crossings over the joint (time x channel)
//! graph, keeps the ones seeded by a strong crossing, and reconciles
//! components that straddle chunk boundaries so every physical spike is
//! emitted exactly once — identical to what a single whole-recording pass
//! would produce.

pub mod config;
pub mod detect;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod probe;
pub mod reconcile;
pub mod resolve;
pub mod source;
pub mod threshold;

pub use config::{EdgePolicy, Polarity, RunConfig};
pub use detect::{detect_components, Cell, Component};
pub use error::{ConfigError, DetectError};
pub use filter::{FilterChain, FilteredRecording};
pub use pipeline::{run_group, DetectionPipeline, MemorySink, RunSummary, SpikeSink};
pub use probe::{ChannelGroup, ChannelGroupSpec, Probe, ProbeSpec};
pub use reconcile::Reconciler;
pub use resolve::{resolve_spike, SpikeEvent};
pub use source::{excerpt_ranges, ChunkSource, FilteredChunk, MemorySource};
pub use threshold::{estimate_thresholds, Thresholds};
