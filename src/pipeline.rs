use log::{debug, info};

use crate::config::RunConfig;
use crate::detect::detect_components;
use crate::error::DetectError;
use crate::probe::{ChannelGroup, Probe};
use crate::reconcile::Reconciler;
use crate::resolve::{resolve_spike, SpikeEvent};
use crate::source::ChunkSource;
use crate::threshold::{estimate_thresholds, Thresholds};

/// Consumer of resolved spikes. The pipeline calls `emit` exactly once per
/// physical spike, ordered up to one chunk's worth of lookahead.
pub trait SpikeSink {
    fn emit(&mut self, spike: SpikeEvent);
}

/// Sink collecting into memory, for tests and small recordings.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub spikes: Vec<SpikeEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpikeSink for MemorySink {
    fn emit(&mut self, spike: SpikeEvent) {
        self.spikes.push(spike);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RunSummary {
    pub thresholds: Thresholds,
    pub n_chunks: usize,
    pub n_spikes: usize,
}

/// High level driver: estimates thresholds once, then walks every channel
/// group through the chunk loop and feeds resolved spikes to the sink.
pub struct DetectionPipeline<S: ChunkSource> {
    source: S,
    probe: Probe,
    config: RunConfig,
}

impl<S: ChunkSource> DetectionPipeline<S> {
    pub fn new(source: S, probe: Probe, config: RunConfig) -> Result<Self, DetectError> {
        config.validate()?;
        Ok(Self {
            source,
            probe,
            config,
        })
    }

    pub fn run(&mut self, sink: &mut impl SpikeSink) -> Result<RunSummary, DetectError> {
        if self.source.n_samples() == 0 {
            return Err(DetectError::EmptyRecording);
        }
        let all_channels = self.probe.all_channels();
        let thresholds = estimate_thresholds(&mut self.source, &all_channels, &self.config)?;
        let mut n_chunks = 0;
        let mut n_spikes = 0;
        for group in self.probe.groups() {
            let (spikes, chunks) =
                run_group(&mut self.source, group, &thresholds, &self.config, sink)?;
            n_spikes += spikes;
            n_chunks += chunks;
        }
        Ok(RunSummary {
            thresholds,
            n_chunks,
            n_spikes,
        })
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

/// Process one channel group front to back.
///
/// Chunks are strictly sequential because the reconciler carries state
/// forward; separate channel groups are independent and may be run
/// concurrently by the caller, each with its own source handle.
pub fn run_group<S: ChunkSource>(
    source: &mut S,
    group: &ChannelGroup,
    thresholds: &Thresholds,
    config: &RunConfig,
    sink: &mut impl SpikeSink,
) -> Result<(usize, usize), DetectError> {
    let n = source.n_samples();
    info!(
        "group {}: detecting over {} samples, chunk size {}, overlap {}",
        group.id(),
        n,
        config.chunk_size,
        config.chunk_overlap
    );
    let mut reconciler = Reconciler::new();
    let mut n_spikes = 0;
    let mut n_chunks = 0;
    let mut start = 0;
    while start < n {
        let end = (start + config.chunk_size).min(n);
        let chunk = source.fetch(group.channels(), start, end, config.chunk_overlap)?;
        let components = detect_components(&chunk, group, thresholds, config.detect_polarity);
        debug!(
            "group {}: chunk {}..{} raw components: {}",
            group.id(),
            start,
            end,
            components.len()
        );
        for component in reconciler.absorb(group, end, components) {
            sink.emit(resolve_spike(component, group, thresholds, config, source)?);
            n_spikes += 1;
        }
        start = end;
        n_chunks += 1;
    }
    for component in reconciler.flush() {
        sink.emit(resolve_spike(component, group, thresholds, config, source)?);
        n_spikes += 1;
    }
    info!("group {}: {} spikes in {} chunks", group.id(), n_spikes, n_chunks);
    Ok((n_spikes, n_chunks))
}
