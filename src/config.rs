use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which side of the baseline counts as a spike.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    Both,
}

impl FromStr for Polarity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Polarity::Positive),
            "negative" => Ok(Polarity::Negative),
            "both" => Ok(Polarity::Both),
            other => Err(ConfigError::UnknownPolarity(other.to_owned())),
        }
    }
}

/// What to do when a waveform window runs past a recording edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgePolicy {
    /// Keep the window size fixed and fill missing samples with zeros.
    ZeroPad,
    /// Shrink the window to the samples that exist.
    Clip,
}

/// Detection run parameters. All sizes are in samples.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub chunk_size: usize,
    /// Margin fetched on each side of a chunk; also the held-over window the
    /// reconciler compares across chunk boundaries.
    pub chunk_overlap: usize,
    pub threshold_strong_multiplier: f32,
    pub threshold_weak_multiplier: f32,
    pub detect_polarity: Polarity,
    /// Number of excerpts sampled for threshold estimation.
    pub nexcerpts: usize,
    pub excerpt_size: usize,
    pub waveform_before: usize,
    pub waveform_after: usize,
    pub edge_policy: EdgePolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        // One-second chunks at 20 kHz with a 15 ms overlap.
        Self {
            chunk_size: 20_000,
            chunk_overlap: 300,
            threshold_strong_multiplier: 4.5,
            threshold_weak_multiplier: 2.0,
            detect_polarity: Polarity::Negative,
            nexcerpts: 50,
            excerpt_size: 20_000,
            waveform_before: 16,
            waveform_after: 16,
            edge_policy: EdgePolicy::ZeroPad,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        if self.chunk_overlap == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidOverlap {
                overlap: self.chunk_overlap,
                chunk_size: self.chunk_size,
            });
        }
        if self.threshold_strong_multiplier <= 0.0 || self.threshold_weak_multiplier <= 0.0 {
            return Err(ConfigError::NonPositiveMultiplier {
                strong: self.threshold_strong_multiplier,
                weak: self.threshold_weak_multiplier,
            });
        }
        if self.threshold_weak_multiplier > self.threshold_strong_multiplier {
            return Err(ConfigError::ThresholdOrder {
                strong: self.threshold_strong_multiplier,
                weak: self.threshold_weak_multiplier,
            });
        }
        if self.nexcerpts == 0 || self.excerpt_size == 0 {
            return Err(ConfigError::InvalidExcerpts);
        }
        if self.waveform_before + self.waveform_after == 0 {
            return Err(ConfigError::EmptyWaveformWindow);
        }
        Ok(())
    }
}
