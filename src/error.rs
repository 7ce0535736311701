use thiserror::Error;

/// Rejected before any data is touched; all of these are caller mistakes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("channel group {group}: graph edge references unknown channel {channel}")]
    UnknownChannel { group: usize, channel: usize },
    #[error("channel group {group}: channel {channel} listed more than once")]
    DuplicateChannel { group: usize, channel: usize },
    #[error("channel group {group} has no channels")]
    EmptyGroup { group: usize },
    #[error("probe has no channel groups")]
    EmptyProbe,
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    #[error("chunk overlap must be in 1..chunk_size, got {overlap} with chunk size {chunk_size}")]
    InvalidOverlap { overlap: usize, chunk_size: usize },
    #[error("weak multiplier {weak} must not exceed strong multiplier {strong}")]
    ThresholdOrder { strong: f32, weak: f32 },
    #[error("threshold multipliers must be positive, got strong {strong}, weak {weak}")]
    NonPositiveMultiplier { strong: f32, weak: f32 },
    #[error("unknown polarity {0:?}; expected \"positive\", \"negative\" or \"both\"")]
    UnknownPolarity(String),
    #[error("excerpt count and excerpt size must be greater than zero")]
    InvalidExcerpts,
    #[error("waveform window must span at least one sample")]
    EmptyWaveformWindow,
    #[error("failed to parse probe description: {0}")]
    Probe(String),
}

/// Run-time failures. Degenerate components are not errors; they resolve
/// with best-effort values so detection stays total over the component set.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The chunk source failed to serve a requested range. Fetches are
    /// assumed idempotent, so the core does not retry.
    #[error("data source failed: {message}")]
    DataSource { message: String },
    #[error("recording contains no samples")]
    EmptyRecording,
}

impl DetectError {
    pub fn data_source(message: impl Into<String>) -> Self {
        DetectError::DataSource {
            message: message.into(),
        }
    }
}
