use thiserror::Error;

/// All errors produced by svad-core.
#[derive(Debug, Error)]
pub enum SvadError {
    #[error("invalid chunk count {count} for {samples} samples")]
    InvalidChunkCount { count: usize, samples: usize },

    #[error("reference '{name}' is too short: {samples} samples, block size {block_size}")]
    ReferenceTooShort {
        name: String,
        samples: usize,
        block_size: usize,
    },

    #[error("no reference recordings found in {location}")]
    NoReferencesFound { location: String },

    #[error("pattern registry is empty, cannot size the streaming window")]
    EmptyRegistry,

    #[error("audio source unavailable: {0}")]
    AudioSourceUnavailable(String),

    #[error("audio read failure: {0}")]
    AudioReadFailure(String),

    #[error("invalid configuration value for {key}: {message}")]
    InvalidConfig { key: &'static str, message: String },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SvadError>;
