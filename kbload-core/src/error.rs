pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("failed to create resource `{name}`: {message}")]
    ResourceSetup { name: String, message: String },

    #[error("failed to drop resource `{name}`: {message}")]
    ResourceTeardown { name: String, message: String },

    #[error("failed to spawn resource sampler: {0}")]
    SamplerSpawn(std::io::Error),

    #[error("`batch_sizes` must be a non-empty list of positive integers")]
    InvalidBatchSizes,

    #[error("`data_sizes` must contain positive integers only")]
    InvalidDataSizes,

    #[error("`concurrency` values must be positive integers")]
    InvalidConcurrency,

    #[error("`iterations` must be a positive integer")]
    InvalidIterations,

    #[error("`timeout` must be a positive duration")]
    InvalidTimeout,

    #[error("`sample_interval` must be a positive duration")]
    InvalidSampleInterval,

    #[error("`resource_name` must not be empty")]
    InvalidResourceName,

    #[error("`{0}` must be in strictly ascending order")]
    NotAscending(&'static str),

    #[error("`min_success_rate` must be within 0..=1 (got {0})")]
    InvalidSuccessRate(f64),

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("invalid baseline: {0}")]
    InvalidBaseline(String),
}

impl Error {
    /// True for setup/teardown failures that abort a whole scenario.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Self::ResourceSetup { .. } | Self::ResourceTeardown { .. }
        )
    }
}
