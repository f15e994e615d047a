use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    Aborted(anyhow::Error),
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::Aborted(_) => ExitCode::Aborted,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e) | Self::Aborted(e) | Self::RuntimeError(e) => e,
        }
    }

    /// Classifies an engine error: validation failures are input errors,
    /// resource lifecycle failures abort the scenario.
    pub fn from_core(context: &'static str, err: kbload_core::Error) -> Self {
        use kbload_core::Error as CoreError;

        let kind = match &err {
            CoreError::InvalidBatchSizes
            | CoreError::InvalidDataSizes
            | CoreError::InvalidConcurrency
            | CoreError::InvalidIterations
            | CoreError::InvalidTimeout
            | CoreError::InvalidSampleInterval
            | CoreError::InvalidResourceName
            | CoreError::NotAscending(_)
            | CoreError::InvalidSuccessRate(_)
            | CoreError::EmptyDataset
            | CoreError::InvalidBaseline(_) => Self::InvalidInput,

            _ if err.is_abort() => Self::Aborted,

            _ => Self::RuntimeError,
        };

        kind(anyhow::Error::new(err).context(context))
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(e) | Self::Aborted(e) | Self::RuntimeError(e) => {
                write!(f, "{e:#}")
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}
