//! Domain error types.

/// Top-level error type for bandtrader.
#[derive(Debug, thiserror::Error)]
pub enum BandtraderError {
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("band series has {bands} entries but price series has {candles}")]
    MisalignedSeries { candles: usize, bands: usize },

    #[error("computation fault at bar {index}: {reason}")]
    ComputationFault { index: usize, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no price data in {path}")]
    NoData { path: String },

    #[error("failed to start worker pool: {reason}")]
    WorkerPool { reason: String },
}

impl BandtraderError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        BandtraderError::InvalidConfiguration {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&BandtraderError> for std::process::ExitCode {
    fn from(err: &BandtraderError) -> Self {
        let code: u8 = match err {
            BandtraderError::WorkerPool { .. } => 1,
            BandtraderError::InvalidConfiguration { .. }
            | BandtraderError::ConfigParse { .. }
            | BandtraderError::ConfigInvalid { .. } => 2,
            BandtraderError::Data { .. } | BandtraderError::NoData { .. } => 3,
            BandtraderError::MisalignedSeries { .. } | BandtraderError::ComputationFault { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
