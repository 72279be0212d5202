use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid group pattern: {0}")]
    GroupPattern(#[from] regex::Error),

    #[error(transparent)]
    Pipeline(#[from] lcmsfeat::LcmsFeatError),

    #[error("Error interpreting the config: {0}")]
    Config(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<lcmsfeat::errors::ConfigError> for CliError {
    fn from(e: lcmsfeat::errors::ConfigError) -> Self {
        CliError::Pipeline(e.into())
    }
}

impl From<lcmsfeat::errors::DataProcessingError> for CliError {
    fn from(e: lcmsfeat::errors::DataProcessingError) -> Self {
        CliError::Pipeline(e.into())
    }
}
