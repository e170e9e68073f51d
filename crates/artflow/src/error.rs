use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("External service error: {0}")]
    Integration(#[from] crate::integrations::StepError),
}

pub type Result<T> = std::result::Result<T, ArtflowError>;
