use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotationError {
    #[error("Category not editable: {0} mixes criteria with different maxima")]
    CategoryNotEditable(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("No save destination for the current project")]
    NoDestination,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Media probe error: {0}")]
    Probe(String),
}

impl From<NotationError> for String {
    fn from(err: NotationError) -> Self {
        err.to_string()
    }
}
