#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("catalog not found at {path}: run the database conversion step first")]
    CatalogMissing { path: String },

    #[error("catalog malformed: {reason}")]
    CatalogMalformed { reason: String },
}
