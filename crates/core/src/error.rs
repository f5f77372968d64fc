/// Errors raised while assembling client configuration.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An environment variable was present but could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
