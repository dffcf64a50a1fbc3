use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the library
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Parse error: {0}")]
    #[diagnostic(code(gcal_utils::parse), help("expected a `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD` string"))]
    Parse(String),

    #[error("Invalid UTC offset: {0} hours")]
    #[diagnostic(code(gcal_utils::invalid_offset), help("offsets are whole hours between -23 and 23"))]
    InvalidOffset(i32),

    #[error("Value out of range: {0}")]
    #[diagnostic(code(gcal_utils::out_of_range))]
    OutOfRange(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(gcal_utils::remote_service))]
    RemoteService(String),

    #[error("Authentication error: {0}")]
    #[diagnostic(code(gcal_utils::auth))]
    Auth(String),

    #[error("Invalid event: {0}")]
    #[diagnostic(code(gcal_utils::invalid_event))]
    InvalidEvent(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(gcal_utils::config))]
    Config(String),

    #[error(transparent)]
    #[diagnostic(code(gcal_utils::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(gcal_utils::serialization))]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type CalendarResult<T> = Result<T, Error>;

/// Helper to create parse errors
pub fn parse_error(message: &str) -> Error {
    Error::Parse(message.to_string())
}

/// Helper to create out-of-range errors
pub fn out_of_range_error(message: &str) -> Error {
    Error::OutOfRange(message.to_string())
}

/// Helper to create Google Calendar errors
pub fn remote_service_error(message: &str) -> Error {
    Error::RemoteService(message.to_string())
}

/// Helper to create authentication errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create invalid event errors
pub fn invalid_event_error(message: &str) -> Error {
    Error::InvalidEvent(message.to_string())
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}
