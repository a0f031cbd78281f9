use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Web error: {0}")]
    Web(String),
}

/// Failures a print bridge call can end with.
///
/// A cancelled print or a dismissed picker is not represented here: both are
/// successful responses with a negative payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrintError {
    #[error("Invalid content descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Unreadable content: {0}")]
    UnreadableContent(String),

    #[error("Unsupported content type: {content_type}")]
    UnsupportedType { content_type: String },

    #[error("A print session is already in progress")]
    SessionBusy,

    #[error("Print subsystem error: {0}")]
    PrintSubsystem(String),

    #[error("Unknown bridge method: {0}")]
    UnknownMethod(String),
}

impl PrintError {
    /// Machine-readable kind sent to the host runtime alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            PrintError::InvalidDescriptor(_) => "invalid_descriptor",
            PrintError::UnreadableContent(_) => "unreadable_content",
            PrintError::UnsupportedType { .. } => "unsupported_type",
            PrintError::SessionBusy => "session_busy",
            PrintError::PrintSubsystem(_) => "print_subsystem_error",
            PrintError::UnknownMethod(_) => "unknown_method",
        }
    }

    pub fn unreadable(target: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        PrintError::UnreadableContent(format!("{}: {}", target, err))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid remote fetch timeout: {value}")]
    InvalidFetchTimeout { value: String },

    #[error("Invalid resource root: {path}")]
    InvalidResourceRoot { path: String },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Initialization(_) => 500,
            AppError::Config(_) => 500,
            AppError::Web(_) => 400,
        }
    }

    pub fn error_response(&self) -> serde_json::Value {
        serde_json::json!({
            "ok": false,
            "error": self.to_string(),
            "error_type": self.error_type()
        })
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Initialization(_) => "initialization_error",
            AppError::Config(_) => "config_error",
            AppError::Web(_) => "web_error",
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::from_u16(AppError::status_code(self))
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        actix_web::HttpResponse::build(actix_web::ResponseError::status_code(self))
            .json(AppError::error_response(self))
    }
}
