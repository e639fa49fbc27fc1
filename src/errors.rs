use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed for {method}: {reason}")]
    Auth { method: String, reason: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Upload failed: {reason}")]
    UploadFailed { reason: String },

    #[error("Slack API error from {method}: {error}")]
    SlackApi { method: String, error: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {field} - {message}")]
    Config { field: String, message: String },
}

/// Custom result type
pub type AppResult<T> = Result<T, AppError>;

/// Coarse classification used by the failure policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    NotFound,
    Transport,
    Decode,
    Encode,
    Upload,
    Api,
    Io,
    Config,
}

impl AppError {
    pub fn auth(method: &str, reason: &str) -> Self {
        Self::Auth {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound {
            what: what.to_string(),
        }
    }

    pub fn http_status(url: &str, status: u16) -> Self {
        Self::HttpStatus {
            url: url.to_string(),
            status,
        }
    }

    pub fn upload_failed(reason: &str) -> Self {
        Self::UploadFailed {
            reason: reason.to_string(),
        }
    }

    pub fn slack_api(method: &str, error: &str) -> Self {
        Self::SlackApi {
            method: method.to_string(),
            error: error.to_string(),
        }
    }

    pub fn config(field: &str, message: &str) -> Self {
        Self::Config {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Auth { .. } => ErrorKind::Auth,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Network(_) | AppError::HttpStatus { .. } => ErrorKind::Transport,
            AppError::Decode(_) => ErrorKind::Decode,
            AppError::Encode(_) => ErrorKind::Encode,
            AppError::UploadFailed { .. } => ErrorKind::Upload,
            AppError::SlackApi { .. } | AppError::Json(_) => ErrorKind::Api,
            AppError::Io(_) => ErrorKind::Io,
            AppError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Worth repeating the same cycle right away
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport)
    }

    /// Nothing short of operator action will fix these. `Io` only comes
    /// from the transport file, so it means an unusable `PFP_SHIM_PATH`.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Auth | ErrorKind::Config | ErrorKind::Io
        )
    }
}
