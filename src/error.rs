//! Unified error handling for the branchdesk CLI and client
//!
//! Every failure carries a stable code so support requests can quote it:
//! - D1XX: Authentication and authorization errors
//! - D2XX: Network, API and response-shape errors
//! - D3XX: File and I/O errors
//! - D4XX: Configuration errors
//! - D5XX: Validation and input errors
//! - D7XX: Resource errors
//! - D8XX: UI and interaction errors
//! - D9XX: Internal errors

use std::fmt;
use thiserror::Error;

/// Unified Result type for all branchdesk operations
pub type Result<T> = std::result::Result<T, DeskError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication (D1XX)
    /// D101: Authentication failed or session expired
    AuthenticationFailed,
    /// D102: Authorization denied
    AuthorizationDenied,
    /// D103: Not logged in
    SessionNotFound,

    // Network (D2XX)
    /// D201: HTTP request failed
    HttpError,
    /// D202: Connection timeout
    ConnectionTimeout,
    /// D204: Connection refused
    ConnectionRefused,
    /// D205: API returned error response
    ApiError,
    /// D206: Response did not match the expected shape
    InvalidResponse,
    /// D207: Server-side failure (5xx)
    ServerError,

    // File/IO (D3XX)
    /// D301: File not found
    FileNotFound,
    /// D302: File read error
    FileReadError,
    /// D303: File write error
    FileWriteError,

    // Configuration (D4XX)
    /// D401: Configuration error
    ConfigError,
    /// D402: Invalid endpoint URL
    InvalidEndpoint,

    // Validation (D5XX)
    /// D501: Invalid input
    InvalidInput,
    /// D502: Validation failed
    ValidationFailed,

    // Resource (D7XX)
    /// D701: Resource not found
    ResourceNotFound,
    /// D702: Upload failed
    UploadFailed,

    // UI (D8XX)
    /// D801: Dialog error
    DialogError,

    // Internal (D9XX)
    /// D901: Internal error
    InternalError,
    /// D902: Serialization error
    SerializationError,
}

impl ErrorCode {
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::AuthenticationFailed => 101,
            ErrorCode::AuthorizationDenied => 102,
            ErrorCode::SessionNotFound => 103,

            ErrorCode::HttpError => 201,
            ErrorCode::ConnectionTimeout => 202,
            ErrorCode::ConnectionRefused => 204,
            ErrorCode::ApiError => 205,
            ErrorCode::InvalidResponse => 206,
            ErrorCode::ServerError => 207,

            ErrorCode::FileNotFound => 301,
            ErrorCode::FileReadError => 302,
            ErrorCode::FileWriteError => 303,

            ErrorCode::ConfigError => 401,
            ErrorCode::InvalidEndpoint => 402,

            ErrorCode::InvalidInput => 501,
            ErrorCode::ValidationFailed => 502,

            ErrorCode::ResourceNotFound => 701,
            ErrorCode::UploadFailed => 702,

            ErrorCode::DialogError => 801,

            ErrorCode::InternalError => 901,
            ErrorCode::SerializationError => 902,
        }
    }

    /// Get the string code (e.g., "D101")
    pub fn as_str(&self) -> String {
        format!("D{}", self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.code())
    }
}

#[derive(Error, Debug)]
pub enum DeskError {
    // ==================== Authentication Errors (D1XX) ====================
    #[error("[{code}] Authentication failed: {message}")]
    Authentication { code: ErrorCode, message: String },

    #[error("[{code}] Authorization denied: {message}")]
    Authorization { code: ErrorCode, message: String },

    // ==================== Network Errors (D2XX) ====================
    /// Request never reached the server or timed out
    #[error("[{code}] Network error: {message}")]
    Network {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Non-2xx response outside the auth and server classes
    #[error("[{code}] API error ({status}): {message}")]
    Api {
        code: ErrorCode,
        status: u16,
        message: String,
    },

    #[error("[{code}] Server error ({status}): {message}")]
    Server {
        code: ErrorCode,
        status: u16,
        message: String,
    },

    /// Response parsed but did not have the expected structure
    #[error("[{code}] Unexpected response: {message}")]
    InvalidResponse { code: ErrorCode, message: String },

    // ==================== File/IO Errors (D3XX) ====================
    #[error("[{code}] {context}: {message}")]
    Io {
        code: ErrorCode,
        context: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // ==================== Configuration Errors (D4XX) ====================
    #[error("[{code}] Configuration error: {message}")]
    Config {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<config::ConfigError>,
    },

    // ==================== Validation Errors (D5XX) ====================
    #[error("[{code}] Validation error: {message}")]
    Validation {
        code: ErrorCode,
        message: String,
        field: Option<String>,
    },

    #[error("[{code}] Invalid input: {message}")]
    InvalidInput { code: ErrorCode, message: String },

    // ==================== Resource Errors (D7XX) ====================
    #[error("[{code}] Not found: {resource}")]
    NotFound { code: ErrorCode, resource: String },

    #[error("[{code}] Upload failed: {message}")]
    Upload { code: ErrorCode, message: String },

    // ==================== UI Errors (D8XX) ====================
    #[error("[{code}] UI error: {message}")]
    Ui { code: ErrorCode, message: String },

    // ==================== Internal Errors (D9XX) ====================
    #[error("[{code}] Internal error: {message}")]
    Internal { code: ErrorCode, message: String },

    #[error("[{code}] Serialization error: {message}")]
    Serialization {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

// ==================== Constructor Methods ====================

impl DeskError {
    // --- Authentication ---

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::AuthenticationFailed,
            message: message.into(),
        }
    }

    pub fn not_logged_in() -> Self {
        Self::Authentication {
            code: ErrorCode::SessionNotFound,
            message: "Not logged in. Run `branchdesk login` first.".to_string(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            code: ErrorCode::AuthorizationDenied,
            message: message.into(),
        }
    }

    // --- Network ---

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            code: ErrorCode::HttpError,
            message: message.into(),
            source: None,
        }
    }

    /// Create network error from reqwest error
    pub fn network_from_reqwest(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::ConnectionTimeout
        } else if err.is_connect() {
            ErrorCode::ConnectionRefused
        } else {
            ErrorCode::HttpError
        };

        Self::Network {
            code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::ApiError,
            status,
            message: message.into(),
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            code: ErrorCode::ServerError,
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            code: ErrorCode::InvalidResponse,
            message: message.into(),
        }
    }

    // --- File/IO ---

    pub fn io(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            code: ErrorCode::FileReadError,
            context: context.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create IO error from std::io::Error
    pub fn io_from_error(context: impl Into<String>, err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::FileWriteError,
            _ => ErrorCode::FileReadError,
        };

        Self::Io {
            code,
            context: context.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    // --- Configuration ---

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::InvalidEndpoint,
            message: message.into(),
            source: None,
        }
    }

    // --- Validation ---

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code: ErrorCode::InvalidInput,
            message: message.into(),
        }
    }

    // --- Resource ---

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            code: ErrorCode::ResourceNotFound,
            resource: resource.into(),
        }
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            code: ErrorCode::UploadFailed,
            message: message.into(),
        }
    }

    // --- UI ---

    pub fn ui(message: impl Into<String>) -> Self {
        Self::Ui {
            code: ErrorCode::DialogError,
            message: message.into(),
        }
    }

    // --- Internal ---

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: ErrorCode::InternalError,
            message: message.into(),
        }
    }

    // ==================== Classification ====================

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { code, .. }
            | Self::Authorization { code, .. }
            | Self::Network { code, .. }
            | Self::Api { code, .. }
            | Self::Server { code, .. }
            | Self::InvalidResponse { code, .. }
            | Self::Io { code, .. }
            | Self::Config { code, .. }
            | Self::Validation { code, .. }
            | Self::InvalidInput { code, .. }
            | Self::NotFound { code, .. }
            | Self::Upload { code, .. }
            | Self::Ui { code, .. }
            | Self::Internal { code, .. }
            | Self::Serialization { code, .. } => *code,
        }
    }

    /// HTTP status carried by the error, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::Authentication {
                code: ErrorCode::AuthenticationFailed,
                ..
            } => Some(401),
            Self::Authorization { .. } => Some(403),
            _ => None,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Authorization { .. })
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn is_shape_error(&self) -> bool {
        matches!(self, Self::InvalidResponse { .. })
    }

    /// Only an unreachable backend or an unusable response may be papered
    /// over with fixture data. Auth, server and validation failures surface.
    pub fn is_fallback_eligible(&self) -> bool {
        self.is_network_error() || self.is_shape_error()
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network {
                code: ErrorCode::ConnectionTimeout | ErrorCode::ConnectionRefused,
                ..
            } | Self::Server { .. }
        )
    }
}

// ==================== Conversions ====================

impl From<std::io::Error> for DeskError {
    fn from(err: std::io::Error) -> Self {
        Self::io_from_error("I/O operation", err)
    }
}

impl From<reqwest::Error> for DeskError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_from_reqwest(err)
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            code: ErrorCode::SerializationError,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<config::ConfigError> for DeskError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<validator::ValidationErrors> for DeskError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|f| f.to_string());
        Self::Validation {
            code: ErrorCode::ValidationFailed,
            message: err.to_string(),
            field,
        }
    }
}

impl From<dialoguer::Error> for DeskError {
    fn from(err: dialoguer::Error) -> Self {
        Self::ui(err.to_string())
    }
}
