use actix_web::http::StatusCode;
use actix_web::ResponseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CspError {
    #[error("Invalid directive value: {0}")]
    InvalidDirectiveValue(String),

    #[error("Invalid directive name: {0}")]
    InvalidDirectiveName(String),

    #[error("Invalid hash algorithm: {0}")]
    InvalidHashAlgorithm(String),

    #[error("Invalid analytics domain: {0}")]
    InvalidDomain(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Script fetch error: {0}")]
    FetchError(String),

    #[error("Script fetch returned status {0}")]
    HttpStatus(u16),

    #[error("Script fetch returned an empty body")]
    EmptyBody,

    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("Header processing error: {0}")]
    HeaderError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ResponseError for CspError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidDirectiveValue(_)
            | Self::InvalidDirectiveName(_)
            | Self::InvalidHashAlgorithm(_)
            | Self::InvalidDomain(_)
            | Self::ConfigError(_) => StatusCode::BAD_REQUEST,

            Self::FetchError(_) | Self::HttpStatus(_) | Self::EmptyBody => StatusCode::BAD_GATEWAY,

            Self::CryptoError(_) | Self::HeaderError(_) | Self::SerializationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
