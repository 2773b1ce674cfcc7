use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoLinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("config error: {0}")]
    Config(String),

    #[error("username must not be empty")]
    EmptyUsername,
}

pub type Result<T> = std::result::Result<T, GeoLinkError>;
