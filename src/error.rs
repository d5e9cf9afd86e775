use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ShelfError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ShelfError::Decode(err.to_string())
        } else {
            ShelfError::Api(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ShelfError>;
