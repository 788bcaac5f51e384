use thiserror::Error;

#[derive(Error, Debug)]
pub enum UiccError {
    #[error("Invalid magic number in disk image")]
    InvalidMagic,

    #[error("Invalid item type: {0}")]
    InvalidItemType(u8),

    #[error("Invalid life-cycle status: {0}")]
    InvalidLcs(u8),

    #[error("Bad parameters: {0}")]
    BadParameters(&'static str),

    #[error("Buffer too short")]
    BufferTooShort,

    #[error("Not found")]
    NotFound,

    #[error("Operation not implemented")]
    NotImplemented,

    #[error("APDU not handled")]
    ApduUnhandled,

    #[error("File system corrupt: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, UiccError>;
