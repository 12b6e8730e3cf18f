use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} is already closed")]
    Closed(&'static str),

    #[error("Maximum allowed scratch storage exceeded: {max_pages} pages of {page_size} bytes")]
    QuotaExceeded { max_pages: usize, page_size: usize },

    #[error("Scratch backing store unavailable: {0}")]
    BackingStoreUnavailable(String),

    #[error("Unexpected end of data: {0}")]
    UnexpectedEndOfData(String),

    #[error("Invalid seek position {position}, length is {length}")]
    InvalidSeek { position: u64, length: u64 },

    #[error("Compression error: {0}")]
    CompressionError(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;

impl From<PdfError> for std::io::Error {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::Io(io) => io,
            PdfError::InvalidSeek { .. } => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
            }
            PdfError::UnexpectedEndOfData(_) => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, err)
            }
            other => std::io::Error::other(other),
        }
    }
}
