pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),
    
    #[error("Preview buffer has {actual} bytes, expected {expected}")]
    PreviewSize {
        expected: usize,
        actual: usize,
    },
}
