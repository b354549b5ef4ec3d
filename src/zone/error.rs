#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid zone id: {0}")]
    InvalidZoneId(String),
}
pub type Result<T> = std::result::Result<T, Error>;
