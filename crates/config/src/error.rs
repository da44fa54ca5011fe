use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The configuration file does not exist.
    #[display("configuration file not found")]
    NotFound,
    /// The file extension doesn't name a supported format.
    #[display("unsupported configuration format")]
    UnsupportedFormat,
    /// Merging or deserializing the layered sources failed.
    #[display("could not load configuration")]
    Load,
    #[display("invalid configuration value: {_0}")]
    InvalidValue(#[error(not(source))] &'static str),
}
