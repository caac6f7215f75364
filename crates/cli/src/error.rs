use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open data directory {_0}")]
    DataDirectory(#[error(not(source))] String),
    #[display("curator error")]
    Curator,
    #[display("{_0} is not a known asset")]
    UnknownAsset(#[error(not(source))] String),
    #[display("{_0} transforms failed")]
    TransformsFailed(#[error(not(source))] usize),
}
