use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("binary parse error: {0}")]
    Parse(#[from] goblin::error::Error),
    #[error("unrecognized image format")]
    UnknownFormat,
    #[error("fat Mach-O archive, extract a single slice first")]
    FatArchive,
    #[error("database error: {0}")]
    Database(#[from] crate::database::DatabaseError),
}
