use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("image info not set")]
    MissingImage,
    #[error("no function contains rva {0:#x}")]
    LabelOutOfRange(u64),
    #[error("invalid name: {0:?}")]
    InvalidName(String),
}
