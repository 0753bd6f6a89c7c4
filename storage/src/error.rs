use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage fallback log io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage writer thread panicked or could not be joined")]
    WriterJoin,
}
