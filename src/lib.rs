use thiserror::Error;

pub type Result<T> = std::result::Result<T, LibrarianError>;

#[derive(Error, Debug)]
pub enum LibrarianError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Vector store error: {0}")]
    Database(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod catalog;
pub mod commands;
pub mod config;
pub mod index;
pub mod openai;
pub mod rag;
pub mod server;
