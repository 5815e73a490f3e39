use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    Xml(String),

    #[error("no rootfile declared in META-INF/container.xml")]
    MissingRootfile,

    #[error("required metadata field missing: {0}")]
    MissingRequiredField(String),

    #[error("malformed dcterms:modified timestamp: {0}")]
    MalformedTimestamp(String),

    #[error("source page {} is malformed: {reason}", .page.display())]
    SourcePageMalformed { page: PathBuf, reason: String },

    #[error("failed to copy image {} to {}: {source}", .src.display(), .dest.display())]
    ImageCopyFailed {
        src: PathBuf,
        dest: PathBuf,
        source: std::io::Error,
    },

    #[error("Bloom template error: {0}")]
    Template(String),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
