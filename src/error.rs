use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "content area is not positive ({width_pt}pt x {height_pt}pt); adjust the top/bottom/left/right margins"
    )]
    InvalidContentArea { width_pt: f64, height_pt: f64 },

    #[error("Failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Template not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("Input produced no pages")]
    NoContent,

    #[error("Typst compilation failed: {0}")]
    Compile(String),

    #[error("PDF generation failed: {0}")]
    Pdf(String),
}
