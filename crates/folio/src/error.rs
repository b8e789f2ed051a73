#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid configuration in {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("Unsupported file format for {0}: expected .json or .toml")]
    UnsupportedFormat(String),

    #[error("Failed to save {path}: {reason}")]
    Persist { path: String, reason: String },

    #[error("No template given: pass --template or set default_template in folio.toml")]
    NoTemplate,
}
