use thiserror::Error;

#[derive(Error, Debug)]
pub enum FramewrightError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Geometry error: {message}")]
    Geometry { message: String },
    #[error("Unknown binding: {name}")]
    UnknownBinding { name: String },
    #[error("Column {column} not found in {frame}")]
    MissingColumn { frame: String, column: String },
    #[error("Type error: {0}")]
    Type(String),
    #[error("Dissolve key may not be the geometry column: {column}")]
    GeometryKey { column: String },
    #[error("No geometry column in {frame}")]
    NoGeometry { frame: String },
    #[error("Join keys have incompatible types: {left} vs {right}")]
    KeyTypeMismatch { left: String, right: String },
    #[error("CRS mismatch: {left} vs {right}")]
    CrsMismatch { left: String, right: String },
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, FramewrightError>;

// Helper conversions
impl From<rusqlite::Error> for FramewrightError {
    fn from(e: rusqlite::Error) -> Self { Self::Store(e.to_string()) }
}
