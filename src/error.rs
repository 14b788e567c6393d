// src/error.rs - Error taxonomy for the skew compensation core
use crate::skew::Plane;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkewError {
    #[error("invalid measurement for {plane} plane: {reason}")]
    InvalidMeasurement { plane: Plane, reason: String },

    #[error("no measurement data stored for {0} plane")]
    MissingPlaneData(Plane),

    #[error("malformed instruction on line {line}: {reason}")]
    MalformedInstruction { line: usize, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
