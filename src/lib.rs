// src/lib.rs - Print skew compensation: calibration math, firmware commands,
// and a streaming G-code shear transform.
pub mod commands;
pub mod config;
pub mod error;
pub mod gcode;
pub mod skew;

pub use error::SkewError;
pub use gcode::GCodeShearTransformer;
pub use skew::{Measurement, Plane, PlaneMeasurements, SkewFactors};
