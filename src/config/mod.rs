// src/config/mod.rs - Per-printer calibration profile (TOML)
use crate::error::SkewError;
use crate::skew::{NOMINAL_LEG_MM, Measurement, PlaneMeasurements, SkewFactors};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which correction path is active for a printer. The surrounding workflow
/// must apply exactly one: stacking a firmware command on top of
/// post-processed G-code double-compensates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompensationMethod {
    #[default]
    None,
    /// Firmware-side via `M852`.
    Marlin,
    /// Firmware-side via `SET_SKEW`.
    Klipper,
    /// Direct transform of the sliced G-code.
    Gcode,
}

/// Calibration profile for one printer: the active method, the calibration
/// model's nominal leg, and the measured planes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default)]
    pub method: CompensationMethod,

    #[serde(default = "default_nominal_leg")]
    pub nominal_leg: f64,

    #[serde(flatten)]
    pub measurements: PlaneMeasurements,
}

fn default_nominal_leg() -> f64 {
    NOMINAL_LEG_MM
}

impl Default for Profile {
    /// Ideal-print defaults: every plane measured at 141.42 / 141.42 / 100,
    /// no compensation active.
    fn default() -> Self {
        Self {
            method: CompensationMethod::None,
            nominal_leg: NOMINAL_LEG_MM,
            measurements: PlaneMeasurements {
                xy: Some(Measurement::default()),
                xz: Some(Measurement::default()),
                yz: Some(Measurement::default()),
            },
        }
    }
}

impl Profile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SkewError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let profile: Profile = toml::from_str(&contents)
            .map_err(|e| SkewError::Config(format!("{}: {e}", path.display())))?;
        profile.validate()?;
        tracing::info!("loaded calibration profile from {}", path.display());
        Ok(profile)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SkewError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SkewError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        tracing::info!("saved calibration profile to {}", path.display());
        Ok(())
    }

    /// Checks the profile without computing anything the caller keeps:
    /// every stored measurement must pass the calculator's input rules.
    pub fn validate(&self) -> Result<(), SkewError> {
        if self.nominal_leg <= 0.0 {
            return Err(SkewError::Config(format!(
                "nominal_leg must be positive (got {})",
                self.nominal_leg
            )));
        }
        self.measurements.factors(self.nominal_leg).map(|_| ())
    }

    /// Skew factors for every measured plane.
    pub fn factors(&self) -> Result<SkewFactors, SkewError> {
        self.measurements.factors(self.nominal_leg)
    }
}

/// Maps a printer display name to a filesystem-safe profile file name.
/// Anything outside `[A-Za-z0-9._-]` collapses to a single underscore.
pub fn profile_file_name(printer_name: &str) -> String {
    let mut safe = String::with_capacity(printer_name.len());
    let mut last_was_underscore = false;
    for c in printer_name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
            safe.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            safe.push('_');
            last_was_underscore = true;
        }
    }
    let trimmed = safe.trim_matches('_');
    if trimmed.is_empty() {
        "printer.toml".to_string()
    } else {
        format!("{trimmed}.toml")
    }
}
