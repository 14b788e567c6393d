// src/skew/mod.rs - Skew factor derivation from calibration print measurements
use crate::error::SkewError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nominal length of the calibration parallelogram's perpendicular leg, in mm.
/// This is a property of the printed calibration model, not a user input.
pub const NOMINAL_LEG_MM: f64 = 100.0;

/// The three orthogonal planes a skew factor can couple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    Xy,
    Xz,
    Yz,
}

impl Plane {
    /// Composition order for shear application is fixed: XY, then XZ, then YZ.
    pub const ALL: [Plane; 3] = [Plane::Xy, Plane::Xz, Plane::Yz];
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Xy => write!(f, "XY"),
            Plane::Xz => write!(f, "XZ"),
            Plane::Yz => write!(f, "YZ"),
        }
    }
}

/// Measured lengths from one plane of the calibration print, in mm.
///
/// `ac` and `bd` are the two diagonals of the printed parallelogram, `ad` is
/// the measured base side.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Measurement {
    pub ac: f64,
    pub bd: f64,
    pub ad: f64,
}

impl Measurement {
    pub fn new(ac: f64, bd: f64, ad: f64) -> Self {
        Self { ac, bd, ad }
    }
}

impl Default for Measurement {
    /// The ideal print: both diagonals at 141.42 mm, base side at 100 mm.
    fn default() -> Self {
        Self { ac: 141.42, bd: 141.42, ad: 100.0 }
    }
}

fn invalid(plane: Plane, reason: impl Into<String>) -> SkewError {
    SkewError::InvalidMeasurement { plane, reason: reason.into() }
}

/// Interior angle of the triangle (ad, leg, diagonal) at the vertex joining
/// `ad` and `leg`, by the law of cosines. A cosine outside [-1, 1] means the
/// three lengths cannot form a triangle; that is reported, never clamped,
/// because clamping would turn operator error into a plausible wrong factor.
fn leg_angle(plane: Plane, ad: f64, leg: f64, diagonal: f64) -> Result<f64, SkewError> {
    let cos = (ad * ad + leg * leg - diagonal * diagonal) / (2.0 * ad * leg);
    if !(-1.0..=1.0).contains(&cos) {
        return Err(invalid(
            plane,
            format!(
                "lengths ad={ad}, leg={leg}, diagonal={diagonal} do not form a triangle (cos = {cos:.6})"
            ),
        ));
    }
    Ok(cos.acos())
}

/// Computes the signed shear coefficient for one plane.
///
/// The angle between the measured base side `ad` and the model's nominal
/// perpendicular leg is recovered with the law of cosines, once per diagonal;
/// the factor is the tangent of the deviation from a right angle. The two
/// diagonals enter symmetrically, so a perfect rectangle (`ac == bd`) yields
/// exactly 0.0 and swapping the diagonals negates the result. Positive means
/// the AC diagonal came out long.
pub fn skew_factor(plane: Plane, m: &Measurement, nominal_leg: f64) -> Result<f64, SkewError> {
    if m.ac <= 0.0 || m.bd <= 0.0 || m.ad <= 0.0 {
        return Err(invalid(
            plane,
            format!("all lengths must be positive (ac={}, bd={}, ad={})", m.ac, m.bd, m.ad),
        ));
    }
    if nominal_leg <= 0.0 {
        return Err(invalid(plane, format!("nominal leg must be positive ({nominal_leg})")));
    }
    if m.ad >= m.ac + m.bd {
        return Err(invalid(
            plane,
            format!("triangle inequality violated: ad={} >= ac={} + bd={}", m.ad, m.ac, m.bd),
        ));
    }

    let angle_d = leg_angle(plane, m.ad, nominal_leg, m.ac)?;
    let angle_a = leg_angle(plane, m.ad, nominal_leg, m.bd)?;
    Ok(((angle_d - angle_a) / 2.0).tan())
}

/// Raw measurements stored per plane. A `None` plane was never measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct PlaneMeasurements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xy: Option<Measurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xz: Option<Measurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yz: Option<Measurement>,
}

impl PlaneMeasurements {
    pub fn get(&self, plane: Plane) -> Option<Measurement> {
        match plane {
            Plane::Xy => self.xy,
            Plane::Xz => self.xz,
            Plane::Yz => self.yz,
        }
    }

    pub fn set(&mut self, plane: Plane, m: Measurement) {
        match plane {
            Plane::Xy => self.xy = Some(m),
            Plane::Xz => self.xz = Some(m),
            Plane::Yz => self.yz = Some(m),
        }
    }

    /// Planes that have a measurement, in fixed XY, XZ, YZ order.
    pub fn planes(&self) -> Vec<Plane> {
        Plane::ALL.iter().copied().filter(|p| self.get(*p).is_some()).collect()
    }

    /// Derives a skew factor for every measured plane. Fails on the first
    /// invalid measurement; a half-corrected factor set is never returned.
    pub fn factors(&self, nominal_leg: f64) -> Result<SkewFactors, SkewError> {
        let mut factors = SkewFactors::default();
        for plane in Plane::ALL {
            if let Some(m) = self.get(plane) {
                factors.set(plane, skew_factor(plane, &m, nominal_leg)?);
            }
        }
        Ok(factors)
    }
}

/// The set of active skew factors. A `None` plane is not corrected at all.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SkewFactors {
    pub xy: Option<f64>,
    pub xz: Option<f64>,
    pub yz: Option<f64>,
}

impl SkewFactors {
    pub fn get(&self, plane: Plane) -> Option<f64> {
        match plane {
            Plane::Xy => self.xy,
            Plane::Xz => self.xz,
            Plane::Yz => self.yz,
        }
    }

    pub fn set(&mut self, plane: Plane, factor: f64) {
        match plane {
            Plane::Xy => self.xy = Some(factor),
            Plane::Xz => self.xz = Some(factor),
            Plane::Yz => self.yz = Some(factor),
        }
    }

    pub fn with(mut self, plane: Plane, factor: f64) -> Self {
        self.set(plane, factor);
        self
    }

    /// True when at least one plane would actually move a coordinate.
    pub fn is_active(&self) -> bool {
        Plane::ALL.iter().any(|p| self.get(*p).is_some_and(|f| f != 0.0))
    }

    /// Same planes, each factor negated. Applying `inverted()` after the
    /// original shear undoes it (up to output rounding).
    pub fn inverted(&self) -> Self {
        Self {
            xy: self.xy.map(|f| -f),
            xz: self.xz.map(|f| -f),
            yz: self.yz.map(|f| -f),
        }
    }

    /// Applies the composed shear to an absolute position, in fixed plane
    /// order XY, XZ, YZ. Each plane shifts the lower axis of its pair by
    /// `factor * higher axis`; Z is never changed, so only X and Y return.
    pub fn shear(&self, position: [f64; 3]) -> (f64, f64) {
        let [x, y, z] = position;
        let mut x_out = x;
        let mut y_out = y;
        if let Some(f) = self.xy {
            x_out += f * y;
        }
        if let Some(f) = self.xz {
            x_out += f * z;
        }
        if let Some(f) = self.yz {
            y_out += f * z;
        }
        (x_out, y_out)
    }
}
