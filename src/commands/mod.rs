// src/commands/mod.rs - Firmware configuration command generation
use crate::error::SkewError;
use crate::skew::{Plane, PlaneMeasurements, SkewFactors};
use std::fmt::Write;

/// Builds the Marlin `M852` skew configuration line.
///
/// Inclusion policy: a plane's parameter is emitted only when a factor was
/// supplied for it and is nonzero. A zero factor is no correction, and
/// omitting it keeps whatever the firmware already has for that plane
/// untouched. Factors are printed with 6 decimal places, enough to
/// reconstruct them to well below manufacturing tolerance.
pub fn marlin_command(factors: &SkewFactors) -> String {
    let mut line = String::from("M852");
    for (plane, letter) in [(Plane::Xy, 'I'), (Plane::Xz, 'J'), (Plane::Yz, 'K')] {
        if let Some(f) = factors.get(plane) {
            if f != 0.0 {
                // String formatting cannot fail here.
                let _ = write!(line, " {letter}{f:.6}");
            }
        }
    }
    line
}

/// Builds the Klipper `SET_SKEW` line for the requested planes.
///
/// Klipper derives its own skew factors in firmware, so this carries the raw
/// triangle measurements rather than anything computed here. Each requested
/// plane must have a stored measurement; values are printed with 3 decimal
/// places, matching the resolution of calipers used on the calibration
/// print.
pub fn klipper_command(
    planes: &[Plane],
    measurements: &PlaneMeasurements,
) -> Result<String, SkewError> {
    let mut line = String::from("SET_SKEW");
    for plane in Plane::ALL {
        if !planes.contains(&plane) {
            continue;
        }
        let m = measurements.get(plane).ok_or(SkewError::MissingPlaneData(plane))?;
        let _ = write!(line, " {plane}={:.3},{:.3},{:.3}", m.ac, m.bd, m.ad);
    }
    Ok(line)
}
