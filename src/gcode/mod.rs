// src/gcode/mod.rs - Streaming shear transform over a G-code stream
pub mod startup;

use crate::error::SkewError;
use crate::skew::SkewFactors;
use std::io::{BufRead, Write};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositioningMode {
    Absolute,
    Relative,
}

/// Per-stream mutable state: positioning mode plus the last-known logical
/// absolute position. Lives for exactly one pass and is never persisted.
#[derive(Debug, Clone, Copy)]
struct TransformState {
    mode: PositioningMode,
    position: [f64; 3],
}

impl Default for TransformState {
    fn default() -> Self {
        // Industry-standard machine default: absolute positioning from origin.
        Self { mode: PositioningMode::Absolute, position: [0.0; 3] }
    }
}

/// One coordinate word found on a movement line: its parsed value and the
/// byte range of the numeric text, so the value can be rewritten in place
/// without disturbing anything around it.
#[derive(Debug, Clone, Copy)]
struct AxisField {
    value: f64,
    span: (usize, usize),
}

/// Single-pass streaming transformer that applies the active skew shear to
/// movement coordinates and copies everything else through byte-exact.
///
/// Feed it whole lines via [`transform_line`](Self::transform_line), or an
/// entire stream via [`transform`](Self::transform). One transformer owns
/// one stream's state; create a fresh one per file.
pub struct GCodeShearTransformer {
    factors: SkewFactors,
    state: TransformState,
    line: usize,
    rewritten: usize,
}

impl GCodeShearTransformer {
    pub fn new(factors: SkewFactors) -> Self {
        Self {
            factors,
            state: TransformState::default(),
            line: 0,
            rewritten: 0,
        }
    }

    /// Processes one line (without its terminator). Returns `Ok(None)` when
    /// the line passes through unchanged, so callers can emit the original
    /// bytes, and `Ok(Some(_))` with the rewritten line otherwise.
    ///
    /// Any error is fatal for the stream: a partially corrected print is
    /// worse than a rejected one, so callers must not continue feeding lines
    /// after an `Err`.
    pub fn transform_line(&mut self, line: &str) -> Result<Option<String>, SkewError> {
        self.line += 1;
        let Some(code) = gcode_number(line) else {
            return Ok(None);
        };
        match code {
            0 | 1 => self.movement(line),
            90 => {
                self.state.mode = PositioningMode::Absolute;
                Ok(None)
            }
            91 => {
                self.state.mode = PositioningMode::Relative;
                Ok(None)
            }
            92 => {
                // G92 redefines the logical position for the axes it names.
                // The line itself is not a movement and passes through.
                let fields = self.scan_axis_fields(line)?;
                for (axis, field) in fields.iter().enumerate() {
                    if let Some(f) = field {
                        self.state.position[axis] = f.value;
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Streams `reader` to `writer`, line at a time, in bounded memory.
    /// Original line terminators (`\n`, `\r\n`, or none on the final line)
    /// are preserved as-is.
    pub fn transform<R: BufRead, W: Write>(
        &mut self,
        mut reader: R,
        mut writer: W,
    ) -> Result<(), SkewError> {
        let mut buf = String::new();
        loop {
            buf.clear();
            if reader.read_line(&mut buf)? == 0 {
                break;
            }
            let (body, terminator) = split_terminator(&buf);
            match self.transform_line(body)? {
                Some(corrected) => writer.write_all(corrected.as_bytes())?,
                None => writer.write_all(body.as_bytes())?,
            }
            writer.write_all(terminator.as_bytes())?;
        }
        writer.flush()?;
        tracing::debug!(
            "shear transform finished: {} lines read, {} movement lines rewritten",
            self.line,
            self.rewritten
        );
        Ok(())
    }

    /// Number of lines whose coordinates were actually rewritten so far.
    pub fn rewritten_lines(&self) -> usize {
        self.rewritten
    }

    fn movement(&mut self, line: &str) -> Result<Option<String>, SkewError> {
        let [x, y, z] = self.scan_axis_fields(line)?;

        let previous = self.state.position;
        let mut target = previous;
        for (axis, field) in [&x, &y, &z].into_iter().enumerate() {
            if let Some(f) = field {
                target[axis] = match self.state.mode {
                    PositioningMode::Absolute => f.value,
                    PositioningMode::Relative => previous[axis] + f.value,
                };
            }
        }
        self.state.position = target;

        let (sheared_x, sheared_y) = self.factors.shear(target);
        let (corrected_x, corrected_y) = match self.state.mode {
            PositioningMode::Absolute => (sheared_x, sheared_y),
            PositioningMode::Relative => {
                // A relative move commands a delta, but the shear is anchored
                // to absolute positions: re-express the delta between the
                // sheared endpoints.
                let (prev_x, prev_y) = self.factors.shear(previous);
                (sheared_x - prev_x, sheared_y - prev_y)
            }
        };

        // Fields absent from the source stay absent, and a field whose value
        // did not move keeps its original bytes. Z is never sheared.
        let mut replacements: Vec<(usize, usize, String)> = Vec::new();
        if let Some(f) = x {
            if corrected_x != f.value {
                replacements.push((f.span.0, f.span.1, format_coord(corrected_x)));
            }
        }
        if let Some(f) = y {
            if corrected_y != f.value {
                replacements.push((f.span.0, f.span.1, format_coord(corrected_y)));
            }
        }
        if replacements.is_empty() {
            return Ok(None);
        }

        self.rewritten += 1;
        let mut out = line.to_string();
        replacements.sort_by(|a, b| b.0.cmp(&a.0));
        for (start, end, text) in replacements {
            out.replace_range(start..end, &text);
        }
        Ok(Some(out))
    }

    /// Walks the words of a G-line (comment excluded) and collects the X, Y
    /// and Z coordinate fields with their spans. E and F values are parsed
    /// for validation only. Later duplicates of an axis word win.
    fn scan_axis_fields(&self, line: &str) -> Result<[Option<AxisField>; 3], SkewError> {
        let body = &line[..comment_start(line)];
        let bytes = body.as_bytes();
        let mut fields: [Option<AxisField>; 3] = [None; 3];

        let mut i = 0;
        // Skip leading whitespace and the command word itself.
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        while i < bytes.len() {
            if bytes[i].is_ascii_whitespace() {
                i += 1;
                continue;
            }
            let letter = (bytes[i] as char).to_ascii_uppercase();
            let num_range = word_value_range(bytes, i);
            let token = &body[num_range.clone()];
            i = num_range.end;

            let axis = match letter {
                'X' => Some(0),
                'Y' => Some(1),
                'Z' => Some(2),
                'E' | 'F' => None,
                _ => continue,
            };
            let value: f64 = token.parse().map_err(|_| SkewError::MalformedInstruction {
                line: self.line,
                reason: format!("cannot parse {letter} field value {token:?}"),
            })?;
            if let Some(axis) = axis {
                fields[axis] = Some(AxisField { value, span: (num_range.start, num_range.end) });
            }
        }
        Ok(fields)
    }
}

/// Byte range of a word's value text: everything after the letter at `start`
/// up to the next whitespace.
fn word_value_range(bytes: &[u8], start: usize) -> Range<usize> {
    let mut end = start + 1;
    while end < bytes.len() && !bytes[end].is_ascii_whitespace() {
        end += 1;
    }
    start + 1..end
}

fn comment_start(line: &str) -> usize {
    line.find(';').unwrap_or(line.len())
}

/// Returns the numeric code of a line whose command word is a G word, or
/// `None` for comments, blanks, and every non-G command. Case-insensitive;
/// non-integer G words (nonstandard) are left alone.
fn gcode_number(line: &str) -> Option<u32> {
    let body = &line[..comment_start(line)];
    let trimmed = body.trim_start();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some('G') | Some('g') => {}
        _ => return None,
    }
    let rest = chars.as_str();
    let end = rest
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

fn split_terminator(buf: &str) -> (&str, &str) {
    if let Some(body) = buf.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = buf.strip_suffix('\n') {
        (body, "\n")
    } else {
        (buf, "")
    }
}

/// Formats a corrected coordinate: at most 3 decimal places (one micrometer
/// resolution), trailing zeros trimmed the way slicers emit coordinates.
fn format_coord(value: f64) -> String {
    let mut s = format!("{value:.3}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skew::{Plane, SkewFactors};

    fn xy(factor: f64) -> SkewFactors {
        SkewFactors::default().with(Plane::Xy, factor)
    }

    #[test]
    fn test_format_coord_trims_like_a_slicer() {
        assert_eq!(format_coord(11.0), "11");
        assert_eq!(format_coord(1.5), "1.5");
        assert_eq!(format_coord(0.1234), "0.123");
        assert_eq!(format_coord(-0.0001), "0");
        assert_eq!(format_coord(-2.25), "-2.25");
    }

    #[test]
    fn test_gcode_number_recognition() {
        assert_eq!(gcode_number("G1 X10"), Some(1));
        assert_eq!(gcode_number("  g91"), Some(91));
        assert_eq!(gcode_number("G92 E0"), Some(92));
        assert_eq!(gcode_number("M104 S200"), None);
        assert_eq!(gcode_number("; comment G1"), None);
        assert_eq!(gcode_number(""), None);
    }

    #[test]
    fn test_non_movement_lines_pass_through_untouched() {
        let mut t = GCodeShearTransformer::new(xy(0.1));
        for line in ["; layer 1", "M104 S210", "M140 S60 ; bed", "", "T0", "G28"] {
            assert_eq!(t.transform_line(line).unwrap(), None, "line {line:?}");
        }
    }

    #[test]
    fn test_simple_xy_shear() {
        let mut t = GCodeShearTransformer::new(xy(0.1));
        let out = t.transform_line("G1 X10 Y10 F1500").unwrap();
        assert_eq!(out.as_deref(), Some("G1 X11 Y10 F1500"));
    }

    #[test]
    fn test_fields_not_present_are_never_introduced() {
        let mut t = GCodeShearTransformer::new(xy(0.1));
        // Establish Y via an earlier move, then move X alone: the shear
        // shift applies, but no Y field may appear.
        t.transform_line("G1 X0 Y20").unwrap();
        let out = t.transform_line("G1 X10").unwrap();
        assert_eq!(out.as_deref(), Some("G1 X12"));
    }

    #[test]
    fn test_unchanged_coordinates_keep_original_bytes() {
        let mut t = GCodeShearTransformer::new(xy(0.1));
        // Y is zero, so X is unshifted and the line must not be re-formatted.
        assert_eq!(t.transform_line("G0 X10.50 Y0").unwrap(), None);
    }

    #[test]
    fn test_relative_moves_accumulate_before_shearing() {
        let mut t = GCodeShearTransformer::new(xy(0.1));
        assert_eq!(t.transform_line("G90").unwrap(), None);
        assert_eq!(t.transform_line("G1 X10 Y0").unwrap(), None);
        assert_eq!(t.transform_line("G91").unwrap(), None);
        // Absolute target is X15 Y0; with Y at zero the sheared delta is
        // still exactly 5, so the line is untouched.
        assert_eq!(t.transform_line("G1 X5").unwrap(), None);
    }

    #[test]
    fn test_relative_delta_is_resheared() {
        let mut t = GCodeShearTransformer::new(xy(0.1));
        t.transform_line("G1 X0 Y0").unwrap();
        t.transform_line("G91").unwrap();
        // A pure Y move stays pure (no X field appears), then an X+Y move
        // afterwards carries the shifted delta.
        assert_eq!(t.transform_line("G1 Y10").unwrap(), None);
        let out = t.transform_line("G1 X5 Y10").unwrap();
        // dx' = (5 + 0.1*20) - (0 + 0.1*10) = 6
        assert_eq!(out.as_deref(), Some("G1 X6 Y10"));
    }

    #[test]
    fn test_g92_updates_tracked_position() {
        let mut t = GCodeShearTransformer::new(xy(0.1));
        assert_eq!(t.transform_line("G92 X0 Y50").unwrap(), None);
        let out = t.transform_line("G1 X10 Y50").unwrap();
        assert_eq!(out.as_deref(), Some("G1 X15 Y50"));
    }

    #[test]
    fn test_xz_and_yz_shear_use_z() {
        let factors = SkewFactors::default()
            .with(Plane::Xz, 0.01)
            .with(Plane::Yz, -0.02);
        let mut t = GCodeShearTransformer::new(factors);
        let out = t.transform_line("G1 X10 Y10 Z100").unwrap();
        assert_eq!(out.as_deref(), Some("G1 X11 Y8 Z100"));
    }

    #[test]
    fn test_malformed_axis_field_is_fatal() {
        let mut t = GCodeShearTransformer::new(xy(0.1));
        let err = t.transform_line("G1 Xabc Y10").unwrap_err();
        assert!(matches!(err, SkewError::MalformedInstruction { line: 1, .. }));
    }

    #[test]
    fn test_malformed_feedrate_is_fatal_too() {
        let mut t = GCodeShearTransformer::new(xy(0.1));
        assert!(t.transform_line("G1 X10 F").is_err());
    }

    #[test]
    fn test_inline_comment_is_preserved() {
        let mut t = GCodeShearTransformer::new(xy(0.1));
        let out = t.transform_line("G1 X10 Y10 ; outer wall").unwrap();
        assert_eq!(out.as_deref(), Some("G1 X11 Y10 ; outer wall"));
    }
}
