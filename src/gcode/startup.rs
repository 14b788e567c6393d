// src/gcode/startup.rs - Keeping the skew command in a printer's start G-code in sync
//
// Firmware-side compensation wants the generated M852 / SET_SKEW line in the
// start G-code. Lines we insert carry a marker comment so a later sync can
// find and replace a stale command without touching anything the user wrote
// themselves.

/// Marker appended to every command this crate inserts into start G-code.
pub const MARKER_COMMENT: &str = "; skewcomp";

/// Tags a generated firmware command so [`sync_start_gcode`] can recognize
/// it later.
pub fn tag(command: &str) -> String {
    format!("{command} {MARKER_COMMENT}")
}

fn is_our_skew_line(line: &str) -> bool {
    let trimmed = line.trim();
    (trimmed.starts_with("M852") || trimmed.starts_with("SET_SKEW"))
        && trimmed.contains(MARKER_COMMENT)
}

/// Ensures exactly the desired tagged skew command (or none) is present in
/// `start_gcode`.
///
/// Previously inserted skew commands that no longer match are removed;
/// user-authored lines are always kept. Returns the new text and whether it
/// differs from the input. `desired` should come from [`tag`]; `None` strips
/// our commands entirely (compensation switched off or moved to
/// post-processing).
pub fn sync_start_gcode(start_gcode: &str, desired: Option<&str>) -> (String, bool) {
    let mut kept: Vec<&str> = Vec::new();
    let mut found_desired = false;
    let mut removed = false;

    for line in start_gcode.lines() {
        if !is_our_skew_line(line) {
            kept.push(line);
        } else if desired.is_some_and(|cmd| line.trim() == cmd) {
            kept.push(line);
            found_desired = true;
        } else {
            removed = true;
        }
    }

    let mut added = false;
    if let Some(cmd) = desired {
        if !found_desired && !kept.iter().any(|line| line.trim() == cmd) {
            kept.push(cmd);
            added = true;
        }
    }

    if !removed && !added {
        return (start_gcode.to_string(), false);
    }
    let new_text = kept.join("\n");
    let changed = new_text != start_gcode;
    (new_text, changed)
}
