//! Misc shared helpers.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Canonical string form of a path as stored in the `files` table.
///
/// Windows paths are normalised to forward slashes so records stay
/// comparable across tools reading the same index.
pub fn to_db_path<P: AsRef<Path>>(path: P) -> String {
    let s = path.as_ref().to_string_lossy().into_owned();
    if cfg!(windows) {
        s.replace('\\', "/")
    } else {
        s
    }
}

/// Lowercased extension of `name` without the dot.
///
/// Empty when the name has no dot or ends with one; a leading dot counts,
/// so `.bashrc` yields `bashrc`.
pub fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => name[idx + 1..].to_lowercase(),
        _ => String::new(),
    }
}

/// Current wall-clock time in epoch milliseconds, the unit every timestamp
/// column uses.
pub fn now_millis() -> i64 {
    system_time_millis(SystemTime::now())
}

/// Epoch milliseconds for `t`; pre-epoch times come out negative.
pub fn system_time_millis(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside a
/// `LIKE ... ESCAPE '\'` pattern.
pub fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
