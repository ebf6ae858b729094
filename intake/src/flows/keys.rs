//! Object key derivation.
//!
//! Keys look like `{folder}/{timestamp_ms}_{sanitized-name}`. Every key of one submission shares
//! the submission's timestamp.

use crate::types::ObjectKey;

/// Replace each run of whitespace with `_`, then drop anything outside `[A-Za-z0-9_.-]`.
///
/// Total and idempotent: the output only ever contains the allowed characters.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.chars() {
        if is_separator_whitespace(c) {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;

        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            out.push(c);
        }
    }

    out
}

/// The whitespace set browsers match with `\s`: Unicode `White_Space` without U+0085, plus the
/// byte order mark U+FEFF
fn is_separator_whitespace(c: char) -> bool {
    match c {
        '\u{85}' => false,
        '\u{FEFF}' => true,
        c => c.is_whitespace(),
    }
}

pub fn object_key(folder: &str, submitted_at_ms: i64, file_name: &str) -> ObjectKey {
    ObjectKey::new(format!("{folder}/{submitted_at_ms}_{}", sanitize_file_name(file_name)))
}
