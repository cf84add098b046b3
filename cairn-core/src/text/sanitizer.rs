use crate::digest::short_hash;

/// Windows device names that cannot be used as file or folder names.
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Map a token or joined name to a filesystem-safe path segment.
///
/// Keeps ASCII alphanumerics, `-` and `_`. Empty or reserved results fall
/// back to `_` followed by the first 8 hex chars of the input's SHA-256.
pub fn sanitize(input: &str) -> String {
    let trimmed = input.trim_end_matches(['.', ' ']);
    let clean: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    if clean.is_empty() || is_reserved(&clean) {
        return fallback_name(input);
    }
    clean
}

pub fn is_reserved(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    RESERVED_NAMES.contains(&upper.as_str())
}

fn fallback_name(input: &str) -> String {
    format!("_{}", short_hash(input))
}
