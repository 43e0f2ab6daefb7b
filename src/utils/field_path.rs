//! Dotted logical paths.
//!
//! A logical path names a location inside a document: `a.b.c`. The root is `"."`.
//! A literal dot inside a key is written `\.` so that `split_field` keeps it in one segment.

/// Split a dotted path into its segments. The root path yields no segments.
pub fn split_field(field: &str) -> Vec<String> {
    if field == "." || field.is_empty() {
        return Vec::new();
    }
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = field.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                current.push('.');
                chars.next();
            }
            '.' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

/// Join segments back into a dotted path, escaping dots inside segments.
pub fn join_field<S: AsRef<str>>(segments: &[S]) -> String {
    let parts: Vec<String> = segments
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !s.is_empty() && *s != ".")
        .map(|s| s.replace('.', "\\."))
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join(".")
    }
}

/// Escape a single document key for use as a path segment.
pub fn escape_key(key: &str) -> String {
    key.replace('.', "\\.")
}

pub fn concat_field(prefix: &str, suffix: &str) -> String {
    if prefix == "." || prefix.is_empty() {
        suffix.to_string()
    } else if suffix == "." || suffix.is_empty() {
        prefix.to_string()
    } else {
        format!("{}.{}", prefix, suffix)
    }
}

/// True when `field` is `prefix` or lies underneath it.
pub fn startswith_field(field: &str, prefix: &str) -> bool {
    if prefix == "." || prefix.is_empty() {
        return true;
    }
    if field == prefix {
        return true;
    }
    field.len() > prefix.len()
        && field.starts_with(prefix)
        && field.as_bytes()[prefix.len()] == b'.'
}

/// Path of `field` relative to `parent`; `"."` when they are equal.
///
/// Unrelated paths come back unchanged, so callers check `startswith_field` first.
pub fn relative_field(field: &str, parent: &str) -> String {
    if parent == "." || parent.is_empty() {
        return field.to_string();
    }
    if field == parent {
        return ".".to_string();
    }
    if startswith_field(field, parent) {
        return field[parent.len() + 1..].to_string();
    }
    field.to_string()
}

pub fn parent_field(field: &str) -> String {
    let mut segments = split_field(field);
    segments.pop();
    join_field(&segments)
}

/// Number of segments; the root has depth zero.
pub fn field_depth(field: &str) -> usize {
    split_field(field).len()
}

/// Total order that lists a parent before its descendants and siblings by name.
pub fn pre_order_key(field: &str) -> Vec<String> {
    split_field(field)
}
