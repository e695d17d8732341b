//! Path and identifier helpers.
//!
//! Project-relative paths are always handled with `/` separators so that the
//! compiled graph is identical across platforms.

/// Normalize Windows separators to `/`.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Last path segment, e.g. `definitions/a/b.sqlx` -> `b.sqlx`.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Everything before the last path segment, or `""` for a bare file name.
pub fn dir_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// File name up to its first `.`, e.g. `definitions/x.assert.sql` -> `x`.
pub fn base_filename(path: &str) -> &str {
    let name = file_name(path);
    match name.find('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Extension after the last `.` of the file name, without the dot.
pub fn file_extension(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => "",
    }
}

/// Join two project-relative paths, collapsing `.` segments and empty parts.
///
/// `..` segments are kept as-is; callers that must stay inside the project
/// reject them separately.
pub fn join(base: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(relative.split('/')) {
        if segment.is_empty() || segment == "." {
            continue;
        }
        parts.push(segment);
    }
    parts.join("/")
}

/// Turn a file base name into something usable as a template variable name.
pub fn variable_name_friendly(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '-' | '@' | '/'))
        .collect()
}

/// True if `affix` only contains characters allowed in generated schema names.
pub fn is_valid_affix(affix: &str) -> bool {
    affix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[path = "path_test.rs"]
mod tests;
