//! Path operations over `/`-joined workspace paths.
//!
//! Pure string functions used by every cascading tree operation. Paths are
//! absolute (`/src/main.rs`); the workspace root sentinel is [`ROOT`].

use crate::error::TreeError;
use unicode_normalization::UnicodeNormalization;

/// Workspace root sentinel.
pub const ROOT: &str = "/";

/// True iff `candidate == base` or `candidate` lies under `base`.
///
/// `/foo2` is not a descendant of `/foo`. Every path is under [`ROOT`].
pub fn is_descendant_or_self(candidate: &str, base: &str) -> bool {
    if candidate == base {
        return true;
    }
    if base == ROOT {
        return candidate.starts_with('/');
    }
    candidate
        .strip_prefix(base)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

/// Replace the `old_base` prefix of `path` with `new_base`.
///
/// Paths outside `old_base` are returned unchanged.
pub fn rebase(path: &str, old_base: &str, new_base: &str) -> String {
    if !is_descendant_or_self(path, old_base) {
        return path.to_string();
    }
    if path == old_base {
        return new_base.to_string();
    }
    let rest = if old_base == ROOT {
        &path[1..]
    } else {
        &path[old_base.len() + 1..]
    };
    join(new_base, rest)
}

/// Substring before the last `/`, or [`ROOT`] when that substring is empty.
pub fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => ROOT.to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Substring after the last `/`.
pub fn base_name_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Join a base path and a child name without doubling the separator.
pub fn join(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Validate a single path segment and return its NFC form.
///
/// Rejects empty names, `.`/`..`, and names containing `/` or NUL.
pub fn validate_name(name: &str) -> Result<String, TreeError> {
    let normalized: String = name.trim().nfc().collect();
    if normalized.is_empty() {
        return Err(TreeError::InvalidPath("name cannot be empty".to_string()));
    }
    if normalized == "." || normalized == ".." {
        return Err(TreeError::InvalidPath(format!(
            "'{}' is not a valid name",
            normalized
        )));
    }
    if normalized.contains('/') || normalized.contains('\0') {
        return Err(TreeError::InvalidPath(format!(
            "'{}' must not contain '/'",
            normalized
        )));
    }
    Ok(normalized)
}

/// Canonicalize a user-supplied path: leading `/`, no empty segments, no
/// trailing `/`. Rejects `.` and `..` segments.
pub fn canonicalize_path(path: &str) -> Result<String, TreeError> {
    let mut out = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(TreeError::InvalidPath(path.to_string()));
        }
        out.push('/');
        out.extend(segment.nfc());
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}
