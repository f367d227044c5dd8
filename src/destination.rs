//! Scratch-directory path resolution for retrieved objects
//!
//! Object keys are attacker-influenced: anyone able to upload to the bucket
//! chooses them. A key is mapped to a path strictly below the scratch
//! directory, keeping its `/`-separated prefix as subdirectories.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Maximum number of path segments a key may expand to
const MAX_PATH_DEPTH: usize = 32;

/// Resolve the local destination for an object key
///
/// Rules:
/// 1. Reject NUL bytes
/// 2. Normalize `\` to `/`
/// 3. Drop empty and `.` segments (this also strips a leading `/`)
/// 4. Reject `..` segments
/// 5. Reject keys with no segment left
/// 6. Limit path depth
///
/// # Examples
///
/// ```
/// use s3_event_worker::destination::resolve;
/// use std::path::Path;
///
/// let path = resolve(Path::new("/tmp"), "reports/2024/q1.pdf").unwrap();
/// assert_eq!(path, Path::new("/tmp/reports/2024/q1.pdf"));
///
/// assert!(resolve(Path::new("/tmp"), "../etc/passwd").is_err());
/// ```
pub fn resolve(scratch_dir: &Path, key: &str) -> Result<PathBuf> {
    let unsafe_key = |reason| Error::UnsafeKey {
        key: key.to_string(),
        reason,
    };

    if key.contains('\0') {
        return Err(unsafe_key("contains NUL byte"));
    }

    let normalized = key.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(unsafe_key("parent directory segment")),
            // Windows drive prefixes such as "C:" would make the join absolute
            s if cfg!(windows) && s.contains(':') => {
                return Err(unsafe_key("drive prefix"));
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(unsafe_key("no file name"));
    }
    if segments.len() > MAX_PATH_DEPTH {
        return Err(unsafe_key("too many path segments"));
    }

    let mut path = scratch_dir.to_path_buf();
    path.extend(segments);
    Ok(path)
}

/// Whether `key` names a folder marker rather than an object with content
///
/// Consoles create these zero-byte placeholders with a trailing separator,
/// e.g. `photos/`. They map to a directory, never to a file.
pub fn is_folder_marker(key: &str) -> bool {
    key.ends_with('/') || key.ends_with('\\')
}
