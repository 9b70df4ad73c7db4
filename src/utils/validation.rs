use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How a client-supplied filename is mapped onto the upload directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenamePolicy {
    /// Join the name onto the directory verbatim. Names containing `..` or an absolute
    /// path escape the directory.
    Raw,
    /// Keep only the final path component.
    Strip,
    /// Refuse any name that carries a path separator.
    Reject,
}

impl FromStr for FilenamePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "strip" => Ok(Self::Strip),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown filename policy '{}'", other)),
        }
    }
}

impl fmt::Display for FilenamePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Raw => "raw",
            Self::Strip => "strip",
            Self::Reject => "reject",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn invalid_name(filename: &str) -> ValidationError {
    ValidationError {
        code: "INVALID_FILENAME",
        message: format!("Filename '{}' does not name a file", filename.escape_debug()),
    }
}

/// Resolves the on-disk path for an uploaded file.
///
/// Returns the full target path. Callers are expected to have rejected the empty filename
/// already.
pub fn resolve_upload_path(
    dir: &Path,
    filename: &str,
    policy: FilenamePolicy,
) -> Result<PathBuf, ValidationError> {
    if filename.contains('\0') {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename contains a NUL byte".to_string(),
        });
    }

    match policy {
        FilenamePolicy::Raw => Ok(dir.join(filename)),
        FilenamePolicy::Strip => {
            if filename.contains("..") || filename.chars().any(is_separator) {
                tracing::warn!("Path traversal attempt detected: {}", filename);
            }

            let name = filename.rsplit(is_separator).next().unwrap_or("");
            if name.is_empty() || name == "." || name == ".." {
                return Err(invalid_name(filename));
            }
            Ok(dir.join(name))
        }
        FilenamePolicy::Reject => {
            if filename.chars().any(is_separator) {
                tracing::warn!("Rejected filename with path separators: {}", filename);
                return Err(ValidationError {
                    code: "PATH_IN_FILENAME",
                    message: format!(
                        "Filename '{}' must not contain path separators",
                        filename.escape_debug()
                    ),
                });
            }
            if filename == "." || filename == ".." {
                return Err(invalid_name(filename));
            }
            Ok(dir.join(filename))
        }
    }
}
