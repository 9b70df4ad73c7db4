use crate::services::storage::CollisionPolicy;
use crate::utils::validation::FilenamePolicy;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Upload service configuration, fixed at process start
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory uploaded files are written to (default: "/uploads")
    pub upload_dir: PathBuf,

    /// Bind address (default: 0.0.0.0)
    pub host: IpAddr,

    /// Bind port (default: 5000)
    pub port: u16,

    /// Optional request body limit in bytes. `None` disables the limit entirely.
    pub max_file_size: Option<usize>,

    /// How client-supplied filenames are turned into paths (default: strip)
    pub filename_policy: FilenamePolicy,

    /// What happens when the target file already exists (default: overwrite)
    pub collision_policy: CollisionPolicy,

    /// Answer "No file part" / "No selected file" with 400 instead of 200 (default: false)
    pub strict_status: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("/uploads"),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
            max_file_size: None,
            filename_policy: FilenamePolicy::Strip,
            collision_policy: CollisionPolicy::Overwrite,
            strict_status: false,
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Unset or unparsable values fall back
    /// to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        Self {
            upload_dir: lookup("UPLOAD_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            host: parse_or("HOST", lookup("HOST"), default.host),

            port: parse_or("PORT", lookup("PORT"), default.port),

            max_file_size: lookup("MAX_FILE_SIZE")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|&size| size > 0)
                .or(default.max_file_size),

            filename_policy: parse_or(
                "FILENAME_POLICY",
                lookup("FILENAME_POLICY"),
                default.filename_policy,
            ),

            collision_policy: parse_or(
                "COLLISION_POLICY",
                lookup("COLLISION_POLICY"),
                default.collision_policy,
            ),

            strict_status: lookup("STRICT_STATUS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.strict_status),
        }
    }

    /// Create config for local development: uploads go to ./uploads on localhost
    pub fn development() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            max_file_size: None,
            filename_policy: FilenamePolicy::Strip,
            collision_policy: CollisionPolicy::Overwrite,
            strict_status: false,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr,
{
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using default", key, value);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = UploadConfig::default();
        assert_eq!(config.upload_dir, PathBuf::from("/uploads"));
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_file_size, None);
        assert_eq!(config.filename_policy, FilenamePolicy::Strip);
        assert_eq!(config.collision_policy, CollisionPolicy::Overwrite);
        assert!(!config.strict_status);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn test_development_config() {
        let config = UploadConfig::development();
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert!(config.host.is_loopback());
    }

    #[test]
    fn test_from_lookup_reads_every_key() {
        let config = UploadConfig::from_lookup(lookup_from(&[
            ("UPLOAD_DIR", "/srv/drop"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("MAX_FILE_SIZE", "1048576"),
            ("FILENAME_POLICY", "reject"),
            ("COLLISION_POLICY", "rename"),
            ("STRICT_STATUS", "TRUE"),
        ]));

        assert_eq!(config.upload_dir, PathBuf::from("/srv/drop"));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.max_file_size, Some(1_048_576));
        assert_eq!(config.filename_policy, FilenamePolicy::Reject);
        assert_eq!(config.collision_policy, CollisionPolicy::Rename);
        assert!(config.strict_status);
    }

    #[test]
    fn test_from_lookup_falls_back_on_garbage() {
        let config = UploadConfig::from_lookup(lookup_from(&[
            ("UPLOAD_DIR", "   "),
            ("PORT", "not-a-port"),
            ("MAX_FILE_SIZE", "0"),
            ("FILENAME_POLICY", "sanitize-everything"),
            ("STRICT_STATUS", "yes please"),
        ]));

        assert_eq!(config.upload_dir, PathBuf::from("/uploads"));
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_file_size, None);
        assert_eq!(config.filename_policy, FilenamePolicy::Strip);
        assert!(!config.strict_status);
    }
}
