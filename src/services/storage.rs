use crate::utils::validation::{FilenamePolicy, ValidationError, resolve_upload_path};
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

/// Upper bound on `name-N.ext` candidates tried by [`CollisionPolicy::Rename`]
const MAX_RENAME_ATTEMPTS: usize = 10_000;

/// What to do when an upload targets a name that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Replace the existing file. Last write wins.
    Overwrite,
    /// Refuse the upload and keep the existing file.
    Reject,
    /// Store under the first free `name-N.ext`.
    Rename,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "reject" => Ok(Self::Reject),
            "rename" => Ok(Self::Rename),
            other => Err(format!("unknown collision policy '{}'", other)),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Overwrite => "overwrite",
            Self::Reject => "reject",
            Self::Rename => "rename",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Final on-disk file name
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0}")]
    InvalidName(#[from] ValidationError),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Writes everything `reader` yields to the file named by `filename`.
    async fn store<'a>(
        &self,
        filename: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<StoredFile, StorageError>;

    /// Whether the upload directory exists and is a directory.
    async fn root_available(&self) -> bool;

    fn root(&self) -> &Path;
}

/// Stores uploads as plain files in a single directory
pub struct LocalStorageService {
    root: PathBuf,
    filename_policy: FilenamePolicy,
    collision_policy: CollisionPolicy,
}

impl LocalStorageService {
    pub fn new(
        root: PathBuf,
        filename_policy: FilenamePolicy,
        collision_policy: CollisionPolicy,
    ) -> Self {
        Self {
            root,
            filename_policy,
            collision_policy,
        }
    }

    /// Moves a fully written staging file to its target according to the collision policy.
    async fn commit(&self, staging: &Path, target: &Path) -> Result<PathBuf, StorageError> {
        match self.collision_policy {
            CollisionPolicy::Overwrite => {
                fs::rename(staging, target).await?;
                Ok(target.to_path_buf())
            }
            CollisionPolicy::Reject => match fs::hard_link(staging, target).await {
                Ok(()) => {
                    discard(staging).await;
                    Ok(target.to_path_buf())
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Err(StorageError::AlreadyExists(display_name(target)))
                }
                Err(e) => Err(e.into()),
            },
            CollisionPolicy::Rename => {
                for attempt in 0..MAX_RENAME_ATTEMPTS {
                    let candidate = candidate_path(target, attempt);
                    match fs::hard_link(staging, &candidate).await {
                        Ok(()) => {
                            discard(staging).await;
                            return Ok(candidate);
                        }
                        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(StorageError::AlreadyExists(display_name(target)))
            }
        }
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn store<'a>(
        &self,
        filename: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> Result<StoredFile, StorageError> {
        let target = resolve_upload_path(&self.root, filename, self.filename_policy)?;
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let staging = parent.join(format!(".{}.part", Uuid::new_v4()));

        let size = match write_staging(&staging, &mut reader).await {
            Ok(size) => size,
            Err(e) => {
                discard(&staging).await;
                return Err(e.into());
            }
        };

        let path = match self.commit(&staging, &target).await {
            Ok(path) => path,
            Err(e) => {
                discard(&staging).await;
                return Err(e);
            }
        };

        tracing::debug!("Stored {} bytes at {}", size, path.display());

        Ok(StoredFile {
            name: display_name(&path),
            path,
            size,
        })
    }

    async fn root_available(&self) -> bool {
        fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

async fn write_staging<R>(path: &Path, reader: &mut R) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = fs::File::create(path).await?;
    let size = tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    Ok(size)
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove staging file {}: {}", path.display(), e);
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `report.txt` -> `report.txt`, `report-1.txt`, `report-2.txt`, ...
fn candidate_path(target: &Path, attempt: usize) -> PathBuf {
    if attempt == 0 {
        return target.to_path_buf();
    }

    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{}-{}.{}", stem, attempt, ext.to_string_lossy()),
        None => format!("{}-{}", stem, attempt),
    };
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir, collision_policy: CollisionPolicy) -> LocalStorageService {
        LocalStorageService::new(
            dir.path().to_path_buf(),
            FilenamePolicy::Strip,
            collision_policy,
        )
    }

    async fn store_bytes(
        storage: &LocalStorageService,
        name: &str,
        data: &'static [u8],
    ) -> Result<StoredFile, StorageError> {
        storage.store(name, Box::new(data)).await
    }

    fn entries(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_candidate_path() {
        let target = Path::new("/uploads/report.txt");
        assert_eq!(candidate_path(target, 0), PathBuf::from("/uploads/report.txt"));
        assert_eq!(candidate_path(target, 2), PathBuf::from("/uploads/report-2.txt"));
        assert_eq!(
            candidate_path(Path::new("/uploads/README"), 1),
            PathBuf::from("/uploads/README-1")
        );
    }

    #[test]
    fn test_collision_policy_from_str() {
        assert_eq!(
            "Overwrite".parse::<CollisionPolicy>().unwrap(),
            CollisionPolicy::Overwrite
        );
        assert!("version".parse::<CollisionPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_store_writes_file_and_leaves_no_staging() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir, CollisionPolicy::Overwrite);

        let stored = store_bytes(&storage, "report.txt", b"hello").await.unwrap();
        assert_eq!(stored.name, "report.txt");
        assert_eq!(stored.size, 5);
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"hello");
        assert_eq!(entries(&dir), vec!["report.txt"]);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_last_write() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir, CollisionPolicy::Overwrite);

        store_bytes(&storage, "a.txt", b"first").await.unwrap();
        store_bytes(&storage, "a.txt", b"second").await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"second");
        assert_eq!(entries(&dir), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_reject_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir, CollisionPolicy::Reject);

        store_bytes(&storage, "a.txt", b"first").await.unwrap();
        let err = store_bytes(&storage, "a.txt", b"second").await.unwrap_err();

        assert!(matches!(err, StorageError::AlreadyExists(ref name) if name == "a.txt"));
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"first");
        assert_eq!(entries(&dir), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_rename_picks_next_free_name() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir, CollisionPolicy::Rename);

        store_bytes(&storage, "a.txt", b"one").await.unwrap();
        let second = store_bytes(&storage, "a.txt", b"two").await.unwrap();
        let third = store_bytes(&storage, "a.txt", b"three").await.unwrap();

        assert_eq!(second.name, "a-1.txt");
        assert_eq!(third.name, "a-2.txt");
        assert_eq!(entries(&dir), vec!["a-1.txt", "a-2.txt", "a.txt"]);
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_invalid_name_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir, CollisionPolicy::Overwrite);

        let err = store_bytes(&storage, "../", b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
        assert!(entries(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_is_io_error() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorageService::new(
            dir.path().join("missing"),
            FilenamePolicy::Strip,
            CollisionPolicy::Overwrite,
        );

        assert!(!storage.root_available().await);
        let err = store_bytes(&storage, "a.txt", b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
