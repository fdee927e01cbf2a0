use crate::{error::FileError, store::FileStore};
use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, warn};

/// [`FileStore`] backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, dir: &Path) -> PathBuf {
        self.root.join(dir)
    }
}

/// `name`, or `stem (n).ext` with the lowest `n` not yet taken in `dir`.
async fn free_name(dir: &Path, name: &str) -> Result<String, FileError> {
    if !fs::try_exists(dir.join(name)).await? {
        return Ok(name.to_string());
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    let mut n = 1u32;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if !fs::try_exists(dir.join(&candidate)).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn list(&self, dir: &Path) -> Result<Vec<String>, FileError> {
        let mut entries = match fs::read_dir(self.resolve(dir)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with('.')
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read(&self, dir: &Path, name: &str) -> Result<Vec<u8>, FileError> {
        match fs::read(self.resolve(dir).join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FileError::NotFound(dir.join(name).display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn move_file(&self, from: &Path, name: &str, to: &Path) -> Result<(), FileError> {
        let source = self.resolve(from).join(name);
        let target_dir = self.resolve(to);
        fs::create_dir_all(&target_dir).await?;

        let target_name = free_name(&target_dir, name).await?;
        if target_name != name {
            warn!(
                file = name,
                to = %to.display(),
                renamed = %target_name,
                "Target already holds a file of that name, keeping both"
            );
        }

        match fs::rename(&source, target_dir.join(&target_name)).await {
            Ok(()) => {
                debug!(file = name, from = %from.display(), to = %to.display(), "Moved file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FileError::NotFound(from.join(name).display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, dir: &Path, name: &str, bytes: &[u8]) -> Result<(), FileError> {
        let target = self.resolve(dir);
        fs::create_dir_all(&target).await?;
        fs::write(target.join(name), bytes).await?;
        Ok(())
    }
}
