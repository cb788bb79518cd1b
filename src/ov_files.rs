use std::fs;
use std::path::{Path, PathBuf};

use hashbrown::HashSet;

use crate::ov_error::PeerError;
use crate::ov_interface::FileName;

/// Names of the files a peer exposes. Taken once when the peer starts and
/// never rescanned: a file dropped into the folder later is not served.
#[derive(Debug, Clone)]
pub struct FileSet {
    folder: PathBuf,
    names: HashSet<FileName>,
}

impl FileSet {
    /// Snapshot `folder`, creating it (empty) when missing
    pub fn scan(folder: impl AsRef<Path>) -> Result<Self, PeerError> {
        let folder = folder.as_ref().to_path_buf();
        let folder_error = |source| PeerError::SharedFolder {
            path: folder.clone(),
            source,
        };

        fs::create_dir_all(&folder).map_err(folder_error)?;

        let mut names = HashSet::new();
        for entry in fs::read_dir(&folder).map_err(folder_error)? {
            let entry = entry.map_err(folder_error)?;
            if !entry.file_type().map_err(folder_error)?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.insert(name.to_string());
            }
        }

        Ok(Self { folder, names })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.names.contains(filename)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Content of an exposed file. `Ok(None)` when the name is not part of the
    /// snapshot or the file has since disappeared from disk. A
    /// `downloaded_<filename>` artifact written after startup is therefore
    /// not served, unlike a server that opens any name on disk.
    pub async fn read(&self, filename: &str) -> std::io::Result<Option<Vec<u8>>> {
        if !self.contains(filename) {
            return Ok(None);
        }
        match tokio::fs::read(self.folder.join(filename)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
