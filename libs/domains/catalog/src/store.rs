//! Whole-document persistence of the catalog file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::error::{CatalogError, CatalogResult};
use crate::models::CatalogDocument;

/// Catalog file at an explicit path.
///
/// There is no locking: two processes updating the same file concurrently
/// will lose one of the writes.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document. A missing file is an empty document.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> CatalogResult<CatalogDocument> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Catalog file does not exist, starting from an empty document");
                return Ok(CatalogDocument::default());
            }
            Err(e) => return Err(CatalogError::io(&self.path, e)),
        };

        let document: CatalogDocument =
            serde_json::from_str(&content).map_err(|source| CatalogError::Format {
                path: self.path.clone(),
                source,
            })?;

        debug!(providers = document.len(), "Loaded catalog");
        Ok(document)
    }

    /// Overwrite the file with the full document.
    ///
    /// The new content goes to a sibling temp file that is then renamed over
    /// the target, so readers see either the old or the new catalog.
    #[instrument(skip(self, document), fields(path = %self.path.display()))]
    pub fn save(&self, document: &CatalogDocument) -> CatalogResult<()> {
        let rendered = render(document)?;

        let file_name = self.path.file_name().ok_or_else(|| {
            CatalogError::InvalidInput(format!(
                "catalog path {} does not name a file",
                self.path.display()
            ))
        })?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
                parent.to_path_buf()
            }
            _ => PathBuf::from("."),
        };

        let temp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));
        fs::write(&temp_path, rendered.as_bytes()).map_err(|e| CatalogError::io(&temp_path, e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| CatalogError::io(&self.path, e))?;

        info!(providers = document.len(), "Saved catalog");
        Ok(())
    }

    /// Load, apply `mutate`, and save only if it succeeded.
    ///
    /// A failed mutation leaves the file exactly as it was.
    pub fn update<T, E, F>(&self, mutate: F) -> Result<T, E>
    where
        F: FnOnce(&mut CatalogDocument) -> Result<T, E>,
        E: From<CatalogError>,
    {
        let mut document = self.load()?;
        let outcome = mutate(&mut document)?;
        self.save(&document)?;
        Ok(outcome)
    }
}

/// Render a document the way it is stored: two-space indentation, `": "`
/// separators, non-ASCII left unescaped, trailing newline.
pub fn render(document: &CatalogDocument) -> CatalogResult<String> {
    let mut rendered = serde_json::to_string_pretty(document)?;
    rendered.push('\n');
    Ok(rendered)
}
