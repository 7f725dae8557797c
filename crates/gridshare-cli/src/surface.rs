//! File-backed host capabilities for the terminal.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gridshare_common::Config;
use gridshare_sync::{Document, EditingSurface, ImportFile, Navigator, Route, SurfaceError};

/// A grid kept in a JSON file.
///
/// The file is re-read on every snapshot so edits made in another editor are
/// picked up by the next save. Detached surfaces keep the grid in memory only.
#[derive(Clone)]
pub struct FileSurface {
    inner: Arc<Mutex<SurfaceState>>,
}

struct SurfaceState {
    document: Document,
    path: Option<PathBuf>,
    export_path: PathBuf,
}

impl FileSurface {
    /// Surface over an existing document file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SurfaceError> {
        let path = path.as_ref();
        let document = read_document(path)?;
        Ok(Self::new(document, Some(path.to_path_buf())))
    }

    /// Surface over `path`, starting blank. The file is written on the first
    /// replace.
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self::new(Document::blank(), Some(path.as_ref().to_path_buf()))
    }

    /// In-memory surface.
    pub fn detached(document: Document) -> Self {
        Self::new(document, None)
    }

    fn new(document: Document, path: Option<PathBuf>) -> Self {
        let export_path = path
            .as_deref()
            .map(|p| p.with_extension("export.json"))
            .unwrap_or_else(|| PathBuf::from("gridshare-export.json"));
        Self {
            inner: Arc::new(Mutex::new(SurfaceState {
                document,
                path,
                export_path,
            })),
        }
    }

    pub fn set_export_path(&self, path: impl Into<PathBuf>) {
        self.state().export_path = path.into();
    }

    pub fn export_path(&self) -> PathBuf {
        self.state().export_path.clone()
    }

    fn state(&self) -> MutexGuard<'_, SurfaceState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refresh from the backing file, falling back to the last known grid.
    fn snapshot(state: &mut SurfaceState) -> Document {
        if let Some(path) = &state.path {
            match read_document(path) {
                Ok(document) => state.document = document,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "using last known grid"),
            }
        }
        state.document.clone()
    }
}

impl EditingSurface for FileSurface {
    fn current_document(&self) -> Document {
        Self::snapshot(&mut self.state())
    }

    fn replace_document(&self, document: Document) {
        let mut state = self.state();
        if let Some(path) = &state.path {
            if let Err(e) = write_document(path, &document) {
                tracing::warn!(path = %path.display(), error = %e, "could not write grid");
            }
        }
        state.document = document;
    }

    async fn import_from(&self, file: &ImportFile) -> Result<(), SurfaceError> {
        Err(SurfaceError::Import(format!(
            "{} is a workbook; the terminal host only reads JSON documents",
            file.name
        )))
    }

    async fn export_current(&self) -> Result<(), SurfaceError> {
        let (document, path) = {
            let mut state = self.state();
            (Self::snapshot(&mut state), state.export_path.clone())
        };
        write_document(&path, &document).map_err(|e| SurfaceError::Export(e.to_string()))?;
        tracing::info!(path = %path.display(), "grid exported");
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<Document, SurfaceError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SurfaceError::Internal(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| SurfaceError::Internal(format!("{}: {e}", path.display())))
}

fn write_document(path: &Path, document: &Document) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(document)?;
    std::fs::write(path, json)
}

/// Prints the share link instead of changing a URL bar.
pub struct PrintNavigator {
    config: Config,
}

impl PrintNavigator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl Navigator for PrintNavigator {
    fn navigate(&self, route: &Route) {
        match route.identifier() {
            Some(id) => println!("→ {}", self.config.share_link(id)),
            None => println!("→ no longer shared"),
        }
    }
}
