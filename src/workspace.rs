//! On-disk layout of an annotation workspace.
//!
//! ```text
//! <root>/
//! ├── images/               working copies of annotated images
//! ├── annotations/<stem>.csv
//! ├── reports/<stem>.txt
//! ├── reports/<stem>_annotated.png
//! └── latest_session.log    name of the most recently active image
//! ```
//!
//! Files are matched by stem, so `slide.png` and `slide.jpg` are the same
//! sample.

use std::path::{Path, PathBuf};

use crate::config::WorkspaceConfig;
use crate::error::{AnnotationError, Result};
use crate::format::{AnnotationReport, ExportProjection, read_store_from_path};
use crate::model::LabelCatalog;
use crate::store::PointStore;

/// File stem of an image name (`"slide_01.png"` → `"slide_01"`).
pub fn stem_of(name: &str) -> String {
    Path::new(name.trim())
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .trim()
        .to_string()
}

/// Paths of the folders and files making up a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    image_dir: PathBuf,
    annotation_dir: PathBuf,
    report_dir: PathBuf,
    session_marker: PathBuf,
}

impl Workspace {
    /// Workspace with the default layout under `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::from_config(root, &WorkspaceConfig::default())
    }

    /// Workspace with folder names taken from configuration, relative to `root`.
    pub fn from_config(root: impl AsRef<Path>, config: &WorkspaceConfig) -> Self {
        let root = root.as_ref();
        Self {
            image_dir: root.join(&config.image_dir),
            annotation_dir: root.join(&config.annotation_dir),
            report_dir: root.join(&config.report_dir),
            session_marker: root.join(&config.session_marker),
        }
    }

    /// Create the workspace folders if they do not exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.image_dir, &self.annotation_dir, &self.report_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Folder holding working image copies.
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// CSV path for an image.
    pub fn annotation_path(&self, image_name: &str) -> PathBuf {
        self.annotation_dir.join(format!("{}.csv", stem_of(image_name)))
    }

    /// Text report path for an image.
    pub fn report_path(&self, image_name: &str) -> PathBuf {
        self.report_dir.join(format!("{}.txt", stem_of(image_name)))
    }

    /// Annotated PNG path for an image.
    pub fn overlay_path(&self, image_name: &str) -> PathBuf {
        self.report_dir.join(format!("{}_annotated.png", stem_of(image_name)))
    }

    /// Find the working copy of an image by stem, ignoring its extension.
    pub fn find_image(&self, image_name: &str) -> Option<PathBuf> {
        let wanted = stem_of(image_name);
        let entries = std::fs::read_dir(&self.image_dir).ok()?;
        let mut matches: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| stem_of(n) == wanted)
            })
            .collect();
        matches.sort();
        matches.into_iter().next()
    }

    /// Check whether a working copy of the image exists.
    pub fn has_image(&self, image_name: &str) -> bool {
        self.find_image(image_name).is_some()
    }

    /// Check whether the image has a persisted annotation CSV.
    pub fn has_annotations(&self, image_name: &str) -> bool {
        self.annotation_path(image_name).is_file()
    }

    /// Store a working copy of an uploaded image under its original name.
    pub fn store_image(&self, image_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.image_dir)?;
        let file_name = Path::new(image_name.trim())
            .file_name()
            .ok_or_else(|| AnnotationError::missing(image_name))?;
        let path = self.image_dir.join(file_name);
        std::fs::write(&path, bytes)?;
        log::info!("Stored image copy at {:?}", path);
        Ok(path)
    }

    /// Decode the working copy of an image.
    pub fn open_image(&self, image_name: &str) -> Result<image::DynamicImage> {
        let path = self
            .find_image(image_name)
            .ok_or_else(|| AnnotationError::missing(self.image_dir.join(image_name)))?;
        Ok(image::open(&path)?)
    }

    /// Recover the store of an image from its CSV.
    ///
    /// Fails with `MissingResource` when no CSV exists.
    pub fn load_store(&self, image_name: &str, catalog: &LabelCatalog) -> Result<PointStore> {
        read_store_from_path(&self.annotation_path(image_name), catalog)
    }

    /// Write the CSV and text report of an image.
    pub fn persist(&self, image_name: &str, store: &PointStore) -> Result<ExportProjection> {
        std::fs::create_dir_all(&self.annotation_dir)?;
        std::fs::create_dir_all(&self.report_dir)?;

        let projection = ExportProjection::from_store(store)?;
        let csv_path = self.annotation_path(image_name);
        std::fs::write(&csv_path, projection.to_csv()?)?;

        let report = AnnotationReport::new(&stem_of(image_name), &projection);
        std::fs::write(self.report_path(image_name), report.to_text())?;

        log::info!(
            "Persisted {} points for '{}' to {:?}",
            store.len(),
            image_name,
            csv_path
        );
        Ok(projection)
    }

    /// Write an already encoded annotated PNG.
    pub fn write_overlay(&self, image_name: &str, png: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.report_dir)?;
        let path = self.overlay_path(image_name);
        std::fs::write(&path, png)?;
        Ok(path)
    }

    /// Name of the most recently active image, if recorded.
    pub fn latest_session(&self) -> Option<String> {
        match std::fs::read_to_string(&self.session_marker) {
            Ok(contents) => {
                let name = contents.trim();
                (!name.is_empty()).then(|| name.to_string())
            }
            Err(e) => {
                log::debug!("No session marker at {:?}: {}", self.session_marker, e);
                None
            }
        }
    }

    /// Record `image_name` as the most recently active image.
    pub fn write_latest_session(&self, image_name: &str) -> Result<()> {
        if let Some(parent) = self.session_marker.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.session_marker, image_name)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnnotationError;
    use crate::model::Point;

    #[test]
    fn test_stem_of() {
        assert_eq!(stem_of("slide_01.png"), "slide_01");
        assert_eq!(stem_of("archive.tar.gz"), "archive.tar");
        assert_eq!(stem_of(" sample "), "sample");
        assert_eq!(stem_of("noext"), "noext");
    }

    #[test]
    fn test_paths_use_stem() {
        let ws = Workspace::new("/data");
        assert_eq!(
            ws.annotation_path("slide.jpg"),
            PathBuf::from("/data/annotations/slide.csv")
        );
        assert_eq!(ws.report_path("slide.jpg"), PathBuf::from("/data/reports/slide.txt"));
        assert_eq!(
            ws.overlay_path("slide.jpg"),
            PathBuf::from("/data/reports/slide_annotated.png")
        );
    }

    #[test]
    fn test_find_image_ignores_extension() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        ws.store_image("slide.png", b"not really a png").unwrap();

        assert!(ws.has_image("slide.jpg"));
        assert!(ws.has_image("slide"));
        assert!(!ws.has_image("other.png"));
    }

    #[test]
    fn test_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let catalog = LabelCatalog::default();

        let mut store = PointStore::new(catalog.clone());
        store.upsert(Point::new(4, 2), 0).unwrap();
        store.upsert(Point::new(1, 9), 1).unwrap();
        ws.persist("slide.png", &store).unwrap();

        assert!(ws.has_annotations("slide.png"));
        let report = std::fs::read_to_string(ws.report_path("slide.png")).unwrap();
        assert!(report.contains("Image name: slide"));

        let loaded = ws.load_store("slide.png", &catalog).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_load_missing_csv() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let err = ws
            .load_store("ghost.png", &LabelCatalog::default())
            .unwrap_err();
        assert!(matches!(err, AnnotationError::MissingResource { .. }));
    }

    #[test]
    fn test_latest_session_marker() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        assert_eq!(ws.latest_session(), None);

        ws.write_latest_session("slide_07.png").unwrap();
        assert_eq!(ws.latest_session().as_deref(), Some("slide_07.png"));
    }
}
