//! Review queue of pre-annotated samples.
//!
//! Samples waiting for correction live in a to-do folder, reviewed ones
//! in a done folder. A sample is the set of files sharing a stem,
//! normally one image plus its `X,Y,Label` CSV. Finishing a sample moves
//! its files to the done folder and rewrites the CSV from the corrected
//! store. A sample may also carry a `<stem>.json` contour file, drawn
//! under the point markers when the sample is rendered.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::RenderConfig;
use crate::constants::{DONE_MARKER, IMAGE_EXTENSIONS};
use crate::error::{AnnotationError, Result};
use crate::format::{ContourSet, ExportProjection, read_store};
use crate::model::LabelCatalog;
use crate::store::PointStore;
use crate::workspace::stem_of;

/// A file held by a [`TaskStorage`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RemoteFile {
    pub folder: String,
    pub name: String,
}

impl RemoteFile {
    pub fn new(folder: &str, name: &str) -> Self {
        Self {
            folder: folder.to_string(),
            name: name.to_string(),
        }
    }

    pub fn stem(&self) -> String {
        stem_of(&self.name)
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
    }

    pub fn is_csv(&self) -> bool {
        self.extension().as_deref() == Some("csv")
    }

    pub fn is_json(&self) -> bool {
        self.extension().as_deref() == Some("json")
    }

    pub fn is_image(&self) -> bool {
        self.extension()
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// Folder-based storage of review tasks.
pub trait TaskStorage {
    /// Files directly inside `folder`.
    fn list(&self, folder: &str) -> Result<Vec<RemoteFile>>;

    fn read(&self, file: &RemoteFile) -> Result<Vec<u8>>;

    /// Overwrite the contents of an existing file.
    fn write(&self, file: &RemoteFile, bytes: &[u8]) -> Result<()>;

    /// Move `file` into `folder`, returning its new location.
    fn move_to(&self, file: &RemoteFile, folder: &str) -> Result<RemoteFile>;
}

/// [`TaskStorage`] over folders of the local filesystem.
///
/// Folder names are resolved against `root`; absolute folder names are
/// used as-is.
#[derive(Debug, Clone)]
pub struct LocalFolderStorage {
    root: PathBuf,
}

impl LocalFolderStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn folder_path(&self, folder: &str) -> PathBuf {
        self.root.join(folder)
    }

    fn file_path(&self, file: &RemoteFile) -> PathBuf {
        self.folder_path(&file.folder).join(&file.name)
    }
}

impl TaskStorage for LocalFolderStorage {
    fn list(&self, folder: &str) -> Result<Vec<RemoteFile>> {
        let dir = self.folder_path(folder);
        if !dir.is_dir() {
            return Err(AnnotationError::missing(dir));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                files.push(RemoteFile::new(folder, name));
            }
        }
        files.sort();
        Ok(files)
    }

    fn read(&self, file: &RemoteFile) -> Result<Vec<u8>> {
        let path = self.file_path(file);
        if !path.is_file() {
            return Err(AnnotationError::missing(path));
        }
        Ok(std::fs::read(path)?)
    }

    fn write(&self, file: &RemoteFile, bytes: &[u8]) -> Result<()> {
        let path = self.file_path(file);
        if !path.is_file() {
            return Err(AnnotationError::missing(path));
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn move_to(&self, file: &RemoteFile, folder: &str) -> Result<RemoteFile> {
        let target_dir = self.folder_path(folder);
        std::fs::create_dir_all(&target_dir)?;
        std::fs::rename(self.file_path(file), target_dir.join(&file.name))?;
        Ok(RemoteFile::new(folder, &file.name))
    }
}

/// One entry of the sample listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleEntry {
    pub name: String,
    pub done: bool,
}

impl SampleEntry {
    /// Name shown to reviewers, with a check mark for reviewed samples.
    pub fn display_name(&self) -> String {
        if self.done {
            format!("{} {}", self.name, DONE_MARKER)
        } else {
            self.name.clone()
        }
    }
}

/// Image and annotation files of one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFiles {
    pub image: RemoteFile,
    pub annotations: RemoteFile,
    /// Optional contour outlines
    pub contours: Option<RemoteFile>,
}

type SampleMap = BTreeMap<String, Vec<RemoteFile>>;

/// Review queue over a [`TaskStorage`].
#[derive(Debug)]
pub struct ReviewQueue<S: TaskStorage> {
    storage: S,
    todo_folder: String,
    done_folder: String,
    todo: SampleMap,
    done: SampleMap,
}

impl<S: TaskStorage> ReviewQueue<S> {
    /// List both folders and group their files by stem.
    pub fn load(storage: S, todo_folder: &str, done_folder: &str) -> Result<Self> {
        let todo = group_by_stem(storage.list(todo_folder)?);
        let done = group_by_stem(storage.list(done_folder)?);
        log::info!(
            "Loaded review queue: {} to do, {} done",
            todo.len(),
            done.len()
        );
        Ok(Self {
            storage,
            todo_folder: todo_folder.to_string(),
            done_folder: done_folder.to_string(),
            todo,
            done,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// All samples, pending ones first. A stem present in both folders
    /// is listed once, as done.
    pub fn samples(&self) -> Vec<SampleEntry> {
        let pending = self
            .todo
            .keys()
            .filter(|name| !self.done.contains_key(*name))
            .map(|name| SampleEntry {
                name: name.clone(),
                done: false,
            });
        let reviewed = self.done.keys().map(|name| SampleEntry {
            name: name.clone(),
            done: true,
        });
        pending.chain(reviewed).collect()
    }

    pub fn is_done(&self, sample: &str) -> bool {
        self.done.contains_key(sample)
    }

    fn files_of(&self, sample: &str) -> Result<&[RemoteFile]> {
        self.done
            .get(sample)
            .or_else(|| self.todo.get(sample))
            .map(Vec::as_slice)
            .ok_or_else(|| AnnotationError::missing(Path::new(&self.todo_folder).join(sample)))
    }

    /// Locate the image and CSV of a sample.
    pub fn fetch(&self, sample: &str) -> Result<SampleFiles> {
        let files = self.files_of(sample)?;
        let folder = files
            .first()
            .map(|f| f.folder.clone())
            .unwrap_or_else(|| self.todo_folder.clone());

        let annotations = files
            .iter()
            .find(|f| f.is_csv())
            .cloned()
            .ok_or_else(|| AnnotationError::missing(Path::new(&folder).join(format!("{sample}.csv"))))?;
        let image = files
            .iter()
            .find(|f| f.is_image())
            .cloned()
            .ok_or_else(|| AnnotationError::missing(Path::new(&folder).join(sample)))?;

        let contours = files.iter().find(|f| f.is_json()).cloned();

        Ok(SampleFiles {
            image,
            annotations,
            contours,
        })
    }

    /// Decode the image of a sample.
    pub fn read_image(&self, sample: &str) -> Result<image::DynamicImage> {
        let files = self.fetch(sample)?;
        let bytes = self.storage.read(&files.image)?;
        Ok(image::load_from_memory(&bytes)?)
    }

    /// Parse the pre-annotations of a sample into a store.
    pub fn read_store(&self, sample: &str, catalog: &LabelCatalog) -> Result<PointStore> {
        let files = self.fetch(sample)?;
        let bytes = self.storage.read(&files.annotations)?;
        read_store(bytes.as_slice(), catalog)
    }

    /// Parse the contour file of a sample, if it has one.
    pub fn read_contours(&self, sample: &str) -> Result<Option<ContourSet>> {
        let Some(file) = self.fetch(sample)?.contours else {
            return Ok(None);
        };
        let bytes = self.storage.read(&file)?;
        let json = std::str::from_utf8(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        ContourSet::from_json(json).map(Some)
    }

    /// Render a sample as an annotated PNG: contours under the markers of
    /// `store`.
    pub fn render(&self, sample: &str, store: &PointStore, style: &RenderConfig) -> Result<Vec<u8>> {
        let base = self.read_image(sample)?;
        let mut renderer = style.renderer();
        if let Some(contours) = self.read_contours(sample)? {
            log::debug!("Drawing {} contours for '{}'", contours.len(), sample);
            renderer = renderer.layer(style.contour_layer(&contours, base.width(), base.height()));
        }
        renderer.render_png(&base, store)
    }

    /// Mark a sample as reviewed and store its corrected annotations.
    ///
    /// Pending samples have all their files moved to the done folder
    /// first. The CSV is then rewritten from `store`.
    pub fn finish(&mut self, sample: &str, store: &PointStore) -> Result<()> {
        // Validate before moving anything
        self.fetch(sample)?;
        let csv = ExportProjection::from_store(store)?.to_csv()?;

        if let Some(files) = self.todo.remove(sample) {
            let mut moved = Vec::with_capacity(files.len());
            for file in &files {
                moved.push(self.storage.move_to(file, &self.done_folder)?);
            }
            log::info!("Moved {} files of '{}' to {}", moved.len(), sample, self.done_folder);
            self.done.insert(sample.to_string(), moved);
        }

        let files = self.fetch(sample)?;
        self.storage.write(&files.annotations, &csv)?;
        log::info!("Wrote {} corrected points for '{}'", store.len(), sample);
        Ok(())
    }
}

fn group_by_stem(files: Vec<RemoteFile>) -> SampleMap {
    let mut map = SampleMap::new();
    for file in files {
        map.entry(file.stem()).or_default().push(file);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point;

    fn setup() -> (tempfile::TempDir, ReviewQueue<LocalFolderStorage>) {
        let dir = tempfile::tempdir().unwrap();
        let todo = dir.path().join("todo");
        let done = dir.path().join("done");
        std::fs::create_dir_all(&todo).unwrap();
        std::fs::create_dir_all(&done).unwrap();

        std::fs::write(todo.join("b.png"), b"img").unwrap();
        std::fs::write(todo.join("b.csv"), "X,Y,Label\n1,2,Positivo\n").unwrap();
        std::fs::write(todo.join("a.jpg"), b"img").unwrap();
        std::fs::write(todo.join("a.csv"), "X,Y,Label\n").unwrap();
        std::fs::write(done.join("c.png"), b"img").unwrap();
        std::fs::write(done.join("c.csv"), "X,Y,Label\n").unwrap();
        std::fs::write(todo.join("orphan.png"), b"img").unwrap();

        let queue =
            ReviewQueue::load(LocalFolderStorage::new(dir.path()), "todo", "done").unwrap();
        (dir, queue)
    }

    #[test]
    fn test_samples_listing() {
        let (_dir, queue) = setup();
        let names: Vec<_> = queue.samples().iter().map(SampleEntry::display_name).collect();
        assert_eq!(names, vec!["a", "b", "orphan", "c (✅)"]);
    }

    #[test]
    fn test_fetch_pairs_files() {
        let (_dir, queue) = setup();
        let files = queue.fetch("b").unwrap();
        assert_eq!(files.image, RemoteFile::new("todo", "b.png"));
        assert_eq!(files.annotations, RemoteFile::new("todo", "b.csv"));
        assert_eq!(files.contours, None);
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 0, 255]));
        image.save(path).unwrap();
    }

    #[test]
    fn test_fetch_and_read_contours() {
        let (dir, queue) = setup();
        std::fs::write(dir.path().join("todo/a.json"), "[[[0, 0], [4, 0], [4, 4]]]").unwrap();
        let queue = ReviewQueue::load(queue.storage().clone(), "todo", "done").unwrap();

        let files = queue.fetch("a").unwrap();
        assert_eq!(files.contours, Some(RemoteFile::new("todo", "a.json")));
        assert_eq!(queue.read_contours("a").unwrap().map(|c| c.len()), Some(1));
        assert!(queue.read_contours("b").unwrap().is_none());
    }

    #[test]
    fn test_render_draws_contours_and_markers() {
        let dir = tempfile::tempdir().unwrap();
        let todo = dir.path().join("todo");
        std::fs::create_dir_all(&todo).unwrap();
        std::fs::create_dir_all(dir.path().join("done")).unwrap();
        write_png(&todo.join("s.png"), 32, 32);
        std::fs::write(todo.join("s.csv"), "X,Y,Label
16,16,Negativo
").unwrap();
        std::fs::write(
            todo.join("s.json"),
            r#"{"contours": [[[2, 2], [29, 2], [29, 29], [2, 29]]]}"#,
        )
        .unwrap();

        let queue = ReviewQueue::load(LocalFolderStorage::new(dir.path()), "todo", "done").unwrap();
        let catalog = LabelCatalog::default();
        let store = queue.read_store("s", &catalog).unwrap();
        let mut style = RenderConfig::default();
        style.layer_opacity = 1.0;

        let png = queue.render("s", &store, &style).unwrap();
        let rendered = image::load_from_memory(&png).unwrap().to_rgba8();

        let [r, g, b] = style.contour_color;
        assert_eq!(rendered.get_pixel(10, 2), &image::Rgba([r, g, b, 255]));
        assert_ne!(rendered.get_pixel(16 + 7, 16), &image::Rgba([0, 0, 0, 255]));
        assert_eq!(rendered.get_pixel(10, 10), &image::Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_malformed_contours() {
        let (dir, queue) = setup();
        std::fs::write(dir.path().join("todo/a.json"), "{\"shapes\": 3}").unwrap();
        let queue = ReviewQueue::load(queue.storage().clone(), "todo", "done").unwrap();
        assert!(matches!(queue.read_contours("a"), Err(AnnotationError::Json(_))));
    }

    #[test]
    fn test_fetch_missing_csv() {
        let (_dir, queue) = setup();
        assert!(matches!(
            queue.fetch("orphan"),
            Err(AnnotationError::MissingResource { .. })
        ));
        assert!(matches!(
            queue.fetch("nope"),
            Err(AnnotationError::MissingResource { .. })
        ));
    }

    #[test]
    fn test_read_store() {
        let (_dir, queue) = setup();
        let store = queue.read_store("b", &LabelCatalog::default()).unwrap();
        assert_eq!(store.label_of(&Point::new(1, 2)), Some(0));
    }

    #[test]
    fn test_finish_moves_and_rewrites() {
        let (dir, mut queue) = setup();
        let mut store = queue.read_store("b", &LabelCatalog::default()).unwrap();
        store.upsert(Point::new(9, 9), 1).unwrap();

        queue.finish("b", &store).unwrap();

        assert!(queue.is_done("b"));
        assert!(!dir.path().join("todo/b.png").exists());
        assert!(dir.path().join("done/b.png").exists());
        let csv = std::fs::read_to_string(dir.path().join("done/b.csv")).unwrap();
        assert_eq!(csv, "X,Y,Label\n1,2,Positivo\n9,9,Negativo\n");

        let names: Vec<_> = queue.samples().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "orphan", "b", "c"]);
    }

    #[test]
    fn test_finish_done_sample_only_rewrites() {
        let (dir, mut queue) = setup();
        let mut store = PointStore::new(LabelCatalog::default());
        store.upsert(Point::new(3, 4), 2).unwrap();

        queue.finish("c", &store).unwrap();
        let csv = std::fs::read_to_string(dir.path().join("done/c.csv")).unwrap();
        assert_eq!(csv, "X,Y,Label\n3,4,No importante\n");
    }

    #[test]
    fn test_finish_orphan_moves_nothing() {
        let (dir, mut queue) = setup();
        let store = PointStore::new(LabelCatalog::default());
        assert!(queue.finish("orphan", &store).is_err());
        assert!(dir.path().join("todo/orphan.png").exists());
    }

    #[test]
    fn test_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReviewQueue::load(LocalFolderStorage::new(dir.path()), "todo", "done");
        assert!(matches!(result, Err(AnnotationError::MissingResource { .. })));
    }
}
