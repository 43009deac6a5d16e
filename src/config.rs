//! Configuration file support for pointanno.
//!
//! Settings live in a JSON file, by default under the user's config
//! directory. Every section has defaults, so a partial file is valid.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ANNOTATION_DIR, DEFAULT_CONTOUR_COLOR, DEFAULT_DONE_DIR, DEFAULT_IMAGE_DIR,
    DEFAULT_LAYER_OPACITY, DEFAULT_MARKER_RADIUS, DEFAULT_MARKER_STROKE, DEFAULT_PATCH_OVERLAP,
    DEFAULT_PATCH_SIZE, DEFAULT_REPORT_DIR, DEFAULT_SESSION_MARKER, DEFAULT_TODO_DIR,
};
use crate::format::{ContourSet, OverlayLayer, OverlayRenderer};
use crate::geometry::IndexingPolicy;
use crate::model::{Category, LabelCatalog, default_categories};

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }

    /// Level raised by `verbosity` steps (`-v`, `-vv`), capped at trace.
    pub fn raised(self, verbosity: u8) -> Self {
        const ORDER: [LogLevel; 5] = [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ];
        let current = ORDER.iter().position(|l| *l == self).unwrap_or(2);
        ORDER[(current + usize::from(verbosity)).min(ORDER.len() - 1)]
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Version of the configuration file format
    pub version: u32,

    #[serde(default)]
    pub preferences: UserPreferences,

    /// Label catalog, in label-id order
    #[serde(default = "default_labels")]
    pub labels: Vec<CategoryConfig>,

    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub patches: PatchConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub queue: QueueConfig,
}

fn default_labels() -> Vec<CategoryConfig> {
    default_categories().iter().map(CategoryConfig::from).collect()
}

/// User preferences section of the config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserPreferences {
    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Folder layout of a workspace, relative to its root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub image_dir: PathBuf,
    pub annotation_dir: PathBuf,
    pub report_dir: PathBuf,
    pub session_marker: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            annotation_dir: PathBuf::from(DEFAULT_ANNOTATION_DIR),
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            session_marker: PathBuf::from(DEFAULT_SESSION_MARKER),
        }
    }
}

/// Patch tiling of large images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatchConfig {
    pub height: u32,
    pub width: u32,
    /// Fraction of a patch shared with its neighbour, in `[0, 1)`
    pub overlap: f64,
    pub indexing: IndexingPolicy,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            height: DEFAULT_PATCH_SIZE,
            width: DEFAULT_PATCH_SIZE,
            overlap: DEFAULT_PATCH_OVERLAP,
            indexing: IndexingPolicy::default(),
        }
    }
}

/// Marker drawing on annotated images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub marker_radius: f32,
    pub marker_stroke: u32,
    /// Outline color of contour layers
    pub contour_color: [u8; 3],
    /// Opacity of mask and contour layers, in `[0, 1]`
    pub layer_opacity: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            marker_radius: DEFAULT_MARKER_RADIUS,
            marker_stroke: DEFAULT_MARKER_STROKE,
            contour_color: DEFAULT_CONTOUR_COLOR,
            layer_opacity: DEFAULT_LAYER_OPACITY,
        }
    }
}

impl RenderConfig {
    pub fn renderer(&self) -> OverlayRenderer {
        OverlayRenderer::new()
            .radius(self.marker_radius)
            .stroke(self.marker_stroke)
    }

    /// Contour outlines as a layer for an image of `width × height`.
    pub fn contour_layer(&self, contours: &ContourSet, width: u32, height: u32) -> OverlayLayer {
        contours.to_layer(width, height, self.contour_color, self.layer_opacity)
    }

    pub fn mask_layer(&self, mask: &DynamicImage) -> OverlayLayer {
        OverlayLayer::from_mask(mask, self.layer_opacity)
    }
}

/// Folder names of the review queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub todo_dir: String,
    pub done_dir: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            todo_dir: DEFAULT_TODO_DIR.to_string(),
            done_dir: DEFAULT_DONE_DIR.to_string(),
        }
    }
}

/// Category configuration for serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryConfig {
    /// Display name, also written to the CSV label column
    pub name: String,
    /// RGB marker color
    pub color: [u8; 3],
}

impl From<&Category> for CategoryConfig {
    fn from(cat: &Category) -> Self {
        Self {
            name: cat.name.clone(),
            color: cat.color,
        }
    }
}

impl From<&CategoryConfig> for Category {
    fn from(config: &CategoryConfig) -> Self {
        Category::new(&config.name, config.color)
    }
}

impl AppConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            preferences: UserPreferences::default(),
            labels: default_labels(),
            workspace: WorkspaceConfig::default(),
            patches: PatchConfig::default(),
            render: RenderConfig::default(),
            queue: QueueConfig::default(),
        }
    }

    /// Build the label catalog from the configured labels.
    pub fn catalog(&self) -> Result<LabelCatalog, ConfigError> {
        let categories = self.labels.iter().map(Category::from).collect();
        LabelCatalog::new(categories).map_err(|e| ConfigError::InvalidLabels(e.to_string()))
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Read configuration from an explicit file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Write configuration to an explicit file, creating parent folders.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "pointanno-config.json"
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("pointanno").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("pointanno")
                    .join(Self::default_filename())
            })
        }
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to the default path.
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save(&path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Label list cannot form a catalog
    #[error("Invalid label configuration: {0}")]
    InvalidLabels(String),
}
