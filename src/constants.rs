//! Global constants for pointanno.

/// Folder holding working copies of annotated images.
pub const DEFAULT_IMAGE_DIR: &str = "images";

/// Folder holding one annotation CSV per image.
pub const DEFAULT_ANNOTATION_DIR: &str = "annotations";

/// Folder holding text reports and rendered overlays.
pub const DEFAULT_REPORT_DIR: &str = "reports";

/// File recording the most recently active image.
pub const DEFAULT_SESSION_MARKER: &str = "latest_session.log";

/// Folder name of samples waiting for review.
pub const DEFAULT_TODO_DIR: &str = "anotaciones_a_corregir";

/// Folder name of reviewed samples.
pub const DEFAULT_DONE_DIR: &str = "anotaciones_corregidas";

/// Suffix appended to the display name of reviewed samples.
pub const DONE_MARKER: &str = "(✅)";

/// CSV header columns.
pub const CSV_HEADER: [&str; 3] = ["X", "Y", "Label"];

/// Radius of a rendered point marker, in image pixels.
pub const DEFAULT_MARKER_RADIUS: f32 = 7.5;

/// Stroke width of a rendered point marker, in image pixels.
pub const DEFAULT_MARKER_STROKE: u32 = 5;

/// Marker color for points whose label has no catalog color.
pub const FALLBACK_MARKER_COLOR: [u8; 3] = [255, 255, 255];

/// Outline color of cell contours drawn under the markers.
pub const DEFAULT_CONTOUR_COLOR: [u8; 3] = [255, 255, 0];

/// Opacity of mask and contour layers.
pub const DEFAULT_LAYER_OPACITY: f32 = 0.6;

/// Default patch edge length for tiled annotation.
pub const DEFAULT_PATCH_SIZE: u32 = 512;

/// Default overlap fraction between neighboring patches.
pub const DEFAULT_PATCH_OVERLAP: f64 = 0.1;

/// Image extensions recognized when matching files by stem.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];
