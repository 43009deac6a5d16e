//! Rendering of annotated images.
//!
//! The base image is copied, optional mask/contour layers are alpha
//! blended onto the copy, and each point is drawn as a hollow circle in
//! its label color. Markers entirely outside the canvas are skipped.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_polygon_mut};
use imageproc::point::Point as PixelPoint;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MARKER_RADIUS, DEFAULT_MARKER_STROKE, FALLBACK_MARKER_COLOR};
use crate::error::{AnnotationError, Result};
use crate::model::Point;
use crate::store::PointStore;

/// A raster blended under the point markers (segmentation mask, contours).
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    pub image: RgbaImage,
    /// Layer opacity in `[0, 1]`, multiplied with the layer's own alpha.
    pub opacity: f32,
}

impl OverlayLayer {
    pub fn new(image: RgbaImage, opacity: f32) -> Self {
        Self {
            image,
            opacity: opacity.clamp(0.0, 1.0),
        }
    }

    /// Layer from a mask image. Fully black pixels are transparent.
    pub fn from_mask(mask: &DynamicImage, opacity: f32) -> Self {
        let mut image = mask.to_rgba8();
        for pixel in image.pixels_mut() {
            if pixel[0] == 0 && pixel[1] == 0 && pixel[2] == 0 {
                pixel[3] = 0;
            }
        }
        Self::new(image, opacity)
    }
}

/// Closed cell contours in image coordinates.
///
/// Read from a JSON list of polygons, `[[[x, y], ...], ...]`, optionally
/// wrapped as `{"contours": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContourSet {
    pub contours: Vec<Vec<[f64; 2]>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContourFile {
    Wrapped { contours: Vec<Vec<[f64; 2]>> },
    Bare(Vec<Vec<[f64; 2]>>),
}

impl ContourSet {
    /// Parse and validate a contour file.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ContourFile = serde_json::from_str(json)?;
        let contours = match file {
            ContourFile::Wrapped { contours } | ContourFile::Bare(contours) => contours,
        };
        for (idx, contour) in contours.iter().enumerate() {
            if contour.iter().flatten().any(|c| !c.is_finite()) {
                return Err(AnnotationError::invalid_geometry(format!(
                    "contour {idx} has a non-finite vertex"
                )));
            }
        }
        Ok(Self { contours })
    }

    pub fn len(&self) -> usize {
        self.contours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// Rasterize the outlines onto a transparent layer of the given size.
    ///
    /// Contours with fewer than two distinct vertices, or reaching further
    /// than one image extent past the border, are skipped.
    pub fn to_layer(&self, width: u32, height: u32, color: [u8; 3], opacity: f32) -> OverlayLayer {
        let mut image = RgbaImage::new(width, height);
        let [r, g, b] = color;
        let (w, h) = (f64::from(width), f64::from(height));
        let in_reach = |[x, y]: &[f64; 2]| (-w..=2.0 * w).contains(x) && (-h..=2.0 * h).contains(y);

        for (idx, contour) in self.contours.iter().enumerate() {
            if !contour.iter().all(in_reach) {
                log::debug!("Skipping contour {} outside the image", idx);
                continue;
            }
            let mut polygon: Vec<PixelPoint<f32>> = contour
                .iter()
                .map(|[x, y]| PixelPoint::new(*x as f32, *y as f32))
                .collect();
            polygon.dedup();
            if polygon.len() > 1 && polygon.first() == polygon.last() {
                polygon.pop();
            }
            if polygon.len() < 2 {
                continue;
            }
            draw_hollow_polygon_mut(&mut image, &polygon, Rgba([r, g, b, 255]));
        }
        OverlayLayer::new(image, opacity)
    }
}

/// Draws point markers and layers onto a copy of a base image.
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    radius: f32,
    stroke: u32,
    layers: Vec<OverlayLayer>,
}

impl OverlayRenderer {
    /// Create a renderer with the default marker size.
    pub fn new() -> Self {
        Self {
            radius: DEFAULT_MARKER_RADIUS,
            stroke: DEFAULT_MARKER_STROKE,
            layers: Vec::new(),
        }
    }

    /// Set the outer marker radius in pixels.
    pub fn radius(mut self, radius: f32) -> Self {
        self.radius = radius.max(0.0);
        self
    }

    /// Set the marker stroke width in pixels.
    pub fn stroke(mut self, stroke: u32) -> Self {
        self.stroke = stroke.max(1);
        self
    }

    /// Add a layer blended before markers are drawn.
    pub fn layer(mut self, layer: OverlayLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Render `store` over a copy of `base`. `base` is left untouched.
    pub fn render(&self, base: &DynamicImage, store: &PointStore) -> Result<RgbaImage> {
        let mut canvas = base.to_rgba8();

        for layer in &self.layers {
            blend_layer(&mut canvas, layer)?;
        }

        let outer = self.radius.floor() as i32;
        let inner = (outer - self.stroke as i32 + 1).max(0);
        let catalog = store.catalog();
        let (width, height) = canvas.dimensions();

        for (point, label) in store.sorted() {
            if !marker_visible(&point, outer, width, height) {
                log::debug!("Skipping marker at ({}, {}) outside the image", point.x, point.y);
                continue;
            }
            let [r, g, b] = catalog.color(label).unwrap_or(FALLBACK_MARKER_COLOR);
            let color = Rgba([r, g, b, 255]);
            for radius in inner..=outer {
                draw_hollow_circle_mut(&mut canvas, (point.x, point.y), radius, color);
            }
        }

        log::debug!(
            "Rendered {} markers over {}x{} image",
            store.len(),
            canvas.width(),
            canvas.height()
        );
        Ok(canvas)
    }

    /// Render and encode as PNG.
    pub fn render_png(&self, base: &DynamicImage, store: &PointStore) -> Result<Vec<u8>> {
        encode_png(&self.render(base, store)?)
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a marker of `radius` around `point` touches the canvas.
fn marker_visible(point: &Point, radius: i32, width: u32, height: u32) -> bool {
    let r = i64::from(radius);
    let (x, y) = (i64::from(point.x), i64::from(point.y));
    x + r >= 0 && x - r < i64::from(width) && y + r >= 0 && y - r < i64::from(height)
}

/// Alpha blend `layer` onto `canvas` in place.
pub fn blend_layer(canvas: &mut RgbaImage, layer: &OverlayLayer) -> Result<()> {
    if canvas.dimensions() != layer.image.dimensions() {
        return Err(AnnotationError::invalid_geometry(format!(
            "layer is {:?}, image is {:?}",
            layer.image.dimensions(),
            canvas.dimensions()
        )));
    }

    for (dst, src) in canvas.pixels_mut().zip(layer.image.pixels()) {
        let alpha = layer.opacity * f32::from(src[3]) / 255.0;
        if alpha <= 0.0 {
            continue;
        }
        for c in 0..3 {
            let blended = f32::from(dst[c]) * (1.0 - alpha) + f32::from(src[c]) * alpha;
            dst[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(())
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
