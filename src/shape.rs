//! Shape extraction: turns a raster image of a single piece drawn dark on a
//! light background into a textured, outlined [`PieceShape`].

use std::path::Path;

use geo::Area;
use geo_types::Polygon;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::drawing::draw_polygon_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::NestError;
use crate::geometry::{is_simple, polygon_from_points, repair, scale_polygon, vertex_count};

/// Parameters of the silhouette detection
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Standard deviation of the noise-suppressing Gaussian blur
    pub blur_sigma: f32,
    /// Gray level at or below which a pixel belongs to the piece
    pub dark_threshold: u8,
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter
    pub simplify_ratio: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 0.8,
            dark_threshold: 200,
            simplify_ratio: 0.004,
        }
    }
}

impl ExtractConfig {
    pub fn validate(&self) -> Result<(), NestError> {
        if !(self.blur_sigma > 0.0) {
            return Err(NestError::InvalidConfig("blur_sigma must be positive".into()));
        }
        if !(self.simplify_ratio > 0.0) {
            return Err(NestError::InvalidConfig("simplify_ratio must be positive".into()));
        }
        Ok(())
    }
}

/// A piece at its canonical orientation.
///
/// `texture` is cropped tightly to the detected contour and is transparent
/// outside of it. `outline` lives in the texture's pixel frame.
#[derive(Debug, Clone)]
pub struct PieceShape {
    texture: RgbaImage,
    outline: Polygon<f64>,
}

impl PieceShape {
    pub fn new(texture: RgbaImage, outline: Polygon<f64>) -> Result<Self, NestError> {
        if texture.width() == 0 || texture.height() == 0 || vertex_count(&outline) < 3 {
            return Err(NestError::NoContourFound);
        }
        Ok(Self { texture, outline })
    }

    pub fn texture(&self) -> &RgbaImage {
        &self.texture
    }

    pub fn outline(&self) -> &Polygon<f64> {
        &self.outline
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    /// Area enclosed by the outline, in square pixels.
    pub fn area(&self) -> f64 {
        self.outline.unsigned_area()
    }

    /// Resize to a target pixel size; the outline is scaled along with the texture.
    pub fn resized(&self, width: u32, height: u32) -> PieceShape {
        let (width, height) = (width.max(1), height.max(1));
        let texture = imageops::resize(&self.texture, width, height, FilterType::CatmullRom);
        let sx = width as f64 / self.texture.width() as f64;
        let sy = height as f64 / self.texture.height() as f64;
        PieceShape {
            texture,
            outline: scale_polygon(&self.outline, sx, sy),
        }
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, NestError> {
    Ok(image::load_from_memory(bytes)?)
}

pub fn load_image(path: &Path) -> Result<DynamicImage, NestError> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

/// Detect the piece silhouette: the external contour with the largest area.
pub fn extract_piece(image: &DynamicImage, config: &ExtractConfig) -> Result<PieceShape, NestError> {
    config.validate()?;
    let rgba = flatten_on_white(image);
    let gray = imageops::grayscale(&rgba);
    let blurred = gaussian_blur_f32(&gray, config.blur_sigma);
    let binary = binarize(&blurred, config.dark_threshold);

    let contour = largest_external_contour(&binary).ok_or(NestError::NoContourFound)?;
    let (min_x, min_y, max_x, max_y) = contour.points.iter().fold(
        (i32::MAX, i32::MAX, i32::MIN, i32::MIN),
        |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
    );
    let (width, height) = ((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32);
    let local: Vec<Point<i32>> = contour
        .points
        .iter()
        .map(|p| Point::new(p.x - min_x, p.y - min_y))
        .collect();

    let mask = fill_contour(&local, width, height);
    let mut texture = imageops::crop_imm(&rgba, min_x as u32, min_y as u32, width, height).to_image();
    for (px, m) in texture.pixels_mut().zip(mask.pixels()) {
        px.0[3] = m.0[0];
    }

    let outline = simplify(&local, config.simplify_ratio)?;
    debug!(
        "[EXTRACT] contour of {} points at ({min_x}, {min_y}) size {width}x{height}, outline has {} vertices",
        local.len(),
        vertex_count(&outline)
    );
    PieceShape::new(texture, outline)
}

/// Composite any transparency over a white background.
fn flatten_on_white(image: &DynamicImage) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    if image.color().has_alpha() {
        for px in rgba.pixels_mut() {
            let a = px.0[3] as u32;
            for c in 0..3 {
                px.0[c] = ((px.0[c] as u32 * a + 255 * (255 - a)) / 255) as u8;
            }
            px.0[3] = 255;
        }
    }
    rgba
}

/// Dark pixels become foreground (255), everything else background (0).
fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = gray.clone();
    for px in out.pixels_mut() {
        px.0[0] = if px.0[0] <= threshold { 255 } else { 0 };
    }
    out
}

fn contour_area(points: &[Point<i32>]) -> f64 {
    let pts: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    polygon_from_points(&pts).unsigned_area()
}

fn largest_external_contour(binary: &GrayImage) -> Option<Contour<i32>> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none() && !c.points.is_empty())
        .map(|c| (contour_area(&c.points), c))
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, c)| c)
}

/// Filled silhouette of the contour, border pixels included.
fn fill_contour(points: &[Point<i32>], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let mut ring = points.to_vec();
    ring.dedup();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() >= 3 {
        draw_polygon_mut(&mut mask, &ring, Luma([255]));
    }
    for p in points {
        mask.put_pixel(p.x as u32, p.y as u32, Luma([255]));
    }
    mask
}

fn simplify(points: &[Point<i32>], ratio: f64) -> Result<Polygon<f64>, NestError> {
    if points.len() < 3 {
        return Err(NestError::NoContourFound);
    }
    let epsilon = ratio * arc_length(points, true);
    if !(epsilon > 0.0) {
        return Err(NestError::NoContourFound);
    }
    let approx = approximate_polygon_dp(points, epsilon, true);
    let pts: Vec<(f64, f64)> = approx.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    let outline = polygon_from_points(&pts);
    if vertex_count(&outline) < 3 {
        return Err(NestError::NoContourFound);
    }
    if is_simple(&outline) {
        return Ok(outline);
    }
    warn!("[EXTRACT] simplified outline is not simple, repairing with a zero buffer");
    match repair(&outline) {
        Some(fixed) if vertex_count(&fixed) >= 3 => Ok(fixed),
        _ => Err(NestError::NoContourFound),
    }
}
