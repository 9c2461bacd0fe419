//! Rotated copies of a piece, one per candidate angle.

use geo::Area;
use geo_types::{Coord, Polygon};
use image::imageops;
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use log::info;
use rayon::prelude::*;

use crate::geometry::{normalize_to_origin, rotate_about};
use crate::occupancy::OccupancyGrid;
use crate::shape::PieceShape;

/// The axis-aligned rotations, in the order they are tried.
pub const AXIS_ANGLES: [f64; 4] = [0.0, 90.0, 180.0, 270.0];

/// `0, step, 2*step, ...` strictly below 360 degrees.
pub fn angles_from_step(step: f64) -> Vec<f64> {
    if !(step > 0.0) {
        return vec![0.0];
    }
    (0..)
        .map(|i| i as f64 * step)
        .take_while(|a| *a < 360.0 - 1e-9)
        .collect()
}

/// A piece rotated by `angle` degrees (counter-clockwise on screen).
///
/// `texture`, `outline` and `mask` share one local frame whose origin is the
/// top-left corner of the rotated piece's bounding box.
#[derive(Debug, Clone)]
pub struct OrientedVariant {
    pub angle: f64,
    pub texture: RgbaImage,
    pub outline: Polygon<f64>,
    pub mask: OccupancyGrid,
    /// True (unbuffered) outline area
    pub area: f64,
}

impl OrientedVariant {
    pub fn new(piece: &PieceShape, angle: f64) -> Self {
        let texture = crop_to_alpha(rotate_expanded(piece.texture(), angle));
        let center = Coord {
            x: piece.width() as f64 / 2.0,
            y: piece.height() as f64 / 2.0,
        };
        // y points down in pixel space, so a visual CCW turn is a negative geometric one
        let outline = normalize_to_origin(&rotate_about(piece.outline(), -angle, center));
        let mask = OccupancyGrid::from_alpha(&texture);
        let area = outline.unsigned_area();
        Self {
            angle,
            texture,
            outline,
            mask,
            area,
        }
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }
}

/// One variant per angle, in the given order.
pub fn build_variants(piece: &PieceShape, angles: &[f64]) -> Vec<OrientedVariant> {
    let variants: Vec<OrientedVariant> = angles
        .par_iter()
        .map(|&angle| OrientedVariant::new(piece, angle))
        .collect();
    info!(
        "[NEST] built {} variants of a {}x{} piece",
        variants.len(),
        piece.width(),
        piece.height()
    );
    variants
}

/// Rotate counter-clockwise around the image center, growing the canvas so
/// nothing is clipped. Uncovered pixels are transparent.
pub fn rotate_expanded(texture: &RgbaImage, angle_deg: f64) -> RgbaImage {
    let a = angle_deg.rem_euclid(360.0);
    if a == 0.0 {
        return texture.clone();
    }
    if a == 90.0 {
        return imageops::rotate270(texture);
    }
    if a == 180.0 {
        return imageops::rotate180(texture);
    }
    if a == 270.0 {
        return imageops::rotate90(texture);
    }

    let theta = a.to_radians();
    let (w, h) = (texture.width() as f64, texture.height() as f64);
    let (cos, sin) = (theta.cos().abs(), theta.sin().abs());
    let (nw, nh) = (snap_ceil(w * cos + h * sin), snap_ceil(w * sin + h * cos));

    let projection = Projection::translate((nw as f32 - 1.0) / 2.0, (nh as f32 - 1.0) / 2.0)
        * Projection::rotate(-theta as f32)
        * Projection::translate(-(w as f32 - 1.0) / 2.0, -(h as f32 - 1.0) / 2.0);
    let mut out = RgbaImage::new(nw, nh);
    warp_into(
        texture,
        &projection,
        Interpolation::Nearest,
        Rgba([0, 0, 0, 0]),
        &mut out,
    );
    out
}

/// Ceil that ignores floating point noise around whole numbers; at least 1.
fn snap_ceil(v: f64) -> u32 {
    let r = v.round();
    let snapped = if (v - r).abs() < 1e-6 { r } else { v.ceil() };
    snapped.max(1.0) as u32
}

/// Crop to the bounding box of the non-transparent pixels.
fn crop_to_alpha(texture: RgbaImage) -> RgbaImage {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, px) in texture.enumerate_pixels() {
        if px.0[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    match bounds {
        Some((x0, y0, x1, y1))
            if (x0, y0) != (0, 0) || x1 + 1 != texture.width() || y1 + 1 != texture.height() =>
        {
            imageops::crop_imm(&texture, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image()
        }
        _ => texture,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{polygon_bounds, polygon_from_points};
    use geo::Contains;
    use geo_types::Point;

    fn solid_piece(w: u32, h: u32) -> PieceShape {
        let texture = RgbaImage::from_pixel(w, h, Rgba([40, 40, 40, 255]));
        let outline = polygon_from_points(&[
            (0.0, 0.0),
            (w as f64, 0.0),
            (w as f64, h as f64),
            (0.0, h as f64),
        ]);
        PieceShape::new(texture, outline).unwrap()
    }

    /// Lower-left right triangle: no rotational symmetry, so a sign error shows.
    fn triangle_piece(n: u32) -> PieceShape {
        let texture = RgbaImage::from_fn(n, n, |x, y| {
            if x <= y {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let n = n as f64;
        let outline = polygon_from_points(&[(0.0, 0.0), (0.0, n), (n, n)]);
        PieceShape::new(texture, outline).unwrap()
    }

    #[test]
    fn step_angles() {
        assert_eq!(angles_from_step(90.0), AXIS_ANGLES.to_vec());
        assert_eq!(angles_from_step(15.0).len(), 24);
        assert_eq!(angles_from_step(7.0).last(), Some(&357.0));
        assert_eq!(angles_from_step(0.0), vec![0.0]);
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let v = OrientedVariant::new(&solid_piece(10, 4), 90.0);
        assert_eq!((v.width(), v.height()), (4, 10));
        assert_eq!((v.mask.width(), v.mask.height()), (4, 10));
        let b = polygon_bounds(&v.outline).unwrap();
        assert!(b.x.abs() < 1e-9 && b.y.abs() < 1e-9);
        assert!((b.width - 4.0).abs() < 1e-9 && (b.height - 10.0).abs() < 1e-9);
        assert!((v.area - 40.0).abs() < 1e-9);
    }

    #[test]
    fn oblique_angle_expands_canvas() {
        let rotated = rotate_expanded(&RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])), 45.0);
        assert_eq!((rotated.width(), rotated.height()), (15, 15));
        assert_eq!(rotated.get_pixel(0, 0).0[3], 0);
        assert_eq!(rotated.get_pixel(7, 7).0[3], 255);
    }

    #[test]
    fn full_turn_is_identity() {
        let v = OrientedVariant::new(&solid_piece(7, 3), 360.0);
        assert_eq!((v.width(), v.height()), (7, 3));
        assert_eq!(v.mask.count(), 21);
    }

    #[test]
    fn outline_and_mask_agree() {
        let piece = triangle_piece(80);
        for angle in [0.0, 90.0, 180.0, 270.0, 45.0] {
            let v = OrientedVariant::new(&piece, angle);
            let mut disagreements = 0;
            for y in 0..v.height() {
                for x in 0..v.width() {
                    let inside = v
                        .outline
                        .contains(&Point::new(x as f64 + 0.5, y as f64 + 0.5));
                    if inside != v.mask.get(x, y) {
                        disagreements += 1;
                    }
                }
            }
            let occupied = v.mask.count();
            assert!(
                (disagreements as f64) < 0.2 * occupied as f64,
                "angle {angle}: {disagreements} of {occupied}"
            );
        }
    }

    #[test]
    fn variants_follow_angle_order() {
        let angles = [30.0, 0.0, 270.0];
        let variants = build_variants(&solid_piece(12, 6), &angles);
        let got: Vec<f64> = variants.iter().map(|v| v.angle).collect();
        assert_eq!(got, angles.to_vec());
        assert!(variants.iter().all(|v| v.width() >= 1 && v.height() >= 1));
    }
}
