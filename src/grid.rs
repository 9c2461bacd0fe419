//! Row-by-row packer restricted to axis-aligned rotations.

use log::{debug, info};

use crate::layout::{NestingResult, Placement, Sheet, utilization};
use crate::shape::PieceShape;
use crate::variant::{AXIS_ANGLES, OrientedVariant};

/// Fill the sheet row by row. At every cursor position the first of
/// 0/90/180/270 that fits is taken; a row ends when none does.
///
/// Utilization is the coarse proxy `placed * (unrotated texture area) / sheet area`.
pub fn pack_orthogonal(piece: &PieceShape, sheet: &Sheet) -> NestingResult {
    let variants: Vec<OrientedVariant> = AXIS_ANGLES
        .iter()
        .map(|&angle| OrientedVariant::new(piece, angle))
        .collect();
    let mut placements = Vec::new();
    let mut rows = 0;

    let mut y = 0u32;
    while y < sheet.height {
        let mut x = 0u32;
        let mut row_height = 0u32;
        while x < sheet.width {
            let fit = variants.iter().position(|v| {
                x as u64 + v.width() as u64 <= sheet.width as u64
                    && y as u64 + v.height() as u64 <= sheet.height as u64
            });
            let Some(i) = fit else { break };
            let v = &variants[i];
            placements.push(Placement {
                x,
                y,
                angle: v.angle,
                variant: i,
            });
            x = x.saturating_add(v.width()).saturating_add(sheet.gap);
            row_height = row_height.max(v.height());
        }
        if row_height == 0 {
            break;
        }
        debug!("[GRID] row {rows} at y={y}, height {row_height}");
        rows += 1;
        y = y.saturating_add(row_height).saturating_add(sheet.gap);
    }

    let proxy_area = placements.len() as f64 * piece.width() as f64 * piece.height() as f64;
    let utilization_percent = utilization(proxy_area, sheet);
    info!(
        "[GRID] placed {} pieces in {rows} rows, {utilization_percent:.1}% utilization",
        placements.len()
    );
    NestingResult {
        placements,
        utilization_percent,
        variants,
        stats: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon_from_points;
    use image::{Rgba, RgbaImage};

    fn solid_piece(w: u32, h: u32) -> PieceShape {
        let texture = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]));
        let (wf, hf) = (w as f64, h as f64);
        let outline = polygon_from_points(&[(0.0, 0.0), (wf, 0.0), (wf, hf), (0.0, hf)]);
        PieceShape::new(texture, outline).unwrap()
    }

    fn boxes_overlap(result: &NestingResult) -> bool {
        let boxes: Vec<(u32, u32, u32, u32)> = result
            .placements
            .iter()
            .map(|p| {
                let v = &result.variants[p.variant];
                (p.x, p.y, p.x + v.width(), p.y + v.height())
            })
            .collect();
        boxes.iter().enumerate().any(|(i, a)| {
            boxes[i + 1..]
                .iter()
                .any(|b| a.0 < b.2 && b.0 < a.2 && a.1 < b.3 && b.1 < a.3)
        })
    }

    #[test]
    fn fills_at_least_the_plain_grid() {
        for (w, h, sw, sh) in [(30, 20, 100, 70), (100, 50, 400, 200), (7, 13, 50, 50), (40, 40, 40, 40)] {
            let result = pack_orthogonal(&solid_piece(w, h), &Sheet::new(sw, sh, 0));
            let expected = ((sw / w) * (sh / h)) as usize;
            assert!(
                result.pieces_placed() >= expected,
                "{w}x{h} on {sw}x{sh}: {} < {expected}",
                result.pieces_placed()
            );
            assert!(!boxes_overlap(&result));
            assert!(result.utilization_percent > 0.0 && result.utilization_percent <= 100.0);
        }
    }

    #[test]
    fn rectangle_grid_is_full() {
        let result = pack_orthogonal(&solid_piece(100, 50), &Sheet::new(400, 200, 0));
        assert_eq!(result.pieces_placed(), 16);
        assert!((result.utilization_percent - 100.0).abs() < 1e-9);
        assert!(result.placements.iter().all(|p| p.angle == 0.0));
    }

    #[test]
    fn rotates_when_upright_does_not_fit() {
        let result = pack_orthogonal(&solid_piece(50, 20), &Sheet::new(30, 100, 0));
        assert_eq!(result.pieces_placed(), 2);
        assert!(result.placements.iter().all(|p| p.angle == 90.0));
        assert_eq!((result.placements[1].x, result.placements[1].y), (0, 50));
    }

    #[test]
    fn gap_separates_columns_and_rows() {
        let result = pack_orthogonal(&solid_piece(10, 10), &Sheet::new(35, 22, 2));
        let anchors: Vec<(u32, u32)> = result.placements.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(anchors, vec![(0, 0), (12, 0), (24, 0), (0, 12), (12, 12), (24, 12)]);
    }

    #[test]
    fn oversized_piece_places_nothing() {
        let result = pack_orthogonal(&solid_piece(500, 500), &Sheet::new(400, 200, 0));
        assert_eq!(result.pieces_placed(), 0);
        assert_eq!(result.utilization_percent, 0.0);
    }
}
