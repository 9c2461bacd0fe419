//! Layout output: placements, metrics and the rendered sheet.

use std::io::Cursor;
use std::time::Duration;

use ab_glyph::{FontRef, PxScale};
use image::imageops;
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use log::warn;
use serde::Serialize;

use crate::error::NestError;
use crate::variant::OrientedVariant;

/// The usable placement area in pixels, margins already removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sheet {
    pub width: u32,
    pub height: u32,
    /// Minimum clearance between pieces
    pub gap: u32,
}

impl Sheet {
    pub fn new(width: u32, height: u32, gap: u32) -> Self {
        Self { width, height, gap }
    }

    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

/// One accepted piece: the variant's bounding box has its top-left corner at `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub angle: f64,
    /// Index into [`NestingResult::variants`]
    pub variant: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    TimeBudget,
    TrialBudget,
    LatticeExhausted,
}

/// Bookkeeping of an advanced search run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchStats {
    /// (anchor, angle) combinations tried
    pub trials: usize,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
    /// Sampling step when the search stopped
    pub final_step: u32,
}

#[derive(Debug, Clone)]
pub struct NestingResult {
    /// In acceptance order; rendering numbers pieces in this order
    pub placements: Vec<Placement>,
    pub utilization_percent: f64,
    pub variants: Vec<OrientedVariant>,
    pub stats: Option<SearchStats>,
}

impl NestingResult {
    pub fn empty(variants: Vec<OrientedVariant>) -> Self {
        Self {
            placements: Vec::new(),
            utilization_percent: 0.0,
            variants,
            stats: None,
        }
    }

    pub fn pieces_placed(&self) -> usize {
        self.placements.len()
    }

    /// Sheets required to cut `quantity` pieces with this layout, 0 if nothing fits.
    pub fn sheets_needed(&self, quantity: u64) -> u64 {
        let per_sheet = self.pieces_placed() as u64;
        if per_sheet == 0 || quantity == 0 {
            return 0;
        }
        quantity.div_ceil(per_sheet)
    }

    /// Turn an empty layout into [`NestError::PieceTooLargeForSheet`].
    pub fn require_placements(self) -> Result<Self, NestError> {
        if self.placements.is_empty() {
            Err(NestError::PieceTooLargeForSheet)
        } else {
            Ok(self)
        }
    }

    /// Compose the placed textures on a white sheet, numbered from 1.
    pub fn render(&self, sheet: &Sheet) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(sheet.width.max(1), sheet.height.max(1), WHITE);
        let font = FontRef::try_from_slice(LABEL_FONT)
            .inspect_err(|e| warn!("[RENDER] label font unusable, pieces left unnumbered: {e}"))
            .ok();
        for (i, p) in self.placements.iter().enumerate() {
            let Some(variant) = self.variants.get(p.variant) else {
                continue;
            };
            imageops::overlay(&mut canvas, &variant.texture, p.x as i64, p.y as i64);
            if let Some(font) = &font {
                let (x, y) = (p.x as i32 + LABEL_OFFSET, p.y as i32 + LABEL_OFFSET);
                draw_text_mut(&mut canvas, LABEL, x, y, LABEL_SCALE, font, &(i + 1).to_string());
            }
        }
        canvas
    }

    pub fn summary(&self, sheet: &Sheet, quantity: Option<u64>) -> LayoutSummary {
        LayoutSummary {
            pieces_placed: self.pieces_placed(),
            utilization_percent: self.utilization_percent,
            sheets_needed: quantity.map(|q| self.sheets_needed(q)),
            sheet: *sheet,
            stats: self.stats,
            placements: self.placements.clone(),
        }
    }
}

/// Serializable digest of a layout.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutSummary {
    pub pieces_placed: usize,
    pub utilization_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheets_needed: Option<u64>,
    pub sheet: Sheet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SearchStats>,
    pub placements: Vec<Placement>,
}

/// `100 * occupied / sheet area`, clamped to `[0, 100]`.
pub fn utilization(occupied_area: f64, sheet: &Sheet) -> f64 {
    if sheet.area() <= 0.0 || occupied_area <= 0.0 {
        return 0.0;
    }
    (100.0 * occupied_area / sheet.area()).min(100.0)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, NestError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const LABEL: Rgba<u8> = Rgba([220, 0, 0, 255]);
const LABEL_SCALE: PxScale = PxScale { x: 16.0, y: 16.0 };
const LABEL_OFFSET: i32 = 5;
/// DejaVu Sans Mono Bold, license in `assets/DejaVu-LICENSE`.
static LABEL_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono-Bold.ttf");
