//! End-to-end pipeline: image in, rendered layout and metrics out.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbaImage};
use log::info;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{NestConfig, NestMode};
use crate::error::NestError;
use crate::grid::pack_orthogonal;
use crate::layout::{NestingResult, Sheet};
use crate::search::{self, SearchConfig};
use crate::shape::{PieceShape, extract_piece, load_image};
use crate::variant::build_variants;

/// Physical dimensions of one nesting request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NestJob {
    pub sheet_width: f64,
    pub sheet_height: f64,
    pub piece_width: f64,
    pub piece_height: f64,
    /// Total pieces required; enables the sheets-needed count
    pub quantity: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NestOutcome {
    pub result: NestingResult,
    pub sheet: Sheet,
    pub layout: RgbaImage,
    pub sheets_needed: Option<u64>,
}

/// Usable sheet in pixels: margins removed on every side, at least 1x1.
pub fn usable_sheet(config: &NestConfig, job: &NestJob) -> Sheet {
    let margin = 2.0 * config.sheet_margin;
    Sheet::new(
        config.to_px(job.sheet_width - margin, 1),
        config.to_px(job.sheet_height - margin, 1),
        config.to_px(config.gap, 0),
    )
}

/// Seeded generator, or one seeded from entropy when no seed is configured.
pub fn search_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    }
}

/// Pack an already extracted piece. The piece is first resized to the job's
/// target size in pixels.
pub fn nest_piece(piece: &PieceShape, job: &NestJob, config: &NestConfig) -> Result<NestOutcome, NestError> {
    config.validate()?;
    let sheet = usable_sheet(config, job);
    let target = piece.resized(config.to_px(job.piece_width, 1), config.to_px(job.piece_height, 1));
    info!(
        "[NEST] {:?} mode, piece {}x{} px on sheet {}x{} px, gap {} px",
        config.mode,
        target.width(),
        target.height(),
        sheet.width,
        sheet.height,
        sheet.gap
    );

    let result = match config.mode {
        NestMode::Orthogonal => pack_orthogonal(&target, &sheet),
        NestMode::Advanced => {
            let variants = build_variants(&target, &config.candidate_angles());
            let mut rng = search_rng(config.prng_seed);
            let size = (target.width(), target.height());
            search::nest(variants, size, &sheet, &SearchConfig::from(config), &mut rng)
        }
    };
    let layout = result.render(&sheet);
    let sheets_needed = job.quantity.map(|q| result.sheets_needed(q));
    Ok(NestOutcome {
        result,
        sheet,
        layout,
        sheets_needed,
    })
}

pub fn nest_image(image: &DynamicImage, job: &NestJob, config: &NestConfig) -> Result<NestOutcome, NestError> {
    config.validate()?;
    let piece = extract_piece(image, &config.extraction)?;
    nest_piece(&piece, job, config)
}

pub fn nest_file(path: &Path, job: &NestJob, config: &NestConfig) -> Result<NestOutcome, NestError> {
    let image = load_image(path)?;
    nest_image(&image, job, config)
}

/// Nest every input independently on the rayon pool. Results keep the input order.
pub fn nest_batch(
    paths: &[PathBuf],
    job: &NestJob,
    config: &NestConfig,
) -> Vec<Result<NestOutcome, NestError>> {
    paths
        .par_iter()
        .map(|path| nest_file(path, job, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn job() -> NestJob {
        NestJob {
            sheet_width: 60.0,
            sheet_height: 40.0,
            piece_width: 12.0,
            piece_height: 8.0,
            quantity: Some(100),
        }
    }

    #[test]
    fn sheet_excludes_margins() {
        let sheet = usable_sheet(&NestConfig::default(), &job());
        assert_eq!(sheet, Sheet::new(2360, 1560, 16));
    }

    #[test]
    fn tiny_sheet_is_still_one_pixel() {
        let job = NestJob {
            sheet_width: 0.5,
            sheet_height: 1.0,
            ..job()
        };
        let sheet = usable_sheet(&NestConfig::default(), &job);
        assert_eq!((sheet.width, sheet.height), (1, 1));
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        assert_eq!(search_rng(Some(9)).next_u64(), search_rng(Some(9)).next_u64());
    }

    #[test]
    fn invalid_config_is_rejected_before_work() {
        let config = NestConfig {
            px_per_unit: -1.0,
            ..Default::default()
        };
        let image = DynamicImage::new_rgba8(4, 4);
        assert!(matches!(
            nest_image(&image, &job(), &config),
            Err(NestError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let outcome = nest_file(Path::new("/nonexistent/piece.png"), &job(), &NestConfig::default());
        assert!(matches!(outcome, Err(NestError::Io(_))));
    }
}
