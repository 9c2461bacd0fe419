//! Randomized nesting search.
//!
//! Candidate anchors are drawn from a shuffled lattice over the sheet. At each
//! anchor the variants are tried in their given order and the first one that
//! passes both the buffered-polygon test and the raster test is accepted.
//! There is no backtracking: accepted placements are final.

use std::time::{Duration, Instant};

use geo::{Intersects, Translate};
use geo_types::MultiPolygon;
use log::{debug, info};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::NestConfig;
use crate::geometry::{Bounds, inflate, merge, multi_bounds};
use crate::layout::{NestingResult, Placement, SearchStats, Sheet, StopReason, utilization};
use crate::occupancy::OccupancyGrid;
use crate::variant::OrientedVariant;

/// Budgets and tuning of a search run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    /// Wall-clock budget, checked before every anchor
    pub time_limit: Duration,
    /// Budget of (anchor, angle) trials, checked before every anchor
    pub max_trials: usize,
    /// Consecutive failed anchors before the lattice step is halved
    pub stuck_limit: usize,
    /// Slide accepted placements towards the top-left corner
    pub compact: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(20),
            max_trials: 60_000,
            stuck_limit: 3,
            compact: false,
        }
    }
}

impl From<&NestConfig> for SearchConfig {
    fn from(config: &NestConfig) -> Self {
        Self {
            time_limit: Duration::try_from_secs_f64(config.time_limit_secs).unwrap_or(Duration::MAX),
            max_trials: config.max_trials,
            stuck_limit: config.stuck_limit.max(1),
            compact: config.compact,
        }
    }
}

/// Gap-buffered outline of a variant, computed once per run.
struct Prepared {
    buffered: MultiPolygon<f64>,
    /// Bounds of `buffered` relative to the anchor
    reach: Bounds,
}

struct SearchState {
    occupancy: OccupancyGrid,
    /// Union of the buffered outlines placed so far
    union: MultiPolygon<f64>,
    placements: Vec<Placement>,
    occupied_area: f64,
}

impl SearchState {
    /// The buffered outline moved to `(x, y)` if the variant can go there.
    fn fits(
        &self,
        variant: &OrientedVariant,
        prepared: &Prepared,
        sheet: &Sheet,
        x: u32,
        y: u32,
    ) -> Option<MultiPolygon<f64>> {
        if self.occupancy.out_of_bounds(&variant.mask, x, y) {
            return None;
        }
        let (fx, fy) = (x as f64, y as f64);
        let reach = Bounds {
            x: prepared.reach.x + fx,
            y: prepared.reach.y + fy,
            ..prepared.reach
        };
        if !reach.inside(sheet.width as f64, sheet.height as f64) {
            return None;
        }
        let moved = prepared.buffered.translate(fx, fy);
        if !self.union.0.is_empty() && self.union.intersects(&moved) {
            return None;
        }
        if self.occupancy.overlaps(&variant.mask, x, y) {
            return None;
        }
        Some(moved)
    }

    /// Slide up, then left, one pixel at a time until neither move is possible
    /// or the deadline passes. Every intermediate position is valid.
    fn compact(
        &self,
        variant: &OrientedVariant,
        prepared: &Prepared,
        sheet: &Sheet,
        (mut x, mut y): (u32, u32),
        mut moved: MultiPolygon<f64>,
        deadline: Option<Instant>,
    ) -> (u32, u32, MultiPolygon<f64>) {
        loop {
            let mut progressed = false;
            while y > 0 && !expired(deadline) {
                let Some(m) = self.fits(variant, prepared, sheet, x, y - 1) else { break };
                y -= 1;
                moved = m;
                progressed = true;
            }
            while x > 0 && !expired(deadline) {
                let Some(m) = self.fits(variant, prepared, sheet, x - 1, y) else { break };
                x -= 1;
                moved = m;
                progressed = true;
            }
            if !progressed {
                return (x, y, moved);
            }
        }
    }

    fn commit(&mut self, index: usize, variant: &OrientedVariant, x: u32, y: u32, moved: &MultiPolygon<f64>) {
        self.occupancy.stamp(&variant.mask, x, y);
        self.union = merge(&self.union, moved);
        self.occupied_area += variant.area;
        self.placements.push(Placement {
            x,
            y,
            angle: variant.angle,
            variant: index,
        });
    }
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Every `step`-th pixel position of the sheet, in random order.
fn shuffled_lattice<R: Rng + ?Sized>(sheet: &Sheet, step: u32, rng: &mut R) -> Vec<(u32, u32)> {
    let step = step.max(1) as usize;
    let mut points: Vec<(u32, u32)> = (0..sheet.height)
        .step_by(step)
        .flat_map(|y| (0..sheet.width).step_by(step).map(move |x| (x, y)))
        .collect();
    points.shuffle(rng);
    points
}

/// Lattice step at the start of a run: a sixth of the unrotated piece's
/// smaller side, at least 2.
pub fn initial_step((width, height): (u32, u32)) -> u32 {
    (width.min(height) / 6).max(2)
}

/// Place as many copies of the piece as the budgets allow.
///
/// `variants` are tried in order at every anchor. `piece_size` is the
/// unrotated piece in pixels and sets the starting lattice step. Running out
/// of budget is the normal way for a search to end; whatever was placed is
/// returned.
pub fn nest<R: Rng + ?Sized>(
    variants: Vec<OrientedVariant>,
    piece_size: (u32, u32),
    sheet: &Sheet,
    config: &SearchConfig,
    rng: &mut R,
) -> NestingResult {
    let start = Instant::now();
    // `None` when the budget is too large to represent, i.e. unbounded.
    let deadline = start.checked_add(config.time_limit);
    if variants.is_empty() {
        let mut result = NestingResult::empty(variants);
        result.stats = Some(SearchStats {
            trials: 0,
            elapsed: start.elapsed(),
            stop_reason: StopReason::LatticeExhausted,
            final_step: 0,
        });
        return result;
    }

    let gap = sheet.gap as f64;
    let prepared: Vec<Option<Prepared>> = variants
        .iter()
        .map(|v| {
            let buffered = inflate(&v.outline, gap);
            multi_bounds(&buffered).map(|reach| Prepared { buffered, reach })
        })
        .collect();

    let mut state = SearchState {
        occupancy: OccupancyGrid::new(sheet.width, sheet.height),
        union: MultiPolygon(Vec::new()),
        placements: Vec::new(),
        occupied_area: 0.0,
    };
    let mut step = initial_step(piece_size);
    let mut lattice = shuffled_lattice(sheet, step, rng);
    let mut trials = 0usize;
    let mut stuck = 0usize;

    let stop_reason = loop {
        if expired(deadline) {
            break StopReason::TimeBudget;
        }
        if trials >= config.max_trials {
            break StopReason::TrialBudget;
        }
        let Some((cx, cy)) = lattice.pop() else {
            break StopReason::LatticeExhausted;
        };

        let mut accepted = None;
        for (i, (variant, prepared)) in variants.iter().zip(&prepared).enumerate() {
            trials += 1;
            let Some(prepared) = prepared else { continue };
            if let Some(moved) = state.fits(variant, prepared, sheet, cx, cy) {
                accepted = Some((i, moved));
                break;
            }
        }

        match accepted {
            Some((i, moved)) => {
                let (variant, prepared) = (&variants[i], prepared[i].as_ref());
                let (x, y, moved) = match prepared {
                    Some(p) if config.compact => state.compact(variant, p, sheet, (cx, cy), moved, deadline),
                    _ => (cx, cy, moved),
                };
                state.commit(i, variant, x, y, &moved);
                debug!(
                    "[SEARCH] piece {} at ({x}, {y}) angle {} (anchor ({cx}, {cy}))",
                    state.placements.len(),
                    variant.angle
                );
                stuck = 0;
            }
            None => {
                stuck += 1;
                if stuck >= config.stuck_limit {
                    stuck = 0;
                    if step > 1 {
                        step = (step / 2).max(1);
                        lattice = shuffled_lattice(sheet, step, rng);
                        debug!("[SEARCH] refining lattice to step {step} ({} anchors)", lattice.len());
                    }
                }
            }
        }
    };

    let elapsed = start.elapsed();
    let utilization_percent = utilization(state.occupied_area, sheet);
    info!(
        "[SEARCH] placed {} pieces, {utilization_percent:.1}% utilization, {trials} trials in {:.2}s ({stop_reason:?})",
        state.placements.len(),
        elapsed.as_secs_f64()
    );
    NestingResult {
        placements: state.placements,
        utilization_percent,
        variants,
        stats: Some(SearchStats {
            trials,
            elapsed,
            stop_reason,
            final_step: step,
        }),
    }
}
