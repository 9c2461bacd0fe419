use serde::{Deserialize, Serialize};

use crate::error::NestError;
use crate::shape::ExtractConfig;
use crate::variant::{AXIS_ANGLES, angles_from_step};

/// Packing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NestMode {
    /// Row-by-row grid with axis-aligned rotations only
    Orthogonal,
    /// Randomized search over anchors and candidate angles
    #[default]
    Advanced,
}

/// Configuration of a nesting run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NestConfig {
    /// Raster density, pixels per physical unit
    pub px_per_unit: f64,
    /// Border margin removed from each side of the sheet, physical units
    pub sheet_margin: f64,
    /// Minimum clearance between pieces, physical units
    pub gap: f64,
    pub mode: NestMode,
    /// Degrees between consecutive candidate angles in advanced mode
    pub angle_step: f64,
    /// Restrict advanced mode to 0/90/180/270
    pub orthogonal_only: bool,
    /// Explicit candidate angles in priority order. Overrides `angle_step` and `orthogonal_only`.
    pub angles: Option<Vec<f64>>,
    /// Wall-clock budget of the advanced search, in seconds
    pub time_limit_secs: f64,
    /// Budget of (anchor x angle) trials of the advanced search
    pub max_trials: usize,
    /// Seed for the PRNG. If undefined, the search runs in non-deterministic mode using entropy
    pub prng_seed: Option<u64>,
    /// Slide accepted placements towards the top-left corner
    pub compact: bool,
    /// Consecutive failed anchors before the sampling step is halved
    pub stuck_limit: usize,
    pub extraction: ExtractConfig,
}

impl Default for NestConfig {
    fn default() -> Self {
        Self {
            px_per_unit: 40.0,
            sheet_margin: 0.5,
            gap: 0.4,
            mode: NestMode::Advanced,
            angle_step: 15.0,
            orthogonal_only: false,
            angles: None,
            time_limit_secs: 20.0,
            max_trials: 60_000,
            prng_seed: Some(0),
            compact: false,
            stuck_limit: 3,
            extraction: ExtractConfig::default(),
        }
    }
}

impl NestConfig {
    pub fn validate(&self) -> Result<(), NestError> {
        let invalid = |msg: &str| Err(NestError::InvalidConfig(msg.to_string()));
        if !(self.px_per_unit > 0.0) {
            return invalid("px_per_unit must be positive");
        }
        if !(self.sheet_margin >= 0.0) || !(self.gap >= 0.0) {
            return invalid("sheet_margin and gap must be non-negative");
        }
        if !(self.time_limit_secs >= 0.0) {
            return invalid("time_limit_secs must be non-negative");
        }
        if self.stuck_limit == 0 {
            return invalid("stuck_limit must be at least 1");
        }
        match &self.angles {
            Some(angles) if angles.is_empty() => return invalid("angles must not be empty"),
            Some(angles) if angles.iter().any(|a| !a.is_finite()) => {
                return invalid("angles must be finite");
            }
            None if !self.orthogonal_only && !(self.angle_step > 0.0) => {
                return invalid("angle_step must be positive");
            }
            _ => {}
        }
        self.extraction.validate()
    }

    /// Candidate angles for advanced mode, in priority order.
    pub fn candidate_angles(&self) -> Vec<f64> {
        match &self.angles {
            Some(angles) => angles.clone(),
            None if self.orthogonal_only => AXIS_ANGLES.to_vec(),
            None => angles_from_step(self.angle_step),
        }
    }

    /// Physical length to whole pixels, never below `min`.
    pub fn to_px(&self, length: f64, min: u32) -> u32 {
        let px = (length * self.px_per_unit).floor();
        if px.is_finite() && px > min as f64 {
            px.min(u32::MAX as f64) as u32
        } else {
            min
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = NestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.candidate_angles().len(), 24);
        assert_eq!(config.candidate_angles()[0], 0.0);
    }

    #[test]
    fn angle_sources_in_priority() {
        let mut config = NestConfig {
            orthogonal_only: true,
            ..Default::default()
        };
        assert_eq!(config.candidate_angles(), vec![0.0, 90.0, 180.0, 270.0]);
        config.angles = Some(vec![45.0, 0.0]);
        assert_eq!(config.candidate_angles(), vec![45.0, 0.0]);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            NestConfig { px_per_unit: 0.0, ..Default::default() },
            NestConfig { gap: -1.0, ..Default::default() },
            NestConfig { angle_step: 0.0, ..Default::default() },
            NestConfig { angles: Some(vec![]), ..Default::default() },
            NestConfig { stuck_limit: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(NestError::InvalidConfig(_))));
        }
    }

    #[test]
    fn physical_lengths_to_pixels() {
        let config = NestConfig::default();
        assert_eq!(config.to_px(59.0, 1), 2360);
        assert_eq!(config.to_px(0.0, 1), 1);
        assert_eq!(config.to_px(0.4, 0), 16);
        assert_eq!(config.to_px(-3.0, 0), 0);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: NestConfig =
            serde_json::from_str(r#"{"mode": "orthogonal", "gap": 0.0, "prng_seed": 7}"#).unwrap();
        assert_eq!(config.mode, NestMode::Orthogonal);
        assert_eq!(config.gap, 0.0);
        assert_eq!(config.prng_seed, Some(7));
        assert_eq!(config.max_trials, 60_000);
        assert!(!config.compact);
    }
}
