//! Raster piece nesting: extract a piece silhouette from an image and pack as
//! many rotated copies of it as possible onto a rectangular sheet.

pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod layout;
pub mod nester;
pub mod occupancy;
pub mod search;
pub mod shape;
pub mod variant;

pub use config::{NestConfig, NestMode};
pub use error::NestError;
pub use layout::{NestingResult, Placement, SearchStats, Sheet, StopReason};
pub use nester::{NestJob, NestOutcome, nest_batch, nest_file, nest_image, nest_piece};
pub use shape::{ExtractConfig, PieceShape, extract_piece};
pub use variant::OrientedVariant;
