//! Run configuration, loadable from TOML.
//!
//! Every section and every key is optional; missing values take the defaults of the
//! respective stage.
//!
//! ```
//! let config = ensclip::Config::from_toml_str(r#"
//!     mode = "crinkle"
//!
//!     [predicate]
//!     shape = { type = "sphere", center = [0.0, 0.0, 0.0], radius = 2.5 }
//!
//!     [clip.memory]
//!     hard_floor_bytes = 268435456
//! "#)?;
//!
//! assert_eq!(config.mode, ensclip::ClipMode::Crinkle);
//! assert_eq!(config.clip.memory.hard_floor_bytes, 256 * 1024 * 1024);
//! assert_eq!(config.clip.memory.soft_floor_bytes, 1024 * 1024 * 1024);
//! # Ok::<(), ensclip::Error>(())
//! ```

use crate::error::InvalidConfig;
use crate::memory::MemoryBudget;
use crate::prelude::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings of the clipping engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    pub strategy: Strategy,
    /// `Strategy::Auto` clips single block meshes with fewer cells than this in one pass
    pub large_dataset_threshold: usize,
    /// on the monolithic path, skip cells far from a box or sphere predicate up front
    pub prefilter: bool,
    /// per axis enlargement of the pre-filter box, as a fraction of the clip extent
    pub prefilter_margin: f64,
    pub memory: MemoryBudget,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            large_dataset_threshold: 10_000_000,
            prefilter: true,
            prefilter_margin: 0.5,
            memory: MemoryBudget::default(),
        }
    }
}

impl ClipConfig {
    /// Reject settings that would drop cells from the result. A negative pre-filter
    /// margin shrinks the candidate box below the kept region.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        let margin = self.prefilter_margin;
        if !margin.is_finite() || margin < 0.0 {
            return Err(InvalidConfig::PrefilterMargin { margin });
        }
        Ok(())
    }
}

/// Everything a driver needs for one clip-reduce-write run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub clip: ClipConfig,
    pub reduce: ReduceOptions,
    pub write: WriteOptions,
    pub predicate: Option<ClipPredicate>,
    pub mode: ClipMode,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.clip.large_dataset_threshold, 10_000_000);
        assert_eq!(config.mode, ClipMode::Exact);
        assert!(config.reduce.merge_points);
        assert!(config.predicate.is_none());
    }

    #[test]
    fn box_predicate_and_overrides() {
        let config = Config::from_toml_str(
            r#"
            [clip]
            strategy = "block_wise"
            prefilter = false

            [reduce]
            canonicalize = true

            [write]
            format = "ascii"
            part_name = "Fluid"

            [predicate]
            invert = true
            shape = { type = "box", bounds = { xmin = -5.0, xmax = 5.0, ymin = -5.0, ymax = 5.0, zmin = -5.0, zmax = 5.0 } }
            "#,
        )
        .unwrap();

        assert_eq!(config.clip.strategy, Strategy::BlockWise);
        assert!(!config.clip.prefilter);
        assert_eq!(config.clip.prefilter_margin, 0.5);
        assert!(config.reduce.canonicalize);
        assert_eq!(config.write.format, GeometryFormat::Ascii);
        assert_eq!(config.write.part_name, "Fluid");

        let predicate = config.predicate.unwrap();
        assert!(predicate.invert);
        assert!(!predicate.classify([0.0, 0.0, 0.0]));
    }

    #[test]
    fn negative_or_nan_margins_are_invalid() {
        let mut config = ClipConfig::default();
        assert!(config.validate().is_ok());

        config.prefilter_margin = 0.0;
        assert!(config.validate().is_ok());

        config.prefilter_margin = -0.6;
        assert_eq!(
            config.validate(),
            Err(InvalidConfig::PrefilterMargin { margin: -0.6 })
        );

        config.prefilter_margin = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        let err = Config::from_toml_str("[predicate]\nshape = { type = \"cone\" }").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
