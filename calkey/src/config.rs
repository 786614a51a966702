//! Declarative hierarchy configuration.
//!
//! A [`HierarchyConfig`] is the serializable form of a [`PeriodHierarchy`]
//! plus the compression flag of the scheme built on it:
//!
//! ```json
//! {
//!   "compression": true,
//!   "periods": ["1Y"],
//!   "rollups": [
//!     { "lower": "5N", "upper": "1H" },
//!     { "lower": "1H", "upper": "6H" },
//!     { "lower": "1H", "upper": "1D" }
//!   ]
//! }
//! ```
//!
//! Periods listed under `periods` are registered first, in order, then each
//! rollup declares `upper` as a parent of `lower`. Declaration order is what
//! decides the default parent and child used for navigation.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::hierarchy::PeriodHierarchy;
use crate::period::AggregationPeriod;
use crate::scheme::KeyScheme;

/// One roll-up edge: buckets of `lower` aggregate into buckets of `upper`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    /// The finer period.
    pub lower: AggregationPeriod,
    /// The coarser period.
    pub upper: AggregationPeriod,
}

/// Serializable description of a key scheme and its hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HierarchyConfig {
    /// Whether keys are rendered with compressed suffixes.
    #[serde(default)]
    pub compression: bool,

    /// Periods registered before any rollup, including periods with no edges.
    #[serde(default)]
    pub periods: Vec<AggregationPeriod>,

    /// Roll-up edges, in declaration order.
    #[serde(default)]
    pub rollups: Vec<RollupConfig>,
}

impl HierarchyConfig {
    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the JSON is invalid or names an
    /// invalid period.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            ConfigError::Parse {
                path: "<inline>".to_string(),
                source: e,
            }
            .into()
        })
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: HierarchyConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                source: e,
            })?;

        tracing::debug!(
            path = %path.display(),
            periods = config.periods.len(),
            rollups = config.rollups.len(),
            compression = config.compression,
            "loaded hierarchy config"
        );
        Ok(config)
    }

    /// Saves the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize { source: e })?;

        fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Describes an existing hierarchy.
    ///
    /// Every period is listed under `periods` so that building the result
    /// reproduces the hierarchy's period order and each period's parent order.
    pub fn from_hierarchy(hierarchy: &PeriodHierarchy, compression: bool) -> Self {
        Self {
            compression,
            periods: hierarchy.iter().copied().collect(),
            rollups: hierarchy
                .edges()
                .map(|(upper, lower)| RollupConfig {
                    lower: *lower,
                    upper: *upper,
                })
                .collect(),
        }
    }

    /// Builds the described hierarchy.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::Cycle`](crate::error::HierarchyError::Cycle)
    /// if the rollups form a cycle.
    pub fn build_hierarchy(&self) -> Result<PeriodHierarchy> {
        let mut hierarchy = PeriodHierarchy::new();
        for period in &self.periods {
            hierarchy.add_period(*period);
        }
        for rollup in &self.rollups {
            hierarchy.add_periods(rollup.upper, rollup.lower)?;
        }
        Ok(hierarchy)
    }

    /// Builds a key scheme over the described hierarchy.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::build_hierarchy`].
    pub fn build_scheme(&self) -> Result<KeyScheme> {
        Ok(KeyScheme::new(self.build_hierarchy()?, self.compression))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CalkeyError, HierarchyError};

    const CONFIG: &str = r#"{
        "compression": true,
        "periods": ["1Y"],
        "rollups": [
            { "lower": "5N", "upper": "1H" },
            { "lower": "1H", "upper": "6H" },
            { "lower": "1H", "upper": "1D" }
        ]
    }"#;

    #[test]
    fn test_build_from_json() {
        let config = HierarchyConfig::from_json_str(CONFIG).unwrap();
        assert!(config.compression);

        let hierarchy = config.build_hierarchy().unwrap();
        let codes: Vec<String> = hierarchy.iter().map(AggregationPeriod::code_name).collect();
        assert_eq!(codes, ["1Y", "1H", "5N", "6H", "1D"]);

        let scheme = config.build_scheme().unwrap();
        assert!(scheme.compression_enabled());
        assert_eq!(
            scheme.upper_level_keys("1H2015031217").unwrap(),
            ["6H201503122", "1D20150312"]
        );
    }

    #[test]
    fn test_defaults() {
        let config = HierarchyConfig::from_json_str("{}").unwrap();
        assert_eq!(config, HierarchyConfig::default());
        assert!(config.build_hierarchy().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            HierarchyConfig::from_json_str(r#"{ "periods": ["2D"] }"#),
            Err(CalkeyError::Config(ConfigError::Parse { .. }))
        ));
        assert!(HierarchyConfig::from_json_str(r#"{ "period": [] }"#).is_err());

        let cyclic = HierarchyConfig::from_json_str(
            r#"{ "rollups": [
                { "lower": "1H", "upper": "1D" },
                { "lower": "1D", "upper": "1H" }
            ] }"#,
        )
        .unwrap();
        assert!(matches!(
            cyclic.build_hierarchy(),
            Err(CalkeyError::Hierarchy(HierarchyError::Cycle { .. }))
        ));
    }

    #[test]
    fn test_from_hierarchy_round_trip() {
        let original = HierarchyConfig::from_json_str(CONFIG).unwrap();
        let hierarchy = original.build_hierarchy().unwrap();

        let dumped = HierarchyConfig::from_hierarchy(&hierarchy, true);
        let rebuilt = dumped.build_hierarchy().unwrap();

        let codes = |h: &PeriodHierarchy| -> Vec<String> {
            h.iter().map(AggregationPeriod::code_name).collect()
        };
        assert_eq!(codes(&rebuilt), codes(&hierarchy));
        assert_eq!(rebuilt.edges().count(), hierarchy.edges().count());
        assert_eq!(dumped.rollups.len(), 3);
    }
}
