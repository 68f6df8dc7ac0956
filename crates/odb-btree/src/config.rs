use serde::{Deserialize, Serialize};

use crate::error::{BTreeError, BTreeResult};

/// Configuration for a persistent B-tree and its node cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Minimum degree: every node but the root holds between `degree - 1`
    /// and `2 * degree - 1` entries.
    pub degree: usize,
    /// Number of recently touched nodes kept alive by strong handles.
    pub strong_cache_capacity: usize,
    /// Every this many node touches, dead weak handles are swept.
    pub sweep_interval: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            degree: 10,
            strong_cache_capacity: 200,
            sweep_interval: 1000,
        }
    }
}

impl TreeConfig {
    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml_str(s: &str) -> BTreeResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| BTreeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BTreeResult<()> {
        if self.degree < 2 {
            return Err(BTreeError::InvalidConfig(format!(
                "degree must be at least 2, got {}",
                self.degree
            )));
        }
        if self.strong_cache_capacity == 0 {
            return Err(BTreeError::InvalidConfig(
                "strong_cache_capacity must be positive".into(),
            ));
        }
        if self.sweep_interval == 0 {
            return Err(BTreeError::InvalidConfig(
                "sweep_interval must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Largest number of entries a node may hold.
    pub fn max_entries(&self) -> usize {
        2 * self.degree - 1
    }
}
