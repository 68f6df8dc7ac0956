use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

/// Largest scale a decimal can carry.
const MAX_SCALE: u32 = 28;

/// Configuration for query execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Number of decimal places averages are rounded to, half to even.
    pub average_scale: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { average_scale: 2 }
    }
}

impl QueryConfig {
    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml_str(s: &str) -> QueryResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| QueryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> QueryResult<()> {
        if self.average_scale > MAX_SCALE {
            return Err(QueryError::InvalidConfig(format!(
                "average_scale must be at most {MAX_SCALE}, got {}",
                self.average_scale
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scale_is_two() {
        assert_eq!(QueryConfig::default().average_scale, 2);
        assert_eq!(QueryConfig::from_toml_str("").unwrap(), QueryConfig::default());
    }

    #[test]
    fn toml_sets_scale() {
        assert_eq!(QueryConfig::from_toml_str("average_scale = 4").unwrap().average_scale, 4);
    }

    #[test]
    fn toml_rejects_bad_scale() {
        assert!(matches!(
            QueryConfig::from_toml_str("average_scale = 29"),
            Err(QueryError::InvalidConfig(_))
        ));
        assert!(QueryConfig::from_toml_str("average_scale = -1").is_err());
    }
}
