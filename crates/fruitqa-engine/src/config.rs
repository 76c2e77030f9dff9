//! Engine configuration.
//!
//! Options are plain serde structs with defaults for every field, so a TOML
//! file only needs the keys it overrides:
//!
//! ```
//! use fruitqa_engine::EngineOptions;
//!
//! let options = EngineOptions::from_toml_str(r#"
//! max_passes = 3
//!
//! [settings]
//! planta = "san_fernando"
//! "#).unwrap();
//!
//! assert_eq!(options.max_passes, 3);
//! assert_eq!(options.percent_precision, 1);
//! assert_eq!(options.settings.formatted_planta(), "San Fernando");
//! assert_eq!(options.settings.temporada, "25-26");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Upper bound on rule-list passes per mutation.
    pub max_passes: usize,
    /// Decimal places for weight and pressure averages.
    pub weight_precision: u32,
    /// Decimal places for stored percentages.
    pub percent_precision: u32,
    pub settings: GlobalSettings,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_passes: 2,
            weight_precision: 2,
            percent_precision: 1,
            settings: GlobalSettings::default(),
        }
    }
}

impl EngineOptions {
    pub fn from_toml_str(src: &str) -> Result<Self> {
        Ok(toml::from_str(src)?)
    }
}

/// Plant and season selected for the whole application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub planta: String,
    pub temporada: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            planta: "teno".to_string(),
            temporada: "25-26".to_string(),
        }
    }
}

impl GlobalSettings {
    /// Display form of the plant key: `_`-separated words, each capitalized.
    pub fn formatted_planta(&self) -> String {
        self.planta
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.max_passes, 2);
        assert_eq!(options.weight_precision, 2);
        assert_eq!(options.settings.planta, "teno");
        assert_eq!(options.settings.formatted_planta(), "Teno");
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(EngineOptions::from_toml_str("").unwrap(), EngineOptions::default());
    }

    #[test]
    fn test_bad_toml() {
        let err = EngineOptions::from_toml_str("max_passes = \"two\"").unwrap_err();
        assert!(matches!(err, crate::EngineError::Config(_)));
    }

    #[test]
    fn test_formatted_planta() {
        let settings = GlobalSettings {
            planta: "los_angeles".into(),
            temporada: "24-25".into(),
        };
        assert_eq!(settings.formatted_planta(), "Los Angeles");
        let empty = GlobalSettings {
            planta: String::new(),
            temporada: String::new(),
        };
        assert_eq!(empty.formatted_planta(), "");
    }
}
