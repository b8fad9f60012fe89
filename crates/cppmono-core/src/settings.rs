//! Run configuration for the simplification core.

use serde::Deserialize;

/// Tunables shared by every pass.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Emit debug-severity reports when a construct is bailed on.
    pub debug_warnings: bool,
    /// Per-declaration cap on instantiation-list growth events before the
    /// engine gives up on that declaration.
    pub max_instantiation_growth: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            debug_warnings: false,
            max_instantiation_growth: 100,
        }
    }
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
