// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blueprint settings file.
//!
//! Settings are stored as RON:
//! ```ron
//! (
//!     version: 1,
//!     compile: (max_port_passes: 16),
//!     runtime: (max_flow_depth: 256),
//! )
//! ```

use crate::compiler::CompileOptions;
use crate::graph::AssetError;
use crate::runtime::RuntimeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Compiler and engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueprintSettings {
    /// Settings format version
    pub version: u32,
    /// Compiler options
    pub compile: CompileOptions,
    /// Engine options
    pub runtime: RuntimeConfig,
}

impl Default for BlueprintSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            compile: CompileOptions::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl BlueprintSettings {
    /// Parse settings from RON
    pub fn from_ron(s: &str) -> Result<Self, AssetError> {
        let settings: BlueprintSettings = ron::from_str(s)?;

        // Version check
        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(AssetError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }

        Ok(settings)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), AssetError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(false)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = BlueprintSettings::default();
        assert_eq!(settings.version, SETTINGS_FORMAT_VERSION);
        assert_eq!(settings.compile.max_port_passes, 16);
        assert_eq!(settings.runtime.max_flow_depth, 256);
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings = BlueprintSettings::from_ron("(runtime: (max_flow_depth: 8))").unwrap();
        assert_eq!(settings.runtime.max_flow_depth, 8);
        assert_eq!(settings.compile, CompileOptions::default());
    }

    #[test]
    fn test_newer_version_rejected() {
        let result = BlueprintSettings::from_ron("(version: 99)");
        assert!(matches!(
            result,
            Err(AssetError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_settings_serialization() {
        let mut settings = BlueprintSettings::default();
        settings.runtime.max_flow_depth = 32;

        let ron_str = ron::ser::to_string_pretty(&settings, ron::ser::PrettyConfig::default()).unwrap();
        let loaded = BlueprintSettings::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, settings);
    }
}
