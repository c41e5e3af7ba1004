// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Engine configuration.
//!
//! Stored as TOML; every field has a default so partial files are fine:
//!
//! ```toml
//! allow_side_effects = false
//!
//! [smart_pointers]
//! [[smart_pointers.rule]]
//! prefix = "std::unique_ptr<"
//! pointer_member = "__ptr_"
//! ```

use std::{fs, path::Path};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::smart_ptr::SmartPtrTable;

/// Settings shared by every evaluation run through an
/// [`ExpressionEvaluator`](crate::ExpressionEvaluator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default for [`Options::allow_side_effects`](crate::Options) when the
    /// caller does not pass options explicitly
    pub allow_side_effects: bool,
    /// Recognized smart pointer templates
    pub smart_pointers: SmartPtrTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { allow_side_effects: false, smart_pointers: SmartPtrTable::default() }
    }
}

impl EngineConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).wrap_err("Failed to parse engine config as TOML")
    }

    /// Load from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), rules = config.smart_pointers.rules.len(), "Loaded engine config");
        Ok(config)
    }

    /// Write to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).wrap_err("Failed to serialize engine config to TOML")?;
        fs::write(path, content)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;
        debug!(path = %path.display(), "Saved engine config");
        Ok(())
    }
}
