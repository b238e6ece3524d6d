//! Compiler configuration.
//!
//! Loaded from an optional JSON file; every field falls back to its default so a
//! partial file (or none at all) is valid.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::compiler::symbol::RegisterClass;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Reserved name of the GPU entry function.
    pub entry_point: String,
    /// Target profile handed to the native shader compiler.
    pub target_profile: String,
    pub registers: RegisterPolicy,
    /// Let a double-precision define or constant-buffer binding satisfy a
    /// float request of the same shape.
    pub allow_double_narrowing: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            entry_point: "main".to_string(),
            target_profile: "cs_5_0".to_string(),
            registers: RegisterPolicy::default(),
            allow_double_narrowing: false,
        }
    }
}

/// Highest register index allowed per register class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterPolicy {
    pub max_constant_buffer: u32,
    pub max_read_only: u32,
    pub max_read_write: u32,
}

impl Default for RegisterPolicy {
    fn default() -> Self {
        // D3D11 limits: 14 constant buffer slots, 128 SRV slots, 8 UAV slots.
        Self {
            max_constant_buffer: 13,
            max_read_only: 127,
            max_read_write: 7,
        }
    }
}

impl RegisterPolicy {
    pub fn max_index(&self, class: RegisterClass) -> u32 {
        match class {
            RegisterClass::ConstantBuffer => self.max_constant_buffer,
            RegisterClass::ReadOnlyResource => self.max_read_only,
            RegisterClass::ReadWriteResource => self.max_read_write,
        }
    }
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<CompilerConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read compiler config at {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse compiler config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: CompilerConfig =
            serde_json::from_str(r#"{"entryPoint": "CSMain", "registers": {"maxReadWrite": 63}}"#)
                .unwrap();
        assert_eq!(cfg.entry_point, "CSMain");
        assert_eq!(cfg.target_profile, "cs_5_0");
        assert_eq!(cfg.registers.max_read_write, 63);
        assert_eq!(cfg.registers.max_constant_buffer, 13);
        assert!(!cfg.allow_double_narrowing);
    }

    #[test]
    fn policy_maps_each_class() {
        let p = RegisterPolicy::default();
        assert_eq!(p.max_index(RegisterClass::ConstantBuffer), 13);
        assert_eq!(p.max_index(RegisterClass::ReadOnlyResource), 127);
        assert_eq!(p.max_index(RegisterClass::ReadWriteResource), 7);
    }
}
