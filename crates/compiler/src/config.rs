//! Compiler configuration
//!
//! Optional TOML file controlling the optimizer and the external
//! assembler/linker command lines. Anything not set falls back to the
//! defaults, which target NASM producing a 32-bit Windows object and a
//! gcc link against the C runtime.

use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Run constant folding and dead-code elimination.
    pub optimize: bool,
    /// Fixed-point cap for the optimizer.
    pub max_opt_passes: usize,
    pub toolchain: ToolchainConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            optimize: true,
            max_opt_passes: crate::optimizer::DEFAULT_MAX_PASSES,
            toolchain: ToolchainConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Assembler executable; must understand NASM syntax.
    pub assembler: String,
    /// Flags placed before the input file (object format, debug info).
    pub assembler_args: Vec<String>,
    /// Linker executable.
    pub linker: String,
    /// Flags placed before the object file.
    pub linker_args: Vec<String>,
    /// Flags placed after the output file (entry point, runtime libs).
    pub linker_trailing_args: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        ToolchainConfig {
            assembler: "nasm".to_string(),
            assembler_args: vec!["-f".to_string(), "win32".to_string(), "-g".to_string()],
            linker: "gcc".to_string(),
            linker_args: vec!["-m32".to_string()],
            linker_trailing_args: vec![
                "-Wl,-e,_main".to_string(),
                "-nostdlib".to_string(),
                "-lgcc".to_string(),
                "-lkernel32".to_string(),
                "-lmsvcrt".to_string(),
            ],
        }
    }
}

impl CompilerConfig {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Invalid config: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config '{}': {}", path.display(), e))?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert!(config.optimize);
        assert_eq!(config.max_opt_passes, 10);
        assert_eq!(config.toolchain.assembler, "nasm");
        assert_eq!(config.toolchain.linker, "gcc");
        assert!(config
            .toolchain
            .linker_trailing_args
            .contains(&"-lmsvcrt".to_string()));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CompilerConfig::from_toml(
            r#"
optimize = false

[toolchain]
assembler = "yasm"
"#,
        )
        .unwrap();
        assert!(!config.optimize);
        assert_eq!(config.max_opt_passes, 10);
        assert_eq!(config.toolchain.assembler, "yasm");
        assert_eq!(config.toolchain.linker, "gcc");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = CompilerConfig::from_toml("optimise = true").unwrap_err();
        assert!(err.contains("Invalid config"));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(CompilerConfig::from_toml("optimize = ").is_err());
    }
}
