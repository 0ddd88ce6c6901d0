//! External assembler/linker invocation
//!
//! Writes the NASM listing into a scratch directory, assembles it to a
//! 32-bit object and links the executable. The scratch directory is
//! removed when this function returns, on every path. Command lines come
//! from [`ToolchainConfig`]; both tools are expected on PATH.

use crate::config::ToolchainConfig;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

/// Reduce an executable name to a safe ASCII base for scratch files.
fn sanitize_base_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "program".to_string()
    } else {
        trimmed.to_string()
    }
}

fn run_tool(command: &mut Command, tool: &str) -> Result<(), String> {
    let output = command.output().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            format!("'{}' not found in PATH", tool)
        } else {
            format!("Failed to run '{}': {}", tool, e)
        }
    })?;
    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "'{}' failed with exit code {:?}:\n{}{}",
            tool,
            output.status.code(),
            stdout,
            stderr
        ));
    }
    Ok(())
}

/// Assemble a NASM listing and link it into `exe_output`.
pub fn assemble_and_link(
    nasm_code: &str,
    exe_output: &Path,
    config: &ToolchainConfig,
) -> Result<(), String> {
    let scratch = tempfile::Builder::new()
        .prefix("pasc-build-")
        .tempdir()
        .map_err(|e| format!("Failed to create scratch directory: {}", e))?;

    let base = exe_output
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(sanitize_base_name)
        .unwrap_or_else(|| "program".to_string());
    let asm_path = scratch.path().join(format!("{}.asm", base));
    let obj_path = scratch.path().join(format!("{}.obj", base));

    fs::write(&asm_path, nasm_code)
        .map_err(|e| format!("Failed to write '{}': {}", asm_path.display(), e))?;

    let mut assemble = Command::new(&config.assembler);
    assemble
        .args(&config.assembler_args)
        .arg(&asm_path)
        .arg("-o")
        .arg(&obj_path);
    run_tool(&mut assemble, &config.assembler)?;

    let mut link = Command::new(&config.linker);
    link.args(&config.linker_args)
        .arg(&obj_path)
        .arg("-o")
        .arg(exe_output)
        .args(&config.linker_trailing_args);
    run_tool(&mut link, &config.linker)?;

    // The scratch dir (and the .asm/.obj inside) is removed on drop.
    Ok(())
}
