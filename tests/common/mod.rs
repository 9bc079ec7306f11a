//! Common test helpers shared across integration tests

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(dead_code)] // Not all helpers are used by every test file

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Package version for testing --version flag
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Helper to get the compiled binary path
pub fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_runtasks"))
}

/// Helper to create a temporary directory for tests
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().unwrap()
}

/// Helper to create a tasks.run file in a directory
pub fn create_tasks_file(dir: &Path, content: &str) {
    fs::write(dir.join("tasks.run"), content).unwrap();
}

/// Helper to create a tasks.toml config file in a directory
pub fn create_config(dir: &Path, content: &str) {
    fs::write(dir.join("tasks.toml"), content).unwrap();
}

/// Helper to create a Command with test environment.
/// Clears variables that change the runner's behavior and disables colors.
pub fn test_command(dir: &Path) -> Command {
    let mut cmd = Command::new(get_binary_path());
    cmd.current_dir(dir)
        .env_remove("RUNTASKS_DEFAULT_ENV")
        .env_remove("RUNTASKS_SHELL")
        .env_remove("RUNTASKS_LOG")
        .env_remove("COLUMNS")
        .env("NO_COLOR", "1");
    cmd
}

/// Run the binary in `dir` with `args`.
pub fn run_in(dir: &Path, args: &[&str]) -> Output {
    test_command(dir)
        .args(args)
        .output()
        .expect("Failed to execute command")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
