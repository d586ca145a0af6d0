//! Common test utilities for CLI tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated home directory for one test
pub struct TestEnv {
    pub home: TempDir,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self { home: tempdir()? })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.home.path().join(".tagloop")
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir().join("config.json")
    }

    /// Command with HOME pointed at the test directory and no API key
    /// leaking in from the environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tagloop"));
        cmd.env("HOME", self.home.path());
        cmd.env_remove("TAGLOOP_API_KEY");
        cmd.env_remove("OPENROUTER_API_KEY");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    pub fn write_config(&self, json: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::write(self.config_file(), json)?;
        Ok(())
    }
}
