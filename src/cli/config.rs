// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::Result;
use iptv_catalog::Config;
use std::path::{Path, PathBuf};

pub enum ConfigCommand {
    /// Write a config file with the default settings.
    Init { force: bool },
    Path,
}

impl ConfigCommand {
    pub fn execute(self, path: &Path) -> Result<()> {
        match self {
            Self::Init { force } => {
                if let Some(backup) = write_default_config(path, force)? {
                    println!("Existing config backed up to: {}", backup.display());
                }
                println!("Configuration saved to: {}", path.display());
            }
            Self::Path => println!("{}", path.display()),
        }
        Ok(())
    }
}

/// Writes the defaults to `path`. An existing file is kept unless `force` is
/// set, in which case it is copied to `<path>.backup` first.
fn write_default_config(path: &Path, force: bool) -> Result<Option<PathBuf>> {
    let mut backup = None;
    if path.exists() {
        if !force {
            anyhow::bail!(
                "Config file already exists: {} (use --force to overwrite)",
                path.display()
            );
        }
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".backup");
        let backup_path = path.with_file_name(name);
        std::fs::copy(path, &backup_path)?;
        backup = Some(backup_path);
    }

    Config::default().save(path)?;
    Ok(backup)
}
