// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::catalog::PlaybackRequest;
use crate::config::PlayerConfig;
use anyhow::{Context, Result};
use std::process::{Command, Stdio};

/// Anything that can take a resolved channel and play it.
pub trait PlaybackSurface {
    fn play(&self, request: &PlaybackRequest) -> Result<()>;
}

/// Plays through an external command such as mpv or vlc.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    config: PlayerConfig,
}

impl CommandPlayer {
    pub fn new(config: PlayerConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, request: &PlaybackRequest) -> Command {
        let mut cmd = Command::new(&self.config.command);

        for arg in &self.config.args {
            cmd.arg(arg.replace("{title}", &request.name));
        }

        cmd.arg(&request.url);
        cmd
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.config.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl PlaybackSurface for CommandPlayer {
    fn play(&self, request: &PlaybackRequest) -> Result<()> {
        tracing::info!("Starting playback of: {}", request.name);

        let status = self.build_command(request).status().with_context(|| {
            format!("Failed to execute player command: {}", self.config.command)
        })?;

        if !status.success() {
            return Err(anyhow::anyhow!(
                "Player process failed with exit code: {}",
                status
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_substitutes_title() {
        let player = CommandPlayer::new(PlayerConfig {
            command: "mpv".to_string(),
            args: vec!["--fs".to_string(), "--force-media-title={title}".to_string()],
        });
        let request = PlaybackRequest {
            name: "BBC One".to_string(),
            url: "http://stream.example/bbc1.m3u8".to_string(),
            logo: String::new(),
        };

        let cmd = player.build_command(&request);
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(cmd.get_program(), "mpv");
        assert_eq!(
            args,
            vec![
                "--fs",
                "--force-media-title=BBC One",
                "http://stream.example/bbc1.m3u8"
            ]
        );
    }

    #[test]
    fn test_missing_player_is_an_error() {
        let player = CommandPlayer::new(PlayerConfig {
            command: "definitely-not-a-real-player-binary".to_string(),
            args: vec![],
        });
        assert!(!player.is_available());
        let request = PlaybackRequest {
            name: "x".to_string(),
            url: "http://x".to_string(),
            logo: String::new(),
        };
        assert!(player.play(&request).is_err());
    }
}
