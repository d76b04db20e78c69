//! Platform playback of the generated WAV.
//!
//! - macOS: `afplay`
//! - Windows: PowerShell `Media.SoundPlayer`
//! - elsewhere: the preferred player if found, then `aplay`, `paplay`, `ffplay`
//!
//! Playback problems are reported as `PlaybackFailure` and never change the
//! outcome of a run.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};
use tts_compat_core::{CompatError, Result};

const LINUX_PLAYERS: [&str; 3] = ["aplay", "paplay", "ffplay"];

/// Resolve a binary name against PATH; path-like values are used as given.
pub fn find_on_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) || bin.contains('/') {
        let p = PathBuf::from(bin);
        return p.exists().then_some(p);
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(bin);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

/// A fully built player invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl PlayerCommand {
    /// Arguments for a known player binary playing `wav`.
    pub fn for_player(program: PathBuf, wav: &Path) -> Self {
        let name = program
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        let mut args: Vec<OsString> = Vec::new();
        match name.as_str() {
            "ffplay" => {
                args.push("-nodisp".into());
                args.push("-autoexit".into());
                args.push("-loglevel".into());
                args.push("quiet".into());
                args.push(wav.as_os_str().to_owned());
            }
            "powershell" | "pwsh" => {
                let quoted = wav.display().to_string().replace('\'', "''");
                args.push("-NoProfile".into());
                args.push("-Command".into());
                args.push(format!("(New-Object Media.SoundPlayer '{}').PlaySync()", quoted).into());
            }
            _ => args.push(wav.as_os_str().to_owned()),
        }
        Self { program, args }
    }
}

/// Pick a player for this platform, honouring `preferred` when it exists.
pub fn select_player(preferred: Option<&str>, wav: &Path) -> Option<PlayerCommand> {
    if let Some(program) = preferred.and_then(find_on_path) {
        return Some(PlayerCommand::for_player(program, wav));
    }

    let program = if cfg!(target_os = "macos") {
        find_on_path("afplay")
    } else if cfg!(windows) {
        find_on_path("powershell").or_else(|| Some(PathBuf::from("powershell")))
    } else {
        LINUX_PLAYERS.iter().find_map(|bin| find_on_path(bin))
    }?;
    Some(PlayerCommand::for_player(program, wav))
}

/// Play `wav` to completion with the selected player.
pub async fn play_wav(wav: &Path, preferred: Option<&str>) -> Result<()> {
    let player = select_player(preferred, wav).ok_or_else(|| {
        CompatError::PlaybackFailure("no audio player found (tried afplay, aplay, paplay, ffplay)".into())
    })?;
    info!(target: "playback", player = %player.program.display(), "Playing audio");

    let status = Command::new(&player.program)
        .args(&player.args)
        .status()
        .await
        .map_err(|e| {
            CompatError::PlaybackFailure(format!("{}: {}", player.program.display(), e))
        })?;

    if !status.success() {
        return Err(CompatError::PlaybackFailure(format!(
            "{} exited with {}",
            player.program.display(),
            status
        )));
    }
    debug!(target: "playback", "Playback finished");
    Ok(())
}
