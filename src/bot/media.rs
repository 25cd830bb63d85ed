use reqwest::Client;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{info, warn};

use super::MusicResult;

const BIN_DIR: &str = ".bin";
const YTDLP_BIN: &str = "yt-dlp";
const YTDLP_URL: &str = "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp";

/// yt-dlp and ffmpeg must be runnable for songbird's `YoutubeDl` input.
/// yt-dlp is fetched into `.bin/` when neither the system nor `.bin/` has it;
/// a missing ffmpeg is only reported.
pub async fn ensure_media_tools(http: &Client) -> MusicResult<()> {
    let bin_dir = PathBuf::from(BIN_DIR);
    prepend_path(&bin_dir)?;

    match tool_version(YTDLP_BIN, "--version").await {
        Some(version) => info!(%version, "yt-dlp found"),
        None => {
            let target = bin_dir.join(YTDLP_BIN);
            download_executable(http, YTDLP_URL, &target).await?;
            info!(path = %target.display(), "yt-dlp downloaded");
        }
    }

    match tool_version("ffmpeg", "-version").await {
        Some(version) => info!(%version, "ffmpeg found"),
        None => warn!("ffmpeg not found on PATH, playback will fail"),
    }
    Ok(())
}

/// First line of `<tool> <flag>`, if the tool runs and succeeds.
async fn tool_version(tool: &str, flag: &str) -> Option<String> {
    let output = Command::new(tool).arg(flag).output().await.ok()?;
    if !output.status.success() {
        warn!(tool, stderr = %String::from_utf8_lossy(&output.stderr), "tool exits with an error");
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_owned)
}

async fn download_executable(http: &Client, url: &str, target: &Path) -> MusicResult<()> {
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir).await?;
    }
    let body = http.get(url).send().await?.error_for_status()?.bytes().await?;
    fs::write(target, &body).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(target, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(())
}

fn prepend_path(dir: &Path) -> MusicResult<()> {
    let current: OsString = env::var_os("PATH").unwrap_or_default();
    let mut paths: Vec<PathBuf> = env::split_paths(&current).collect();
    if paths.iter().any(|p| p == dir) {
        return Ok(());
    }
    paths.insert(0, dir.to_path_buf());
    let joined = env::join_paths(paths)?;
    // Runs at startup before any task that reads the environment is spawned.
    unsafe {
        env::set_var("PATH", joined);
    }
    Ok(())
}
