use super::runner::ProcessRunner;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use utoipa::ToSchema;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToolInfo {
    pub name: String,
    #[schema(value_type = Option<String>)]
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    pub is_available: bool,
}

impl ToolInfo {
    pub fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: None,
            version: None,
            is_available: false,
        }
    }
}

/// Finds `binary`: the configured path first, then a copy in the working
/// directory, then `PATH`.
pub fn locate(configured: Option<&Path>, binary: &str) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!("Configured {} at {} does not exist", binary, path.display());
        return None;
    }

    let local = Path::new(".").join(format!("{}{}", binary, std::env::consts::EXE_SUFFIX));
    if local.is_file() {
        return Some(local);
    }

    which::which(binary).ok()
}

/// Runs `<program> <flag>` and keeps the first stdout line.
pub async fn probe_version(runner: &dyn ProcessRunner, program: &Path, flag: &str) -> Option<String> {
    match runner
        .run(program, &[flag.to_string()], VERSION_PROBE_TIMEOUT)
        .await
    {
        Ok(out) if out.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty()),
        Ok(out) => {
            warn!("{} {} failed: {}", program.display(), flag, out.stderr_tail());
            None
        }
        Err(e) => {
            warn!("Version probe failed: {}", e);
            None
        }
    }
}

/// Locates and probes one tool, logging what was found.
pub async fn discover(
    runner: &dyn ProcessRunner,
    configured: Option<&Path>,
    binary: &str,
    version_flag: &str,
) -> ToolInfo {
    let Some(path) = locate(configured, binary) else {
        return ToolInfo::missing(binary);
    };

    let version = probe_version(runner, &path, version_flag).await;
    info!(
        "Found {} at {} ({})",
        binary,
        path.display(),
        version.as_deref().unwrap_or("unknown version")
    );

    ToolInfo {
        name: binary.to_string(),
        path: Some(path),
        version,
        is_available: true,
    }
}
