//! Host capabilities behind the remediation commands.
//!
//! One implementation per platform family, chosen once at startup by
//! [`select_host_actions`]. Both implementations compile everywhere so the
//! tool invocations can be exercised against a recording runner.

mod posix;
mod windows;

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub use posix::PosixHost;
pub use windows::WindowsHost;

use crate::errors::{ResponseError, ResponseResult};
use crate::hosts_file::default_hosts_path;

/// Rule name or comment tag shared by every isolation rule, so restore can
/// target exactly what isolate created.
pub const ISOLATION_TAG: &str = "IOCGuard-Isolate";

pub trait HostActions: Send + Sync {
    fn platform(&self) -> &'static str;

    fn delete_file(&self, path: &Path) -> ResponseResult<String> {
        remove_regular_file(path)
    }

    fn kill_process(&self, pid: u32) -> ResponseResult<String>;
    fn kill_process_tree(&self, pid: u32) -> ResponseResult<String>;
    fn block_ip(&self, ip: IpAddr) -> ResponseResult<String>;
    fn block_url(&self, domain: &str) -> ResponseResult<String>;
    fn isolate(&self, allowed: &[IpAddr]) -> ResponseResult<String>;
    fn restore(&self) -> ResponseResult<String>;
}

#[derive(Debug, Clone)]
pub struct HostOptions {
    pub hosts_file: PathBuf,
    /// Time survivors get between SIGTERM and SIGKILL in a tree kill.
    pub kill_grace: Duration,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            hosts_file: default_hosts_path(),
            kill_grace: Duration::from_secs(2),
        }
    }
}

#[cfg(target_os = "windows")]
pub fn select_host_actions(options: &HostOptions) -> Arc<dyn HostActions> {
    tracing::info!("using Windows host actions");
    Arc::new(WindowsHost::system(options))
}

#[cfg(unix)]
pub fn select_host_actions(options: &HostOptions) -> Arc<dyn HostActions> {
    tracing::info!("using POSIX host actions");
    Arc::new(PosixHost::system(options))
}

pub(crate) fn remove_regular_file(path: &Path) -> ResponseResult<String> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ResponseError::FileNotFound(path.to_path_buf()));
        }
        Err(err) => return Err(ResponseError::Io(err)),
    };
    if metadata.is_dir() {
        return Err(ResponseError::invalid(
            "path",
            format!("{} is a directory", path.display()),
        ));
    }

    std::fs::remove_file(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => ResponseError::FileNotFound(path.to_path_buf()),
        _ => ResponseError::execution("remove file", format!("{}: {}", path.display(), err)),
    })?;
    Ok(format!("deleted file {}", path.display()))
}
