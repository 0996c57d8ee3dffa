//! Hosts-file sinkholing for URL blocks.
//!
//! Each block appends one `127.0.0.1 <domain>` line. Entries are not
//! deduplicated and there is no matching unblock operation.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::errors::{ResponseError, ResponseResult};

pub const SINKHOLE_ADDRESS: &str = "127.0.0.1";

#[cfg(target_os = "windows")]
pub const DEFAULT_HOSTS_FILE: &str = r"C:\Windows\System32\drivers\etc\hosts";
#[cfg(not(target_os = "windows"))]
pub const DEFAULT_HOSTS_FILE: &str = "/etc/hosts";

pub fn default_hosts_path() -> PathBuf {
    PathBuf::from(DEFAULT_HOSTS_FILE)
}

/// Host part of a URL or bare domain, lowercased.
pub fn extract_domain(url: &str) -> ResponseResult<String> {
    detection::normalize_url_host(url)
        .ok_or_else(|| ResponseError::invalid("url", format!("no host in '{}'", url.trim())))
}

/// Append a sinkhole entry for `domain`.
pub fn append_block_entry(hosts_path: &Path, domain: &str) -> ResponseResult<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(hosts_path)
        .map_err(|err| {
            ResponseError::execution("hosts file", format!("{}: {}", hosts_path.display(), err))
        })?;

    let mut line = String::new();
    if !ends_with_newline(&mut file)? {
        line.push('\n');
    }
    line.push_str(SINKHOLE_ADDRESS);
    line.push(' ');
    line.push_str(domain);
    line.push('\n');

    file.write_all(line.as_bytes()).map_err(|err| {
        ResponseError::execution("hosts file", format!("{}: {}", hosts_path.display(), err))
    })?;
    Ok(())
}

fn ends_with_newline(file: &mut std::fs::File) -> ResponseResult<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
