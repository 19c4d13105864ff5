//! Control socket paths for ssh multiplexing
//!
//! ssh refuses control paths longer than the Unix socket path limit, and
//! hostnames and usernames can be arbitrarily long. Instead of truncating
//! (which could make two hosts share a socket), the resolver walks a fixed
//! ladder of shorter and shorter names and takes the first that fits.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::host::Host;

/// Longest control path ssh will accept (historical `sun_path` size)
pub const MAX_CONTROL_PATH_LEN: usize = 104;

/// ssh token expanding to a hash of the local host, remote host, port and user
pub const CONNECTION_HASH_TOKEN: &str = "%C";

/// Length of [`CONNECTION_HASH_TOKEN`] once ssh expands it (SHA-1 hex)
pub const CONNECTION_HASH_LEN: usize = 40;

/// Derives control paths under a home directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPathResolver {
    home: PathBuf,
}

impl ControlPathResolver {
    /// Resolve paths under `home`
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Resolve paths under the current user's home directory
    pub fn from_home_dir() -> Result<Self> {
        dirs::home_dir()
            .map(Self::new)
            .ok_or_else(|| Error::configuration("cannot determine home directory for control path"))
    }

    /// The home directory paths are built under
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Every candidate for `host`, longest first
    pub fn candidates(&self, host: &Host) -> Vec<String> {
        let triple = connection_triple(host);
        let ssh_dir = self.home.join(".ssh");

        [
            ssh_dir.join(format!("deployer_mux_{triple}")),
            ssh_dir.join(format!("deployer_mux_{CONNECTION_HASH_TOKEN}")),
            self.home.join(format!("deployer_mux_{triple}")),
            self.home.join(format!("deployer_mux_{CONNECTION_HASH_TOKEN}")),
            self.home.join(format!("mux_{CONNECTION_HASH_TOKEN}")),
        ]
        .into_iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect()
    }

    /// First candidate that fits within [`MAX_CONTROL_PATH_LEN`]
    pub fn resolve(&self, host: &Host) -> Result<String> {
        let candidates = self.candidates(host);

        if let Some(path) = candidates
            .iter()
            .find(|path| expanded_len(path) <= MAX_CONTROL_PATH_LEN)
        {
            return Ok(path.clone());
        }

        let shortest = candidates.last().cloned().unwrap_or_default();
        Err(Error::configuration(format!(
            "control path too long for {}: {} is {} bytes once expanded, limit is {}",
            host.hostname(),
            shortest,
            expanded_len(&shortest),
            MAX_CONTROL_PATH_LEN
        )))
    }
}

/// `{user}_{hostname}_{port}` with absent parts left out
fn connection_triple(host: &Host) -> String {
    let port = host.port().map(|port| port.to_string());
    [host.user(), Some(host.hostname()), port.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("_")
}

/// Length in bytes after ssh expands the connection hash token
pub fn expanded_len(path: &str) -> usize {
    let tokens = path.matches(CONNECTION_HASH_TOKEN).count();
    path.len() - tokens * CONNECTION_HASH_TOKEN.len() + tokens * CONNECTION_HASH_LEN
}
