//! Filesystem usage acquisition via the `zfs` utility.

use std::path::PathBuf;

use tokio::process::Command;

use super::{Error, FilesystemUsage, Result};

/// Invokes the external `zfs` utility.
#[derive(Debug, Clone)]
pub struct ZfsInvoker {
    path: PathBuf,
}

impl ZfsInvoker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Queries used and available bytes for the given dataset via
    /// `zfs list -Hpo used,avail`.
    ///
    /// # Errors
    ///
    /// Fails if the utility cannot be spawned, exits unsuccessfully (e.g. an
    /// unknown dataset), or prints output that does not parse as two byte
    /// counts.
    pub async fn usage(&self, dataset: &str) -> Result<FilesystemUsage> {
        let command = format!("{} list -Hpo used,avail {}", self.path.display(), dataset);
        let output = Command::new(&self.path)
            .args(["list", "-Hpo", "used,avail", dataset])
            .output()
            .await
            .map_err(|source| Error::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        parse_usage(&String::from_utf8_lossy(&output.stdout))
            .map_err(|detail| Error::InvalidOutput { command, detail })
    }
}

/// Parses the single `used<TAB>avail` line printed by `zfs list -Hpo`.
fn parse_usage(stdout: &str) -> std::result::Result<FilesystemUsage, String> {
    let line = stdout
        .lines()
        .next()
        .ok_or_else(|| "empty output".to_owned())?;
    let mut fields = line.split_whitespace();

    let used = parse_bytes(fields.next(), "used")?;
    let available = parse_bytes(fields.next(), "avail")?;

    Ok(FilesystemUsage { used, available })
}

fn parse_bytes(field: Option<&str>, column: &str) -> std::result::Result<u64, String> {
    let raw = field.ok_or_else(|| format!("missing `{column}` column"))?;
    raw.parse()
        .map_err(|_| format!("invalid `{column}` value `{raw}`"))
}
