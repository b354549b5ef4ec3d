//! Kernel counter acquisition via the `kstat` utility.
//!
//! `kstat -p` prints one statistic per line as
//! `module:instance:name:statistic<TAB>value`. The invoker runs the utility
//! with caller-supplied filter arguments and parses its output into
//! [`KstatRow`]s; malformed lines are logged and skipped so a single odd
//! statistic cannot fail a whole read.

use std::path::PathBuf;

use tokio::process::Command;

use super::{Error, Result};

/// A single statistic reported by `kstat -p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KstatRow {
    pub module: String,
    pub instance: u32,
    pub name: String,
    pub statistic: String,
    /// Raw value text; kstat reports strings as well as numbers.
    pub value: String,
}

impl KstatRow {
    /// Returns the value as an unsigned integer, if it is numeric.
    pub fn numeric(&self) -> Option<u64> {
        self.value.parse().ok()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("malformed kstat line `{0}`")]
pub struct ParseError(String);

/// Parses one line of `kstat -p` output.
pub fn parse_line(line: &str) -> std::result::Result<KstatRow, ParseError> {
    let (ident, value) = line
        .split_once('\t')
        .ok_or_else(|| ParseError(line.to_owned()))?;

    let mut parts = ident.splitn(4, ':');
    let module = parts.next().ok_or_else(|| ParseError(line.to_owned()))?;
    let instance = parts
        .next()
        .and_then(|raw| raw.parse::<u32>().ok())
        .ok_or_else(|| ParseError(line.to_owned()))?;
    let name = parts.next().ok_or_else(|| ParseError(line.to_owned()))?;
    let statistic = parts.next().ok_or_else(|| ParseError(line.to_owned()))?;

    Ok(KstatRow {
        module: module.to_owned(),
        instance,
        name: name.to_owned(),
        statistic: statistic.to_owned(),
        value: value.trim().to_owned(),
    })
}

/// Invokes the external `kstat` utility.
#[derive(Debug, Clone)]
pub struct KstatInvoker {
    path: PathBuf,
}

impl KstatInvoker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Runs `kstat -p` with the given filter arguments and parses the
    /// reported statistics.
    ///
    /// # Errors
    ///
    /// Fails if the utility cannot be spawned or exits unsuccessfully.
    pub async fn read(&self, filter: &[&str]) -> Result<Vec<KstatRow>> {
        let output = Command::new(&self.path)
            .arg("-p")
            .args(filter)
            .output()
            .await
            .map_err(|source| Error::Spawn {
                command: self.command_line(filter),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: self.command_line(filter),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut rows = Vec::new();
        for line in stdout.lines() {
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Ok(row) => rows.push(row),
                Err(err) => log::warn!("{err}"),
            }
        }

        Ok(rows)
    }

    fn command_line(&self, filter: &[&str]) -> String {
        format!("{} -p {}", self.path.display(), filter.join(" "))
    }
}
