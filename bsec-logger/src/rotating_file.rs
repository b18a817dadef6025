use chrono::{DateTime, Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_BACKUP_COUNT: usize = 180;
const SUFFIX_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum RotateError {
    #[error("cannot open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("cannot rotate {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Append-only file that is moved aside to `<base>.<YYYY-MM-DD>` at local midnight.
#[derive(Debug)]
pub struct RotatingFile {
    base: PathBuf,
    backup_count: usize,
    period: NaiveDate,
    file: File,
}

fn open_append(path: &Path) -> Result<File, RotateError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| RotateError::Open {
            path: path.to_path_buf(),
            source,
        })
}

impl RotatingFile {
    /// Continues an existing file in the day it was last written, else starts today.
    pub fn open(base: &Path, backup_count: usize) -> Result<RotatingFile, RotateError> {
        let period = match fs::metadata(base).and_then(|meta| meta.modified()) {
            Ok(modified) => DateTime::<Local>::from(modified).date_naive(),
            Err(_) => Local::now().date_naive(),
        };
        let file = open_append(base)?;
        info!("Logging to {}", base.display());
        Ok(RotatingFile {
            base: base.to_path_buf(),
            backup_count,
            period,
            file,
        })
    }

    pub fn period(&self) -> NaiveDate {
        self.period
    }

    pub fn write_line(&mut self, line: &str) -> Result<(), RotateError> {
        self.write_line_on(line, Local::now().date_naive())
    }

    /// Writes `line` as if it were logged on `today`.
    pub fn write_line_on(&mut self, line: &str, today: NaiveDate) -> Result<(), RotateError> {
        if today > self.period {
            self.rotate(today)?;
        }
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        Ok(())
    }

    fn rotated_name(&self, day: NaiveDate) -> PathBuf {
        let mut name = self.base.clone().into_os_string();
        name.push(format!(".{}", day.format(SUFFIX_FORMAT)));
        PathBuf::from(name)
    }

    fn rotate(&mut self, today: NaiveDate) -> Result<(), RotateError> {
        self.file.flush()?;
        let target = self.rotated_name(self.period);
        if self.base.exists() {
            if target.exists() {
                fs::remove_file(&target)?;
            }
            fs::rename(&self.base, &target).map_err(|source| RotateError::Rename {
                from: self.base.clone(),
                to: target.clone(),
                source,
            })?;
            info!("Rotated {} to {}", self.base.display(), target.display());
        } else {
            warn!("{} is gone, starting a new file", self.base.display());
        }

        for old in self.expired_backups()? {
            debug!("Removing {}", old.display());
            fs::remove_file(&old)?;
        }
        self.file = open_append(&self.base)?;
        self.period = today;
        Ok(())
    }

    /// Dated backups beyond `backup_count`, oldest first.
    pub fn expired_backups(&self) -> Result<Vec<PathBuf>, RotateError> {
        if self.backup_count == 0 {
            return Ok(Vec::new());
        }
        let Some(file_name) = self.base.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let prefix = format!("{file_name}.");
        let dir = match self.base.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.file_name().to_str().is_some_and(|name| {
                    name.strip_prefix(&prefix).is_some_and(|suffix| {
                        suffix.len() == 10
                            && NaiveDate::parse_from_str(suffix, SUFFIX_FORMAT).is_ok()
                    })
                })
            })
            .map(|entry| entry.path())
            .collect();
        backups.sort();
        let excess = backups.len().saturating_sub(self.backup_count);
        backups.truncate(excess);
        Ok(backups)
    }
}
