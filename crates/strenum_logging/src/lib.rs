//! Shared logging setup for strenum binaries.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_LOG_FILTER: &str = "strenum=info,strenum_db=info,strenum_definition=info";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the file filter on stderr instead of warnings only
    pub verbose: bool,
    /// Filter directive from configuration; `RUST_LOG` wins over it
    pub filter: Option<&'a str>,
}

/// Keeps the background log writer alive; drop it on exit to flush.
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Initialize tracing with a rolling file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let appender = RollingFileAppender::new(
        log_dir,
        config.app_name,
        MAX_LOG_FILES,
        MAX_LOG_FILE_SIZE,
    )
    .with_context(|| format!("Failed to open log file for {}", config.app_name))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let directive = resolve_filter(std::env::var("RUST_LOG").ok().as_deref(), config.filter);
    let file_filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid log filter: {}", directive))?;
    let console_filter = if config.verbose {
        EnvFilter::try_new(&directive)
            .with_context(|| format!("Invalid log filter: {}", directive))?
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Logging already initialized")?;

    Ok(LogGuard { _file: guard })
}

/// Filter precedence: `RUST_LOG`, then configuration, then the default.
pub fn resolve_filter(env: Option<&str>, configured: Option<&str>) -> String {
    env.filter(|s| !s.trim().is_empty())
        .or(configured.filter(|s| !s.trim().is_empty()))
        .unwrap_or(DEFAULT_LOG_FILTER)
        .to_string()
}

/// Strenum home directory: `$STRENUM_HOME`, else `~/.strenum`.
pub fn strenum_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("STRENUM_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".strenum")
}

pub fn logs_dir() -> PathBuf {
    strenum_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// Size-capped log file with numbered backups (`app.log`, `app.log.1`, ...).
struct RollingFileAppender {
    dir: PathBuf,
    base_name: String,
    max_files: usize,
    max_size: u64,
    file: Option<File>,
    current_size: u64,
}

impl RollingFileAppender {
    fn new(dir: PathBuf, base_name: &str, max_files: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let mut appender = Self {
            dir,
            base_name: sanitize_name(base_name),
            max_files: max_files.max(1),
            max_size,
            file: None,
            current_size: 0,
        };
        appender.reopen()?;
        if appender.current_size > appender.max_size {
            appender.rotate()?;
        }
        Ok(appender)
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())?;
        self.current_size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base_name))
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.base_name, index))
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        let max_index = self.max_files - 1;
        if max_index == 0 {
            // single file: truncate in place
            fs::remove_file(self.current_path()).or_else(ignore_missing)?;
            return self.reopen();
        }

        fs::remove_file(self.rotated_path(max_index)).or_else(ignore_missing)?;
        for idx in (1..max_index).rev() {
            shift(&self.rotated_path(idx), &self.rotated_path(idx + 1))?;
        }
        shift(&self.current_path(), &self.rotated_path(1))?;
        self.reopen()
    }
}

fn shift(src: &Path, dst: &Path) -> io::Result<()> {
    if src.exists() {
        fs::rename(src, dst)?;
    }
    Ok(())
}

fn ignore_missing(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(err)
    }
}

impl Write for RollingFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size > 0 && self.current_size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let bytes = file.write(buf)?;
        self.current_size += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
