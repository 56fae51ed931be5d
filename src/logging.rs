use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    /// `--debug` wins; otherwise each `-v` raises the level by one step.
    pub fn from_flags(verbose: u8, debug: bool) -> Self {
        if debug {
            return LogLevel::Debug;
        }
        match verbose {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

enum Sink {
    Stderr,
    File(File),
}

struct Logger {
    level: LevelFilter,
    sink: Mutex<Sink>,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} [{}] {}: {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level().as_str().to_ascii_lowercase(),
            record.target(),
            record.args()
        );
        let Ok(mut sink) = self.sink.lock() else {
            return;
        };
        match &mut *sink {
            Sink::Stderr => eprintln!("{line}"),
            Sink::File(file) => {
                let _ = writeln!(file, "{line}");
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut sink) = self.sink.lock() {
            if let Sink::File(file) = &mut *sink {
                let _ = file.flush();
            }
        }
    }
}

/// Install the process logger. With a `file`, lines are appended there
/// instead of stderr so that the terminal UI stays intact.
pub fn init(level: LogLevel, file: Option<PathBuf>) -> eyre::Result<()> {
    let sink = match file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            Sink::File(OpenOptions::new().create(true).append(true).open(path)?)
        }
        None => Sink::Stderr,
    };

    let logger = Logger {
        level: level.filter(),
        sink: Mutex::new(sink),
    };
    log::set_logger(Box::leak(Box::new(logger))).map_err(|err| eyre::eyre!("{err}"))?;
    log::set_max_level(level.filter());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_flags() {
        assert_eq!(LogLevel::from_flags(0, false), LogLevel::Warn);
        assert_eq!(LogLevel::from_flags(1, false), LogLevel::Info);
        assert_eq!(LogLevel::from_flags(5, false), LogLevel::Debug);
        assert_eq!(LogLevel::from_flags(0, true), LogLevel::Debug);
    }

    #[test]
    fn test_file_logger_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("biderja.log");
        // Other tests in this binary never install a logger.
        init(LogLevel::Info, Some(path.clone())).unwrap();
        log::info!("hello from the test");
        log::debug!("filtered out");
        log::logger().flush();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[info]"));
        assert!(contents.contains("hello from the test"));
        assert!(!contents.contains("filtered out"));
        assert!(init(LogLevel::Debug, None).is_err());
    }
}
