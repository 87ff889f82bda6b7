use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use serde::Serialize;
use tokio::sync::broadcast;

const LOG_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Serialize, Clone)]
pub struct LogMessage {
    pub level: String,
    pub message: String,
    pub timestamp: String,
}

/// Receiving end of the log fan-out, handed to whoever displays the log.
#[derive(Clone)]
pub struct LogFeed {
    sender: broadcast::Sender<LogMessage>,
}

impl LogFeed {
    pub fn subscribe(&self) -> broadcast::Receiver<LogMessage> {
        self.sender.subscribe()
    }
}

/// Prints records to stderr and forwards them to every [`LogFeed`] subscriber.
pub struct BridgeLogger {
    level: LevelFilter,
    sender: broadcast::Sender<LogMessage>,
}

impl BridgeLogger {
    pub fn new(level: LevelFilter) -> Self {
        let (sender, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self { level, sender }
    }

    pub fn feed(&self) -> LogFeed {
        LogFeed {
            sender: self.sender.clone(),
        }
    }

    /// Installs the logger as the global `log` backend.
    pub fn init(level: LevelFilter) -> Result<LogFeed, SetLoggerError> {
        let logger = BridgeLogger::new(level);
        let feed = logger.feed();
        log::set_boxed_logger(Box::new(logger)).map(|()| log::set_max_level(level))?;
        Ok(feed)
    }

    fn emit_log(&self, record: &Record) {
        // Nobody listening is the normal case for the CLI
        if self.sender.receiver_count() == 0 {
            return;
        }
        let log_message = LogMessage {
            level: record.level().to_string(),
            message: record.args().to_string(),
            timestamp: Local::now().to_rfc3339(),
        };
        let _ = self.sender.send(log_message);
    }
}

impl log::Log for BridgeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if record.level() <= Level::Warn {
                eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
            } else {
                eprintln!("[{}] {}", record.level(), record.args());
            }
            self.emit_log(record);
        }
    }

    fn flush(&self) {}
}

/// Installs [`BridgeLogger`]; falls back to `env_logger` if a logger is already set.
pub fn init_logging(level: LevelFilter) -> Option<LogFeed> {
    match BridgeLogger::init(level) {
        Ok(feed) => Some(feed),
        Err(_) => {
            let _ = env_logger::builder()
                .filter_level(level)
                .parse_default_env()
                .try_init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    #[test]
    fn test_records_reach_subscribers() {
        let logger = BridgeLogger::new(LevelFilter::Info);
        let mut receiver = logger.feed().subscribe();

        logger.log(
            &Record::builder()
                .args(format_args!("left connected"))
                .level(Level::Info)
                .build(),
        );

        let message = receiver.try_recv().unwrap();
        assert_eq!(message.level, "INFO");
        assert_eq!(message.message, "left connected");
        assert!(!message.timestamp.is_empty());
    }

    #[test]
    fn test_records_below_level_are_dropped() {
        let logger = BridgeLogger::new(LevelFilter::Warn);
        let mut receiver = logger.feed().subscribe();

        logger.log(
            &Record::builder()
                .args(format_args!("frame sent"))
                .level(Level::Debug)
                .build(),
        );

        assert!(receiver.try_recv().is_err());
    }
}
