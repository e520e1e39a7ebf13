use std::{
    path::Path,
    sync::{mpsc, LazyLock, Mutex},
    thread,
};

use anyhow::Result;
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    {ContentLimit, FileRotate},
};
use log::Log;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

pub type LogListener = Box<dyn Fn(String) + Send>;

/// Listener registered by the UI (e.g. a debug console), if any.
static LOG_LISTENER: LazyLock<Mutex<Option<LogListener>>> = LazyLock::new(|| Mutex::new(None));

/// Sender side of the channel feeding the dispatcher thread.
static LOG_SENDER: LazyLock<Mutex<Option<mpsc::Sender<String>>>> =
    LazyLock::new(|| Mutex::new(None));

pub struct MainLogger {
    write_logger: Box<WriteLogger<FileRotate<AppendTimestamp>>>,
}

impl MainLogger {
    fn new(write_logger: Box<WriteLogger<FileRotate<AppendTimestamp>>>) -> Self {
        Self { write_logger }
    }
}

impl Log for MainLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.write_logger.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        self.write_logger.log(record);

        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!(
            "{}:{} -- {}",
            record.level(),
            record.target(),
            record.args()
        );
        if let Ok(guard) = LOG_SENDER.lock() {
            if let Some(tx) = guard.as_ref() {
                // the dispatcher only exits when every sender is gone
                let _ = tx.send(message);
            }
        }
    }

    fn flush(&self) {
        self.write_logger.flush();
    }
}

/// Logs to `{cache_dir}/logs/main.log`, rotated, and to the registered
/// listener. Can only succeed once per process.
pub fn init(cache_dir: &str) -> Result<()> {
    let path = Path::new(cache_dir).join("logs/main.log");
    let log = FileRotate::new(
        path,
        AppendTimestamp::default(FileLimit::MaxFiles(3)),
        ContentLimit::Lines(1000),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let write_logger = WriteLogger::new(LevelFilter::Info, config, log);
    let main_logger = MainLogger::new(write_logger);
    log::set_boxed_logger(Box::new(main_logger))?;
    log::set_max_level(LevelFilter::Info);

    init_dispatcher();
    info!("logging initialized");
    Ok(())
}

fn init_dispatcher() {
    let mut guard = match LOG_SENDER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if guard.is_some() {
        return;
    }

    let (tx, rx) = mpsc::channel::<String>();
    *guard = Some(tx);

    thread::Builder::new()
        .name("log-dispatcher".to_string())
        .spawn(move || {
            while let Ok(msg) = rx.recv() {
                if let Ok(listener) = LOG_LISTENER.lock() {
                    if let Some(listener) = listener.as_ref() {
                        listener(msg);
                    }
                }
            }
        })
        .map(|_| ())
        .unwrap_or_else(|e| eprintln!("failed to start log dispatcher: {e}"));
}

pub fn set_listener(listener: LogListener) {
    let mut guard = match LOG_LISTENER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = Some(listener);
}

pub fn clear_listener() {
    if let Ok(mut guard) = LOG_LISTENER.lock() {
        *guard = None;
    }
}
