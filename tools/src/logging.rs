//! Log sinks, configured through log4rs:
//!
//!   console          env_logger filter (`RUST_LOG`, default `info`)
//!   logs/info.log    INFO and above
//!   logs/errors.log  ERROR and above
//!
//! Files roll at 10 MiB and keep 20 backups (info.log.1 … info.log.20).

use chrono::Local;
use log::{LevelFilter, Record};
use log4rs::{
    append::{
        rolling_file::{
            policy::compound::{
                roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
            },
            RollingFileAppender,
        },
        Append,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use std::{fmt, io::Write, path::Path};

pub const MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const BACKUP_COUNT: u32 = 20;

const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S,%3f)} - {t} - {l} - {m}{n}";

/// Console appender that keeps env_logger's `RUST_LOG` directives.
struct EnvConsole(env_logger::Logger);

impl fmt::Debug for EnvConsole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EnvConsole").field(&self.0.filter()).finish()
    }
}

impl Append for EnvConsole {
    fn append(&self, record: &Record<'_>) -> anyhow::Result<()> {
        if self.0.matches(record) {
            log::Log::log(&self.0, record);
        }
        Ok(())
    }

    fn flush(&self) {}
}

fn env_console() -> EnvConsole {
    let logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .build();
    EnvConsole(logger)
}

/// `path` rolled to `path.1` … `path.{backups}` once it passes `max_bytes`.
fn rolling_file(path: &Path, max_bytes: u64, backups: u32) -> anyhow::Result<RollingFileAppender> {
    let pattern = format!("{}.{{}}", path.display());
    let roller = FixedWindowRoller::builder()
        .base(1)
        .build(&pattern, backups)
        .map_err(|e| anyhow::anyhow!("Invalid roll pattern {pattern}: {e}"))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(max_bytes)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
        .build(path, Box::new(policy))?;
    Ok(appender)
}

fn config(logs_dir: &Path, max_bytes: u64, backups: u32) -> anyhow::Result<Config> {
    std::fs::create_dir_all(logs_dir)?;
    let console = env_console();
    let level = console.0.filter().max(LevelFilter::Info);

    let info = rolling_file(&logs_dir.join("info.log"), max_bytes, backups)?;
    let errors = rolling_file(&logs_dir.join("errors.log"), max_bytes, backups)?;

    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Info)))
                .build("info_file", Box::new(info)),
        )
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Error)))
                .build("error_file", Box::new(errors)),
        )
        .build(
            Root::builder()
                .appenders(["console", "info_file", "error_file"])
                .build(level),
        )?;
    Ok(config)
}

/// Install the console and file sinks as the global logger.
pub fn init(logs_dir: &Path) -> anyhow::Result<()> {
    log4rs::init_config(config(logs_dir, MAX_BYTES, BACKUP_COUNT)?)?;
    Ok(())
}
