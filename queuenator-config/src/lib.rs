use clap::Parser;

use queuenator_models::errors::SendableError;

#[derive(Parser, Debug, Clone)]
pub struct Config {
    /// SQLite database holding tasks, queue entries and settings.
    #[arg(long, default_value = "queuenator.db")]
    pub database: String,

    /// Seconds between scheduler sweeps.
    #[arg(long, default_value_t = 15)]
    pub tick_seconds: u64,

    /// Execution window per task run; the cutoff deadline is task start plus
    /// this many seconds.
    #[arg(long, default_value_t = 30)]
    pub cutoff_window_seconds: i64,

    /// Queue entry lease duration. Should exceed the cutoff window, since an
    /// in-flight batch may legitimately outlive the cutoff.
    #[arg(long, default_value_t = 300)]
    pub lease_seconds: i64,

    /// Maximum queue entries fetched per sweep.
    #[arg(long, default_value_t = 50)]
    pub fetch_limit: u32,

    /// Seconds between queue-drain runs of the built-in queue task.
    #[arg(long, default_value_t = 60)]
    pub queue_interval_seconds: i64,

    /// Log file path.
    #[arg(long, default_value = "queuenator.log")]
    pub log_file: String,
}

pub fn parse_config() -> Result<Config, SendableError> {
    Ok(Config::try_parse()?)
}
