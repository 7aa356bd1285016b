use chrono::{DateTime, Duration, Utc};
use croner::Cron;
use queuenator_engine::EngineError;
use queuenator_models::core::TaskSchedule;

pub fn next_occurrence(
    schedule: &TaskSchedule,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, EngineError> {
    match schedule {
        TaskSchedule::Interval(seconds) => Ok(now + Duration::seconds((*seconds).max(1))),
        TaskSchedule::Cron(expr) => {
            let cron = Cron::new(expr)
                .parse()
                .map_err(|err| EngineError::Schedule(err.to_string()))?;
            cron.find_next_occurrence(&now, false)
                .map_err(|err| EngineError::Schedule(err.to_string()))
        }
    }
}
