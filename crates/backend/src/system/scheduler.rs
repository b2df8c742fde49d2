use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;

use crate::shared::error::LoaderError;
use crate::usecases::u601_load_tenders::LoadTendersExecutor;

/// Плановые запуски загрузки по cron-выражению в локальной зоне
pub struct LoadScheduler {
    schedule: Schedule,
    tz: Tz,
    executor: Arc<LoadTendersExecutor>,
}

impl LoadScheduler {
    pub fn new(expr: &str, tz: Tz, executor: Arc<LoadTendersExecutor>) -> Result<Self, LoaderError> {
        let schedule = Schedule::from_str(expr).map_err(|e| {
            LoaderError::Configuration(format!("Invalid cron expression '{}': {}", expr, e))
        })?;
        Ok(Self {
            schedule,
            tz,
            executor,
        })
    }

    /// Ближайший запуск строго после `now`
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        next_run(&self.schedule, self.tz, now)
    }

    /// Цикл планировщика; запускается через tokio::spawn
    pub async fn run_loop(self) {
        tracing::info!("Load scheduler started ({})", self.schedule);
        loop {
            let now = Utc::now();
            let Some(next) = self.next_run_after(now) else {
                tracing::warn!("Schedule has no upcoming runs, scheduler stopped");
                return;
            };
            tracing::info!("Next scheduled load at {}", next.format("%d.%m.%Y %H:%M:%S %Z"));

            let wait = (next.with_timezone(&Utc) - now)
                .to_std()
                .unwrap_or_default();
            tokio::time::sleep(wait).await;

            match self.executor.run().await {
                Ok(summary) => tracing::info!(
                    "Scheduled load {} finished: {} added, status {}",
                    summary.run_id,
                    summary.added,
                    summary.status
                ),
                Err(e) => tracing::error!("Scheduled load failed: {}", e),
            }
        }
    }
}

fn next_run(schedule: &Schedule, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
    schedule.after(&now.with_timezone(&tz)).next()
}
