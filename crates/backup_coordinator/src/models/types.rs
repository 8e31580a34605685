use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::models::error::CoordinatorError;

/// A backup archive as known to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BackupArtifact {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Recurrence of the scheduled backup job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleInterval {
    /// Every day at midnight.
    Daily,
    /// Every Sunday at midnight.
    Weekly,
    /// The 1st of every month at midnight.
    Monthly,
}

impl ScheduleInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleInterval::Daily => "daily",
            ScheduleInterval::Weekly => "weekly",
            ScheduleInterval::Monthly => "monthly",
        }
    }

    /// Cron expression equivalent of the interval.
    pub fn cron_expression(&self) -> &'static str {
        match self {
            ScheduleInterval::Daily => "0 0 * * *",
            ScheduleInterval::Weekly => "0 0 * * 0",
            ScheduleInterval::Monthly => "0 0 1 * *",
        }
    }

    /// First fire time strictly after `now` (UTC midnights).
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let date = match self {
            ScheduleInterval::Daily => today.succ_opt()?,
            ScheduleInterval::Weekly => {
                let days_from_sunday = today.weekday().num_days_from_sunday();
                let ahead = if days_from_sunday == 0 { 7 } else { 7 - days_from_sunday };
                today.checked_add_signed(Duration::days(i64::from(ahead)))?
            }
            ScheduleInterval::Monthly => {
                let (year, month) = if today.month() == 12 {
                    (today.year() + 1, 1)
                } else {
                    (today.year(), today.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)?
            }
        };
        Some(date.and_time(NaiveTime::MIN).and_utc())
    }
}

impl fmt::Display for ScheduleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleInterval {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(ScheduleInterval::Daily),
            "weekly" => Ok(ScheduleInterval::Weekly),
            "monthly" => Ok(ScheduleInterval::Monthly),
            other => Err(CoordinatorError::InvalidSchedule(other.to_string())),
        }
    }
}

/// Decoded claims of an externally issued bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: String,
    pub exp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduleRequest {
    /// One of `daily`, `weekly` or `monthly`.
    pub interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RestoreRequest {
    #[serde(rename = "backupName")]
    pub backup_name: String,
}

/// Currently armed schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScheduleStatus {
    pub interval: ScheduleInterval,
    pub cron: String,
    pub next_run: Option<DateTime<Utc>>,
}
