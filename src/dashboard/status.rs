use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::models::{DraftPayload, RunRecord, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthLabel {
    Healthy,
    AwaitingDraft,
}

impl HealthLabel {
    pub fn label(&self) -> &'static str {
        match self {
            HealthLabel::Healthy => "Pipeline healthy",
            HealthLabel::AwaitingDraft => "Awaiting draft",
        }
    }
}

/// Header summary derived from the cached runs and draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusProjection {
    pub label: HealthLabel,
    pub last_run_text: String,
    pub draft_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub id: String,
    pub topics: String,
    pub when: String,
    pub status: RunStatus,
    pub copy: String,
    pub message: Option<String>,
}

/// Runs ordered newest first by `created_at`.
///
/// The backend already returns them in that order; sorting again keeps the
/// header right if it ever doesn't. Untimestamped runs keep their relative
/// order behind the timestamped ones.
pub fn newest_first(runs: &[RunRecord]) -> Vec<&RunRecord> {
    let mut sorted: Vec<(Option<DateTime<Utc>>, &RunRecord)> =
        runs.iter().map(|run| (run.created_at_utc(), run)).collect();
    sorted.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    sorted.into_iter().map(|(_, run)| run).collect()
}

pub fn project(
    runs: &[RunRecord],
    draft: Option<&DraftPayload>,
    now: DateTime<Utc>,
) -> StatusProjection {
    let last_run = newest_first(runs).into_iter().next();

    let label = match last_run {
        Some(run) if run.status == RunStatus::Completed => HealthLabel::Healthy,
        _ => HealthLabel::AwaitingDraft,
    };

    let last_run_text = last_run
        .and_then(|run| run.created_at_utc())
        .map(|created| format!("Last run {}", relative_time(created, now)))
        .unwrap_or_else(|| "No runs recorded".to_string());

    StatusProjection {
        label,
        last_run_text,
        draft_id: draft.map(|d| d.run_id.clone()),
    }
}

pub fn history_rows(runs: &[RunRecord], now: DateTime<Utc>) -> Vec<HistoryRow> {
    newest_first(runs)
        .into_iter()
        .map(|run| HistoryRow {
            id: run.id.clone(),
            topics: run
                .topics
                .as_ref()
                .filter(|topics| !topics.is_empty())
                .map(|topics| topics.join(", "))
                .unwrap_or_else(|| "Ad-hoc".to_string()),
            when: run
                .created_at_utc()
                .map(|created| relative_time(created, now))
                .unwrap_or_else(|| "draft".to_string()),
            status: run.status.clone(),
            copy: run.status.copy().to_string(),
            message: run.message.clone().filter(|m| !m.is_empty()),
        })
        .collect()
}

/// Rows the backend reports as queued or running. Unknown labels are not
/// counted.
pub fn in_progress_count(rows: &[HistoryRow]) -> usize {
    rows.iter()
        .filter(|row| matches!(row.status, RunStatus::Queued | RunStatus::Running))
        .count()
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Coarse human distance such as "5 minutes ago" or "in about 2 hours".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let seconds = delta.num_seconds().abs();
    let minutes = (seconds as f64 / 60.0).round() as i64;

    let distance = if minutes < 1 {
        "less than a minute".to_string()
    } else if minutes < 45 {
        plural(minutes, "minute")
    } else if minutes < 90 {
        "about 1 hour".to_string()
    } else if minutes < 24 * 60 {
        let hours = (minutes as f64 / 60.0).round() as i64;
        format!("about {}", plural(hours, "hour"))
    } else if minutes < 42 * 60 {
        "1 day".to_string()
    } else if minutes < 30 * 24 * 60 {
        let days = (minutes as f64 / (24.0 * 60.0)).round() as i64;
        plural(days, "day")
    } else if minutes < 365 * 24 * 60 {
        let months = ((minutes as f64 / (30.0 * 24.0 * 60.0)).round() as i64).max(1);
        if months == 1 {
            "about 1 month".to_string()
        } else {
            plural(months, "month")
        }
    } else {
        let years = (minutes as f64 / (365.0 * 24.0 * 60.0)).round() as i64;
        format!("about {}", plural(years.max(1), "year"))
    };

    if delta.num_seconds() < 0 {
        format!("in {distance}")
    } else {
        format!("{distance} ago")
    }
}
