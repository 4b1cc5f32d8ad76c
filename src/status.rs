//! Human-readable bot status.

use crate::config::BotSettings;
use crate::ingest::scheduler::next_run_after;
use crate::storage::RunRecord;
use chrono::{DateTime, Utc};

pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn last_run_text(last_run: Option<&RunRecord>) -> String {
    match last_run {
        Some(record) => format_timestamp(record.created_at),
        None => "Has not run yet".to_string(),
    }
}

pub fn next_run_text(settings: &BotSettings, last_run: Option<&RunRecord>) -> String {
    match last_run {
        Some(record) => match next_run_after(record.created_at, settings.interval_minutes) {
            Some(next) => format_timestamp(next),
            None => "Unknown".to_string(),
        },
        None if settings.is_active => "Will run soon".to_string(),
        None => "Bot is not active".to_string(),
    }
}

/// Multi-line summary of state, schedule, channels and fee.
///
/// `last_run` is the latest `process` run record.
pub fn status_message(settings: &BotSettings, last_run: Option<&RunRecord>) -> String {
    format!(
        "Bot is {}.\n\
         Runs every {} minutes.\n\
         Last run: {}\n\
         Next run: {}\n\
         Watched channels: {}\n\
         Fee: {} TL",
        if settings.is_active { "active" } else { "passive" },
        settings.interval_minutes,
        last_run_text(last_run),
        next_run_text(settings, last_run),
        settings.source_channels.join(", "),
        settings.add_fee,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RunStatus, RunType};
    use chrono::TimeZone;

    fn record(ts: DateTime<Utc>) -> RunRecord {
        RunRecord {
            id: 1,
            status: RunStatus::Success,
            run_type: RunType::Process,
            message: "done".to_string(),
            created_at: ts,
        }
    }

    #[test]
    fn test_status_after_a_run() {
        let settings = BotSettings {
            source_channels: vec!["@a".to_string(), "@b".to_string()],
            add_fee: 20,
            interval_minutes: 90,
            ..BotSettings::default()
        };
        let last = record(Utc.with_ymd_and_hms(2024, 3, 9, 23, 15, 5).unwrap());

        let message = status_message(&settings, Some(&last));
        assert_eq!(
            message,
            "Bot is active.\n\
             Runs every 90 minutes.\n\
             Last run: 09.03.2024 23:15:05\n\
             Next run: 10.03.2024 00:45:05\n\
             Watched channels: @a, @b\n\
             Fee: 20 TL"
        );
    }

    #[test]
    fn test_next_run_without_history() {
        let active = BotSettings::default();
        assert_eq!(next_run_text(&active, None), "Will run soon");

        let passive = BotSettings {
            is_active: false,
            ..BotSettings::default()
        };
        assert_eq!(next_run_text(&passive, None), "Bot is not active");
        assert!(status_message(&passive, None).starts_with("Bot is passive.\n"));
        assert!(status_message(&passive, None).contains("Last run: Has not run yet"));
    }
}
