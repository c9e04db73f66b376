use std::collections::HashMap;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use notification_service::models::notification::{Channel, NotificationType};
use notification_service::models::preferences::{QuietHours, UserPreferences};
use notification_service::preferences::{
    channel_enabled, filter_channels, is_in_quiet_hours, quiet_hours_delay,
};

fn prefs_with_window(start: &str, end: &str, timezone: &str) -> UserPreferences {
    let mut prefs = UserPreferences::default_for("u1");
    prefs.quiet_hours = Some(QuietHours {
        start: start.to_string(),
        end: end.to_string(),
        timezone: timezone.to_string(),
    });
    prefs
}

/// Test: Per-type override wins over the global toggle
#[test]
fn test_per_type_override_beats_global() {
    let mut prefs = UserPreferences::default_for("u1");
    prefs.email = false;
    prefs.types.insert(
        NotificationType::PropertyInquiry,
        HashMap::from([(Channel::Email, true)]),
    );

    assert!(channel_enabled(
        &prefs,
        NotificationType::PropertyInquiry,
        Channel::Email
    ));
    // No override for this type, so the global toggle applies.
    assert!(!channel_enabled(
        &prefs,
        NotificationType::PriceChanged,
        Channel::Email
    ));
}

/// Test: Filtering keeps only enabled channels and collapses duplicates
#[test]
fn test_filter_channels() {
    let mut prefs = UserPreferences::default_for("u1");
    prefs.sms = false;

    let filtered = filter_channels(
        &[Channel::Email, Channel::Sms, Channel::Email, Channel::InApp],
        NotificationType::PropertyInquiry,
        &prefs,
    );

    assert_eq!(filtered, vec![Channel::Email, Channel::InApp]);
}

/// Test: Quiet-hours window spanning midnight
#[test]
fn test_quiet_hours_spanning_midnight() {
    let prefs = prefs_with_window("22:00", "06:00", "UTC");

    let inside = Utc.with_ymd_and_hms(2026, 8, 7, 23, 30, 0).unwrap();
    assert!(is_in_quiet_hours(&prefs, inside));

    let after_midnight = Utc.with_ymd_and_hms(2026, 8, 8, 5, 59, 0).unwrap();
    assert!(is_in_quiet_hours(&prefs, after_midnight));

    let noon = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
    assert!(!is_in_quiet_hours(&prefs, noon));
}

/// Test: Window boundaries are half-open [start, end)
#[test]
fn test_quiet_hours_boundaries() {
    let prefs = prefs_with_window("22:00", "06:00", "UTC");

    let at_start = Utc.with_ymd_and_hms(2026, 8, 7, 22, 0, 0).unwrap();
    assert!(is_in_quiet_hours(&prefs, at_start));

    let at_end = Utc.with_ymd_and_hms(2026, 8, 8, 6, 0, 0).unwrap();
    assert!(!is_in_quiet_hours(&prefs, at_end));
}

/// Test: Same-day quiet-hours window
#[test]
fn test_quiet_hours_same_day() {
    let prefs = prefs_with_window("09:00", "17:00", "UTC");

    let noon = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
    assert!(is_in_quiet_hours(&prefs, noon));

    let evening = Utc.with_ymd_and_hms(2026, 8, 7, 18, 0, 0).unwrap();
    assert!(!is_in_quiet_hours(&prefs, evening));
}

/// Test: The window is evaluated in the user's timezone
#[test]
fn test_quiet_hours_timezone_conversion() {
    let prefs = prefs_with_window("22:00", "06:00", "America/New_York");

    // 03:00 UTC on an August night is 23:00 EDT the previous evening.
    let late_evening_local = Utc.with_ymd_and_hms(2026, 8, 7, 3, 0, 0).unwrap();
    assert!(is_in_quiet_hours(&prefs, late_evening_local));

    // 16:00 UTC is midday in New York.
    let midday_local = Utc.with_ymd_and_hms(2026, 8, 7, 16, 0, 0).unwrap();
    assert!(!is_in_quiet_hours(&prefs, midday_local));
}

/// Test: No quiet-hours configuration means never deferred
#[test]
fn test_no_quiet_hours_config() {
    let prefs = UserPreferences::default_for("u1");
    let now = Utc.with_ymd_and_hms(2026, 8, 7, 3, 0, 0).unwrap();

    assert!(!is_in_quiet_hours(&prefs, now));
    assert!(quiet_hours_delay(&prefs, now).is_none());
}

/// Test: Malformed window times disable the window instead of panicking
#[test]
fn test_malformed_window_ignored() {
    let prefs = prefs_with_window("late", "06:00", "UTC");
    let now = Utc.with_ymd_and_hms(2026, 8, 7, 23, 30, 0).unwrap();

    assert!(!is_in_quiet_hours(&prefs, now));
}

/// Test: Delay runs to the end of the window, wrap-aware
#[test]
fn test_quiet_hours_delay() {
    let prefs = prefs_with_window("22:00", "06:00", "UTC");

    // 23:30 -> 06:00 is six and a half hours.
    let now = Utc.with_ymd_and_hms(2026, 8, 7, 23, 30, 0).unwrap();
    assert_eq!(
        quiet_hours_delay(&prefs, now),
        Some(Duration::from_secs(6 * 3600 + 1800))
    );

    // Seconds already elapsed in the current minute are not double-counted.
    let now = Utc.with_ymd_and_hms(2026, 8, 8, 5, 59, 30).unwrap();
    assert_eq!(quiet_hours_delay(&prefs, now), Some(Duration::from_secs(30)));

    // Outside the window there is nothing to wait for.
    let noon = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
    assert!(quiet_hours_delay(&prefs, noon).is_none());
}

/// Test: Same-day delay
#[test]
fn test_quiet_hours_delay_same_day() {
    let prefs = prefs_with_window("09:00", "17:00", "UTC");

    let now = Utc.with_ymd_and_hms(2026, 8, 7, 16, 0, 0).unwrap();
    assert_eq!(
        quiet_hours_delay(&prefs, now),
        Some(Duration::from_secs(3600))
    );
}
