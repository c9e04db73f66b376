use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::models::notification::{Channel, NotificationType};
use crate::models::preferences::UserPreferences;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Returns the subset of `requested` the user allows for this notification
/// type: per-type override first, global toggle as the fallback. Duplicates
/// in the request collapse to one dispatch.
pub fn filter_channels(
    requested: &[Channel],
    kind: NotificationType,
    prefs: &UserPreferences,
) -> Vec<Channel> {
    let mut filtered = Vec::new();
    for channel in requested {
        if channel_enabled(prefs, kind, *channel) && !filtered.contains(channel) {
            filtered.push(*channel);
        }
    }
    filtered
}

pub fn channel_enabled(prefs: &UserPreferences, kind: NotificationType, channel: Channel) -> bool {
    if let Some(overrides) = prefs.types.get(&kind) {
        if let Some(enabled) = overrides.get(&channel) {
            return *enabled;
        }
    }
    prefs.global_toggle(channel)
}

/// Whether `now` falls inside the user's quiet-hours window. The window is
/// half-open `[start, end)` in the user's timezone; `start > end` spans
/// midnight. No configuration means never.
pub fn is_in_quiet_hours(prefs: &UserPreferences, now: DateTime<Utc>) -> bool {
    let Some(window) = &prefs.quiet_hours else {
        return false;
    };

    let (Some(start), Some(end)) = (parse_hhmm(&window.start), parse_hhmm(&window.end)) else {
        warn!(
            start = %window.start,
            end = %window.end,
            "Ignoring malformed quiet-hours window"
        );
        return false;
    };

    if start == end {
        return false;
    }

    let (minutes, _) = local_clock(&window.timezone, now);

    if start < end {
        minutes >= start && minutes < end
    } else {
        minutes >= start || minutes < end
    }
}

/// Time remaining until the quiet-hours window ends, or `None` when `now`
/// is outside the window. The scheduler uses this to defer rather than drop.
pub fn quiet_hours_delay(prefs: &UserPreferences, now: DateTime<Utc>) -> Option<Duration> {
    if !is_in_quiet_hours(prefs, now) {
        return None;
    }

    let window = prefs.quiet_hours.as_ref()?;
    let end = parse_hhmm(&window.end)?;
    let (minutes, seconds) = local_clock(&window.timezone, now);

    let minutes_left = if minutes < end {
        end - minutes
    } else {
        MINUTES_PER_DAY - minutes + end
    };

    let secs = (u64::from(minutes_left) * 60).saturating_sub(u64::from(seconds));
    Some(Duration::from_secs(secs.max(1)))
}

fn local_clock(timezone: &str, now: DateTime<Utc>) -> (u32, u32) {
    let tz: Tz = timezone.parse().unwrap_or_else(|_| {
        warn!(timezone, "Unknown timezone in quiet hours, falling back to UTC");
        chrono_tz::UTC
    });

    let local = now.with_timezone(&tz);
    (local.hour() * 60 + local.minute(), local.second())
}

fn parse_hhmm(value: &str) -> Option<u32> {
    let (hours, minutes) = value.split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}
