use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::models::{NotificationPreferences, QuietHours};

/// Whether push delivery to this recipient is currently suppressed.
///
/// `PushDispatcher::dispatch_at` goes through [`is_quiet_at`] so callers
/// can pin the clock.
pub fn is_quiet_now(prefs: Option<&NotificationPreferences>) -> bool {
    is_quiet_at(prefs, Utc::now())
}

/// Evaluate the recipient's do-not-disturb window at `now`.
///
/// Absent or malformed preferences never suppress delivery. Both window
/// bounds are inclusive, and `start > end` wraps across midnight.
pub fn is_quiet_at(prefs: Option<&NotificationPreferences>, now: DateTime<Utc>) -> bool {
    let Some(hours) = prefs.and_then(|p| p.quiet_hours.as_ref()) else {
        return false;
    };

    match QuietWindow::parse(hours) {
        Some(window) => window.contains(now),
        None => {
            tracing::debug!(
                start = %hours.start,
                end = %hours.end,
                timezone = ?hours.timezone,
                "ignoring malformed quiet hours"
            );
            false
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct QuietWindow {
    start: u32,
    end: u32,
    tz: Tz,
}

impl QuietWindow {
    fn parse(hours: &QuietHours) -> Option<Self> {
        let tz = match hours.timezone.as_deref().map(str::trim) {
            None | Some("") => Tz::UTC,
            Some(name) => name.parse::<Tz>().ok()?,
        };

        Some(Self {
            start: minute_of_day(&hours.start)?,
            end: minute_of_day(&hours.end)?,
            tz,
        })
    }

    fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);
        let minute = local.hour() * 60 + local.minute();

        if self.start <= self.end {
            self.start <= minute && minute <= self.end
        } else {
            minute >= self.start || minute <= self.end
        }
    }
}

/// Parse "HH:MM" (24h) into minutes since midnight.
fn minute_of_day(value: &str) -> Option<u32> {
    let (h, m) = value.trim().split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    let hours: u32 = h.parse().ok()?;
    let minutes: u32 = m.parse().ok()?;
    (hours < 24 && minutes < 60).then_some(hours * 60 + minutes)
}
