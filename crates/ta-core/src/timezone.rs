//! Conversion into the reporting timezone.

use chrono_tz::Tz;

use crate::types::{Occurrence, Warning};

/// Resolves an IANA identifier such as `"Europe/Berlin"`.
///
/// Unknown identifiers fall back to UTC and come back with a warning; the
/// caller uses the returned zone for every later step, window bounds included.
pub fn resolve_timezone(id: &str) -> (Tz, Option<Warning>) {
    let trimmed = id.trim();
    match trimmed.parse::<Tz>() {
        Ok(tz) => (tz, None),
        Err(_) if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" => (Tz::UTC, None),
        Err(_) => {
            tracing::warn!(timezone = %trimmed, "unknown timezone, falling back to UTC");
            (Tz::UTC, Some(Warning::UnknownTimezone(trimmed.to_string())))
        }
    }
}

/// Values whose instants can be re-expressed in another zone.
///
/// Conversion keeps the instant and changes the wall clock.
pub trait Localize {
    #[must_use]
    fn in_zone(&self, tz: Tz) -> Self;
}

impl Localize for Occurrence {
    fn in_zone(&self, tz: Tz) -> Self {
        Self {
            title: self.title.clone(),
            start: self.start.with_timezone(&tz),
            end: self.end.with_timezone(&tz),
        }
    }
}

/// Converts every item to `tz`.
pub fn localize_all<T: Localize>(items: &[T], tz: Tz) -> Vec<T> {
    items.iter().map(|item| item.in_zone(tz)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Timelike};
    use chrono_tz::Asia::Tokyo;
    use chrono_tz::Europe::Berlin;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn resolves_known_zone() {
        let (tz, warning) = resolve_timezone("Europe/Berlin");
        assert_eq!(tz, Berlin);
        assert!(warning.is_none());
    }

    #[test]
    fn lowercase_utc_is_accepted() {
        let (tz, warning) = resolve_timezone(" utc ");
        assert_eq!(tz, Tz::UTC);
        assert!(warning.is_none());
    }

    #[test]
    fn unknown_zone_falls_back_with_warning() {
        let (tz, warning) = resolve_timezone("Mars/Olympus_Mons");
        assert_eq!(tz, Tz::UTC);
        assert_eq!(
            warning,
            Some(Warning::UnknownTimezone("Mars/Olympus_Mons".to_string()))
        );
    }

    #[test]
    fn conversion_keeps_instant_and_moves_wall_clock() {
        let occurrence = Occurrence {
            title: "Work: Deep".into(),
            start: utc(2024, 1, 1, 23),
            end: utc(2024, 1, 2, 0),
        };

        let local = occurrence.in_zone(Tokyo);
        assert_eq!(local.start, occurrence.start);
        assert_eq!(local.end, occurrence.end);
        assert_eq!(local.start.hour(), 8);
        assert_eq!(local.start.date_naive().to_string(), "2024-01-02");
        assert_eq!(local.title, "Work: Deep");
    }

    #[test]
    fn localize_all_converts_every_occurrence() {
        let occurrences = vec![
            Occurrence {
                title: "a".into(),
                start: utc(2024, 6, 1, 10),
                end: utc(2024, 6, 1, 11),
            },
            Occurrence {
                title: "b".into(),
                start: utc(2024, 6, 1, 22),
                end: utc(2024, 6, 1, 23),
            },
        ];

        let local = localize_all(&occurrences, Berlin);
        assert_eq!(local.len(), 2);
        assert!(local.iter().all(|o| o.start.timezone() == Berlin));
        assert_eq!(local[0].start.hour(), 12);
        assert_eq!(local[1].start.date_naive().to_string(), "2024-06-02");
    }
}
