//! Segment splitting.
//!
//! An occurrence is first cut at every local midnight, then each day piece is
//! divided back-to-back among the title's subcategory allocations. Cuts leave
//! no gaps and no overlaps, and zero-length pieces are never emitted.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;

use crate::classify::Classification;
use crate::time::next_midnight;
use crate::types::{Occurrence, Segment, SubcategoryAllocation};

/// Splits an occurrence into single-day, single-subcategory segments.
///
/// Day boundaries are taken in the occurrence's own zone, so callers convert
/// the occurrence to the reporting zone first.
pub fn split_occurrence(occurrence: &Occurrence, classification: &Classification) -> Vec<Segment> {
    split_by_day(occurrence.start, occurrence.end)
        .into_iter()
        .flat_map(|(day_start, day_end)| {
            split_by_allocation(day_start, day_end, &classification.allocations)
        })
        .map(|(start, end, allocation)| Segment {
            start,
            end,
            category: classification.category.clone(),
            subcategory: allocation.name.clone(),
            title: occurrence.title.clone(),
        })
        .collect()
}

/// Cuts `[start, end)` at each midnight in `start`'s zone.
pub fn split_by_day(start: DateTime<Tz>, end: DateTime<Tz>) -> Vec<(DateTime<Tz>, DateTime<Tz>)> {
    let mut pieces = Vec::new();
    let mut cursor = start;

    while cursor < end {
        let piece_end = end.min(next_midnight(&cursor));
        if piece_end <= cursor {
            break;
        }
        pieces.push((cursor, piece_end));
        cursor = piece_end;
    }

    pieces
}

/// Divides `[start, end)` by allocation weight, in allocation order.
///
/// Cut points come from cumulative weights against this piece's own length;
/// the last piece always ends exactly at `end`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn split_by_allocation(
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    allocations: &[SubcategoryAllocation],
) -> Vec<(DateTime<Tz>, DateTime<Tz>, &SubcategoryAllocation)> {
    let total_ms = (end - start).num_milliseconds() as f64;
    let last = allocations.len().saturating_sub(1);
    let mut pieces = Vec::with_capacity(allocations.len());
    let mut cumulative = 0.0;
    let mut piece_start = start;

    for (i, allocation) in allocations.iter().enumerate() {
        cumulative += allocation.weight_percent;
        let piece_end = if i == last {
            end
        } else {
            let offset_ms = (total_ms * cumulative / 100.0).round() as i64;
            (start + Duration::milliseconds(offset_ms)).min(end)
        };

        if piece_end > piece_start {
            pieces.push((piece_start, piece_end, allocation));
            piece_start = piece_end;
        }
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_title;
    use chrono::{TimeZone, Timelike};
    use chrono_tz::America::New_York;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn occurrence(title: &str, start: DateTime<Tz>, end: DateTime<Tz>) -> Occurrence {
        Occurrence {
            title: title.to_string(),
            start,
            end,
        }
    }

    fn split(title: &str, start: DateTime<Tz>, end: DateTime<Tz>) -> Vec<Segment> {
        let classification = classify_title(title, ":", "-");
        split_occurrence(&occurrence(title, start, end), &classification)
    }

    fn total(segments: &[Segment]) -> Duration {
        segments
            .iter()
            .fold(Duration::zero(), |acc, s| acc + s.duration())
    }

    #[test]
    fn subcategories_split_same_day_occurrence() {
        let segments = split("Work: Deep - Review", utc(2024, 1, 1, 9, 0), utc(2024, 1, 1, 11, 0));
        assert_eq!(segments.len(), 2);

        assert_eq!(segments[0].start, utc(2024, 1, 1, 9, 0));
        assert_eq!(segments[0].end, utc(2024, 1, 1, 10, 0));
        assert_eq!(segments[0].subcategory, "deep");
        assert_eq!(segments[1].start, utc(2024, 1, 1, 10, 0));
        assert_eq!(segments[1].end, utc(2024, 1, 1, 11, 0));
        assert_eq!(segments[1].subcategory, "review");

        assert!(segments.iter().all(|s| s.category == "work"));
        assert!(segments.iter().all(|s| s.title == "Work: Deep - Review"));
        assert!(segments.iter().all(|s| s.duration() == Duration::minutes(60)));
    }

    #[test]
    fn midnight_splits_occurrence() {
        let segments = split("Reading", utc(2024, 1, 1, 23, 0), utc(2024, 1, 2, 1, 0));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end, utc(2024, 1, 2, 0, 0));
        assert_eq!(segments[1].start, utc(2024, 1, 2, 0, 0));
        assert_ne!(
            segments[0].start.date_naive(),
            segments[1].start.date_naive()
        );
        assert!(segments.iter().all(|s| s.duration() == Duration::minutes(60)));
        assert!(segments.iter().all(|s| s.subcategory == "no subcategory"));
    }

    #[test]
    fn each_day_is_divided_by_allocation() {
        let segments = split("Work: a - b", utc(2024, 1, 1, 22, 0), utc(2024, 1, 2, 2, 0));
        assert_eq!(segments.len(), 4);
        let subcats: Vec<&str> = segments.iter().map(|s| s.subcategory.as_str()).collect();
        assert_eq!(subcats, vec!["a", "b", "a", "b"]);
        assert_eq!(segments[0].end, utc(2024, 1, 1, 23, 0));
        assert_eq!(segments[2].end, utc(2024, 1, 2, 1, 0));
    }

    #[test]
    fn pieces_are_contiguous_and_preserve_duration() {
        let start = utc(2024, 1, 1, 7, 13);
        let end = utc(2024, 1, 4, 16, 47);
        let segments = split("Project: a - b - c", start, end);

        assert_eq!(segments.first().unwrap().start, start);
        assert_eq!(segments.last().unwrap().end, end);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(total(&segments), end - start);
    }

    #[test]
    fn no_segment_crosses_midnight() {
        let segments = split("Trip: x - y", utc(2024, 3, 1, 5, 0), utc(2024, 3, 5, 19, 30));
        for s in &segments {
            assert!(s.start < s.end);
            let last_instant = s.end - Duration::nanoseconds(1);
            assert_eq!(s.start.date_naive(), last_instant.date_naive());
        }
    }

    #[test]
    fn splits_at_local_midnight_across_dst() {
        // 2024-03-10 is 23 hours long in New York.
        let start = New_York.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let end = New_York.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap();
        let pieces = split_by_day(start, end);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[1].1 - pieces[1].0, Duration::hours(23));
        assert!(pieces.iter().skip(1).all(|(s, _)| s.hour() == 0));
    }

    #[test]
    fn ending_exactly_at_midnight_is_one_segment() {
        let segments = split("Late", utc(2024, 1, 1, 22, 0), utc(2024, 1, 2, 0, 0));
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn empty_interval_yields_nothing() {
        let at = utc(2024, 1, 1, 9, 0);
        assert!(split("Work", at, at).is_empty());
    }

    #[test]
    fn uneven_thirds_still_cover_interval() {
        let start = utc(2024, 1, 1, 9, 0);
        let end = start + Duration::milliseconds(100);
        let segments = split("Work: a - b - c", start, end);
        assert_eq!(segments.len(), 3);
        assert_eq!(total(&segments), Duration::milliseconds(100));
    }
}
