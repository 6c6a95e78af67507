//! iCalendar document reader.
//!
//! Reads `VEVENT` components with the `ical` crate and keeps only the
//! properties the pipeline needs, still untyped. Typing (dates, zones,
//! durations) happens in [`crate::source`] so a bad value fails one event
//! rather than the whole document.

use std::io::BufRead;

use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use thiserror::Error;

/// Fatal document-level errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The document had no content at all.
    #[error("calendar document is empty")]
    Empty,
    /// The parser rejected the document structure.
    #[error("calendar document could not be parsed: {0}")]
    Parse(String),
}

/// A date or date-time property value with the parameters that type it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeProperty {
    pub value: String,
    /// `TZID` parameter, if any.
    pub tzid: Option<String>,
    /// `VALUE` parameter (`DATE` or `DATE-TIME`), if any.
    pub value_type: Option<String>,
}

/// One `VEVENT` as read from the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub uid: Option<String>,
    pub summary: Option<String>,
    pub start: Option<TimeProperty>,
    pub end: Option<TimeProperty>,
    /// `DURATION` value, used when `DTEND` is absent.
    pub duration: Option<String>,
    pub rrule: Option<String>,
    /// Every `EXDATE` value, comma lists already split.
    pub exdates: Vec<TimeProperty>,
}

/// A parsed calendar document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarDocument {
    /// `X-WR-CALNAME` of the first calendar that has one.
    pub name: Option<String>,
    /// `X-WR-TIMEZONE` of the first calendar that has one.
    pub timezone: Option<String>,
    /// Events of every calendar in the stream, in document order.
    pub events: Vec<RawEvent>,
}

impl CalendarDocument {
    /// Parses a document held in memory.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        if text.trim().is_empty() {
            return Err(DocumentError::Empty);
        }
        Self::from_reader(text.as_bytes())
    }

    /// Parses a document from a buffered reader.
    ///
    /// A stream containing no calendar at all is [`DocumentError::Empty`];
    /// a calendar with no events is a valid, empty document.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, DocumentError> {
        let parser = ical::IcalParser::new(reader);
        let mut document = Self::default();
        let mut calendars = 0_usize;

        for calendar_result in parser {
            let calendar = calendar_result.map_err(|e| DocumentError::Parse(e.to_string()))?;
            calendars += 1;

            for property in &calendar.properties {
                match property.name.as_str() {
                    "X-WR-CALNAME" if document.name.is_none() => {
                        document.name = property.value.as_deref().map(unescape_text);
                    }
                    "X-WR-TIMEZONE" if document.timezone.is_none() => {
                        document.timezone.clone_from(&property.value);
                    }
                    _ => {}
                }
            }

            document
                .events
                .extend(calendar.events.iter().map(read_event));
        }

        if calendars == 0 {
            return Err(DocumentError::Empty);
        }

        tracing::debug!(
            calendars,
            events = document.events.len(),
            "parsed calendar document"
        );
        Ok(document)
    }
}

fn read_event(event: &IcalEvent) -> RawEvent {
    let mut raw = RawEvent::default();

    for property in &event.properties {
        match property.name.as_str() {
            "SUMMARY" => raw.summary = property.value.as_deref().map(unescape_text),
            "UID" => raw.uid.clone_from(&property.value),
            "DTSTART" => raw.start = time_property(property),
            "DTEND" => raw.end = time_property(property),
            "DURATION" => raw.duration.clone_from(&property.value),
            "RRULE" => raw.rrule.clone_from(&property.value),
            "EXDATE" => {
                if let Some(template) = time_property(property) {
                    raw.exdates.extend(
                        template
                            .value
                            .split(',')
                            .map(str::trim)
                            .filter(|v| !v.is_empty())
                            .map(|v| TimeProperty {
                                value: v.to_string(),
                                ..template.clone()
                            }),
                    );
                }
            }
            _ => {}
        }
    }

    raw
}

fn time_property(property: &Property) -> Option<TimeProperty> {
    let value = property.value.as_deref()?.trim();
    if value.is_empty() {
        return None;
    }
    Some(TimeProperty {
        value: value.to_string(),
        tzid: param(property, "TZID"),
        value_type: param(property, "VALUE"),
    })
}

fn param(property: &Property, name: &str) -> Option<String> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(|v| v.trim_matches('"').to_string())
}

/// Undoes RFC 5545 TEXT escaping (`\,` `\;` `\\` `\n`).
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
