//! Header-less delimited rows

use super::{CATEGORY_DELIMITER, LoadOutcome, PoiIdentities, parse_distance};
use crate::poi::parse_categories;
use crate::utils::{optional_text, parse_latitude, parse_longitude, require_text};
use crate::{GeoPoint, PointOfInterest, RecordIssue, Route};
use csv::{ReaderBuilder, StringRecord, Trim};

const POI_COLUMNS: usize = 5;
const ROUTE_COLUMNS: usize = 5;

/// Counts newlines up to a byte offset, resuming from the previous call
///
/// The reader's line counter ignores skipped blank lines and a record's byte
/// offset points before them, so the line is taken at the first byte after
/// any line terminators.
struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            offset: 0,
            line: 1,
        }
    }

    /// 1-based line holding `byte`; offsets must not decrease between calls
    fn line_at(&mut self, byte: u64) -> usize {
        let target = usize::try_from(byte).map_or(self.bytes.len(), |b| b.min(self.bytes.len()));
        if target > self.offset {
            self.line += self.bytes[self.offset..target]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.offset = target;
        }
        while let Some(&b) = self.bytes.get(self.offset) {
            match b {
                b'\n' => self.line += 1,
                b'\r' => {}
                _ => break,
            }
            self.offset += 1;
        }
        self.line
    }
}

/// Decode every row with `decode`, keyed by its 1-based physical line number
fn parse_rows<T>(
    text: &str,
    mut decode: impl FnMut(&StringRecord) -> Result<T, RecordIssue>,
) -> LoadOutcome<T> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut lines = LineCounter::new(text);
    let mut outcome = LoadOutcome::default();
    for (ordinal, row) in reader.records().enumerate() {
        match row {
            Ok(record) => {
                if record.iter().all(str::is_empty) {
                    continue;
                }
                let line = record
                    .position()
                    .map_or(ordinal + 1, |p| lines.line_at(p.byte()));
                outcome.push(line, decode(&record));
            }
            Err(e) => {
                let line = e.position().map_or(ordinal + 1, |p| lines.line_at(p.byte()));
                outcome.push(line, Err(RecordIssue::Unreadable(e.to_string())));
            }
        }
    }
    outcome
}

fn require_columns(record: &StringRecord, expected: usize) -> Result<(), RecordIssue> {
    if record.len() < expected {
        return Err(RecordIssue::TooFewColumns {
            expected,
            found: record.len(),
        });
    }
    Ok(())
}

/// `latitude, longitude, title, description, categories, imageName?`
fn decode_poi(record: &StringRecord) -> Result<PointOfInterest, RecordIssue> {
    require_columns(record, POI_COLUMNS)?;

    let lat = parse_latitude("latitude", &record[0])?;
    let lon = parse_longitude("longitude", &record[1])?;
    let title = require_text("title", &record[2])?;
    let categories = parse_categories(record[4].split(CATEGORY_DELIMITER));
    if categories.is_empty() {
        return Err(RecordIssue::NoCategories);
    }

    Ok(PointOfInterest {
        location: GeoPoint::new(lat, lon),
        title,
        description: record[3].to_string(),
        categories,
        image: optional_text(record.get(5)),
        audio: None,
        directions: None,
    })
}

/// `name, description, trackRef, distanceKm, durationLabel`
fn decode_route(record: &StringRecord) -> Result<Route, RecordIssue> {
    require_columns(record, ROUTE_COLUMNS)?;

    Ok(Route {
        name: require_text("name", &record[0])?,
        description: record[1].to_string(),
        track_ref: require_text("trackRef", &record[2])?,
        distance_km: parse_distance(&record[3])?,
        duration_label: record[4].to_string(),
    })
}

pub(super) fn parse_pois(text: &str) -> LoadOutcome<PointOfInterest> {
    let mut identities = PoiIdentities::default();
    parse_rows(text, |record| {
        decode_poi(record).and_then(|poi| identities.admit(poi))
    })
}

pub(super) fn parse_routes(text: &str) -> LoadOutcome<Route> {
    parse_rows(text, decode_route)
}
