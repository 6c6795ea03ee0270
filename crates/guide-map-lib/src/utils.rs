//! Utility functions for coordinate clamping, field validation and XML
//! document checks

use crate::RecordIssue;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Mean Earth radius in kilometres (haversine distances)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Clamp latitude to the valid Web Mercator range
#[inline(always)]
pub fn clamp_latitude(lat: f64) -> f64 {
    lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
}

/// Parse a decimal number, rejecting NaN and infinities
///
/// Surrounding whitespace is ignored. The field name is carried into the
/// error so skipped records can be reported precisely.
pub fn parse_finite(field: &'static str, raw: &str) -> Result<f64, RecordIssue> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(RecordIssue::InvalidNumber {
            field,
            value: trimmed.to_string(),
        }),
    }
}

/// Parse a latitude in degrees (must lie within [-90, 90])
pub fn parse_latitude(field: &'static str, raw: &str) -> Result<f64, RecordIssue> {
    let value = parse_finite(field, raw)?;
    if !(-90.0..=90.0).contains(&value) {
        return Err(RecordIssue::OutOfRange { field, value });
    }
    Ok(value)
}

/// Parse a longitude in degrees (must lie within [-180, 180])
pub fn parse_longitude(field: &'static str, raw: &str) -> Result<f64, RecordIssue> {
    let value = parse_finite(field, raw)?;
    if !(-180.0..=180.0).contains(&value) {
        return Err(RecordIssue::OutOfRange { field, value });
    }
    Ok(value)
}

/// Trim a required text field, rejecting it when nothing is left
pub fn require_text(field: &'static str, raw: &str) -> Result<String, RecordIssue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RecordIssue::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field; blank values become `None`
pub fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Well-formedness checks the XML reader leaves to the caller
///
/// Fed from the top-level event loop: it counts open elements and the number
/// of root elements, and rejects character data outside the root. An element
/// consumed in one go (entry, track point) is reported with [`Self::element`].
#[derive(Debug, Default)]
pub(crate) struct DocumentOutline {
    depth: usize,
    roots: usize,
}

impl DocumentOutline {
    pub(crate) fn start(&mut self) -> Result<(), &'static str> {
        if self.depth == 0 {
            if self.roots > 0 {
                return Err("more than one root element");
            }
            self.roots += 1;
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn end(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn element(&mut self) -> Result<(), &'static str> {
        self.start()?;
        self.end();
        Ok(())
    }

    /// Character data; only whitespace may appear outside the root
    pub(crate) fn text(&self, raw: &[u8]) -> Result<(), &'static str> {
        let blank = std::str::from_utf8(raw).is_ok_and(|s| {
            s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
                .is_empty()
        });
        if self.depth == 0 && !blank {
            return Err("text outside the root element");
        }
        Ok(())
    }

    /// Called at end of input
    pub(crate) fn finish(&self) -> Result<(), &'static str> {
        if self.depth > 0 {
            return Err("document ends inside an element");
        }
        if self.roots == 0 {
            return Err("no root element");
        }
        Ok(())
    }
}
