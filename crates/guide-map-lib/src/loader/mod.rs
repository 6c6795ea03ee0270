//! Point of interest and route loading
//!
//! Two source shapes are supported: header-less delimited rows (`csv`) and
//! element-based markup (`xml`). Both follow the same policy: a record that
//! fails validation is skipped and reported, a document that cannot be
//! decoded at all fails as a whole.
//!
//! The strict entry points ([`parse_pois`], [`parse_routes`]) return a
//! [`LoadOutcome`] with the rejected records; the fail-soft ones
//! ([`load_pois`], [`load_routes`]) log and return whatever loaded.

mod delimited;
mod markup;

use crate::{DataError, PointOfInterest, RecordIssue, Result, Route};
use std::collections::HashSet;
use std::path::Path;

/// Separator for multi-valued category fields
pub const CATEGORY_DELIMITER: char = ';';

/// Encoding of a data file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Xml,
}

impl DataFormat {
    /// Guess the format from a file extension, falling back to sniffing the
    /// first non-blank character of the content
    pub fn detect(path: &Path, text: &str) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("xml") => DataFormat::Xml,
            Some("csv") | Some("txt") => DataFormat::Csv,
            _ if text.trim_start().starts_with('<') => DataFormat::Xml,
            _ => DataFormat::Csv,
        }
    }
}

/// In-memory contents of a data file
#[derive(Clone, Debug)]
pub struct DataSource {
    /// Name used in log messages (usually the file name)
    pub name: String,
    pub format: DataFormat,
    pub text: String,
}

impl DataSource {
    pub fn csv(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: DataFormat::Csv,
            text: text.into(),
        }
    }

    pub fn xml(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: DataFormat::Xml,
            text: text.into(),
        }
    }

    /// Read a data file, picking the format from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DataError::ResourceNotFound(path.to_path_buf()),
            _ => DataError::Io(e),
        })?;
        Ok(Self {
            name: path.display().to_string(),
            format: DataFormat::detect(path, &text),
            text,
        })
    }
}

/// Title and location of every POI accepted so far
///
/// Two POIs with the same title and location are one entity; the first one
/// in the file wins.
#[derive(Debug, Default)]
struct PoiIdentities {
    seen: HashSet<(String, u64, u64)>,
}

impl PoiIdentities {
    fn admit(&mut self, poi: PointOfInterest) -> std::result::Result<PointOfInterest, RecordIssue> {
        // `+ 0.0` folds -0.0 into 0.0, matching `==` on the coordinates
        let key = (
            poi.title.clone(),
            (poi.location.lat + 0.0).to_bits(),
            (poi.location.lon + 0.0).to_bits(),
        );
        if self.seen.insert(key) {
            Ok(poi)
        } else {
            Err(RecordIssue::DuplicatePoi(poi.title))
        }
    }
}

/// Records accepted from a source plus the ones that were skipped
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome<T> {
    pub records: Vec<T>,
    /// 1-based position of each skipped record (CSV line or XML entry number)
    pub rejected: Vec<(usize, RecordIssue)>,
}

impl<T> Default for LoadOutcome<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> LoadOutcome<T> {
    fn push(&mut self, index: usize, decoded: std::result::Result<T, RecordIssue>) {
        match decoded {
            Ok(record) => self.records.push(record),
            Err(issue) => self.rejected.push((index, issue)),
        }
    }

    /// Whether every record in the source was accepted
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Rejected records as [`DataError::MalformedRecord`]
    pub fn errors(&self) -> impl Iterator<Item = DataError> + '_ {
        self.rejected
            .iter()
            .map(|(index, issue)| DataError::MalformedRecord {
                index: *index,
                issue: issue.clone(),
            })
    }

    fn log(&self, kind: &str, source: &str) {
        for error in self.errors() {
            tracing::warn!(source, "Skipping {kind}: {error}");
        }
        tracing::info!(
            source,
            "Loaded {} {kind} record(s), skipped {}",
            self.records.len(),
            self.rejected.len()
        );
    }
}

/// Parse points of interest, reporting every skipped record
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn parse_pois(source: &DataSource) -> Result<LoadOutcome<PointOfInterest>> {
    match source.format {
        DataFormat::Csv => Ok(delimited::parse_pois(&source.text)),
        DataFormat::Xml => markup::parse_pois(&source.name, &source.text),
    }
}

/// Parse walking routes, reporting every skipped record
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn parse_routes(source: &DataSource) -> Result<LoadOutcome<Route>> {
    match source.format {
        DataFormat::Csv => Ok(delimited::parse_routes(&source.text)),
        DataFormat::Xml => markup::parse_routes(&source.name, &source.text),
    }
}

/// Load points of interest, degrading to an empty list on failure
pub fn load_pois(source: &DataSource) -> Vec<PointOfInterest> {
    fail_soft(parse_pois(source), "point of interest", &source.name)
}

/// Load walking routes, degrading to an empty list on failure
pub fn load_routes(source: &DataSource) -> Vec<Route> {
    fail_soft(parse_routes(source), "route", &source.name)
}

/// Read and load a point of interest file; a missing file yields no POIs
pub fn load_pois_file(path: &Path) -> Vec<PointOfInterest> {
    match DataSource::from_path(path) {
        Ok(source) => load_pois(&source),
        Err(e) => {
            tracing::warn!("Cannot read points of interest: {e}");
            Vec::new()
        }
    }
}

/// Read and load a route file; a missing file yields no routes
pub fn load_routes_file(path: &Path) -> Vec<Route> {
    match DataSource::from_path(path) {
        Ok(source) => load_routes(&source),
        Err(e) => {
            tracing::warn!("Cannot read routes: {e}");
            Vec::new()
        }
    }
}

fn fail_soft<T>(parsed: Result<LoadOutcome<T>>, kind: &str, source: &str) -> Vec<T> {
    match parsed {
        Ok(outcome) => {
            outcome.log(kind, source);
            outcome.records
        }
        Err(e) => {
            tracing::error!(source, "Discarding {kind} data: {e}");
            Vec::new()
        }
    }
}

/// Parse a route distance such as `2.4` or `2.4 km`
pub(crate) fn parse_distance(raw: &str) -> std::result::Result<f64, RecordIssue> {
    let lower = raw.trim().to_ascii_lowercase();
    let number = lower.strip_suffix("km").unwrap_or(&lower);
    let value = crate::utils::parse_finite("distance", number)?;
    if value < 0.0 {
        return Err(RecordIssue::OutOfRange {
            field: "distance",
            value,
        });
    }
    Ok(value)
}
