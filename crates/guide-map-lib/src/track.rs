//! GPX track loading and the start-of-route direction indicator

use crate::utils::DocumentOutline;
use crate::{DataError, GeoPoint, Result, compute_bearing, haversine_km};
use geo::{Coord, Rect};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Ordered geometry of a walking route
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Track {
    /// Track and route points in document order
    pub points: Vec<GeoPoint>,
    /// Points dropped for a missing or non-numeric `lat`/`lon`
    pub skipped_points: usize,
}

/// Arrow drawn at the second track point, pointing along the walk
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DirectionIndicator {
    pub at: GeoPoint,
    /// Degrees clockwise from north, in [0, 360)
    pub bearing: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Track {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self {
            points,
            skipped_points: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Indicator at the second point, bearing from the first to the second
    ///
    /// `None` when the track has fewer than two points.
    pub fn start_indicator(&self) -> Option<DirectionIndicator> {
        match self.points.as_slice() {
            [first, second, ..] => Some(DirectionIndicator {
                at: *second,
                bearing: compute_bearing(*first, *second),
            }),
            _ => None,
        }
    }

    /// Great-circle length of the polyline
    pub fn length_km(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| haversine_km(pair[0], pair[1]))
            .sum()
    }

    /// Bounding box of all points (x = longitude, y = latitude)
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let first = self.points.first()?;
        let (mut min, mut max) = (*first, *first);
        for p in &self.points[1..] {
            min.lat = min.lat.min(p.lat);
            min.lon = min.lon.min(p.lon);
            max.lat = max.lat.max(p.lat);
            max.lon = max.lon.max(p.lon);
        }
        Some(Rect::new(
            Coord {
                x: min.lon,
                y: min.lat,
            },
            Coord {
                x: max.lon,
                y: max.lat,
            },
        ))
    }
}

/// Read `lat`/`lon` attributes of a point element
fn point_from_attributes(e: &BytesStart<'_>) -> Option<GeoPoint> {
    let mut lat = None;
    let mut lon = None;
    for attr in e.attributes().flatten() {
        let value = std::str::from_utf8(&attr.value).unwrap_or_default().trim();
        match attr.key.local_name().as_ref() {
            b"lat" => lat = value.parse::<f64>().ok().filter(|v| v.is_finite()),
            b"lon" => lon = value.parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => {}
        }
    }
    Some(GeoPoint::new(lat?, lon?))
}

fn decode_error(reader: &Reader<&[u8]>, detail: impl std::fmt::Display) -> DataError {
    DataError::Decode {
        source_name: "GPX track".to_string(),
        detail: format!("{detail} (at byte {})", reader.buffer_position()),
    }
}

fn is_track_point(e: &BytesStart<'_>) -> bool {
    matches!(e.local_name().as_ref(), b"trkpt" | b"rtept")
}

/// Parse GPX text into a track
///
/// Every `trkpt` and `rtept` is collected in document order, across all
/// tracks, segments and routes. A point with a missing or unparsable
/// coordinate is skipped and counted; a malformed or truncated document
/// fails the whole track.
pub fn parse_track(xml: &str) -> Result<Track> {
    #[cfg(feature = "profiling")]
    profiling::scope!("track::parse_track");

    let mut reader = Reader::from_str(xml);
    let mut outline = DocumentOutline::default();
    let mut track = Track::default();

    loop {
        let checked = match reader.read_event() {
            Ok(Event::Start(e)) if is_track_point(&e) => {
                match point_from_attributes(&e) {
                    Some(point) => track.points.push(point),
                    None => track.skipped_points += 1,
                }
                // Elevation, time and extensions are not needed
                if let Err(err) = reader.read_to_end(e.name()) {
                    return Err(decode_error(&reader, err));
                }
                outline.element()
            }
            Ok(Event::Empty(e)) => {
                if is_track_point(&e) {
                    match point_from_attributes(&e) {
                        Some(point) => track.points.push(point),
                        None => track.skipped_points += 1,
                    }
                }
                outline.element()
            }
            Ok(Event::Start(_)) => outline.start(),
            Ok(Event::End(_)) => {
                outline.end();
                Ok(())
            }
            Ok(Event::Text(e)) => outline.text(e.as_ref()),
            Ok(Event::CData(e)) => outline.text(e.as_ref()),
            Ok(Event::GeneralRef(e)) => outline.text(e.as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(decode_error(&reader, e)),
            Ok(_) => Ok(()),
        };
        checked.map_err(|err| decode_error(&reader, err))?;
    }
    outline.finish().map_err(|err| decode_error(&reader, err))?;

    Ok(track)
}

/// Resolves a route's track reference to its geometry
///
/// Implementations fail soft: an unreadable track is an empty track.
pub trait TrackSource: Send + Sync {
    fn load_track(&self, track_ref: &str) -> Track;
}

/// Tracks stored as GPX files in one directory
#[derive(Clone, Debug)]
pub struct DirectoryTracks {
    root: PathBuf,
}

impl DirectoryTracks {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{root}/{track_ref}`, with `.gpx` added when the reference has no extension
    pub fn path_for(&self, track_ref: &str) -> PathBuf {
        let path = self.root.join(track_ref.trim());
        if path.extension().is_none() {
            path.with_extension("gpx")
        } else {
            path
        }
    }

    /// Strict variant of [`TrackSource::load_track`]
    pub fn try_load(&self, track_ref: &str) -> Result<Track> {
        let path = self.path_for(track_ref);
        let text = read_track_file(&path)?;
        parse_track(&text).map_err(|e| match e {
            DataError::Decode { detail, .. } => DataError::Decode {
                source_name: path.display().to_string(),
                detail,
            },
            other => other,
        })
    }
}

fn read_track_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataError::ResourceNotFound(path.to_path_buf()),
        _ => DataError::Io(e),
    })
}

impl TrackSource for DirectoryTracks {
    fn load_track(&self, track_ref: &str) -> Track {
        match self.try_load(track_ref) {
            Ok(track) => {
                if track.skipped_points > 0 {
                    tracing::warn!(
                        track_ref,
                        "Skipped {} point(s) with invalid coordinates",
                        track.skipped_points
                    );
                }
                tracing::debug!(track_ref, "Loaded {} track point(s)", track.points.len());
                track
            }
            Err(e) => {
                tracing::warn!(track_ref, "Cannot load track: {e}");
                Track::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test">
  <trk>
    <name>City Walls</name>
    <trkseg>
      <trkpt lat="51.0600" lon="-1.3100"><ele>40</ele><time>2024-05-01T10:00:00Z</time></trkpt>
      <trkpt lat="51.0610" lon="-1.3100"/>
      <trkpt lat="north" lon="-1.3090"/>
      <trkpt lon="-1.3090"/>
    </trkseg>
    <trkseg>
      <trkpt lat="51.0610" lon="-1.3080"></trkpt>
    </trkseg>
  </trk>
  <rte>
    <rtept lat="51.0620" lon="-1.3080"/>
  </rte>
</gpx>"#;

    #[test]
    fn test_parse_track_points_in_order() {
        let track = parse_track(GPX).unwrap();
        assert_eq!(
            track.points,
            vec![
                GeoPoint::new(51.06, -1.31),
                GeoPoint::new(51.061, -1.31),
                GeoPoint::new(51.061, -1.308),
                GeoPoint::new(51.062, -1.308),
            ]
        );
        assert_eq!(track.skipped_points, 2);
    }

    #[test]
    fn test_start_indicator() {
        let track = parse_track(GPX).unwrap();
        let indicator = track.start_indicator().unwrap();
        assert_eq!(indicator.at, GeoPoint::new(51.061, -1.31));
        // Second point is due north of the first
        assert!(indicator.bearing.abs() < 1e-9);

        let single = Track::new(vec![GeoPoint::new(51.0, -1.0)]);
        assert_eq!(single.start_indicator(), None);
        assert_eq!(Track::default().start_indicator(), None);
    }

    #[test]
    fn test_length_and_bounds() {
        let track = Track::new(vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0)]);
        assert!((track.length_km() - 111.19).abs() < 0.01);

        let bounds = track.bounds().unwrap();
        assert_eq!(bounds.min(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(bounds.max(), Coord { x: 1.0, y: 0.0 });
        assert_eq!(Track::default().bounds(), None);
    }

    #[test]
    fn test_malformed_gpx_is_decode_error() {
        let result = parse_track("<gpx><trk><trkseg><trkpt lat=\"1\" lon=\"2\"></trk></gpx>");
        assert!(matches!(result, Err(DataError::Decode { .. })));
    }

    #[test]
    fn test_truncated_or_non_xml_track_is_decode_error() {
        for text in [
            "<gpx><trk><trkseg><trkpt lat=\"1\" lon=\"2\"/>",
            "lat,lon\n1,2\n",
            "",
        ] {
            assert!(
                matches!(parse_track(text), Err(DataError::Decode { .. })),
                "accepted {text:?}"
            );
        }
        assert!(parse_track("<gpx/>").unwrap().is_empty());
    }

    #[test]
    fn test_directory_tracks() {
        let dir = std::env::temp_dir().join(format!("guide-map-tracks-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("walls.gpx"), GPX).unwrap();

        let tracks = DirectoryTracks::new(&dir);
        assert_eq!(tracks.path_for("walls"), dir.join("walls.gpx"));
        assert_eq!(tracks.path_for("walls.gpx"), dir.join("walls.gpx"));
        assert_eq!(tracks.load_track("walls").points.len(), 4);

        assert!(tracks.load_track("missing.gpx").is_empty());
        assert!(matches!(
            tracks.try_load("missing.gpx"),
            Err(DataError::ResourceNotFound(_))
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
