//! Element-based data files
//!
//! Each record type is described by an [`EntrySchema`]: the element wrapping
//! one record and the child fields it may carry. A single collector walks
//! the document, gathers the text of every known field into a [`RawEntry`]
//! and hands it to a typed decode function. Unknown elements are skipped.

use super::{CATEGORY_DELIMITER, LoadOutcome, PoiIdentities, parse_distance};
use crate::poi::parse_categories;
use crate::utils::{
    DocumentOutline, optional_text, parse_latitude, parse_longitude, require_text,
};
use crate::{DataError, GeoPoint, PointOfInterest, RecordIssue, Result, Route};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

/// How a field appears inside an entry
#[derive(Clone, Copy, Debug)]
enum Shape {
    /// Single text element that must be present
    Required,
    /// Single text element
    Optional,
    /// Container of repeated text items, e.g. `<categories><category>`
    List { item: &'static str },
    /// Container of repeated structured items, e.g. `<sections><section>`
    Groups {
        item: &'static str,
        keys: &'static [&'static str],
    },
}

#[derive(Clone, Copy, Debug)]
struct Field {
    name: &'static str,
    shape: Shape,
}

const fn field(name: &'static str, shape: Shape) -> Field {
    Field { name, shape }
}

struct EntrySchema {
    entry: &'static str,
    fields: &'static [Field],
}

impl EntrySchema {
    fn field(&self, name: &[u8]) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.as_bytes() == name)
    }
}

const POI_SCHEMA: EntrySchema = EntrySchema {
    entry: "poi",
    fields: &[
        field("title", Shape::Required),
        field("latitude", Shape::Required),
        field("longitude", Shape::Required),
        field("description", Shape::Optional),
        field("directions", Shape::Optional),
        field("audio", Shape::Optional),
        field("image", Shape::Optional),
        field("categories", Shape::List { item: "category" }),
        field(
            "sections",
            Shape::Groups {
                item: "section",
                keys: &["name", "content"],
            },
        ),
    ],
};

const ROUTE_SCHEMA: EntrySchema = EntrySchema {
    entry: "route",
    fields: &[
        field("name", Shape::Required),
        field("trackFile", Shape::Required),
        field("distance", Shape::Required),
        field("description", Shape::Optional),
        field("duration", Shape::Optional),
    ],
};

type Group = HashMap<&'static str, String>;

/// Field values collected for one entry, before validation
#[derive(Debug, Default)]
struct RawEntry {
    text: HashMap<&'static str, String>,
    lists: HashMap<&'static str, Vec<String>>,
    groups: HashMap<&'static str, Vec<Group>>,
}

impl RawEntry {
    fn required(&self, name: &'static str) -> std::result::Result<&str, RecordIssue> {
        self.text
            .get(name)
            .map(String::as_str)
            .ok_or(RecordIssue::MissingField(name))
    }

    fn optional(&self, name: &'static str) -> Option<String> {
        optional_text(self.text.get(name).map(String::as_str))
    }

    fn list(&self, name: &'static str) -> &[String] {
        self.lists.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    fn groups(&self, name: &'static str) -> &[Group] {
        self.groups.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

fn decode_error(source_name: &str, reader: &Reader<&[u8]>, detail: impl std::fmt::Display) -> DataError {
    DataError::Decode {
        source_name: source_name.to_string(),
        detail: format!("{detail} (at byte {})", reader.buffer_position()),
    }
}

/// Walk the document and decode every `schema.entry` element found at any depth
fn parse_entries<T>(
    source_name: &str,
    text: &str,
    schema: &EntrySchema,
    mut decode: impl FnMut(&RawEntry) -> std::result::Result<T, RecordIssue>,
) -> Result<LoadOutcome<T>> {
    let mut reader = Reader::from_str(text);
    let mut outline = DocumentOutline::default();
    let mut outcome = LoadOutcome::default();
    let mut ordinal = 0;

    loop {
        let checked = match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == schema.entry.as_bytes() => {
                outline
                    .element()
                    .map_err(|err| decode_error(source_name, &reader, err))?;
                ordinal += 1;
                let entry = collect_entry(&mut reader, &e, schema)
                    .map_err(|err| decode_error(source_name, &reader, err))?;
                outcome.push(ordinal, decode(&entry));
                Ok(())
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == schema.entry.as_bytes() {
                    ordinal += 1;
                    outcome.push(ordinal, decode(&RawEntry::default()));
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
            Err(e) => return Err(decode_error(source_name, &reader, e)),
            Ok(_) => Ok(()),
        };
        checked.map_err(|err| decode_error(source_name, &reader, err))?;
    }
    outline
        .finish()
        .map_err(|err| decode_error(source_name, &reader, err))?;

    Ok(outcome)
}

/// Problems that abort the whole document
#[derive(Debug, thiserror::Error)]
enum CollectError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error("document ends inside <{0}>")]
    Truncated(String),
}

type Collected<T> = std::result::Result<T, CollectError>;

fn truncated(start: &BytesStart<'_>) -> CollectError {
    CollectError::Truncated(String::from_utf8_lossy(start.name().as_ref()).into_owned())
}

/// Called after `Event::Start` of an entry; consumes up to its end tag
fn collect_entry<'a>(
    reader: &mut Reader<&'a [u8]>,
    start: &BytesStart<'a>,
    schema: &EntrySchema,
) -> Collected<RawEntry> {
    let mut entry = RawEntry::default();
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match schema.field(e.local_name().as_ref()) {
                Some(Field {
                    name,
                    shape: Shape::Required | Shape::Optional,
                }) => {
                    let value = read_text_owned(reader, &e)?;
                    entry.text.entry(*name).or_insert(value);
                }
                Some(Field {
                    name,
                    shape: Shape::List { item },
                }) => {
                    let items = collect_list(reader, &e, item)?;
                    entry.lists.entry(*name).or_default().extend(items);
                }
                Some(Field {
                    name,
                    shape: Shape::Groups { item, keys },
                }) => {
                    let groups = collect_groups(reader, &e, item, *keys)?;
                    entry.groups.entry(*name).or_default().extend(groups);
                }
                None => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) => {
                // `<description/>` is present but blank
                if let Some(Field {
                    name,
                    shape: Shape::Required | Shape::Optional,
                }) = schema.field(e.local_name().as_ref())
                {
                    entry.text.entry(*name).or_default();
                }
            }
            Event::End(e) if e.name().0 == end_name.as_slice() => break,
            Event::Eof => return Err(truncated(start)),
            _ => {}
        }
    }

    Ok(entry)
}

/// Text of every `<item>` inside a container element
fn collect_list<'a>(
    reader: &mut Reader<&'a [u8]>,
    start: &BytesStart<'a>,
    item: &str,
) -> Collected<Vec<String>> {
    let mut items = Vec::new();
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == item.as_bytes() => {
                items.push(read_text_owned(reader, &e)?);
            }
            Event::Start(e) => {
                reader.read_to_end(e.name())?;
            }
            Event::End(e) if e.name().0 == end_name.as_slice() => break,
            Event::Eof => return Err(truncated(start)),
            _ => {}
        }
    }

    Ok(items)
}

/// Keyed text of every `<item>` inside a container element
fn collect_groups<'a>(
    reader: &mut Reader<&'a [u8]>,
    start: &BytesStart<'a>,
    item: &str,
    keys: &'static [&'static str],
) -> Collected<Vec<Group>> {
    let mut groups = Vec::new();
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == item.as_bytes() => {
                groups.push(collect_group(reader, &e, keys)?);
            }
            Event::Start(e) => {
                reader.read_to_end(e.name())?;
            }
            Event::End(e) if e.name().0 == end_name.as_slice() => break,
            Event::Eof => return Err(truncated(start)),
            _ => {}
        }
    }

    Ok(groups)
}

fn collect_group<'a>(
    reader: &mut Reader<&'a [u8]>,
    start: &BytesStart<'a>,
    keys: &'static [&'static str],
) -> Collected<Group> {
    let mut group = Group::new();
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let key = keys
                    .iter()
                    .find(|k| k.as_bytes() == e.local_name().as_ref());
                match key {
                    Some(key) => {
                        let value = read_text_owned(reader, &e)?;
                        group.entry(*key).or_insert(value);
                    }
                    None => {
                        reader.read_to_end(e.name())?;
                    }
                }
            }
            Event::End(e) if e.name().0 == end_name.as_slice() => break,
            Event::Eof => return Err(truncated(start)),
            _ => {}
        }
    }

    Ok(group)
}

/// Read the text content of an element as an owned String
///
/// Handles regular text, CDATA sections and entity references. Markup nested
/// inside the element is dropped, its text is kept.
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Collected<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Event::CData(e) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Event::GeneralRef(e) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else {
                    match std::str::from_utf8(e.as_ref()).unwrap_or_default() {
                        "amp" => text.push('&'),
                        "lt" => text.push('<'),
                        "gt" => text.push('>'),
                        "quot" => text.push('"'),
                        "apos" => text.push('\''),
                        _ => {}
                    }
                }
            }
            Event::End(e) if e.name().0 == end_name.as_slice() => break,
            Event::Eof => return Err(truncated(start)),
            _ => {}
        }
    }

    Ok(text)
}

fn decode_poi(entry: &RawEntry) -> std::result::Result<PointOfInterest, RecordIssue> {
    let title = require_text("title", entry.required("title")?)?;
    let lat = parse_latitude("latitude", entry.required("latitude")?)?;
    let lon = parse_longitude("longitude", entry.required("longitude")?)?;

    let categories = parse_categories(
        entry
            .list("categories")
            .iter()
            .flat_map(|c| c.split(CATEGORY_DELIMITER)),
    );
    if categories.is_empty() {
        return Err(RecordIssue::NoCategories);
    }

    let mut description = entry
        .text
        .get("description")
        .map(|d| d.trim().to_string())
        .unwrap_or_default();
    for section in entry.groups("sections") {
        let name = section.get("name").map_or("", |s| s.trim());
        let content = section.get("content").map_or("", |s| s.trim());
        if name.is_empty() && content.is_empty() {
            continue;
        }
        description.push_str(&format!("<h3>{name}</h3><p>{content}</p>"));
    }

    Ok(PointOfInterest {
        location: GeoPoint::new(lat, lon),
        title,
        description,
        categories,
        image: entry.optional("image"),
        audio: entry.optional("audio"),
        directions: entry.optional("directions"),
    })
}

fn decode_route(entry: &RawEntry) -> std::result::Result<Route, RecordIssue> {
    Ok(Route {
        name: require_text("name", entry.required("name")?)?,
        track_ref: require_text("trackFile", entry.required("trackFile")?)?,
        distance_km: parse_distance(entry.required("distance")?)?,
        description: entry.optional("description").unwrap_or_default(),
        duration_label: entry.optional("duration").unwrap_or_default(),
    })
}

pub(super) fn parse_pois(source_name: &str, text: &str) -> Result<LoadOutcome<PointOfInterest>> {
    let mut identities = PoiIdentities::default();
    parse_entries(source_name, text, &POI_SCHEMA, |entry| {
        decode_poi(entry).and_then(|poi| identities.admit(poi))
    })
}

pub(super) fn parse_routes(source_name: &str, text: &str) -> Result<LoadOutcome<Route>> {
    parse_entries(source_name, text, &ROUTE_SCHEMA, decode_route)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POIS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<pois>
  <poi>
    <title>Great Hall</title>
    <latitude>51.0614</latitude>
    <longitude>-1.3190</longitude>
    <description>Home of the Round Table &amp; more</description>
    <directions>Up the High Street</directions>
    <audio>hall.mp3</audio>
    <image>hall.jpg</image>
    <categories>
      <category>Historic</category>
      <category>Museum</category>
      <category>Historic</category>
    </categories>
    <sections>
      <section><name>History</name><content>Built in 1222.</content></section>
      <section><name>Today</name><content><![CDATA[Open <daily>]]></content></section>
    </sections>
    <extensions><rating>5</rating></extensions>
  </poi>
  <poi>
    <title>Nowhere</title>
    <longitude>-1.3</longitude>
    <categories><category>Park</category></categories>
  </poi>
  <poi>
    <title>Water Meadows</title>
    <latitude>51.05</latitude>
    <longitude>-1.31</longitude>
    <categories><category>Park</category></categories>
  </poi>
  <poi>
    <title>Untagged</title>
    <latitude>51.05</latitude>
    <longitude>-1.31</longitude>
    <categories/>
  </poi>
</pois>"#;

    #[test]
    fn test_poi_entries() {
        let outcome = parse_pois("pois.xml", POIS).unwrap();
        assert_eq!(outcome.records.len(), 2);

        let hall = &outcome.records[0];
        assert_eq!(hall.title, "Great Hall");
        assert_eq!(hall.location, GeoPoint::new(51.0614, -1.3190));
        assert_eq!(hall.categories.as_slice(), ["Historic", "Museum"]);
        assert_eq!(
            hall.description,
            "Home of the Round Table & more\
             <h3>History</h3><p>Built in 1222.</p>\
             <h3>Today</h3><p>Open <daily></p>"
        );
        assert_eq!(hall.directions.as_deref(), Some("Up the High Street"));
        assert_eq!(hall.audio.as_deref(), Some("hall.mp3"));
        assert_eq!(hall.image.as_deref(), Some("hall.jpg"));

        let meadows = &outcome.records[1];
        assert_eq!(meadows.description, "");
        assert_eq!(meadows.image, None);

        assert_eq!(
            outcome.rejected,
            vec![
                (2, RecordIssue::MissingField("latitude")),
                (4, RecordIssue::NoCategories),
            ]
        );
    }

    #[test]
    fn test_route_entries() {
        let xml = r#"<routes>
  <route>
    <name>City Walls</name>
    <description>Around the old walls</description>
    <trackFile>walls.gpx</trackFile>
    <distance>2.4 km</distance>
    <duration>1 hour</duration>
  </route>
  <route>
    <name>Riverside</name>
    <trackFile>river.gpx</trackFile>
    <distance>a fair way</distance>
  </route>
  <route>
    <name>   </name>
    <trackFile>x.gpx</trackFile>
    <distance>1</distance>
  </route>
</routes>"#;
        let outcome = parse_routes("routes.xml", xml).unwrap();
        assert_eq!(outcome.records.len(), 1);
        let walls = &outcome.records[0];
        assert_eq!(walls.track_ref, "walls.gpx");
        assert_eq!(walls.distance_km, 2.4);
        assert_eq!(walls.duration_label, "1 hour");
        assert_eq!(walls.description, "Around the old walls");

        assert!(matches!(
            outcome.rejected[0],
            (2, RecordIssue::InvalidNumber { field: "distance", .. })
        ));
        assert_eq!(outcome.rejected[1], (3, RecordIssue::EmptyField("name")));
    }

    #[test]
    fn test_entries_nested_under_any_root() {
        let xml = "<guide><city><poi><title>A</title><latitude>1</latitude>\
                   <longitude>2</longitude><categories><category>x</category>\
                   </categories></poi></city></guide>";
        let outcome = parse_pois("nested.xml", xml).unwrap();
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn test_malformed_document_fails_whole_file() {
        let err = parse_routes("routes.xml", "<routes><route><name>A</route></routes>").unwrap_err();
        match err {
            DataError::Decode { source_name, .. } => assert_eq!(source_name, "routes.xml"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_documents_fail_whole_file() {
        let unclosed = "<pois><poi><title>A</title><latitude>1</latitude><longitude>2</longitude>\
                        <categories><category>x</category></categories></poi>";
        let csv_text = "50.9,-1.4,Title,Desc,Park\n";
        let stray = "<pois></pois>trailing";
        let two_roots = "<pois></pois><pois></pois>";
        for text in [unclosed, csv_text, stray, two_roots, "", "  \n"] {
            assert!(
                matches!(parse_pois("pois.xml", text), Err(DataError::Decode { .. })),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn test_whitespace_around_root() {
        let outcome = parse_pois("pois.xml", "<?xml version=\"1.0\"?>\n<!-- guide -->\n<pois/>\n").unwrap();
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn test_no_entries() {
        let outcome = parse_pois("empty.xml", "<pois></pois>").unwrap();
        assert!(outcome.records.is_empty());
        assert!(outcome.is_clean());
    }
}
