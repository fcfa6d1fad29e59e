//! Typed KML document model.
//!
//! Covers the subset of KML produced by the MapShare feed:
//! `kml/Document/Folder/Placemark` with a `Point` or `LineString`,
//! `ExtendedData/Data` pairs and a `TimeStamp`. Everything else in the
//! document is skipped.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KmlError {
    #[error("Empty document")]
    Empty,

    #[error("Malformed XML: {0}")]
    Malformed(String),

    #[error("Unexpected document structure: {0}")]
    Structure(#[from] quick_xml::de::DeError),
}

/// Root `<kml>` element
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KmlDocument {
    #[serde(rename = "Document")]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Document {
    #[serde(rename = "Folder", default)]
    pub folders: Vec<Folder>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Folder {
    #[serde(rename = "Placemark", default)]
    pub placemarks: Vec<Placemark>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Placemark {
    #[serde(rename = "TimeStamp")]
    pub time_stamp: Option<TimeStamp>,
    #[serde(rename = "ExtendedData")]
    pub extended_data: Option<ExtendedData>,
    #[serde(rename = "Point")]
    pub point: Option<Point>,
    #[serde(rename = "LineString")]
    pub line_string: Option<LineString>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeStamp {
    pub when: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtendedData {
    #[serde(rename = "Data", default)]
    pub data: Vec<Data>,
}

/// `<Data name="..."><value>...</value></Data>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Data {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Point {
    pub coordinates: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineString {
    pub coordinates: Option<String>,
}

/// Raw coordinate text of the geometry a placemark carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacemarkGeometry<'a> {
    Point(&'a str),
    LineString(&'a str),
}

fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

impl KmlDocument {
    /// Placemarks of the first `Document/Folder`, in document order.
    pub fn placemarks(&self) -> &[Placemark] {
        self.document
            .as_ref()
            .and_then(|doc| doc.folders.first())
            .map(|folder| folder.placemarks.as_slice())
            .unwrap_or(&[])
    }
}

impl Placemark {
    /// Point wins when both geometries carry coordinates.
    pub fn geometry(&self) -> Option<PlacemarkGeometry<'_>> {
        if let Some(text) = self.point.as_ref().and_then(|p| non_empty(&p.coordinates)) {
            return Some(PlacemarkGeometry::Point(text));
        }
        self.line_string
            .as_ref()
            .and_then(|l| non_empty(&l.coordinates))
            .map(PlacemarkGeometry::LineString)
    }

    pub fn extended_data(&self) -> impl Iterator<Item = &Data> {
        self.extended_data.iter().flat_map(|ext| ext.data.iter())
    }

    pub fn when(&self) -> Option<&str> {
        self.time_stamp.as_ref().and_then(|ts| ts.when.as_deref())
    }
}

/// Parse raw KML text into the typed document.
pub fn parse(raw: &str) -> Result<KmlDocument, KmlError> {
    if raw.trim().is_empty() {
        return Err(KmlError::Empty);
    }
    check_well_formed(raw)?;
    Ok(quick_xml::de::from_str(raw)?)
}

/// Walk the event stream once: matched end tags, one root element,
/// no stray text outside it and nothing left open at EOF.
fn check_well_formed(raw: &str) -> Result<(), KmlError> {
    let mut reader = Reader::from_str(raw);
    let mut depth: usize = 0;
    let mut roots: usize = 0;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(KmlError::Malformed(format!(
                    "{} at byte {}",
                    e,
                    reader.buffer_position()
                )));
            }
        };

        match event {
            Event::Start(_) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Event::Empty(_) if depth == 0 => roots += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(text) if depth == 0 => {
                if !text.iter().all(u8::is_ascii_whitespace) {
                    return Err(KmlError::Malformed("text outside root element".to_string()));
                }
            }
            Event::CData(_) if depth == 0 => {
                return Err(KmlError::Malformed("CDATA outside root element".to_string()));
            }
            Event::Eof => break,
            _ => {}
        }

        if roots > 1 {
            return Err(KmlError::Malformed("multiple root elements".to_string()));
        }
    }

    if depth > 0 {
        return Err(KmlError::Malformed(format!("{} unclosed element(s)", depth)));
    }
    if roots == 0 {
        return Err(KmlError::Malformed("no root element".to_string()));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Trimmed-down MapShare feed: two tracking points, a message and the track line.
    pub(crate) const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>KML Export 10/16/2026 3:00:00 PM</name>
    <Style id="style_1"><IconStyle><color>ff0000ff</color></IconStyle></Style>
    <Folder>
      <name>Trail Party</name>
      <Placemark>
        <name>Trail Party</name>
        <visibility>1</visibility>
        <description></description>
        <TimeStamp><when>2026-10-15T14:00:00Z</when></TimeStamp>
        <styleUrl>#style_1</styleUrl>
        <ExtendedData>
          <Data name="Id"><value>1001</value></Data>
          <Data name="IMEI"><value>300000000000000</value></Data>
          <Data name="Valid GPS Fix"><value>True</value></Data>
          <Data name="Event"><value>Tracking interval received.</value></Data>
        </ExtendedData>
        <Point><extrude>false</extrude><altitudeMode>absolute</altitudeMode><coordinates>-115.5,51.2,1400.5</coordinates></Point>
      </Placemark>
      <Placemark>
        <name>Trail Party</name>
        <TimeStamp><when>2026-10-15T14:10:00Z</when></TimeStamp>
        <ExtendedData>
          <Data name="Id"><value>1002</value></Data>
          <Data name="Text"><value>Camp at the lake &amp; all good</value></Data>
          <Data name="Event"><value>Msg to shared map received.</value></Data>
        </ExtendedData>
        <Point><coordinates>-115.6,51.3</coordinates></Point>
      </Placemark>
      <Placemark>
        <name>Trail Party</name>
        <LineString>
          <tessellate>true</tessellate>
          <coordinates>-115.5,51.2,1400.5
-115.6,51.3,1410.0</coordinates>
        </LineString>
      </Placemark>
    </Folder>
  </Document>
</kml>"#;

    #[test]
    fn test_parse_sample_feed() {
        let doc = parse(SAMPLE_FEED).expect("Failed to parse sample feed");
        let placemarks = doc.placemarks();
        assert_eq!(placemarks.len(), 3);

        let first = &placemarks[0];
        assert_eq!(first.when(), Some("2026-10-15T14:00:00Z"));
        assert_eq!(first.geometry(), Some(PlacemarkGeometry::Point("-115.5,51.2,1400.5")));
        let data: Vec<(&str, &str)> = first
            .extended_data()
            .map(|d| (d.name.as_str(), d.value.as_str()))
            .collect();
        assert_eq!(data[0], ("Id", "1001"));
        assert_eq!(data[3], ("Event", "Tracking interval received."));

        let text = placemarks[1].extended_data().find(|d| d.name == "Text");
        assert_eq!(text.map(|d| d.value.as_str()), Some("Camp at the lake & all good"));

        match placemarks[2].geometry() {
            Some(PlacemarkGeometry::LineString(text)) => assert_eq!(text.lines().count(), 2),
            other => panic!("expected LineString, got {:?}", other),
        }
        assert!(placemarks[2].when().is_none());
    }

    #[test]
    fn test_missing_folder_is_empty_not_error() {
        let doc = parse(r#"<kml><Document><name>Empty</name></Document></kml>"#)
            .expect("Failed to parse");
        assert!(doc.placemarks().is_empty());

        let doc = parse("<kml/>").expect("Failed to parse");
        assert!(doc.placemarks().is_empty());
    }

    #[test]
    fn test_point_takes_precedence() {
        let doc = parse(
            r#"<kml><Document><Folder><Placemark>
                <LineString><coordinates>1,2
3,4</coordinates></LineString>
                <Point><coordinates>5,6</coordinates></Point>
            </Placemark></Folder></Document></kml>"#,
        )
        .expect("Failed to parse");
        assert_eq!(doc.placemarks()[0].geometry(), Some(PlacemarkGeometry::Point("5,6")));
    }

    #[test]
    fn test_empty_point_falls_through_to_line() {
        let doc = parse(
            r#"<kml><Document><Folder><Placemark>
                <Point><coordinates>  </coordinates></Point>
                <LineString><coordinates>1,2</coordinates></LineString>
            </Placemark><Placemark><name>bare</name></Placemark></Folder></Document></kml>"#,
        )
        .expect("Failed to parse");
        assert_eq!(doc.placemarks()[0].geometry(), Some(PlacemarkGeometry::LineString("1,2")));
        assert!(doc.placemarks()[1].geometry().is_none());
    }

    #[test]
    fn test_repeated_unmodelled_children_are_skipped() {
        let doc = parse(
            r#"<kml><Document><name>a</name><name>b</name><Folder><name>f</name><name>g</name>
                <Placemark>
                    <name>a</name><name>b</name>
                    <description>one</description><description>two</description>
                    <Point><coordinates>1,2</coordinates></Point>
                </Placemark>
            </Folder></Document></kml>"#,
        )
        .expect("Failed to parse");
        assert_eq!(doc.placemarks().len(), 1);
        assert_eq!(doc.placemarks()[0].geometry(), Some(PlacemarkGeometry::Point("1,2")));
    }

    #[test]
    fn test_rejects_empty_and_malformed_input() {
        assert!(matches!(parse(""), Err(KmlError::Empty)));
        assert!(matches!(parse("   \n"), Err(KmlError::Empty)));
        assert!(matches!(parse("not xml at all"), Err(KmlError::Malformed(_))));
        assert!(matches!(parse("<kml><Document></kml>"), Err(KmlError::Malformed(_))));
        assert!(matches!(parse("<kml><Document>"), Err(KmlError::Malformed(_))));
        assert!(matches!(parse("<a/><b/>"), Err(KmlError::Malformed(_))));
        assert!(parse("<html><body>Service Unavailable</body></html>").is_ok());
    }
}
