use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use shared::{GeoPoint, Route};

use crate::error::RouteError;

pub const DEFAULT_TRACK_NAME: &str = "Imported Track";
pub const DEFAULT_ROUTE_NAME: &str = "Imported Route";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed XML attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("document has no <gpx> root element")]
    NotGpx,
    #[error("document ended inside <{0}>")]
    UnexpectedEof(&'static str),
    #[error("{attribute}={value} is outside the valid range")]
    CoordinateOutOfRange { attribute: &'static str, value: f64 },
}

type Result<T> = std::result::Result<T, ParseError>;

/// Parse GPX text into a route.
///
/// The first `<trk>` wins (all of its segments, in order), even when it holds no
/// usable point; only a document without any track uses its first `<rte>`. Points lacking a usable `lat` or `lon` are skipped.
/// A document without tracks or routes yields an empty route, which callers
/// reject through [`parse_route`].
pub fn parse_gpx(content: &str) -> Result<Route> {
    let mut reader = Reader::from_str(content);
    let mut seen_root = false;
    let mut track: Option<Route> = None;
    let mut route: Option<Route> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"gpx" => seen_root = true,
                b"trk" if seen_root && track.is_none() => {
                    track = Some(read_container(&mut reader, Container::Track)?);
                }
                b"rte" if seen_root && route.is_none() => {
                    route = Some(read_container(&mut reader, Container::Route)?);
                }
                b"metadata" | b"wpt" | b"trk" | b"rte" | b"extensions" => {
                    reader.read_to_end(e.name())?;
                }
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"gpx" => seen_root = true,
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(ParseError::NotGpx);
    }

    let parsed = track.or(route).unwrap_or_default();

    tracing::debug!(
        "parsed GPX {:?} with {} points",
        parsed.name,
        parsed.points.len()
    );
    Ok(parsed)
}

/// Parse and require at least one point.
pub fn parse_route(content: &str) -> std::result::Result<Route, RouteError> {
    let route = parse_gpx(content)?;
    if route.points.is_empty() {
        return Err(RouteError::EmptyRoute);
    }
    Ok(route)
}

pub fn load_route_file(path: impl AsRef<Path>) -> std::result::Result<Route, RouteError> {
    let content = std::fs::read_to_string(path)?;
    parse_route(&content)
}

#[derive(Clone, Copy)]
enum Container {
    Track,
    Route,
}

impl Container {
    fn tag(self) -> &'static str {
        match self {
            Container::Track => "trk",
            Container::Route => "rte",
        }
    }

    fn point_tag(self) -> &'static [u8] {
        match self {
            Container::Track => b"trkpt",
            Container::Route => b"rtept",
        }
    }

    fn default_name(self) -> &'static str {
        match self {
            Container::Track => DEFAULT_TRACK_NAME,
            Container::Route => DEFAULT_ROUTE_NAME,
        }
    }
}

/// Read a `<trk>` or `<rte>` after its start tag, up to and including its end tag.
fn read_container(reader: &mut Reader<&[u8]>, container: Container) -> Result<Route> {
    let mut name: Option<String> = None;
    let mut points = Vec::new();
    let point_tag = container.point_tag();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let local = e.local_name();
                if local.as_ref() == b"name" {
                    let text = read_text(reader, &e)?;
                    if !text.trim().is_empty() {
                        name = Some(text.trim().to_string());
                    }
                } else if local.as_ref() == point_tag {
                    if let Some(point) = read_point(reader, &e)? {
                        points.push(point);
                    }
                } else if matches!(container, Container::Track) && local.as_ref() == b"trkseg" {
                    // segment contents are handled by this loop
                } else {
                    reader.read_to_end(e.name())?;
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == point_tag => {
                if let Some(point) = read_lat_lon(&e)? {
                    points.push(point);
                }
            }
            Event::End(e) if e.local_name().as_ref() == container.tag().as_bytes() => break,
            Event::Eof => return Err(ParseError::UnexpectedEof(container.tag())),
            _ => {}
        }
    }

    Ok(Route {
        name: Some(name.unwrap_or_else(|| container.default_name().to_string())),
        points,
    })
}

/// `Ok(None)` when either attribute is missing or not a number.
fn read_lat_lon(e: &BytesStart<'_>) -> Result<Option<GeoPoint>> {
    let mut lat = None;
    let mut lon = None;

    for attr in e.attributes() {
        let attr = attr?;
        let value = std::str::from_utf8(&attr.value)
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok());
        match attr.key.local_name().as_ref() {
            b"lat" => lat = value,
            b"lon" => lon = value,
            _ => {}
        }
    }

    let (Some(lat), Some(lon)) = (lat, lon) else {
        return Ok(None);
    };
    let point = GeoPoint::new(lat, lon);
    if point.is_valid() {
        return Ok(Some(point));
    }
    let (attribute, value) = if GeoPoint::new(lat, 0.0).is_valid() {
        ("lon", lon)
    } else {
        ("lat", lat)
    };
    Err(ParseError::CoordinateOutOfRange { attribute, value })
}

fn read_point(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Option<GeoPoint>> {
    let Some(mut point) = read_lat_lon(start)? else {
        tracing::debug!("skipping point without usable lat/lon");
        reader.read_to_end(start.name())?;
        return Ok(None);
    };

    let end_name = start.name().as_ref().to_vec();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ele" => point.ele = read_text(reader, &e)?.trim().parse::<f64>().ok(),
                b"time" => {
                    let text = read_text(reader, &e)?;
                    let text = text.trim();
                    if !text.is_empty() {
                        point.time = Some(text.to_string());
                    }
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(e) if e.name().as_ref() == end_name.as_slice() => break,
            Event::Eof => return Err(ParseError::UnexpectedEof("point")),
            _ => {}
        }
    }

    Ok(Some(point))
}

/// Text content of a simple element, including CDATA and entity references.
fn read_text(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().as_ref().to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Text(e) => text.push_str(&String::from_utf8_lossy(e.as_ref())),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(e.as_ref())),
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
            Event::Start(e) => {
                reader.read_to_end(e.name())?;
            }
            Event::End(e) if e.name().as_ref() == end_name.as_slice() => break,
            Event::Eof => return Err(ParseError::UnexpectedEof("text element")),
            _ => {}
        }
    }

    Ok(text)
}
