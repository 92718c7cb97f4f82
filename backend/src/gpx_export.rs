use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Metadata, Track, TrackSegment, Waypoint};
use shared::{GeoPoint, Route};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::RouteError;

pub const CREATOR: &str = "refuel";
pub const FALLBACK_NAME: &str = "Refuel Route";

/// Serialize a route as a GPX 1.1 document with a single track and segment.
pub fn encode_route_as_gpx(route: &Route) -> Result<String, RouteError> {
    encode_route_at(route, OffsetDateTime::now_utc())
}

/// Same document, base64 encoded for JSON payloads.
pub fn encode_route_as_gpx_base64(route: &Route) -> Result<String, RouteError> {
    Ok(BASE64.encode(encode_route_as_gpx(route)?))
}

fn encode_route_at(route: &Route, generated_at: OffsetDateTime) -> Result<String, RouteError> {
    let name = route
        .name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());

    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        metadata: Some(Metadata {
            name: Some(name.clone()),
            time: Some(generated_at.into()),
            ..Default::default()
        }),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(name),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    for waypoint in route.points.iter().map(to_waypoint) {
        segment.points.push(waypoint);
    }
    track.segments.push(segment);
    gpx.tracks.push(track);

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    // the writer only emits UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn to_waypoint(point: &GeoPoint) -> Waypoint {
    let mut waypoint = Waypoint::new(Point::new(point.lon, point.lat));
    waypoint.elevation = point.ele;
    waypoint.time = point.time.as_deref().and_then(|raw| {
        match OffsetDateTime::parse(raw, &Rfc3339) {
            Ok(parsed) => Some(parsed.into()),
            Err(err) => {
                tracing::debug!("dropping non RFC 3339 timestamp {raw:?}: {err}");
                None
            }
        }
    });
    waypoint
}

/// File name offered to the share/save surface.
pub fn export_file_name(at: OffsetDateTime) -> String {
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    format!("refuel_route_{millis}.gpx")
}
