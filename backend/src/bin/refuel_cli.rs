use std::path::PathBuf;

use clap::Parser;
use refuel_backend::{
    augment::RouteAugmenter,
    config::AppConfig,
    directions_from_config,
    discovery::fetch_candidates,
    error::RouteError,
    gpx_export::{encode_route_as_gpx, export_file_name},
    gpx_import::load_route_file,
    providers::overpass::OverpassClient,
    session::Session,
};
use shared::RouteStats;
use time::OffsetDateTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Find water, food and stores along a GPX route and add detours to them"
)]
struct Args {
    /// GPX file to read
    #[arg(long)]
    input: PathBuf,

    /// Where to write the modified GPX (defaults to refuel_route_<millis>.gpx)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Category ids to search (water, store, food); repeat for several
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Maximum distance from the route in km
    #[arg(long)]
    max_deviation: Option<f64>,

    /// `all` or a comma separated list of POI ids
    #[arg(long, default_value = "all")]
    select: String,

    /// Skip the directions provider, insert POIs directly
    #[arg(long)]
    offline: bool,

    /// Only print the candidates
    #[arg(long)]
    list: bool,
}

#[derive(Debug, PartialEq)]
enum Selection {
    All,
    Ids(Vec<String>),
}

fn parse_selection(raw: &str) -> Selection {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Selection::All;
    }
    Selection::Ids(
        raw.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Enable exactly `wanted` among the session filters.
fn apply_categories(session: &mut Session, wanted: &[String]) -> Result<(), RouteError> {
    if wanted.is_empty() {
        return Ok(());
    }
    if let Some(unknown) = wanted
        .iter()
        .find(|id| !session.filters().iter().any(|f| &f.id == *id))
    {
        return Err(RouteError::Validation(format!("unknown category '{unknown}'")));
    }
    let toggles: Vec<String> = session
        .filters()
        .iter()
        .filter(|f| f.enabled != wanted.contains(&f.id))
        .map(|f| f.id.clone())
        .collect();
    for id in toggles {
        session.toggle_filter(&id)?;
    }
    Ok(())
}

fn apply_selection(session: &mut Session, selection: &Selection) -> Result<(), RouteError> {
    let ids: Vec<String> = match selection {
        Selection::All => session.candidates().iter().map(|poi| poi.id.clone()).collect(),
        Selection::Ids(ids) => ids.clone(),
    };
    for id in ids {
        let already = session
            .candidates()
            .iter()
            .any(|poi| poi.id == id && poi.selected);
        if !already {
            session.toggle_candidate(&id)?;
        }
    }
    Ok(())
}

fn print_stats(label: &str, stats: &RouteStats) {
    println!(
        "{label:<9} {:>8.2} km  {:>6.0} m gain  {:>6} points",
        stats.distance_km, stats.elevation_gain_m, stats.point_count
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    let route = load_route_file(&args.input)?;
    let mut session = Session::new(config.default_max_deviation_km);
    let file_name = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    session.load_route(route, file_name)?;
    apply_categories(&mut session, &args.categories)?;
    if let Some(km) = args.max_deviation {
        session.set_max_deviation(km)?;
    }

    let pois = OverpassClient::new(
        config.overpass_url.clone(),
        config.http_timeout,
        config.overpass_timeout_secs,
    )?;
    let original = session.require_route()?.clone();
    let candidates = fetch_candidates(
        &pois,
        &original.points,
        session.filters(),
        session.max_deviation_km(),
    )
    .await?;
    session.set_candidates(candidates);

    println!(
        "{} candidates within {} km",
        session.candidates().len(),
        session.max_deviation_km()
    );
    for poi in session.candidates() {
        println!(
            "{:>12}  {:<14} {:>7.2} km along  {:>5.2} km off  {}",
            poi.id, poi.category, poi.distance_along_route_km, poi.distance_from_route_km, poi.name
        );
    }
    if args.list {
        return Ok(());
    }

    apply_selection(&mut session, &parse_selection(&args.select))?;
    let augmenter = if args.offline {
        RouteAugmenter::offline()
    } else {
        RouteAugmenter::new(directions_from_config(&config)?)
            .with_concurrency(config.detour_concurrency)
    };
    let modified = augmenter.generate(&original, session.candidates()).await?;
    session.set_modified_route(modified);

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(export_file_name(OffsetDateTime::now_utc())));
    let gpx = encode_route_as_gpx(session.export_route(true)?)?;
    tokio::fs::write(&output, gpx).await?;

    println!("{} POIs selected, written to {}", session.selected_count(), output.display());
    if let Some(comparison) = session.comparison() {
        print_stats("original", &comparison.original);
        print_stats("modified", &comparison.modified);
        println!(
            "added     {:>8.2} km  {:>6.0} m gain",
            comparison.added_distance_km, comparison.added_elevation_gain_m
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use shared::{CandidatePoi, GeoPoint, Route};

    use super::*;

    fn session_with_candidates() -> Session {
        let mut session = Session::default();
        session
            .load_route(Route::new("r", vec![GeoPoint::new(45.0, 5.0)]), None)
            .unwrap();
        let candidates = ["a", "b", "c"]
            .iter()
            .map(|id| CandidatePoi {
                id: id.to_string(),
                name: id.to_string(),
                category: "Stores".to_string(),
                location: GeoPoint::new(45.0, 5.0),
                distance_from_route_km: 0.0,
                distance_along_route_km: 0.0,
                selected: false,
            })
            .collect();
        session.set_candidates(candidates);
        session
    }

    #[test]
    fn selection_parsing() {
        assert_eq!(parse_selection("all"), Selection::All);
        assert_eq!(parse_selection(" ALL "), Selection::All);
        assert_eq!(
            parse_selection("12, 40,,7"),
            Selection::Ids(vec!["12".into(), "40".into(), "7".into()])
        );
    }

    #[test]
    fn categories_replace_defaults() {
        let mut session = Session::default();
        apply_categories(&mut session, &["food".to_string(), "store".to_string()]).unwrap();
        let enabled: Vec<&str> = session
            .filters()
            .iter()
            .filter(|f| f.enabled)
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(enabled, vec!["store", "food"]);
        assert!(apply_categories(&mut session, &["fuel".to_string()]).is_err());
    }

    #[test]
    fn select_all_and_by_id() {
        let mut session = session_with_candidates();
        apply_selection(&mut session, &Selection::Ids(vec!["b".into()])).unwrap();
        assert_eq!(session.selected_count(), 1);
        apply_selection(&mut session, &Selection::All).unwrap();
        assert_eq!(session.selected_count(), 3);
        assert!(apply_selection(&mut session, &Selection::Ids(vec!["zz".into()])).is_err());
    }
}
