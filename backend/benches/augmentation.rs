use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use refuel_backend::augment::RouteAugmenter;
use refuel_backend::discovery::shape_candidates;
use refuel_backend::geometry::{min_distance_to_route, nearest_point_index};
use refuel_backend::providers::PoiFeature;
use shared::{CandidatePoi, CategoryFilter, GeoPoint, Route};

/// A wavy track of `len` points heading east.
fn synthetic_route(len: usize) -> Route {
    let points = (0..len)
        .map(|i| {
            let t = i as f64 * 0.001;
            GeoPoint::new(45.0 + (t * 20.0).sin() * 0.01, 5.0 + t).with_elevation(300.0 + (t * 7.0).cos() * 50.0)
        })
        .collect();
    Route::new("bench", points)
}

fn synthetic_pois(route: &Route, count: usize) -> Vec<CandidatePoi> {
    let step = (route.points.len() / count.max(1)).max(1);
    route
        .points
        .iter()
        .step_by(step)
        .take(count)
        .enumerate()
        .map(|(i, p)| CandidatePoi {
            id: i.to_string(),
            name: format!("poi {i}"),
            category: "Water Supply".to_string(),
            location: GeoPoint::new(p.lat + 0.003, p.lon),
            distance_from_route_km: 0.3,
            distance_along_route_km: i as f64,
            selected: true,
        })
        .collect()
}

fn benchmark_generate_offline(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_offline");
    let augmenter = RouteAugmenter::offline();

    for (points, pois) in [(1_000, 10), (10_000, 50), (10_000, 200)] {
        let route = synthetic_route(points);
        let candidates = synthetic_pois(&route, pois);
        let name = format!("{points}_points_{pois}_pois");
        group.bench_with_input(BenchmarkId::from_parameter(name), &candidates, |b, candidates| {
            b.iter(|| futures::executor::block_on(augmenter.generate(black_box(&route), candidates)))
        });
    }

    group.finish();
}

fn benchmark_geometry(c: &mut Criterion) {
    let route = synthetic_route(10_000);
    let target = GeoPoint::new(45.004, 9.2);

    c.bench_function("nearest_point_index_10k", |b| {
        b.iter(|| nearest_point_index(black_box(&target), &route.points))
    });
    c.bench_function("min_distance_to_route_10k", |b| {
        b.iter(|| min_distance_to_route(black_box(&target), &route.points))
    });
}

fn benchmark_shape_candidates(c: &mut Criterion) {
    let route = synthetic_route(5_000);
    let filters = CategoryFilter::defaults();
    let enabled: Vec<&CategoryFilter> = filters.iter().collect();
    let features: Vec<PoiFeature> = (0..500)
        .map(|i| PoiFeature {
            id: i.to_string(),
            point: Some(GeoPoint::new(45.0 + (i % 7) as f64 * 0.002, 5.0 + i as f64 * 0.01)),
            center: None,
            tags: [("amenity".to_string(), "drinking_water".to_string())].into(),
        })
        .collect();

    c.bench_function("shape_candidates_500_features", |b| {
        b.iter(|| shape_candidates(&route.points, &enabled, 5.0, black_box(features.clone())))
    });
}

criterion_group!(
    benches,
    benchmark_generate_offline,
    benchmark_geometry,
    benchmark_shape_candidates
);
criterion_main!(benches);
