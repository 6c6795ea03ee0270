//! Performance benchmarks for guide-map-lib
//!
//! Run with: cargo bench --package guide-map-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use guide_map_lib::loader::{parse_pois, parse_routes};
use guide_map_lib::{
    CategoryFilter, DataSource, GeoPoint, PointOfInterest, Viewport, load_pois, parse_track,
    tiles_for_region,
};
use std::fmt::Write;

const CATEGORIES: [&str; 6] = ["Museum", "Park", "Historic", "Shopping", "Restaurant", "Sports"];

/// Header-less POI rows spread around Southampton
fn generate_poi_csv(rows: usize) -> String {
    let mut text = String::with_capacity(rows * 80);
    for i in 0..rows {
        let t = i as f64 / rows as f64;
        let lat = 50.88 + t * 0.05;
        let lon = -1.43 + (t * 40.0).sin() * 0.02;
        let a = CATEGORIES[i % CATEGORIES.len()];
        let b = CATEGORIES[(i / 3) % CATEGORIES.len()];
        let _ = writeln!(
            text,
            "{lat:.6},{lon:.6},Place {i},\"A description, with a comma\",{a};{b},image{i}.jpg"
        );
    }
    text
}

fn generate_poi_xml(entries: usize) -> String {
    let mut text = String::from("<pois>\n");
    for i in 0..entries {
        let t = i as f64 / entries as f64;
        let _ = write!(
            text,
            "<poi><title>Place {i}</title><latitude>{:.6}</latitude><longitude>{:.6}</longitude>\
             <description>About place {i}</description>\
             <categories><category>{}</category></categories>\
             <sections><section><name>History</name><content>Old &amp; new</content></section></sections>\
             </poi>\n",
            50.88 + t * 0.05,
            -1.43 + t * 0.04,
            CATEGORIES[i % CATEGORIES.len()]
        );
    }
    text.push_str("</pois>\n");
    text
}

fn generate_gpx(points: usize) -> String {
    let mut text = String::from("<gpx><trk><trkseg>\n");
    for i in 0..points {
        let t = i as f64 / points as f64;
        let _ = writeln!(
            text,
            "<trkpt lat=\"{:.6}\" lon=\"{:.6}\"><ele>12.5</ele></trkpt>",
            50.90 + t * 0.02,
            -1.40 + (t * 20.0).cos() * 0.01
        );
    }
    text.push_str("</trkseg></trk></gpx>\n");
    text
}

fn bench_tiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiles");
    let viewport = Viewport::new(GeoPoint::new(50.9097, -1.4044), 0.05, 0.05);

    for zoom in [12_u8, 16, 18] {
        let count = tiles_for_region(&viewport, zoom).len();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("enumerate", zoom), &zoom, |b, &zoom| {
            b.iter(|| tiles_for_region(&viewport, zoom).iter().count());
        });
    }

    group.finish();
}

fn bench_loaders(c: &mut Criterion) {
    let mut group = c.benchmark_group("loaders");
    group.sample_size(20);

    let csv = DataSource::csv("pois.csv", generate_poi_csv(10_000));
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("csv_pois_10k", |b| {
        b.iter(|| parse_pois(&csv));
    });

    let xml = DataSource::xml("pois.xml", generate_poi_xml(10_000));
    group.bench_function("xml_pois_10k", |b| {
        b.iter(|| parse_pois(&xml));
    });

    let routes = DataSource::csv(
        "routes.csv",
        (0..10_000)
            .map(|i| format!("Route {i},Walk {i},route{i}.gpx,{}.5,{} min\n", i % 9, i % 90))
            .collect::<String>(),
    );
    group.bench_function("csv_routes_10k", |b| {
        b.iter(|| parse_routes(&routes));
    });

    let gpx = generate_gpx(50_000);
    group.throughput(Throughput::Elements(50_000));
    group.bench_function("gpx_track_50k", |b| {
        b.iter(|| parse_track(&gpx));
    });

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");

    let pois: Vec<PointOfInterest> = load_pois(&DataSource::csv("pois.csv", generate_poi_csv(10_000)));
    let filter = CategoryFilter::with_selected(["Museum", "Park"]);

    group.throughput(Throughput::Elements(pois.len() as u64));
    group.bench_function("two_categories_10k", |b| {
        b.iter(|| filter.apply(&pois).count());
    });

    group.finish();
}

criterion_group!(benches, bench_tiles, bench_loaders, bench_filter);

criterion_main!(benches);
