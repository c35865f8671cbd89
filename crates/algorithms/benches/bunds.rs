//! Benchmarks for the overlap resolver and the catchment simulator

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bundsim_algorithms::bunds::{
    resolve_overlaps, simulate_catchments, CatchmentParams, CatchmentSite, Footprint, Wings,
};
use bundsim_algorithms::hydrology::{flow_direction, priority_flood, FillParams};
use bundsim_core::{GeoTransform, Raster};
use geo::{coord, Geometry};

/// Sites scattered on a jittered grid so that neighbours partly overlap
fn create_footprints(n: usize) -> Vec<Footprint> {
    let side = (n as f64).sqrt().ceil() as usize;
    (0..n)
        .map(|i| {
            let (r, c) = (i / side, i % side);
            let jitter = ((i * 7919) % 13) as f64;
            let point = coord! { x: c as f64 * 15.0 + jitter, y: r as f64 * 15.0 };
            let azimuth = ((i * 37) % 360) as f64;
            Footprint {
                db_id: i as i64 + 1,
                contr_area: ((i * 31) % 97) as f64 + 2.5,
                shape: Wings::new(point, azimuth, 20.0).footprint(0.7),
            }
        })
        .collect()
}

/// Valley draining south with side slopes toward the centre column
fn create_valley_dem(size: usize) -> Raster<f64> {
    let mut dem = Raster::new(size, size);
    dem.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
    let centre = (size / 2) as f64;
    for row in 0..size {
        for col in 0..size {
            let bank = (col as f64 - centre).abs();
            dem.set(row, col, (size - row) as f64 * 0.5 + bank).unwrap();
        }
    }
    dem
}

/// Dams across the valley every `spacing` rows
fn create_sites(size: usize, spacing: usize) -> Vec<CatchmentSite> {
    let centre = (size / 2) as f64 + 0.5;
    (1..size / spacing)
        .map(|k| {
            let y = size as f64 - (k * spacing) as f64 - 0.8;
            CatchmentSite {
                db_id: k as i64,
                contr_area: (k * spacing) as f64,
                height: 3.0,
                length: 10.0,
                geometry: Geometry::LineString(
                    vec![(centre - 5.0, y), (centre, y), (centre + 5.0, y)].into(),
                ),
            }
        })
        .collect()
}

fn bench_resolve_overlaps(c: &mut Criterion) {
    let mut group = c.benchmark_group("bunds/resolve_overlaps");
    for n in [100, 1_000, 10_000] {
        let footprints = create_footprints(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| resolve_overlaps(black_box(&footprints)))
        });
    }
    group.finish();
}

fn bench_simulate_catchments(c: &mut Criterion) {
    let mut group = c.benchmark_group("bunds/simulate_catchments");
    group.sample_size(10);
    for size in [128, 256, 512] {
        let dem = create_valley_dem(size);
        let filled = priority_flood(&dem, FillParams::default()).unwrap();
        let fdir = flow_direction(&filled).unwrap();
        let sites = create_sites(size, 16);
        let params = CatchmentParams::default();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                simulate_catchments(black_box(&sites), black_box(&filled), &fdir, &params).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resolve_overlaps, bench_simulate_catchments);
criterion_main!(benches);
