use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use astimp::{
    analyze_zone, detect_disks, fit_circle_ransac, locate_plate, AnalysisConfig, Calibration,
    CircleRansacConfig, Image, Point,
};

#[path = "../tests/common/synthetic_plate.rs"]
#[allow(dead_code)]
mod synthetic_plate;

use synthetic_plate::PlateScene;

fn bench_config() -> AnalysisConfig {
    let mut cfg = AnalysisConfig::default();
    cfg.plate.radius_range_mm = [35.0, 50.0];
    cfg.disk.radius_range_mm = [2.5, 3.5];
    cfg
}

fn ruler() -> Calibration {
    Calibration::ReferenceLength {
        from: Point::new(0.0, 0.0),
        to: Point::new(100.0, 0.0),
        length_mm: 10.0,
    }
}

/// 1000×1000 plate at 0.1 mm/px with a ring of eight disks.
fn make_plate_fixture() -> PlateScene {
    let mut scene = PlateScene::new(1000, 1000, [500.0, 500.0], 430.0).noise(0.04, 7);
    for k in 0..8 {
        let a = k as f32 * std::f32::consts::TAU / 8.0;
        scene = scene.disk(
            [500.0 + 250.0 * a.cos(), 500.0 + 250.0 * a.sin()],
            30.0,
            60.0 + 8.0 * k as f32,
        );
    }
    scene
}

fn bench_locate_plate(c: &mut Criterion) {
    let img = make_plate_fixture().render();
    let cfg = bench_config();
    let cal = ruler();
    c.bench_function("locate_plate_1000x1000", |b| {
        b.iter(|| black_box(locate_plate(black_box(&img), Some(&cal), &cfg).map(|p| p.radius)))
    });
}

fn bench_detect_disks(c: &mut Criterion) {
    let img = make_plate_fixture().render();
    let cfg = bench_config();
    let Ok(plate) = locate_plate(&img, Some(&ruler()), &cfg) else {
        return;
    };
    c.bench_function("detect_disks_8", |b| {
        b.iter(|| black_box(detect_disks(black_box(&img), &plate, &cfg).len()))
    });
}

fn bench_analyze_zone(c: &mut Criterion) {
    let img = make_plate_fixture().render();
    let cfg = bench_config();
    let Ok(plate) = locate_plate(&img, Some(&ruler()), &cfg) else {
        return;
    };
    let disks = detect_disks(&img, &plate, &cfg);
    let Some(disk) = disks.first().copied() else {
        return;
    };
    c.bench_function("analyze_zone_72_rays", |b| {
        b.iter(|| black_box(analyze_zone(black_box(&img), &disk, &plate, &cfg).boundary_radius_px))
    });
}

fn bench_circle_ransac(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let points: Vec<Point> = (0..72)
        .map(|i| {
            let a = i as f64 * std::f64::consts::TAU / 72.0;
            let r = if i % 9 == 0 { 20.0 } else { 60.0 + rng.gen_range(-0.5..0.5) };
            Point::new(300.0 + r * a.cos(), 280.0 + r * a.sin())
        })
        .collect();
    let cfg = CircleRansacConfig::default();
    c.bench_function("circle_ransac_72pts", |b| {
        b.iter(|| black_box(fit_circle_ransac(black_box(&points), &cfg).map(|f| f.num_inliers)))
    });
}

criterion_group!(
    hotpaths,
    bench_locate_plate,
    bench_detect_disks,
    bench_analyze_zone,
    bench_circle_ransac
);
criterion_main!(hotpaths);
