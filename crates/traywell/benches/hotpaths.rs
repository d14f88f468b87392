use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::SeedableRng;

use traywell::{GrowConfig, GrowRequest, IntensityField, LensUnwarper, PixelPos, RegionGrower};

const K: f64 = 0.1322595;

fn make_tray_like_image(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        let on = (x / 16 + y / 16) % 2 == 0;
        if on {
            Rgb([240, 230, 250])
        } else {
            Rgb([20, 20, 30])
        }
    })
}

fn bench_build_map(c: &mut Criterion) {
    let unwarper = LensUnwarper::new(K);
    c.bench_function("unwarp_build_map_640x480", |b| {
        b.iter(|| {
            let map = unwarper.build_map(black_box(640), black_box(480), black_box(20));
            black_box(map.entries().len())
        })
    });
}

fn bench_apply_map(c: &mut Criterion) {
    let map = LensUnwarper::new(K).build_map(640, 480, 20);
    let img = make_tray_like_image(640, 480);
    c.bench_function("unwarp_apply_640x480", |b| {
        b.iter(|| {
            let out = map
                .apply(black_box(&img))
                .expect("fixture matches map dimensions");
            black_box(out.width())
        })
    });
}

fn bench_grow(c: &mut Criterion) {
    let center = PixelPos::new(120, 160);
    let img = RgbImage::from_fn(320, 240, |x, y| {
        let dr = y as f64 - center.row as f64;
        let dc = x as f64 - center.col as f64;
        if (dr * dr + dc * dc).sqrt() <= 16.0 {
            Rgb([250, 250, 250])
        } else {
            Rgb([10, 10, 10])
        }
    });
    let field = IntensityField::from_rgb(&img);
    let cfg = GrowConfig::default();
    let grower = RegionGrower::new(&field, &cfg);
    let req = GrowRequest::new(center, 32, 300.0);
    let mut rng = StdRng::seed_from_u64(12345);

    c.bench_function("grow_disk_r16", |b| {
        b.iter(|| {
            let pixels = grower.grow(black_box(&req), &mut rng);
            black_box(pixels.len())
        })
    });

    let hopeless = GrowRequest::new(center, 32, 5000.0);
    c.bench_function("grow_backoff_exhausted", |b| {
        b.iter(|| {
            let outcome = grower.grow_with_backoff(black_box(&hopeless), &mut rng);
            black_box(outcome.attempts)
        })
    });
}

criterion_group!(hotpaths, bench_build_map, bench_apply_map, bench_grow);
criterion_main!(hotpaths);
