//! Benchmarks for volume construction and axis projection.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use spacetime_slicer::{
    compute::{Frame, SpaceTimeVolume, project},
    schema::ViewMode,
};

fn make_frames(time: usize, size: usize, channels: usize) -> Vec<Frame> {
    (0..time)
        .map(|t| {
            Frame::from_fn(size, size, channels, |x, y, c| {
                ((t * 7 + y * 3 + x + c * 50) % 256) as f32
            })
            .unwrap_or_else(|| panic!("{0}x{0}x{1} frame", size, channels))
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("volume_build");

    for size in [64, 128, 256] {
        let frames = make_frames(64, size, 3);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("64x{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| SpaceTimeVolume::build(black_box(&frames)));
            },
        );
    }

    group.finish();
}

fn bench_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("project");

    for size in [64, 128, 256] {
        let frames = make_frames(64, size, 3);
        let Ok(volume) = SpaceTimeVolume::build(&frames) else {
            panic!("volume build failed for {}x{}", size, size);
        };

        for mode in ViewMode::ALL {
            group.bench_with_input(
                BenchmarkId::new(mode.label(), format!("64x{}x{}", size, size)),
                &mode,
                |b, &mode| {
                    b.iter(|| project(black_box(&volume), mode, size / 2));
                },
            );
        }
    }

    group.finish();
}

fn bench_channels(c: &mut Criterion) {
    let mut group = c.benchmark_group("vertical_slice_channels");

    for channels in [1, 3, 4] {
        let frames = make_frames(64, 128, channels);
        let Ok(volume) = SpaceTimeVolume::build(&frames) else {
            panic!("volume build failed for {} channels", channels);
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_channels", channels)),
            &channels,
            |b, _| {
                b.iter(|| project(black_box(&volume), ViewMode::VerticalSlice, 64));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_project, bench_channels);
criterion_main!(benches);
