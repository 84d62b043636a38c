extern crate criterion;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rifret::{PixelGrid, ShiftDirection, shift};
#[cfg(not(target_os = "windows"))]
use pprof::criterion::{Output, PProfProfiler};

const WIDTH: usize = 2048;
const HEIGHT: usize = 2048;

fn criterion_benchmark(c: &mut Criterion) {
    let grid = PixelGrid::from_fn(WIDTH, HEIGHT, |x, y| ((x * 31 + y * 17) % 4096) as f32)
        .expect("bench grid fits in memory");

    for direction in ShiftDirection::ALL {
        c.bench_function(&format!("shift {direction} by 1"), |b| {
            b.iter_batched(
                || grid.clone(),
                |grid| black_box(shift(grid, direction, 1)),
                BatchSize::LargeInput,
            );
        });
    }
}

criterion_group! {
    name = benches;
    config = {
        #[cfg(not(target_os="windows"))]
        let config = Criterion::default().with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)));
        #[cfg(target_os="windows")]
        let config = Criterion::default();

        config
    };
    targets = criterion_benchmark
}
criterion_main!(benches);
