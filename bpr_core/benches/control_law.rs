use bpr_core::{ControlCurve, Controller, CurveParams};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

// Synthetic pressure trace: slow sine around the setpoint with white noise
fn synth_trace(n: usize, noise_amp: f32, seed: u32) -> Vec<f32> {
    // tiny PRNG
    let mut state = seed.max(1);
    let mut next_f32 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f32) / (u32::MAX as f32 + 1.0)
    };
    (0..n)
        .map(|i| {
            let t = i as f32 / 200.0;
            5.0 + 3.0 * t.sin() + (next_f32() * 2.0 - 1.0) * noise_amp
        })
        .collect()
}

fn curve() -> ControlCurve {
    ControlCurve::new(CurveParams {
        e_allowed: 0.05,
        e_slow: 0.6,
        r_slow: 10.0,
        e_fast: 2.5,
        r_fast: 800.0,
        inverted: false,
    })
    .unwrap()
}

pub fn bench_output(c: &mut Criterion) {
    let mut g = c.benchmark_group("control_law");
    // Allow quick tweaking without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 cargo bench -p bpr_core --bench control_law
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE")
        && let Ok(n) = ss.parse::<usize>()
    {
        g.sample_size(n.max(1));
    } else {
        g.sample_size(50);
    }

    for &(label, noise) in &[("clean", 0.0f32), ("noisy", 0.2f32)] {
        let trace = synth_trace(4096, noise, 0xC0FFEE);
        g.bench_function(format!("output_{label}"), |b| {
            b.iter_batched(
                || {
                    let mut ctl = Controller::new(curve());
                    ctl.set_target(5.0);
                    ctl
                },
                |mut ctl| {
                    let mut acc = 0i64;
                    for &p in &trace {
                        acc += i64::from(ctl.output(black_box(p)).steps);
                    }
                    black_box(acc)
                },
                BatchSize::SmallInput,
            )
        });
    }

    g.bench_function("curve_derivation", |b| {
        b.iter(|| black_box(ControlCurve::new(black_box(curve().params()))))
    });

    g.finish();
}

criterion_group!(benches, bench_output);
criterion_main!(benches);
