use chanlog::dispatch::QueryDispatcher;
use chanlog::resolver::{LogRoot, PathResolver};
use chanlog::{ScopeSelector, SearchConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Runtime;

/// Build `<root>/<name>/<date>.log` trees with `days` files per directory.
fn create_log_tree(channels: usize, users: usize, days: usize, lines_per_day: usize) -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let words = ["hello", "znc", "build", "timeout", "deploy", "lunch", "review", "ping"];

    let names: Vec<String> = (0..channels)
        .map(|n| format!("#chan{n:03}"))
        .chain((0..users).map(|n| format!("user{n:03}")))
        .collect();

    for name in &names {
        let dir = temp.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        for day in 0..days {
            let date = format!("2023-{:02}-{:02}", day / 28 + 1, day % 28 + 1);
            let mut file = fs::File::create(dir.join(format!("{date}.log"))).unwrap();
            for line in 0..lines_per_day {
                let seconds = line * 86_400 / lines_per_day.max(1);
                let word = words[rng.gen_range(0..words.len())];
                writeln!(
                    file,
                    "[{:02}:{:02}:{:02}] <nick{}> {} number {}",
                    seconds / 3600,
                    (seconds / 60) % 60,
                    seconds % 60,
                    rng.gen_range(0..50),
                    word,
                    line
                )
                .unwrap();
            }
        }
    }

    temp
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.sample_size(20);

    let tree = create_log_tree(40, 40, 60, 1);
    let root = LogRoot::new(tree.path());
    let resolver = PathResolver::new();

    for (label, selector) in [
        ("all", ScopeSelector::All),
        ("channel_glob", ScopeSelector::Channel("#chan0*".to_string())),
        ("users", ScopeSelector::User("*".to_string())),
    ] {
        group.bench_with_input(BenchmarkId::new("resolve", label), &selector, |b, selector| {
            b.iter(|| black_box(resolver.resolve(&root, selector).unwrap()));
        });
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("queries");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    let tree = create_log_tree(20, 20, 60, 200);
    let dispatcher =
        QueryDispatcher::new(SearchConfig::default(), vec![LogRoot::new(tree.path())]).unwrap();

    // Frequent term: early termination after the newest date group
    group.bench_function("frequent_literal", |b| {
        b.iter(|| black_box(rt.block_on(dispatcher.execute_lines("* hello"))));
    });

    // Rare term: every file is scanned
    group.bench_function("rare_regex", |b| {
        let command = "* nick4[0-9]> deploy number 199$";
        b.iter(|| black_box(rt.block_on(dispatcher.execute_lines(command))));
    });

    group.bench_function("single_channel", |b| {
        b.iter(|| black_box(rt.block_on(dispatcher.execute_lines("#chan007 review"))));
    });

    group.finish();
}

criterion_group!(benches, bench_resolution, bench_queries);
criterion_main!(benches);
