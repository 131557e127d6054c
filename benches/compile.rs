use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tregex::{Compiler, RegexOptions, RegexSource};

fn bench_compile(c: &mut Criterion) {
    let compiler = Compiler::new(RegexOptions::default());
    let patterns = [
        ("literal", "needle in a haystack"),
        ("alternation", "GET|POST|PUT|DELETE"),
        ("captures", r"(\d{4})-(\d{2})-(\d{2})"),
        ("loops", r"[a-z]+@[a-z]+\.[a-z]{2,3}"),
    ];
    for (name, pattern) in patterns {
        c.bench_function(&format!("compile/{name}"), |b| {
            b.iter(|| {
                compiler
                    .compile(RegexSource::new(black_box(pattern), ""))
                    .unwrap()
            })
        });
    }
}

fn bench_compile_search(c: &mut Criterion) {
    let compiler = Compiler::new(RegexOptions::default());
    c.bench_function("compile_search/alternation", |b| {
        b.iter(|| {
            compiler
                .compile_search(RegexSource::new(black_box("ab|cde|f"), ""))
                .unwrap()
        })
    });
}

fn bench_find(c: &mut Criterion) {
    let compiler = Compiler::new(RegexOptions::default());
    let matcher = compiler
        .compile_search(RegexSource::new(r"(\d+)-(\d+)", ""))
        .unwrap();
    let haystack = "x".repeat(512) + "17-42";
    c.bench_function("find/lazy_dfa", |b| {
        b.iter(|| matcher.find(black_box(&haystack)))
    });
}

criterion_group!(benches, bench_compile, bench_compile_search, bench_find);
criterion_main!(benches);
