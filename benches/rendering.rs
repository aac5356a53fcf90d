//! Benchmarks for document rendering.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use markview::document::{render_document, sanitize};
use markview::theme::Palette;

fn large_document() -> String {
    let sample = include_str!("../tests/fixtures/sample.md");
    sample.repeat(50)
}

fn bench_render_sample(c: &mut Criterion) {
    let md = include_str!("../tests/fixtures/sample.md");
    c.bench_function("render_sample", |b| {
        b.iter(|| render_document(black_box(md), "", Palette::Light, 100))
    });
}

fn bench_render_large(c: &mut Criterion) {
    let md = large_document();
    c.bench_function("render_large", |b| {
        b.iter(|| render_document(black_box(&md), "", Palette::Dark, 100))
    });
}

fn bench_sanitize(c: &mut Criterion) {
    let html = "<p onclick=\"x()\">text <a href=\"javascript:alert(1)\">link</a></p><script>alert(1)</script><table><tr><td>cell</td></tr></table>"
        .repeat(200);
    c.bench_function("sanitize", |b| b.iter(|| sanitize(black_box(&html))));
}

criterion_group!(benches, bench_render_sample, bench_render_large, bench_sanitize);
criterion_main!(benches);
