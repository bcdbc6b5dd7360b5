// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for document generation in the cronprint-document
// crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use cronprint_document::generate_test_page;

/// Benchmark generating the test page for a typical job label.
fn bench_test_page(c: &mut Criterion) {
    c.bench_function("generate_test_page (short label)", |b| {
        b.iter(|| {
            let bytes = generate_test_page(black_box("nightly-report"));
            black_box(bytes);
        });
    });

    // Escaping path: every character needs attention.
    let awkward = "((\\))".repeat(32);
    c.bench_function("generate_test_page (escaped label)", |b| {
        b.iter(|| {
            let bytes = generate_test_page(black_box(&awkward));
            black_box(bytes);
        });
    });
}

criterion_group!(benches, bench_test_page);
criterion_main!(benches);
