//! Benchmarks for file name sanitization.
//!
//! Every generated document passes through these functions once per decompilation:
//! - Plain type names
//! - Generic arity suffixes and compiler generated names
//! - Reserved device names
//! - Namespaces turned into nested directories

extern crate dotsource;

use criterion::{criterion_group, criterion_main, Criterion};
use dotsource::naming::{clean_up_directory_name, clean_up_file_name, clean_up_path};
use std::hint::black_box;

fn bench_file_name_plain(c: &mut Criterion) {
    c.bench_function("naming_file_plain", |b| {
        b.iter(|| black_box(clean_up_file_name(black_box("Widget"), ".cs")));
    });
}

fn bench_file_name_generated(c: &mut Criterion) {
    let names = [
        "List`1",
        "Dictionary`2",
        "<>c__DisplayClass0_0",
        "<PrivateImplementationDetails>",
        "<Run>d__4",
    ];

    c.bench_function("naming_file_generated", |b| {
        b.iter(|| {
            for name in &names {
                black_box(clean_up_file_name(black_box(name), ".cs"));
            }
        });
    });
}

fn bench_file_name_reserved(c: &mut Criterion) {
    let names = ["con", "PRN", "aux", "nul", "com1", "lpt9"];

    c.bench_function("naming_file_reserved", |b| {
        b.iter(|| {
            for name in &names {
                black_box(clean_up_file_name(black_box(name), ".cs"));
            }
        });
    });
}

/// 300 characters, longer than any path segment may be.
fn bench_file_name_long(c: &mut Criterion) {
    let name = "VeryLongTypeName".repeat(19);

    c.bench_function("naming_file_long", |b| {
        b.iter(|| black_box(clean_up_file_name(black_box(&name), ".cs")));
    });
}

fn bench_directory_name(c: &mut Criterion) {
    c.bench_function("naming_directory", |b| {
        b.iter(|| black_box(clean_up_directory_name(black_box("System.Collections:Generic"))));
    });
}

fn bench_path(c: &mut Criterion) {
    c.bench_function("naming_path", |b| {
        b.iter(|| black_box(clean_up_path(black_box("Microsoft.CodeAnalysis.CSharp.Syntax"))));
    });
}

criterion_group!(
    benches,
    bench_file_name_plain,
    bench_file_name_generated,
    bench_file_name_reserved,
    bench_file_name_long,
    bench_directory_name,
    bench_path,
);
criterion_main!(benches);
