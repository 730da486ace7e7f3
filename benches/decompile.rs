//! Benchmarks for whole-assembly decompilation.
//!
//! Modules are built in code with a configurable number of types, each with fields,
//! properties and methods that reference other types of the module.

extern crate dotsource;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dotsource::prelude::*;
use std::{hint::black_box, sync::Arc};

/// `count` types spread over ten namespaces; every type references its predecessor.
fn module_with_types(count: usize) -> ModuleRc {
    let mut builder = ModuleBuilder::new(
        "Bench.dll",
        AssemblyIdentity::new("Bench", AssemblyVersion::new(1, 0, 0, 0)),
    );

    let mut previous: Option<Token> = None;
    for index in 0..count {
        let namespace = format!("Bench.Area{}", index % 10);
        let mut ty = builder
            .add_type(&namespace, &format!("Type{index}"))
            .field(
                "count",
                TypeSignature::I4,
                Accessibility::Private,
                FieldAttributes::empty(),
            )
            .property("Name", TypeSignature::String, true, true);

        let mut run = MethodBuilder::new("Run")
            .returns(TypeSignature::Boolean)
            .parameter("value", TypeSignature::I8)
            .local(TypeSignature::String);
        if let Some(previous) = previous {
            run = run.local(TypeSignature::class(previous));
            ty = ty.base_type(TypeSignature::class(previous));
        }
        previous = Some(ty.method(run).token());
    }

    Arc::new(builder.build())
}

fn bench_decompile_to_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompile_to_memory");
    for count in [10, 100, 500] {
        let module = module_with_types(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &module, |b, module| {
            let decompiler = WholeAssemblyDecompiler::new(DecompilerSettings::default());
            b.iter(|| {
                let files = decompiler
                    .decompile_to_memory(black_box(module), &CancellationToken::none())
                    .unwrap();
                black_box(files)
            });
        });
    }
    group.finish();
}

fn bench_decompile_parallelism(c: &mut Criterion) {
    let module = module_with_types(200);
    let mut group = c.benchmark_group("decompile_parallelism");
    for threads in [1, 2, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let decompiler = WholeAssemblyDecompiler::new(DecompilerSettings::default())
                .with_max_degree_of_parallelism(threads);
            b.iter(|| {
                let files = decompiler
                    .decompile_to_memory(black_box(&module), &CancellationToken::none())
                    .unwrap();
                black_box(files)
            });
        });
    }
    group.finish();
}

fn bench_single_type(c: &mut Criterion) {
    let module = module_with_types(50);
    let token = module
        .find_type("Bench.Area9", "Type49")
        .map(|definition| definition.token)
        .unwrap();
    let settings = DecompilerSettings::default();
    let decompiler = TypeDecompiler::new(
        Arc::new(DecompilerTypeSystem::new(module.clone())),
        settings.clone(),
    );

    c.bench_function("decompile_single_type", |b| {
        b.iter(|| {
            let unit = decompiler
                .decompile_types(black_box(&[token]), &CancellationToken::none())
                .unwrap();
            black_box(dotsource::decompiler::OutputVisitor::render(&unit, &settings.formatting))
        });
    });
}

criterion_group!(
    benches,
    bench_decompile_to_memory,
    bench_decompile_parallelism,
    bench_single_type
);
criterion_main!(benches);
