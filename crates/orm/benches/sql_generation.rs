//! SQL generation benchmarks
//!
//! Criteria rendering, schema generation and a save/load round trip over
//! an in-memory database.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_orm::criteria::{and, between, eq, gt, is_in, like, not, or};
use tessera_orm::{
    CriteriaSpec, Lazy, Model, ModelMapping, Order, OrmConfig, OrmContext, Session,
};

#[derive(Debug, Clone, Default)]
struct Foo {
    id: i32,
    name: String,
    score: f64,
    bars: Lazy<Vec<Bar>>,
}

impl Model for Foo {
    const NAME: &'static str = "Foo";

    fn map(m: &mut ModelMapping<Self>) {
        m.field("id", |f| &f.id, |f| &mut f.id);
        m.field("name", |f| &f.name, |f| &mut f.name);
        m.field("score", |f| &f.score, |f| &mut f.score);
        m.relation("bars", |f| &f.bars, |f| &mut f.bars)
            .many_to_many();
    }
}

#[derive(Debug, Clone, Default)]
struct Bar {
    id: i64,
    code: String,
    foos: Lazy<Vec<Foo>>,
}

impl Model for Bar {
    const NAME: &'static str = "Bar";

    fn map(m: &mut ModelMapping<Self>) {
        m.field("id", |b| &b.id, |b| &mut b.id);
        m.field("code", |b| &b.code, |b| &mut b.code);
        m.relation("foos", |b| &b.foos, |b| &mut b.foos)
            .many_to_many();
    }
}

fn context() -> Arc<OrmContext> {
    OrmContext::builder()
        .config(OrmConfig::in_memory())
        .register::<Foo>()
        .register::<Bar>()
        .build()
        .expect("context")
}

fn bench_criteria_rendering(c: &mut Criterion) {
    let context = context();
    let sql = context.sql();
    let mut group = c.benchmark_group("criteria_rendering");

    let simple = CriteriaSpec::of::<Foo>().add(eq("name", "x"));
    group.bench_function("single_criterion", |b| {
        b.iter(|| black_box(sql.create_query(black_box(&simple))))
    });

    let complex = CriteriaSpec::of::<Foo>()
        .add(or(gt("id", 5), like("name", "%x%").ignore_case()))
        .add(not(and(between("score", 1.0, 2.0), is_in("id", [1, 2, 3]))))
        .order_by(Order::desc("score"))
        .order_by(Order::asc("name").ignore_case())
        .limit(20)
        .offset(40);
    group.bench_function("nested_junctions", |b| {
        b.iter(|| black_box(sql.create_query(black_box(&complex))))
    });

    let association = CriteriaSpec::of::<Foo>()
        .create_criteria("bars", |bars| bars.add(eq("code", "red")));
    group.bench_function("association_subquery", |b| {
        b.iter(|| black_box(sql.create_query(black_box(&association))))
    });

    group.bench_function("count", |b| {
        b.iter(|| black_box(sql.create_count_query(black_box(&complex))))
    });

    for size in [10usize, 100, 1000] {
        let spec = CriteriaSpec::of::<Foo>().add(is_in("id", 0..size as i32));
        group.bench_with_input(BenchmarkId::new("in_list", size), &spec, |b, spec| {
            b.iter(|| black_box(sql.create_query(spec)))
        });
    }

    group.finish();
}

fn bench_schema_generation(c: &mut Criterion) {
    let context = context();
    c.bench_function("create_table_statements", |b| {
        b.iter(|| black_box(context.sql().create_table_statements()))
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let context = context();
    let mut session = context.session().expect("session");
    session.open().expect("open");

    c.bench_function("save_then_load", |b| {
        b.iter(|| {
            let mut foo = Foo {
                name: "bench".into(),
                score: 1.0,
                ..Default::default()
            };
            let id = session.save(&mut foo).expect("save");
            session.recycle_cache();
            black_box(session.load::<Foo, _>(id as i32).expect("load"))
        })
    });
}

criterion_group!(
    benches,
    bench_criteria_rendering,
    bench_schema_generation,
    bench_round_trip
);
criterion_main!(benches);
