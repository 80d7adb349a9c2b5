//! Benchmarks for share transcoding and chord counting.
//!
//! Run with: `cargo bench --bench transcode`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use uuid::Uuid;

use bip_hub_kernel::{
    chord_map_for, transcode, AccountContext, BipType, Channel, ChannelResolver, Hub, HubNode, Pipeline, Template,
};

const ACTIONS: &[&str] = &["rss.read", "slack.post", "email.smtp_forward", "http.request"];

fn channel(n: usize) -> String {
    Uuid::from_u128(n as u128).to_string()
}

/// A resolver for `count` channels.
fn make_resolver(count: usize) -> ChannelResolver {
    let channels = (0..count).map(|n| Channel::new(channel(n).as_str(), "bench", ACTIONS[n % ACTIONS.len()]));
    ChannelResolver::new("bench", channels)
}

/// A chain `source → c0 → c1 → …` with one templated transform per hop.
fn make_pipeline(hops: usize) -> Pipeline {
    let mut hub = Hub::new().with(
        "source",
        HubNode::with_edges([channel(0)]).with_transform(channel(0), "text", "[%source#title%]"),
    );
    for n in 0..hops {
        let template = format!("[%{}#body%] via [%{}#link%]", channel(n), channel(n + 1));
        hub.insert(
            channel(n).as_str(),
            HubNode::with_edges([channel(n + 1)]).with_transform(channel(n + 1), "text", template),
        );
    }
    Pipeline::new("bench-bip", "bench", BipType::Trigger)
        .with_hub(hub)
        .with_config("channel_id", channel(0))
}

fn bench_transcode(c: &mut Criterion) {
    let account = AccountContext::new("bench", "Bench");
    let mut group = c.benchmark_group("transcode");

    for hops in [1, 10, 50, 200] {
        let resolver = make_resolver(hops + 1);
        let pipeline = make_pipeline(hops);

        group.throughput(Throughput::Elements(hops as u64));
        group.bench_with_input(BenchmarkId::new("hops", hops), &pipeline, |b, pipeline| {
            b.iter(|| {
                let share = transcode(black_box(pipeline), &resolver, &account);
                assert!(!share.manifest.is_empty());
                share
            })
        });
    }

    group.finish();
}

fn bench_chords(c: &mut Criterion) {
    let resolver = make_resolver(51);
    let pipelines: Vec<_> = (0..100).map(|_| make_pipeline(50)).collect();

    c.bench_function("chord_map_100x50", |b| {
        b.iter(|| chord_map_for(black_box(&pipelines), &resolver))
    });
}

fn bench_template_parse(c: &mut Criterion) {
    let source = (0..20)
        .map(|n| format!("[%{}#field{}%]", channel(n), n))
        .collect::<Vec<_>>()
        .join(" ");

    c.bench_function("template_parse_20_refs", |b| b.iter(|| Template::parse(black_box(&source))));
}

criterion_group!(benches, bench_transcode, bench_chords, bench_template_parse);
criterion_main!(benches);
