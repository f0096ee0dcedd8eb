//! Benchmarks for per-frame audio processing and message decoding

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tacnet_voice::audio::{
    create_output_bus, AudioChain, AudioFrame, ChainBuilder, ProfileTable, TrackSpec,
};
use tacnet_voice::codec::decoder::decode;

fn frame_10ms() -> AudioFrame {
    let samples = (0..480)
        .map(|i| (i as f32 * 0.057).sin() * 0.4)
        .collect();
    AudioFrame::mono(samples, 0)
}

fn bench_graph_process(c: &mut Criterion) {
    let profile = ProfileTable::default().for_role(Some("Vagrant"));
    let mut graph = ChainBuilder::new(48_000)
        .profile(profile)
        .pan(-0.3)
        .gain(0.8)
        .build();
    let frame = frame_10ms();

    c.bench_function("graph_process_10ms", |b| {
        b.iter(|| black_box(graph.process(black_box(&frame))))
    });
}

fn bench_chain_process_frame(c: &mut Criterion) {
    let chain = AudioChain::new(create_output_bus(1024));
    let track = TrackSpec {
        track_id: "TR_bench".to_string(),
        participant_id: "bravo".to_string(),
        sample_rate: 48_000,
        channels: 1,
    };
    let _ = chain.process_remote_track(&track, ProfileTable::default().for_role(None), None);
    let frame = frame_10ms();

    c.bench_function("chain_process_frame", |b| {
        b.iter(|| {
            let _ = chain.process_frame("TR_bench", black_box(&frame));
            chain.output().drain();
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let flare = br#"{"type":"FLARE","variant":"COMBAT","loc":"HUR-L1"}"#;
    let unknown = br#"{"type":"WAYPOINT","x":12,"y":40,"label":"rally"}"#;

    c.bench_function("decode_flare", |b| b.iter(|| decode(black_box(flare))));
    c.bench_function("decode_app_event", |b| b.iter(|| decode(black_box(unknown))));
}

criterion_group!(benches, bench_graph_process, bench_chain_process_frame, bench_decode);
criterion_main!(benches);
