use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use folio::filter::{AsciiHexDecode, FlateDecode, FlateEncode, FlateParams, RunLengthDecode};
use folio::mobi::palmdoc;
use folio::{Buffer, Filter, FilterStatus, Stage};

fn drive(filter: impl Filter + 'static, input: &[u8]) -> Vec<u8> {
    let mut stage = Stage::new(filter);
    let mut inbuf = Buffer::from_bytes(input.to_vec());
    let mut collected = Vec::new();
    loop {
        let mut out = Buffer::with_capacity(4096);
        let status = stage.process(&mut inbuf, &mut out).unwrap();
        collected.extend_from_slice(out.readable());
        match status {
            FilterStatus::Done | FilterStatus::NeedInput => return collected,
            FilterStatus::NeedOutput => {}
        }
    }
}

fn bench_filters(c: &mut Criterion) {
    let text: Vec<u8> = b"the quick brown fox jumps over the lazy dog "
        .iter()
        .cycle()
        .copied()
        .take(64 * 1024)
        .collect();

    let hex: Vec<u8> = {
        let mut out: Vec<u8> = text
            .iter()
            .flat_map(|b| format!("{b:02X}").into_bytes())
            .collect();
        out.push(b'>');
        out
    };
    c.bench_function("asciihex_64k", |b| {
        b.iter(|| drive(AsciiHexDecode::new(), black_box(&hex)))
    });

    let rle: Vec<u8> = {
        let mut out = Vec::new();
        for chunk in text.chunks(128) {
            out.push((chunk.len() - 1) as u8);
            out.extend_from_slice(chunk);
        }
        out.push(128);
        out
    };
    c.bench_function("runlength_64k", |b| {
        b.iter(|| drive(RunLengthDecode::new(), black_box(&rle)))
    });

    let deflated = drive(FlateEncode::new(FlateParams::default()), &text);
    c.bench_function("flate_64k", |b| {
        b.iter(|| drive(FlateDecode::new(FlateParams::default()), black_box(&deflated)))
    });
}

fn bench_palmdoc(c: &mut Criterion) {
    // Space-folded ASCII decompresses through the 0xC0 fast path.
    let record: Vec<u8> = b"words\xC1\xC2\xC3"
        .iter()
        .cycle()
        .copied()
        .take(4000)
        .collect();
    c.bench_function("palmdoc_record", |b| {
        b.iter(|| palmdoc::decompress(black_box(&record), 16 * 1024).unwrap())
    });
}

criterion_group!(benches, bench_filters, bench_palmdoc);
criterion_main!(benches);
