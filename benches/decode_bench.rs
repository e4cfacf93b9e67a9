//! Yue MP3 解码性能基准测试.
//!
//! 覆盖完整流式解码、帧索引扫描和多相合成等核心路径.

use std::io::{Read, Seek, SeekFrom};

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use yue::core::BitWriter;
use yue::core::io::MemoryBackend;
use yue::mp3::FrameHeader;
use yue::mp3::synthesis::synthesize;
use yue::mp3::tables::big_value_table;
use yue::{Decoder, DecoderConfig};

/// 构造 MPEG-1 44100Hz 128kbps 立体声码流, 每个 granule/声道 32 对 15 号表频谱
fn make_stream(frames: usize) -> Vec<u8> {
    let header = FrameHeader::from_raw(0xFFFB_9004);
    let frame_size = header.frame_size().unwrap();
    let spec = big_value_table(15).unwrap();

    let mut part3 = BitWriter::new();
    for i in 0..32usize {
        let symbol = (i % 6) * spec.wrap + (i * 7) % 5;
        part3.write_bits(u32::from(spec.codes[symbol]), u32::from(spec.lens[symbol]));
        if i % 6 != 0 {
            part3.write_bit(i as u32 & 1);
        }
        if (i * 7) % 5 != 0 {
            part3.write_bit(0);
        }
    }
    let part3_bits = part3.bits_written() as u32;
    let part3 = part3.finish();

    let mut side = BitWriter::new();
    side.write_bits(0, 9 + 3 + 8);
    for _ in 0..4 {
        side.write_bits(part3_bits, 12);
        side.write_bits(32, 9);
        side.write_bits(185, 8);
        side.write_bits(0, 4 + 1);
        side.write_bits(15, 5);
        side.write_bits(15, 5);
        side.write_bits(15, 5);
        side.write_bits(7, 4);
        side.write_bits(7, 3);
        side.write_bits(0, 3);
    }
    let side = side.finish();

    let mut main = BitWriter::new();
    for _ in 0..4 {
        let mut bits = part3_bits;
        for &byte in &part3 {
            let n = bits.min(8);
            main.write_bits(u32::from(byte) >> (8 - n), n);
            bits -= n;
        }
    }
    let main = main.finish();

    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(&side);
    frame.extend_from_slice(&main);
    frame.resize(frame_size, 0);
    frame.repeat(frames)
}

fn bench_decode_stream(c: &mut Criterion) {
    let data = make_stream(100);
    c.bench_function("mp3_decode_100_frames", |b| {
        b.iter(|| {
            let config = DecoderConfig {
                build_index: false,
                ..Default::default()
            };
            let mut decoder =
                Decoder::with_config(MemoryBackend::from_data(black_box(data.clone())), config)
                    .unwrap();
            let mut pcm = Vec::with_capacity(100 * 4608);
            decoder.read_to_end(&mut pcm).unwrap();
            black_box(pcm);
        });
    });
}

fn bench_index_scan(c: &mut Criterion) {
    let data = make_stream(1000);
    c.bench_function("mp3_index_scan_1000_frames", |b| {
        b.iter(|| {
            let decoder = Decoder::new(MemoryBackend::from_data(black_box(data.clone()))).unwrap();
            black_box(decoder.length());
        });
    });
}

fn bench_seek(c: &mut Criterion) {
    let data = make_stream(200);
    let mut decoder = Decoder::new(MemoryBackend::from_data(data)).unwrap();
    let mut buf = vec![0u8; 4608];
    c.bench_function("mp3_seek_and_read_frame", |b| {
        let mut target = 0u64;
        b.iter(|| {
            target = (target + 123_457) % (190 * 4608);
            decoder.seek(SeekFrom::Start(black_box(target))).unwrap();
            decoder.read_exact(&mut buf).unwrap();
        });
    });
}

fn bench_synthesis(c: &mut Criterion) {
    let mut samples = [0.0f32; 576];
    for (i, s) in samples.iter_mut().enumerate() {
        *s = ((i * 37) % 101) as f32 / 101.0 - 0.5;
    }
    let mut v = [0.0f32; 1024];
    let mut out = [0.0f32; 576];
    c.bench_function("mp3_polyphase_synthesis_granule", |b| {
        b.iter(|| {
            synthesize(black_box(&samples), &mut v, &mut out);
            black_box(&out);
        });
    });
}

criterion_group!(
    benches,
    bench_decode_stream,
    bench_index_scan,
    bench_seek,
    bench_synthesis
);
criterion_main!(benches);
