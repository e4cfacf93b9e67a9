//! 端到端集成测试: 合成 MP3 码流的顺序解码.

mod common;

use std::io::{Cursor, Read};

use common::*;
use yue::core::io::MemoryBackend;
use yue::{Decoder, DecoderConfig};

fn memory_decoder(data: Vec<u8>) -> Decoder {
    Decoder::new(MemoryBackend::from_data(data)).expect("创建解码器失败")
}

#[test]
fn test_静音立体声帧输出全零() {
    init_logger();
    let mut decoder = memory_decoder(silent_frame(STEREO_44K));
    let pcm = drain(&mut decoder);
    assert_eq!(pcm.len(), 4608);
    assert!(pcm.iter().all(|&b| b == 0));
}

#[test]
fn test_长度等于读出字节数() {
    init_logger();
    let mut decoder = memory_decoder(tone_stream(STEREO_44K, 10));
    assert_eq!(decoder.length(), Some(10 * 4608));
    assert_eq!(decoder.frame_count(), Some(10));
    let pcm = drain(&mut decoder);
    assert_eq!(pcm.len() as u64, decoder.length().unwrap());
    assert_eq!(decoder.position(), pcm.len() as u64);
    // 合成的频谱不为零, 输出不应是静音
    assert!(pcm.iter().any(|&b| b != 0));
}

#[test]
fn test_分段读取与一次读取一致() {
    let data = tone_stream(STEREO_44K, 6);
    let mut whole = memory_decoder(data.clone());
    let expected = drain(&mut whole);

    let mut decoder = memory_decoder(data);
    let mut pieces = Vec::new();
    let mut buf = [0u8; 1000];
    let mut size = 1;
    loop {
        let n = decoder.read_pcm(&mut buf[..size]).unwrap();
        if n == 0 {
            break;
        }
        pieces.extend_from_slice(&buf[..n]);
        size = size % 997 + 3;
    }
    assert_eq!(pieces, expected);
}

#[test]
fn test_顺序数据源与随机访问数据源一致() {
    let data = tone_stream(STEREO_44K, 5);
    let mut seekable = memory_decoder(data.clone());
    let expected = drain(&mut seekable);

    let mut stream = Decoder::from_reader(Cursor::new(data)).unwrap();
    assert_eq!(stream.length(), None);
    assert_eq!(stream.frame_count(), None);
    let mut pcm = Vec::new();
    stream.read_to_end(&mut pcm).unwrap();
    assert_eq!(pcm, expected);
}

#[test]
fn test_采样率由首帧决定() {
    let decoder = memory_decoder(tone_stream(MONO_48K, 3));
    assert_eq!(decoder.sample_rate(), 48000);
    let decoder = memory_decoder(tone_stream(MONO_22K, 3));
    assert_eq!(decoder.sample_rate(), 22050);
    assert_eq!(decoder.length(), Some(3 * 2304));
}

#[test]
fn test_单声道复制到左右声道() {
    for header in [MONO_48K, MONO_22K] {
        let mut decoder = memory_decoder(tone_stream(header, 4));
        let pcm = drain(&mut decoder);
        assert!(!pcm.is_empty());
        for frame in pcm.chunks_exact(4) {
            assert_eq!(frame[0..2], frame[2..4]);
        }
        assert!(pcm.iter().any(|&b| b != 0));
    }
}

#[test]
fn test_ms_立体声侧声道为零时左右相同() {
    let content = [
        [lines(1, 30), Vec::new()],
        [lines(2, 30), Vec::new()],
    ];
    let data: Vec<u8> = (0..3)
        .flat_map(|_| build_frame(JOINT_MS_44K, &content))
        .collect();
    let mut decoder = memory_decoder(data);
    let pcm = drain(&mut decoder);
    assert_eq!(pcm.len(), 3 * 4608);
    for frame in pcm.chunks_exact(4) {
        assert_eq!(frame[0..2], frame[2..4]);
    }
    assert!(pcm.iter().any(|&b| b != 0));
}

#[test]
fn test_跳过_id3v2_标签() {
    let stream = tone_stream(STEREO_44K, 3);
    let mut expected_decoder = memory_decoder(stream.clone());
    let expected = drain(&mut expected_decoder);

    let mut data = b"ID3\x03\x00\x00\x00\x00\x00\x20".to_vec();
    data.extend(vec![0u8; 32]);
    data.extend(stream);
    let mut decoder = memory_decoder(data);
    assert_eq!(decoder.length(), Some(3 * 4608));
    assert_eq!(drain(&mut decoder), expected);
}

#[test]
fn test_帧间垃圾数据重新同步() {
    let mut data = Vec::new();
    for i in 0..4 {
        data.extend(tone_frame(STEREO_44K, i));
        data.extend([0u8, 0x12, 0x34, 0x00, 0xFF, 0x00]);
    }
    let mut decoder = memory_decoder(data);
    assert_eq!(decoder.frame_count(), Some(4));
    assert_eq!(drain(&mut decoder).len(), 4 * 4608);
}

#[test]
fn test_不建立索引时长度未知() {
    let config = DecoderConfig {
        build_index: false,
        verify_crc: true,
    };
    let mut decoder =
        Decoder::with_config(MemoryBackend::from_data(tone_stream(STEREO_44K, 3)), config)
            .unwrap();
    assert_eq!(decoder.length(), None);
    assert_eq!(decoder.duration(), None);
    assert_eq!(drain(&mut decoder).len(), 3 * 4608);
}

#[test]
fn test_文件解码() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.mp3");
    std::fs::write(&path, tone_stream(STEREO_44K, 4)).unwrap();

    let mut decoder = yue::open(&path).unwrap();
    assert_eq!(decoder.length(), Some(4 * 4608));
    let duration = decoder.duration().unwrap();
    assert!((duration.as_secs_f64() - 4.0 * 1152.0 / 44100.0).abs() < 1e-9);
    assert_eq!(drain(&mut decoder).len(), 4 * 4608);
}

#[test]
fn test_空文件无法创建解码器() {
    assert!(Decoder::new(MemoryBackend::from_data(Vec::new())).is_err());
    assert!(Decoder::new(MemoryBackend::from_data(vec![0u8; 100])).is_err());
}

#[test]
fn test_跨帧储备库码流() {
    init_logger();
    let data = reservoir_stream(STEREO_44K_64K, 16);
    // 第 1 帧起 main_data_begin 不为 0
    assert_ne!(&data[208 + 4..208 + 6], &[0, 0]);

    let mut decoder = memory_decoder(data.clone());
    assert_eq!(decoder.frame_count(), Some(16));
    assert_eq!(decoder.length(), Some(16 * 4608));
    let pcm = drain(&mut decoder);
    assert_eq!(pcm.len(), 16 * 4608);
    assert!(pcm.iter().any(|&b| b != 0));

    let mut stream = Decoder::from_reader(Cursor::new(data)).unwrap();
    let mut sequential = Vec::new();
    stream.read_to_end(&mut sequential).unwrap();
    assert_eq!(sequential, pcm);
}

#[test]
fn test_强度立体声码流() {
    init_logger();
    let mut decoder = memory_decoder(reservoir_stream(JOINT_IS_44K_64K, 8));
    let pcm = drain(&mut decoder);
    assert_eq!(pcm.len(), 8 * 4608);
    assert_eq!(decoder.length(), Some(pcm.len() as u64));
    assert!(pcm.iter().any(|&b| b != 0));
}

#[test]
fn test_短块与混合块() {
    // 第 0 帧: granule 1 左声道短块; 第 1 帧: granule 0 右声道混合块
    let frames: Vec<(u32, [[Granule; 2]; 2])> = (0..3)
        .map(|i| {
            let g = |seed: usize| Granule::long(13, wide_lines(seed, 40, 13));
            let mut content = [[g(i * 4), g(i * 4 + 1)], [g(i * 4 + 2), g(i * 4 + 3)]];
            if i == 0 {
                content[1][0] = content[1][0].clone().with_block(Block::Short);
            }
            if i == 1 {
                content[0][1] = content[0][1].clone().with_block(Block::Mixed);
            }
            (STEREO_44K, content)
        })
        .collect();
    let mut decoder = memory_decoder(build_stream(&frames, false));
    let pcm = drain(&mut decoder);
    assert_eq!(pcm.len(), 3 * 4608);
    assert!(pcm.iter().any(|&b| b != 0));
}

#[test]
fn test_随机访问数据源截断的最后一帧不计入长度() {
    let mut data = tone_stream(STEREO_44K, 3);
    data.truncate(data.len() - 50);
    let mut decoder = Decoder::from_seekable(Cursor::new(data)).unwrap();
    assert_eq!(decoder.length(), Some(2 * 4608));
    let pcm = drain(&mut decoder);
    assert_eq!(pcm.len() as u64, decoder.length().unwrap());
}
