//! yue - MP3 解码命令行工具
//!
//! 把 MP3 文件解码为 16 位立体声 PCM (原始数据或 WAV), 或显示流信息.

mod logging;
mod wav;

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use serde::Serialize;

use yue_core::YueError;
use yue_mp3::{Decoder, DecoderConfig};

/// PCM 每个采样帧的字节数 (双声道 16 位)
const BYTES_PER_SAMPLE_FRAME: u64 = 4;

#[derive(Parser, Debug)]
#[command(name = "yue", version, about = "纯 Rust MP3 解码工具")]
struct Cli {
    /// 输入 MP3 文件路径
    input: PathBuf,

    /// 输出文件路径, "-" 表示标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 输出格式
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Wav)]
    format: OutputFormat,

    /// 显示流信息
    #[arg(long)]
    info: bool,

    /// 流信息以 JSON 输出
    #[arg(long)]
    json: bool,

    /// 起始时间 (秒)
    #[arg(long)]
    seek: Option<f64>,

    /// 不建立帧索引 (长度未知, 不能定位)
    #[arg(long)]
    no_index: bool,

    /// 不校验 CRC
    #[arg(long)]
    no_crc: bool,

    /// 日志详细程度 (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// 16 位小端交织 PCM
    Raw,
    /// RIFF WAVE
    Wav,
}

/// 流信息
#[derive(Debug, Serialize)]
struct StreamInfo {
    file: String,
    version: String,
    layer: String,
    channel_mode: String,
    source_channels: usize,
    sample_rate: u32,
    bitrate_kbps: u32,
    crc_protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pcm_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    config: DecoderConfig,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init("yue", cli.verbose) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    if let Err(e) = run(&cli) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = DecoderConfig {
        verify_crc: !cli.no_crc,
        build_index: !cli.no_index,
    };
    let file = File::open(&cli.input)
        .with_context(|| format!("无法打开输入文件 {}", cli.input.display()))?;
    let mut decoder = Decoder::with_config(yue_core::io::FileBackend::new(file), config)
        .with_context(|| format!("无法解码 {}", cli.input.display()))?;

    if cli.info || cli.output.is_none() {
        let info = stream_info(&cli.input, &decoder)?;
        print_info(&info, cli.json)?;
        if cli.output.is_none() {
            return Ok(());
        }
    }

    if let Some(seconds) = cli.seek {
        let target = seek_target(seconds, decoder.sample_rate())?;
        decoder
            .seek(SeekFrom::Start(target))
            .with_context(|| format!("定位到 {seconds} 秒失败"))?;
        info!("从 {seconds} 秒 (PCM 字节 {target}) 开始解码");
    }

    let Some(output) = &cli.output else {
        return Ok(());
    };
    let written = if output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        if cli.format == OutputFormat::Wav {
            let expected = decoder
                .length()
                .map_or(u64::MAX, |len| len.saturating_sub(decoder.position()));
            out.write_all(&wav::header(decoder.sample_rate(), expected))?;
        }
        let n = decode_to(&mut decoder, &mut out)?;
        out.flush()?;
        n
    } else {
        let file = File::create(output)
            .with_context(|| format!("无法创建输出文件 {}", output.display()))?;
        let mut out = BufWriter::new(file);
        if cli.format == OutputFormat::Wav {
            out.write_all(&wav::header(decoder.sample_rate(), 0))?;
        }
        let n = decode_to(&mut decoder, &mut out)?;
        let mut file = out.into_inner().map_err(|e| e.into_error())?;
        if cli.format == OutputFormat::Wav {
            wav::patch_sizes(&mut file, decoder.sample_rate(), n)?;
        }
        n
    };
    info!("解码完成, 输出 {written} 字节 PCM");
    Ok(())
}

/// 解码全部剩余 PCM 写入 `out`, 单帧格式错误只记录警告
fn decode_to(decoder: &mut Decoder, out: &mut impl Write) -> anyhow::Result<u64> {
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        match decoder.read_pcm(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                out.write_all(&buf[..n]).context("写入输出失败")?;
                total += n as u64;
            }
            Err(YueError::InvalidData(msg)) => warn!("跳过损坏的帧: {msg}"),
            Err(e) => return Err(e).context("解码失败"),
        }
    }
    Ok(total)
}

/// 秒数换算为 PCM 字节位置
fn seek_target(seconds: f64, sample_rate: u32) -> anyhow::Result<u64> {
    if !seconds.is_finite() || seconds < 0.0 {
        bail!("无效的起始时间: {seconds}");
    }
    let samples = (seconds * f64::from(sample_rate)).round() as u64;
    Ok(samples * BYTES_PER_SAMPLE_FRAME)
}

fn stream_info(path: &Path, decoder: &Decoder) -> anyhow::Result<StreamInfo> {
    let header = decoder.first_header();
    Ok(StreamInfo {
        file: path.display().to_string(),
        version: format!("{:?}", header.version()),
        layer: format!("{:?}", header.layer()),
        channel_mode: format!("{:?}", header.mode()),
        source_channels: header.channels(),
        sample_rate: decoder.sample_rate(),
        bitrate_kbps: header.bitrate_kbps()?,
        crc_protected: header.has_crc(),
        frames: decoder.frame_count(),
        pcm_bytes: decoder.length(),
        duration: decoder.duration().map(|d| d.as_secs_f64()),
        config: *decoder.config(),
    })
}

fn print_info(info: &StreamInfo, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }
    println!("文件:     {}", info.file);
    println!(
        "格式:     {} {} {}",
        info.version, info.layer, info.channel_mode
    );
    println!(
        "采样率:   {} Hz, 源声道 {}, 输出双声道 16 位",
        info.sample_rate, info.source_channels
    );
    println!("码率:     {} kbps (首帧)", info.bitrate_kbps);
    println!("CRC 保护: {}", if info.crc_protected { "是" } else { "否" });
    match (info.frames, info.pcm_bytes, info.duration) {
        (Some(frames), Some(bytes), Some(duration)) => {
            println!("帧数:     {frames}");
            println!("PCM 长度: {bytes} 字节");
            println!("时长:     {duration:.3} 秒");
        }
        _ => println!("长度:     未知 (未建立帧索引)"),
    }
    Ok(())
}
