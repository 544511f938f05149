//! `decode` subcommand: feed a file to the hardware codec in fixed-size
//! chunks, signal end of stream and wait for the last picture.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use clap::Args;
use tracing::{info, warn};

use rk_common::{
    CodecError, DecoderSettings, DisplayNegotiator, NullDisplay, StreamHints, VideoCodec,
    VideoPacket,
};
use rk_decoder::fake::{FakeBinding, FakeLoader};
use rk_decoder::{DecodeStatus, RkCodec, MAX_QUEUED_FRAMES};
use rk_display::{DisplayConfig, SysfsDisplay, DISPLAY_CLASS_ROOT};

const EOS_POLL: Duration = Duration::from_millis(20);
const HOLD_POLL: Duration = Duration::from_millis(2);

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Elementary stream to decode
    #[arg(short, long)]
    input: PathBuf,

    /// Codec name (h264, hevc, mpeg2, mpeg4, vc1, vp8, vp9)
    #[arg(long, default_value = "h264")]
    codec: String,

    #[arg(long, default_value = "1920")]
    width: u32,

    #[arg(long, default_value = "1080")]
    height: u32,

    /// Frame rate numerator
    #[arg(long, default_value = "24000")]
    fps_rate: u32,

    /// Frame rate denominator
    #[arg(long, default_value = "1001")]
    fps_scale: u32,

    /// Bytes per packet handed to the codec
    #[arg(long, default_value = "65536")]
    chunk: usize,

    /// Demuxer stereo hint (left_right, top_bottom, block_lr, ...)
    #[arg(long)]
    stereo: Option<String>,

    /// sysfs display class directory; no display is driven when it has no
    /// HDMI node
    #[arg(long, default_value = DISPLAY_CLASS_ROOT)]
    sysfs_root: PathBuf,

    /// Seconds to wait for the codec to drain after end of stream
    #[arg(long, default_value = "10")]
    drain_timeout: u64,

    /// Run against an in-process stand-in instead of the vendor library
    #[arg(long)]
    dry_run: bool,
}

impl DecodeArgs {
    fn hints(&self) -> anyhow::Result<StreamHints> {
        let codec = VideoCodec::from_name(&self.codec)
            .ok_or_else(|| anyhow!("Unknown codec name: {}", self.codec))?;
        Ok(StreamHints {
            codec: Some(codec),
            filename: self.input.display().to_string(),
            fps_rate: self.fps_rate,
            fps_scale: self.fps_scale,
            width: self.width,
            height: self.height,
            stereo_mode: self.stereo.clone().unwrap_or_default(),
            ..Default::default()
        })
    }

    /// Duration of one packet in microseconds, assuming one frame per packet.
    fn frame_duration_us(&self) -> i64 {
        if self.fps_rate == 0 {
            return 0;
        }
        1_000_000 * i64::from(self.fps_scale) / i64::from(self.fps_rate)
    }
}

fn open_display(root: &Path) -> Arc<dyn DisplayNegotiator> {
    if !SysfsDisplay::is_compatible(root) {
        info!(root = %root.display(), "No HDMI node; display negotiation disabled");
        return Arc::new(NullDisplay);
    }
    match SysfsDisplay::open(DisplayConfig {
        root: root.to_path_buf(),
        ..Default::default()
    }) {
        Ok(display) => Arc::new(display),
        Err(e) => {
            warn!(error = %e, "Could not open HDMI display");
            Arc::new(NullDisplay)
        }
    }
}

pub fn run(settings: DecoderSettings, args: DecodeArgs) -> anyhow::Result<()> {
    if args.chunk == 0 {
        bail!("--chunk must be greater than zero");
    }
    let hints = args.hints()?;
    let data = fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let display = open_display(&args.sysfs_root);
    let codec = if args.dry_run {
        info!("Dry run: decoding against the in-process stand-in");
        let loader = FakeLoader::new(Arc::new(FakeBinding::echoing()));
        RkCodec::with_loader(settings, Box::new(loader), display)
    } else {
        RkCodec::new(settings, display)
    };

    codec.open_decoder(&hints).context("Failed to open hardware decoder")?;
    if let Some(stream) = codec.stream_info() {
        info!(
            codec = stream.codec.display_name(),
            width = stream.width,
            height = stream.height,
            fps = stream.fps(),
            stereo = ?stream.stereo,
            "Decoder opened"
        );
    }

    let step = args.frame_duration_us();
    let started = Instant::now();
    for (i, chunk) in data.chunks(args.chunk).enumerate() {
        let pts = i as i64 * step;
        match codec.decode_video(VideoPacket::new(chunk.to_vec(), Some(pts), None)) {
            Ok(DecodeStatus::Picture) => {
                while codec.queued_frames() >= MAX_QUEUED_FRAMES {
                    thread::sleep(HOLD_POLL);
                }
            }
            Ok(_) => {}
            Err(e @ CodecError::Protocol { .. }) => warn!(packet = i, error = %e, "Write failed"),
            Err(e) => {
                codec.close_decoder();
                return Err(e).context("Decoding stopped");
            }
        }
    }
    codec.submit_eos().context("Failed to signal end of stream")?;

    let deadline = Instant::now() + Duration::from_secs(args.drain_timeout);
    while !codec.is_eos() && Instant::now() < deadline {
        thread::sleep(EOS_POLL);
    }
    let drained = codec.is_eos();
    if !drained {
        warn!(timeout_s = args.drain_timeout, "Codec did not report end of stream");
    }

    let stats = codec.stats();
    let last = codec.display_info();
    codec.close_decoder();

    println!("input:            {} ({} bytes)", args.input.display(), data.len());
    println!("elapsed:          {:.2?}", started.elapsed());
    println!("frames written:   {}", stats.frames_written);
    println!("pictures:         {}", stats.pictures);
    println!("write errors:     {}", stats.write_errors);
    println!("display events:   {}", stats.display_events);
    println!("dropped events:   {}", stats.dropped_events);
    println!("sync corrections: {}", stats.sync_corrections);
    println!("record gaps:      {}", stats.record_gaps);
    println!("last pts:         {} (record {})", last.pts, last.record);
    println!("end of stream:    {}", if drained { "reached" } else { "timed out" });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        decode: DecodeArgs,
    }

    fn parse(extra: &[&str]) -> DecodeArgs {
        let mut argv = vec!["rkmc-helper", "--input", "clip.264"];
        argv.extend_from_slice(extra);
        Cli::parse_from(argv).decode
    }

    #[test]
    fn default_hints() {
        let args = parse(&[]);
        let hints = args.hints().unwrap();
        assert_eq!(hints.codec, Some(VideoCodec::H264));
        assert_eq!((hints.width, hints.height), (1920, 1080));
        assert_eq!(args.frame_duration_us(), 41_708);
    }

    #[test]
    fn stereo_hint_and_codec_name() {
        let args = parse(&["--codec", "hevc", "--stereo", "block_lr"]);
        let hints = args.hints().unwrap();
        assert_eq!(hints.codec, Some(VideoCodec::Hevc));
        assert_eq!(hints.stereo_mode, "block_lr");

        assert!(parse(&["--codec", "theora"]).hints().is_err());
    }

    #[test]
    fn zero_rate_has_no_step() {
        assert_eq!(parse(&["--fps-rate", "0"]).frame_duration_us(), 0);
    }

    #[test]
    fn dry_run_reaches_eos() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.264");
        fs::write(&input, vec![0u8; 10_000]).unwrap();

        let args = DecodeArgs {
            input,
            chunk: 1_000,
            sysfs_root: dir.path().to_path_buf(),
            dry_run: true,
            drain_timeout: 5,
            ..parse(&[])
        };
        run(DecoderSettings::default(), args).unwrap();
    }
}
