//! Tests against the real `librkffplayer.so`.
//!
//! These need a Rockchip board with the vendor media stack installed and are
//! ignored by default:
//!
//! ```bash
//! cargo test -p rk-decoder --test rkcodec_hardware -- --ignored
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use rk_common::{DecoderSettings, NullDisplay, StreamHints, VideoCodec, VideoPacket};
use rk_decoder::rkcodec::RkCodecLibrary;
use rk_decoder::{CodecState, RkCodec};

fn h264_hints() -> StreamHints {
    StreamHints {
        codec: Some(VideoCodec::H264),
        width: 1920,
        height: 1080,
        fps_rate: 24000,
        fps_scale: 1001,
        ..Default::default()
    }
}

#[test]
#[ignore = "requires librkffplayer.so"]
fn library_loads_all_symbols() {
    let lib = RkCodecLibrary::load().expect("vendor codec library should load");
    println!("{lib:?}");
}

#[test]
#[ignore = "requires librkffplayer.so"]
fn open_close_cycle() {
    let codec = RkCodec::new(DecoderSettings::default(), Arc::new(NullDisplay));
    for _ in 0..3 {
        codec.open_decoder(&h264_hints()).expect("open");
        assert_eq!(codec.state(), CodecState::Opened);
        codec.close_decoder();
        assert_eq!(codec.state(), CodecState::Closed);
    }
}

#[test]
#[ignore = "requires librkffplayer.so and RKMC_TEST_H264 (Annex B elementary stream)"]
fn decode_elementary_stream_to_eos() {
    let Ok(path) = std::env::var("RKMC_TEST_H264") else {
        eprintln!("RKMC_TEST_H264 not set; skipping");
        return;
    };
    let data = std::fs::read(path).expect("read test stream");

    let codec = RkCodec::new(DecoderSettings::default(), Arc::new(NullDisplay));
    codec.open_decoder(&h264_hints()).expect("open");

    for (i, chunk) in data.chunks(64 * 1024).enumerate() {
        let pts = i as i64 * 41_708;
        codec
            .decode_video(VideoPacket::new(chunk.to_vec(), Some(pts), None))
            .expect("decode");
    }
    codec.submit_eos().expect("eos");

    let deadline = Instant::now() + Duration::from_secs(10);
    while !codec.is_eos() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }

    let stats = codec.stats();
    println!("{stats:?}");
    assert!(stats.display_events > 0);
    codec.close_decoder();
}
