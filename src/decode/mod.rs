//! Barcode decoding.
//!
//! Two real engines sit behind [`DecodeStrategy`]: a multi-format one
//! and a pure-Rust QR-only fallback. Engine availability is probed once
//! and cached; selection never surfaces an error to the session, it
//! just degrades.

use std::sync::OnceLock;
use std::time::Instant;

use tracing::debug;

use crate::capture::LumaFrame;
use crate::config::DecodeBackend;

pub mod multiformat;
pub mod portable;
pub mod replay;

/// Fraction of the frame (centered, both axes) decoded by default.
pub const DEFAULT_ROI_FRACTION: f32 = 0.5;

/// A successfully decoded code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub value: String,
    pub timestamp: Instant,
}

impl ScanEvent {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            timestamp: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    MultiFormat,
    QrOnly,
    Replay,
}

impl DecoderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecoderKind::MultiFormat => "multi-format",
            DecoderKind::QrOnly => "qr-only",
            DecoderKind::Replay => "replay",
        }
    }
}

/// A decoder that inspects single frames. Stateful engines keep scratch
/// buffers between calls, so `decode` takes `&mut self`.
pub trait DecodeStrategy: Send {
    fn kind(&self) -> DecoderKind;
    fn decode(&mut self, frame: &LumaFrame) -> Option<ScanEvent>;
}

#[derive(Debug, Clone, Copy)]
pub struct DecoderSupport {
    pub multi_format: bool,
}

static DECODER_SUPPORT: OnceLock<DecoderSupport> = OnceLock::new();

/// Which decode engines work in this environment. Probed on first call,
/// cached for the process lifetime.
pub fn supported_backends() -> DecoderSupport {
    *DECODER_SUPPORT.get_or_init(probe_backends)
}

fn probe_backends() -> DecoderSupport {
    let probe = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut engine = multiformat::MultiFormatStrategy::new();
        let blank = LumaFrame::new(32, 32, vec![255; 32 * 32]);
        let _ = engine.decode(&blank);
    }));
    let multi_format = probe.is_ok();
    if multi_format {
        debug!("multi-format decode engine available");
    } else {
        debug!("multi-format engine failed probe, QR-only fallback active");
    }
    DecoderSupport { multi_format }
}

/// Picks a decode engine for the requested backend. `Auto` consults the
/// capability probe and falls back silently.
pub fn select_strategy(backend: DecodeBackend) -> Box<dyn DecodeStrategy> {
    match backend {
        DecodeBackend::MultiFormat => Box::new(multiformat::MultiFormatStrategy::new()),
        DecodeBackend::QrOnly => Box::new(portable::PortableQrStrategy::new()),
        DecodeBackend::Auto => {
            if supported_backends().multi_format {
                Box::new(multiformat::MultiFormatStrategy::new())
            } else {
                Box::new(portable::PortableQrStrategy::new())
            }
        }
    }
}

/// Crops the centered region covering `fraction` of each axis. The crop
/// keeps the source frame id and capture time so downstream logging
/// still refers to the original frame.
pub fn roi_crop(frame: &LumaFrame, fraction: f32) -> LumaFrame {
    let fraction = fraction.clamp(0.1, 1.0);
    let roi_w = ((frame.width as f32 * fraction).round() as u32).max(1);
    let roi_h = ((frame.height as f32 * fraction).round() as u32).max(1);
    let x0 = (frame.width - roi_w) / 2;
    let y0 = (frame.height - roi_h) / 2;

    let mut data = Vec::with_capacity((roi_w * roi_h) as usize);
    for y in y0..y0 + roi_h {
        let start = (y * frame.width + x0) as usize;
        data.extend_from_slice(&frame.data[start..start + roi_w as usize]);
    }
    LumaFrame {
        width: roi_w,
        height: roi_h,
        data,
        frame_id: frame.frame_id,
        captured_at: frame.captured_at,
    }
}
