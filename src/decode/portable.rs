//! Pure-Rust QR-only engine. Always available; used when the
//! multi-format engine fails its probe or when pinned by configuration.

use tracing::debug;

use crate::capture::LumaFrame;
use crate::decode::{DecodeStrategy, DecoderKind, ScanEvent};

#[derive(Default)]
pub struct PortableQrStrategy;

impl PortableQrStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DecodeStrategy for PortableQrStrategy {
    fn kind(&self) -> DecoderKind {
        DecoderKind::QrOnly
    }

    fn decode(&mut self, frame: &LumaFrame) -> Option<ScanEvent> {
        let img = image::GrayImage::from_raw(frame.width, frame.height, frame.data.clone())?;
        let mut prepared = rqrr::PreparedImage::prepare(img);
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => return Some(ScanEvent::new(content)),
                Err(e) => debug!("QR grid decode failed: {e}"),
            }
        }
        None
    }
}
