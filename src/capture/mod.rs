//! Frame acquisition.
//!
//! A [`FrameSource`] opens into a [`FrameFeed`]: a bounded channel fed by
//! a dedicated capture thread. The channel stays shallow so a slow
//! consumer reads recent frames, not a backlog.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ScanError;

#[cfg(feature = "camera")]
pub mod camera;
pub mod synthetic;

/// Frames buffered between the capture thread and the session.
pub(crate) const FRAME_CHANNEL_CAPACITY: usize = 4;

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// A single grayscale frame. One byte per pixel, row-major.
#[derive(Debug, Clone)]
pub struct LumaFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub frame_id: u64,
    pub captured_at: Instant,
}

impl LumaFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
            frame_id: NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed),
            captured_at: Instant::now(),
        }
    }

    /// Converts packed RGB to luma with integer BT.601 weights.
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> Self {
        let mut data = Vec::with_capacity((width * height) as usize);
        for px in rgb.chunks_exact(3) {
            let luma = (px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000;
            data.push(luma as u8);
        }
        Self::new(width, height, data)
    }
}

/// Something that can produce a live stream of frames.
///
/// `open` blocks until the underlying device is streaming (or has
/// definitively failed), so call it off the async runtime.
pub trait FrameSource: Send {
    fn describe(&self) -> String;
    fn open(self: Box<Self>) -> Result<FrameFeed, ScanError>;
}

/// Owns the capture thread. Signals stop, then joins.
pub(crate) struct ThreadGuard {
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl ThreadGuard {
    pub(crate) fn new(
        stop_tx: std::sync::mpsc::Sender<()>,
        thread: std::thread::JoinHandle<()>,
    ) -> Self {
        Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }
    }

    fn close(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                debug!("capture thread panicked during shutdown");
            }
        }
    }
}

/// Live frame stream plus ownership of the thread producing it.
pub struct FrameFeed {
    frames: mpsc::Receiver<LumaFrame>,
    guard: ThreadGuard,
}

impl FrameFeed {
    pub(crate) fn new(frames: mpsc::Receiver<LumaFrame>, guard: ThreadGuard) -> Self {
        Self { frames, guard }
    }

    /// Waits for a frame, then drains the channel and returns the newest
    /// one. `None` once the capture thread has exited.
    pub async fn latest(&mut self) -> Option<LumaFrame> {
        let mut frame = self.frames.recv().await?;
        while let Ok(newer) = self.frames.try_recv() {
            frame = newer;
        }
        Some(frame)
    }

    /// Stops the capture thread and waits for it to exit. The channel is
    /// closed first so a producer parked on a full channel wakes up.
    pub fn close(&mut self) {
        self.frames.close();
        self.guard.close();
    }
}

impl Drop for FrameFeed {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_bt601() {
        let rgb = [
            255u8, 255, 255, // white
            255, 0, 0, // red
            0, 255, 0, // green
            0, 0, 255, // blue
        ];
        let frame = LumaFrame::from_rgb(4, 1, &rgb);
        assert_eq!(frame.data, vec![255, 76, 149, 29]);
    }

    #[test]
    fn test_frame_ids_monotonic() {
        let a = LumaFrame::new(2, 2, vec![0; 4]);
        let b = LumaFrame::new(2, 2, vec![0; 4]);
        assert!(b.frame_id > a.frame_id);
    }
}
