//! Synthetic frame source for tests and camera-free demos.
//!
//! Emits flat gray frames with a sprinkle of noise at a fixed rate. No
//! code will ever decode from these; they exercise the capture and
//! session plumbing without hardware.

use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::debug;

use crate::capture::{FrameFeed, FrameSource, LumaFrame, ThreadGuard, FRAME_CHANNEL_CAPACITY};
use crate::error::ScanError;

pub struct SyntheticSource {
    width: u32,
    height: u32,
    fps: u32,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("synthetic {}x{} @ {} fps", self.width, self.height, self.fps)
    }

    fn open(self: Box<Self>) -> Result<FrameFeed, ScanError> {
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = std::sync::mpsc::channel();
        let period = Duration::from_millis(1000 / u64::from(self.fps.max(1)));
        let (width, height) = (self.width, self.height);

        let handle = std::thread::Builder::new()
            .name("synthetic-capture".to_string())
            .spawn(move || {
                let mut rng = rand::thread_rng();
                let len = (width * height) as usize;
                loop {
                    match stop_rx.try_recv() {
                        Ok(()) | Err(std::sync::mpsc::TryRecvError::Disconnected) => break,
                        Err(std::sync::mpsc::TryRecvError::Empty) => {}
                    }
                    let mut data = vec![128u8; len];
                    for i in (0..len).step_by(97) {
                        data[i] = rng.gen();
                    }
                    if frame_tx
                        .blocking_send(LumaFrame::new(width, height, data))
                        .is_err()
                    {
                        break;
                    }
                    std::thread::sleep(period);
                }
                debug!("synthetic capture thread exiting");
            })?;

        Ok(FrameFeed::new(frame_rx, ThreadGuard::new(stop_tx, handle)))
    }
}
