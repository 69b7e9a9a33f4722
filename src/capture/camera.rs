//! Physical camera capture via nokhwa.
//!
//! The device is opened inside the capture thread and never crosses a
//! thread boundary. A readiness handshake reports the open result back
//! to the caller before `open` returns.

use std::time::Duration;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::capture::{FrameFeed, FrameSource, LumaFrame, ThreadGuard, FRAME_CHANNEL_CAPACITY};
use crate::config::Settings;
use crate::error::ScanError;

const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Consecutive capture failures tolerated before the stream is declared dead.
const MAX_FRAME_FAILURES: u32 = 30;

pub struct CameraSource {
    index: u32,
    width: u32,
    height: u32,
    fps: u32,
}

impl CameraSource {
    pub fn new(settings: &Settings) -> Self {
        Self {
            index: settings.camera_index,
            width: settings.capture_width,
            height: settings.capture_height,
            fps: settings.capture_fps,
        }
    }
}

impl FrameSource for CameraSource {
    fn describe(&self) -> String {
        format!("camera {}", self.index)
    }

    fn open(self: Box<Self>) -> Result<FrameFeed, ScanError> {
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = std::sync::mpsc::channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                capture_loop(
                    self.index,
                    self.width,
                    self.height,
                    self.fps,
                    frame_tx,
                    stop_rx,
                    ready_tx,
                );
            })?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => Ok(FrameFeed::new(frame_rx, ThreadGuard::new(stop_tx, handle))),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                // Backend is wedged inside the device open; abandon the
                // thread rather than block the caller on a join.
                drop(stop_tx);
                Err(ScanError::CameraUnavailable {
                    detail: "timed out waiting for the camera to start".to_string(),
                })
            }
        }
    }
}

fn capture_loop(
    index: u32,
    width: u32,
    height: u32,
    fps: u32,
    frames: mpsc::Sender<LumaFrame>,
    stop_rx: std::sync::mpsc::Receiver<()>,
    ready_tx: std::sync::mpsc::Sender<Result<(), ScanError>>,
) {
    let mut camera = match open_camera(index, width, height, fps) {
        Ok(cam) => cam,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    if let Err(e) = camera.open_stream() {
        let _ = ready_tx.send(Err(classify_camera_error(&e)));
        return;
    }
    let _ = ready_tx.send(Ok(()));
    info!("camera {} streaming at {}", index, camera.camera_format());

    let mut failures = 0u32;
    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(std::sync::mpsc::TryRecvError::Disconnected) => break,
            Err(std::sync::mpsc::TryRecvError::Empty) => {}
        }
        let raw = match camera.frame() {
            Ok(f) => f,
            Err(e) => {
                failures += 1;
                if failures >= MAX_FRAME_FAILURES {
                    warn!("camera {} stream dead after {} failures: {e}", index, failures);
                    break;
                }
                debug!("camera frame error: {e}");
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
        };
        let rgb = match raw.decode_image::<RgbFormat>() {
            Ok(img) => img,
            Err(e) => {
                debug!("frame conversion error: {e}");
                continue;
            }
        };
        failures = 0;
        let (w, h) = rgb.dimensions();
        if frames.blocking_send(LumaFrame::from_rgb(w, h, rgb.as_raw())).is_err() {
            break;
        }
    }
    let _ = camera.stop_stream();
    debug!("camera {} capture thread exiting", index);
}

/// Tries format requests from most to least specific. Some backends
/// reject MJPEG outright, so a plain YUYV and two wildcard requests
/// follow it.
fn open_camera(index: u32, width: u32, height: u32, fps: u32) -> Result<Camera, ScanError> {
    let formats = [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::MJPEG,
            fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::YUYV,
            fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ];

    let mut last_err = None;
    for requested in &formats {
        match Camera::new(CameraIndex::Index(index), *requested) {
            Ok(cam) => return Ok(cam),
            Err(e) => {
                debug!("camera {} rejected format request: {e}", index);
                last_err = Some(e);
            }
        }
    }
    match last_err {
        Some(e) => Err(classify_camera_error(&e)),
        None => Err(ScanError::CameraUnavailable {
            detail: format!("camera {} accepted no format", index),
        }),
    }
}

/// Maps backend errors onto the scan error taxonomy. nokhwa surfaces OS
/// failures as strings, so classification goes by message content.
fn classify_camera_error(err: &nokhwa::NokhwaError) -> ScanError {
    let text = err.to_string();
    let lowered = text.to_lowercase();
    if lowered.contains("permission") || lowered.contains("access denied") {
        ScanError::PermissionDenied { detail: text }
    } else if lowered.contains("not implemented") || lowered.contains("unsupported") {
        ScanError::BackendUnsupported { detail: text }
    } else {
        ScanError::CameraUnavailable { detail: text }
    }
}

#[derive(Debug, Clone)]
pub struct CameraDevice {
    pub index: u32,
    pub name: String,
    pub description: String,
}

pub fn list_devices() -> Result<Vec<CameraDevice>, ScanError> {
    let cameras = nokhwa::query(ApiBackend::Auto).map_err(|e| classify_camera_error(&e))?;
    let mut devices = Vec::new();
    for (position, info) in cameras.iter().enumerate() {
        let index = match info.index() {
            CameraIndex::Index(n) => *n,
            CameraIndex::String(_) => position as u32,
        };
        devices.push(CameraDevice {
            index,
            name: info.human_name(),
            description: info.description().to_string(),
        });
    }
    Ok(devices)
}
