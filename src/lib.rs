//! QR box scanning and transfer reconciliation for warehouse receiving.
//!
//! The pipeline: a [`capture::FrameSource`] produces grayscale frames, a
//! [`decode::DecodeStrategy`] reads codes out of a centered region, the
//! [`scan::ScanController`] filters duplicate reads and delivers
//! accepted codes, and [`reconcile::Reconciliation`] checks them off
//! against the transfer's expected boxes until the receipt can be
//! confirmed.

pub mod capture;
pub mod config;
pub mod decode;
pub mod error;
pub mod reconcile;
pub mod scan;

pub use capture::{FrameSource, LumaFrame};
pub use error::ScanError;
pub use scan::{
    new_seen, ScanConfig, ScanController, ScanMode, ScanUpdate, SessionState, SharedSeen,
};
