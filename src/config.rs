//! Persisted scanner settings.
//!
//! Settings live in a single JSON file under the platform config
//! directory. Missing file or unknown fields fall back to defaults so
//! old installs keep working across upgrades.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Decoder backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecodeBackend {
    /// Probe the multi-format engine first, fall back to QR-only.
    #[default]
    Auto,
    /// Multi-format engine (QR, DataMatrix, Code128, EAN).
    MultiFormat,
    /// Pure-Rust QR-only engine.
    QrOnly,
}

impl DecodeBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeBackend::Auto => "auto",
            DecodeBackend::MultiFormat => "multiformat",
            DecodeBackend::QrOnly => "qronly",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DecodeBackend::Auto => "Probe multi-format engine, fall back to QR-only",
            DecodeBackend::MultiFormat => "Multi-format engine (QR, DataMatrix, Code128, EAN)",
            DecodeBackend::QrOnly => "Pure-Rust QR-only engine",
        }
    }

    pub fn all() -> &'static [DecodeBackend] {
        &[
            DecodeBackend::Auto,
            DecodeBackend::MultiFormat,
            DecodeBackend::QrOnly,
        ]
    }
}

impl std::fmt::Display for DecodeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Keep scanning after each accepted code instead of stopping.
    pub continuous: bool,
    /// Suppression window for repeated reads of the same code.
    pub cooldown_ms: u64,
    /// Fraction of the frame (centered) handed to the decoder.
    pub roi_fraction: f32,
    pub decode_backend: DecodeBackend,
    pub camera_index: u32,
    pub capture_width: u32,
    pub capture_height: u32,
    pub capture_fps: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            continuous: false,
            cooldown_ms: 2000,
            roi_fraction: 0.5,
            decode_backend: DecodeBackend::Auto,
            camera_index: 0,
            capture_width: 1280,
            capture_height: 720,
            capture_fps: 30,
        }
    }
}

pub fn file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("boxscan").join("settings.json"))
}

impl Settings {
    pub fn load() -> Result<Self> {
        let Some(path) = file_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings = serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings from {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = file_path() else {
            anyhow::bail!("no config directory on this platform");
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(&path, raw)
            .with_context(|| format!("writing settings to {}", path.display()))?;
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(!s.continuous);
        assert_eq!(s.cooldown_ms, 2000);
        assert_eq!(s.roi_fraction, 0.5);
        assert_eq!(s.decode_backend, DecodeBackend::Auto);
        assert_eq!(s.capture_width, 1280);
        assert_eq!(s.capture_height, 720);
    }

    #[test]
    fn test_backend_serde_names() {
        let json = serde_json::to_string(&DecodeBackend::QrOnly).unwrap();
        assert_eq!(json, "\"qronly\"");
        let back: DecodeBackend = serde_json::from_str("\"multiformat\"").unwrap();
        assert_eq!(back, DecodeBackend::MultiFormat);
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let s: Settings = serde_json::from_str("{\"cooldown_ms\": 500}").unwrap();
        assert_eq!(s.cooldown_ms, 500);
        assert_eq!(s.roi_fraction, 0.5);
        assert_eq!(s.decode_backend, DecodeBackend::Auto);
    }

    #[test]
    fn test_cooldown_duration() {
        let s = Settings {
            cooldown_ms: 1500,
            ..Settings::default()
        };
        assert_eq!(s.cooldown(), Duration::from_millis(1500));
    }
}
