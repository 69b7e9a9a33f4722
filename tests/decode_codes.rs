//! Real decode paths: QR symbols rendered into synthetic frames and
//! read back through both engines, including the centered crop.

use boxscan::capture::LumaFrame;
use boxscan::config::DecodeBackend;
use boxscan::decode::{
    multiformat::MultiFormatStrategy, portable::PortableQrStrategy, roi_crop, select_strategy,
    DecodeStrategy, DecoderKind,
};
use boxscan::reconcile::BoxLabel;
use qrcode::{Color, QrCode};

const SCALE: u32 = 4;

/// Renders `payload` as a QR symbol centered on a gray canvas, with a
/// white quiet zone around the symbol.
fn frame_with_qr(payload: &str, canvas_w: u32, canvas_h: u32) -> LumaFrame {
    let code = QrCode::new(payload.as_bytes()).unwrap();
    let modules = code.to_colors();
    let side = code.width() as u32;
    let qr_px = side * SCALE;
    assert!(qr_px < canvas_w && qr_px < canvas_h, "canvas too small");

    let mut data = vec![200u8; (canvas_w * canvas_h) as usize];
    let x0 = (canvas_w - qr_px) / 2;
    let y0 = (canvas_h - qr_px) / 2;

    let quiet = 4 * SCALE;
    for y in y0.saturating_sub(quiet)..(y0 + qr_px + quiet).min(canvas_h) {
        for x in x0.saturating_sub(quiet)..(x0 + qr_px + quiet).min(canvas_w) {
            data[(y * canvas_w + x) as usize] = 255;
        }
    }
    for (i, color) in modules.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let mx = i as u32 % side;
        let my = i as u32 / side;
        for dy in 0..SCALE {
            for dx in 0..SCALE {
                let x = x0 + mx * SCALE + dx;
                let y = y0 + my * SCALE + dy;
                data[(y * canvas_w + x) as usize] = 0;
            }
        }
    }
    LumaFrame::new(canvas_w, canvas_h, data)
}

#[test]
fn test_portable_engine_reads_qr_through_roi() {
    let frame = frame_with_qr("BOX-0001", 640, 480);
    let roi = roi_crop(&frame, 0.5);
    let event = PortableQrStrategy::new().decode(&roi).unwrap();
    assert_eq!(event.value, "BOX-0001");
}

#[test]
fn test_multiformat_engine_reads_qr_through_roi() {
    let frame = frame_with_qr("BOX-0001", 640, 480);
    let roi = roi_crop(&frame, 0.5);
    let event = MultiFormatStrategy::new().decode(&roi).unwrap();
    assert_eq!(event.value, "BOX-0001");
}

#[test]
fn test_blank_frame_decodes_nothing() {
    let blank = LumaFrame::new(320, 240, vec![200; 320 * 240]);
    assert!(PortableQrStrategy::new().decode(&blank).is_none());
    assert!(MultiFormatStrategy::new().decode(&blank).is_none());
}

#[test]
fn test_auto_selection_prefers_multiformat() {
    let strategy = select_strategy(DecodeBackend::Auto);
    assert_eq!(strategy.kind(), DecoderKind::MultiFormat);
}

#[test]
fn test_label_payload_survives_decode() {
    let payload = r#"{"tn":"T-100","bx":"2","sku":"SKU-9"}"#;
    let frame = frame_with_qr(payload, 640, 480);
    let roi = roi_crop(&frame, 0.5);
    let event = PortableQrStrategy::new().decode(&roi).unwrap();
    let label = BoxLabel::parse(&event.value).unwrap();
    assert_eq!(label.transaction_ref.as_deref(), Some("T-100"));
    assert_eq!(label.box_number.as_deref(), Some("2"));
}
