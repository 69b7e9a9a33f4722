//! Multi-format engine. Reads QR, DataMatrix, Code128, EAN and the
//! other symbologies the underlying reader supports.

use rxing::common::HybridBinarizer;
use rxing::{BinaryBitmap, Luma8LuminanceSource, MultiFormatReader, Reader};
use tracing::{debug, trace};

use crate::capture::LumaFrame;
use crate::decode::{DecodeStrategy, DecoderKind, ScanEvent};

#[derive(Default)]
pub struct MultiFormatStrategy {
    reader: MultiFormatReader,
}

impl MultiFormatStrategy {
    pub fn new() -> Self {
        Self {
            reader: MultiFormatReader::default(),
        }
    }
}

impl DecodeStrategy for MultiFormatStrategy {
    fn kind(&self) -> DecoderKind {
        DecoderKind::MultiFormat
    }

    fn decode(&mut self, frame: &LumaFrame) -> Option<ScanEvent> {
        let source = Luma8LuminanceSource::new(frame.data.clone(), frame.width, frame.height);
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));
        match self.reader.decode(&mut bitmap) {
            Ok(result) => {
                debug!(
                    "decoded {:?} from frame {}",
                    result.getBarcodeFormat(),
                    frame.frame_id
                );
                Some(ScanEvent::new(result.getText()))
            }
            Err(e) => {
                trace!("frame {} had no readable code: {e}", frame.frame_id);
                None
            }
        }
    }
}
