//! Transfer reconciliation.
//!
//! A receiving session loads the list of boxes expected for a transfer,
//! acknowledges them one at a time as codes arrive, and refuses to
//! confirm receipt until every expected box is matched.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ScanError;

pub mod label;

pub use label::BoxLabel;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpectedBox {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gross_weight: Option<f64>,
    #[serde(default)]
    pub matched: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferManifest {
    pub transaction_ref: String,
    pub boxes: Vec<ExpectedBox>,
}

impl TransferManifest {
    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| ScanError::ManifestInvalid(e.to_string()))
    }
}

/// Outcome of acknowledging one scanned payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    Matched { box_id: String },
    /// The box was already matched. State is unchanged.
    AlreadyMatched { box_id: String },
    NoMatch,
}

/// Signed proof that a complete transfer was received.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptConfirmation {
    pub confirmation_id: Uuid,
    pub transaction_ref: String,
    pub confirmed_at: DateTime<Utc>,
    pub box_count: usize,
}

#[derive(Debug, Default)]
pub struct Reconciliation {
    transaction_ref: Option<String>,
    boxes: Vec<ExpectedBox>,
}

impl Reconciliation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the expected set. Match flags always start cleared, even
    /// if the manifest carried stale ones.
    pub fn load_expected(&mut self, manifest: TransferManifest) {
        self.boxes = manifest.boxes;
        for b in &mut self.boxes {
            b.matched = false;
        }
        info!(
            "expecting {} boxes for transfer {}",
            self.boxes.len(),
            manifest.transaction_ref
        );
        self.transaction_ref = Some(manifest.transaction_ref);
    }

    pub fn transaction_ref(&self) -> Option<&str> {
        self.transaction_ref.as_deref()
    }

    pub fn boxes(&self) -> &[ExpectedBox] {
        &self.boxes
    }

    /// Resolves a payload to an expected box and marks it matched.
    ///
    /// Resolution tries the raw payload as a box id, then as a box
    /// number, then parses it as a printed label and matches on the
    /// label's box number. A label naming a different transfer never
    /// matches.
    pub fn acknowledge(&mut self, payload: &str) -> AckOutcome {
        let Some(i) = self.find_box(payload) else {
            debug!("no expected box matches {:?}", payload);
            return AckOutcome::NoMatch;
        };
        let box_id = self.boxes[i].id.clone();
        if self.boxes[i].matched {
            debug!("box {} was already acknowledged", box_id);
            return AckOutcome::AlreadyMatched { box_id };
        }
        self.boxes[i].matched = true;
        info!("box {} acknowledged, {}", box_id, self.progress());
        AckOutcome::Matched { box_id }
    }

    /// Marks every remaining box matched. Returns how many were newly
    /// marked.
    pub fn acknowledge_all(&mut self) -> usize {
        let mut newly = 0;
        for b in &mut self.boxes {
            if !b.matched {
                b.matched = true;
                newly += 1;
            }
        }
        info!("acknowledged all boxes, {}", self.progress());
        newly
    }

    /// Marks every box with the given article code. Returns how many
    /// were newly marked.
    pub fn acknowledge_group(&mut self, article_code: &str) -> usize {
        let mut newly = 0;
        for b in &mut self.boxes {
            if b.article_code.as_deref() == Some(article_code) && !b.matched {
                b.matched = true;
                newly += 1;
            }
        }
        info!(
            "acknowledged {} boxes of {}, {}",
            newly,
            article_code,
            self.progress()
        );
        newly
    }

    pub fn matched_count(&self) -> usize {
        self.boxes.iter().filter(|b| b.matched).count()
    }

    pub fn total_count(&self) -> usize {
        self.boxes.len()
    }

    /// Complete means every expected box is matched. An empty expected
    /// set is never complete.
    pub fn is_complete(&self) -> bool {
        self.total_count() > 0 && self.matched_count() == self.total_count()
    }

    pub fn progress(&self) -> String {
        format!("{}/{}", self.matched_count(), self.total_count())
    }

    /// Issues a receipt confirmation. Refused while any expected box is
    /// unmatched; completeness is enforced here, not in the caller.
    pub fn confirm(&self) -> Result<ReceiptConfirmation, ScanError> {
        if !self.is_complete() {
            return Err(ScanError::ReconcileIncomplete {
                matched: self.matched_count(),
                total: self.total_count(),
            });
        }
        Ok(ReceiptConfirmation {
            confirmation_id: Uuid::new_v4(),
            transaction_ref: self.transaction_ref.clone().unwrap_or_default(),
            confirmed_at: Utc::now(),
            box_count: self.total_count(),
        })
    }

    fn find_box(&self, payload: &str) -> Option<usize> {
        if let Some(i) = self.boxes.iter().position(|b| b.id == payload) {
            return Some(i);
        }
        if let Some(i) = self
            .boxes
            .iter()
            .position(|b| b.box_number.as_deref() == Some(payload))
        {
            return Some(i);
        }
        let label = BoxLabel::parse(payload)?;
        if let (Some(label_tn), Some(tn)) = (&label.transaction_ref, &self.transaction_ref) {
            if label_tn != tn {
                warn!("label is for transfer {label_tn}, this session expects {tn}");
                return None;
            }
        }
        let bx = label.box_number.as_deref()?;
        self.boxes
            .iter()
            .position(|b| b.box_number.as_deref() == Some(bx))
            .or_else(|| self.boxes.iter().position(|b| b.id == bx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> TransferManifest {
        let boxes = [("BOX-1", "1", "SKU-A"), ("BOX-2", "2", "SKU-A"), ("BOX-3", "3", "SKU-B")]
            .iter()
            .map(|(id, number, sku)| ExpectedBox {
                id: id.to_string(),
                box_number: Some(number.to_string()),
                article_code: Some(sku.to_string()),
                ..ExpectedBox::default()
            })
            .collect();
        TransferManifest {
            transaction_ref: "T-100".to_string(),
            boxes,
        }
    }

    #[test]
    fn test_acknowledge_by_id_then_remainder_via_all() {
        let mut rec = Reconciliation::new();
        rec.load_expected(manifest());

        assert_eq!(
            rec.acknowledge("BOX-1"),
            AckOutcome::Matched {
                box_id: "BOX-1".to_string()
            }
        );
        assert_eq!(
            rec.acknowledge("BOX-2"),
            AckOutcome::Matched {
                box_id: "BOX-2".to_string()
            }
        );
        assert_eq!(rec.progress(), "2/3");
        assert!(!rec.is_complete());

        assert_eq!(rec.acknowledge_all(), 1);
        assert!(rec.is_complete());
    }

    #[test]
    fn test_double_acknowledge_is_noop() {
        let mut rec = Reconciliation::new();
        rec.load_expected(manifest());
        rec.acknowledge("BOX-1");
        assert_eq!(
            rec.acknowledge("BOX-1"),
            AckOutcome::AlreadyMatched {
                box_id: "BOX-1".to_string()
            }
        );
        assert_eq!(rec.matched_count(), 1);
    }

    #[test]
    fn test_empty_expected_set_never_complete() {
        let rec = Reconciliation::new();
        assert!(!rec.is_complete());
        match rec.confirm() {
            Err(ScanError::ReconcileIncomplete { matched: 0, total: 0 }) => {}
            other => panic!("expected incomplete error, got {other:?}"),
        }
    }

    #[test]
    fn test_confirm_gated_until_complete() {
        let mut rec = Reconciliation::new();
        rec.load_expected(manifest());
        rec.acknowledge("BOX-1");
        match rec.confirm() {
            Err(ScanError::ReconcileIncomplete { matched: 1, total: 3 }) => {}
            other => panic!("expected incomplete error, got {other:?}"),
        }
        rec.acknowledge_all();
        let receipt = rec.confirm().unwrap();
        assert_eq!(receipt.transaction_ref, "T-100");
        assert_eq!(receipt.box_count, 3);
    }

    #[test]
    fn test_label_payload_resolves_by_box_number() {
        let mut rec = Reconciliation::new();
        rec.load_expected(manifest());
        let outcome = rec.acknowledge(r#"{"tn":"T-100","bx":"2"}"#);
        assert_eq!(
            outcome,
            AckOutcome::Matched {
                box_id: "BOX-2".to_string()
            }
        );
    }

    #[test]
    fn test_label_for_other_transfer_rejected() {
        let mut rec = Reconciliation::new();
        rec.load_expected(manifest());
        let outcome = rec.acknowledge(r#"{"tn":"T-999","bx":"2"}"#);
        assert_eq!(outcome, AckOutcome::NoMatch);
    }

    #[test]
    fn test_group_acknowledge() {
        let mut rec = Reconciliation::new();
        rec.load_expected(manifest());
        assert_eq!(rec.acknowledge_group("SKU-A"), 2);
        assert_eq!(rec.progress(), "2/3");
        assert_eq!(rec.acknowledge_group("SKU-A"), 0);
    }

    #[test]
    fn test_load_clears_stale_match_flags() {
        let mut stale = manifest();
        stale.boxes[0].matched = true;
        let mut rec = Reconciliation::new();
        rec.load_expected(stale);
        assert_eq!(rec.matched_count(), 0);
    }

    #[test]
    fn test_manifest_rejects_bad_json() {
        let path = std::env::temp_dir().join(format!("manifest-{}.json", Uuid::new_v4()));
        std::fs::write(&path, "{not json").unwrap();
        let err = TransferManifest::from_file(&path).unwrap_err();
        assert!(matches!(err, ScanError::ManifestInvalid(_)));
        let _ = std::fs::remove_file(&path);
    }
}
