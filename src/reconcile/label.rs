//! Printed box label payloads.
//!
//! Labels are JSON objects with short keys to keep the printed code
//! small; older printers emitted long keys, so both spellings parse.
//! Anything that is not a JSON object is treated as a bare box id.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Box numbers print as either a string or a bare number.
fn flexible_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(de)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxLabel {
    #[serde(
        rename = "tn",
        alias = "transactionNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_ref: Option<String>,
    #[serde(
        rename = "bx",
        alias = "boxNumber",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flexible_string"
    )]
    pub box_number: Option<String>,
    #[serde(
        rename = "sku",
        alias = "articleCode",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub article_code: Option<String>,
    #[serde(
        rename = "mt",
        alias = "materialType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub material_type: Option<String>,
    #[serde(
        rename = "de",
        alias = "description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        rename = "bt",
        alias = "batchNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub batch_number: Option<String>,
    #[serde(
        rename = "qt",
        alias = "quantity",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<f64>,
    #[serde(
        rename = "nw",
        alias = "netWeight",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub net_weight: Option<f64>,
    #[serde(
        rename = "gw",
        alias = "grossWeight",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub gross_weight: Option<f64>,
    #[serde(
        rename = "md",
        alias = "mfgDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mfg_date: Option<String>,
    #[serde(
        rename = "ed",
        alias = "expDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub exp_date: Option<String>,
}

impl BoxLabel {
    /// Parses a scanned payload as a label. Returns `None` for payloads
    /// that are not JSON objects; callers then match the raw text as a
    /// box id.
    pub fn parse(payload: &str) -> Option<Self> {
        let trimmed = payload.trim_start();
        if !trimmed.starts_with('{') {
            return None;
        }
        match serde_json::from_str(trimmed) {
            Ok(label) => Some(label),
            Err(e) => {
                debug!("payload looked like JSON but did not parse as a label: {e}");
                None
            }
        }
    }

    /// One-line human description for logs and the CLI.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(bx) = &self.box_number {
            parts.push(format!("box {bx}"));
        }
        if let Some(tn) = &self.transaction_ref {
            parts.push(format!("transfer {tn}"));
        }
        if let Some(sku) = &self.article_code {
            parts.push(format!("sku {sku}"));
        }
        if parts.is_empty() {
            "unlabeled".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_keys() {
        let label = BoxLabel::parse(r#"{"tn":"T-100","bx":"2","sku":"SKU-9","qt":25.0}"#).unwrap();
        assert_eq!(label.transaction_ref.as_deref(), Some("T-100"));
        assert_eq!(label.box_number.as_deref(), Some("2"));
        assert_eq!(label.article_code.as_deref(), Some("SKU-9"));
        assert_eq!(label.quantity, Some(25.0));
    }

    #[test]
    fn test_long_keys() {
        let label = BoxLabel::parse(
            r#"{"transactionNumber":"T-100","boxNumber":"2","batchNumber":"L42"}"#,
        )
        .unwrap();
        assert_eq!(label.transaction_ref.as_deref(), Some("T-100"));
        assert_eq!(label.box_number.as_deref(), Some("2"));
        assert_eq!(label.batch_number.as_deref(), Some("L42"));
    }

    #[test]
    fn test_numeric_box_number() {
        let label = BoxLabel::parse(r#"{"tn":"T-100","bx":3}"#).unwrap();
        assert_eq!(label.box_number.as_deref(), Some("3"));
    }

    #[test]
    fn test_bare_payload_is_not_a_label() {
        assert!(BoxLabel::parse("BOX-0001").is_none());
        assert!(BoxLabel::parse("{not json").is_none());
    }

    #[test]
    fn test_summary() {
        let label = BoxLabel::parse(r#"{"tn":"T-100","bx":"2"}"#).unwrap();
        assert_eq!(label.summary(), "box 2, transfer T-100");
        let empty = BoxLabel::parse("{}").unwrap();
        assert_eq!(empty.summary(), "unlabeled");
    }
}
