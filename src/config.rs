use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::{ColumnMapping, Field};
use crate::transform::{signature_bytes, SignatureOverhead};
use crate::Scenario;

/// Byte size of one signature in the measured deployment.
pub const DEFAULT_SIGNATURE_SIZE: u64 = 71;

/// Signatures every receipt event is normalized to for comparison.
pub const DEFAULT_TARGET_SIGNATURES: u64 = 3;

/// Parameters of one reporting run.
///
/// Every field has a default, so an experiment file only needs the values it
/// changes:
///
/// ```json
/// { "signature_size": 64, "columns": { "total_proof_byte_size": ["rawProofSize"] } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub signature_size: u64,
    pub target_signatures: u64,
    /// Signature counts compared by the signatures view.
    pub signature_counts: Vec<u64>,
    /// Header overrides, replacing the default aliases of each listed field.
    pub columns: BTreeMap<Field, Vec<String>>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            signature_size: DEFAULT_SIGNATURE_SIZE,
            target_signatures: DEFAULT_TARGET_SIGNATURES,
            signature_counts: vec![2, 4],
            columns: BTreeMap::new(),
        }
    }
}

impl ReportConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn column_mapping(&self) -> ColumnMapping {
        self.columns
            .iter()
            .fold(ColumnMapping::default(), |mapping, (field, headers)| {
                mapping.with_override(*field, headers.clone())
            })
    }

    /// Fixed signature bytes every normalized scenario is charged.
    pub fn target_overhead(&self) -> Result<u64> {
        signature_bytes(self.signature_size, self.target_signatures)
    }

    pub fn overhead_for(&self, scenario: Scenario) -> Result<SignatureOverhead> {
        if scenario.normalizes_signatures() {
            self.target_overhead().map(SignatureOverhead::Fixed)
        } else {
            Ok(SignatureOverhead::Measured)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_measured_deployment() {
        let cfg = ReportConfig::default();
        assert_eq!(cfg.target_overhead().unwrap(), 213);
        assert_eq!(cfg.overhead_for(Scenario::Issued).unwrap(), SignatureOverhead::Measured);
        assert_eq!(cfg.overhead_for(Scenario::Loaned).unwrap(), SignatureOverhead::Fixed(213));
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let cfg = ReportConfig::from_json_str(r#"{ "signature_size": 64 }"#).unwrap();
        assert_eq!(cfg.signature_size, 64);
        assert_eq!(cfg.target_signatures, DEFAULT_TARGET_SIGNATURES);
        assert_eq!(cfg.signature_counts, vec![2, 4]);
    }

    #[test]
    fn test_column_overrides_reach_mapping() {
        let cfg = ReportConfig::from_json_str(
            r#"{ "columns": { "total_proof_byte_size": ["rawProofSize"] } }"#,
        )
        .unwrap();
        let mapping = cfg.column_mapping();
        assert_eq!(mapping.aliases(Field::TotalProofByteSize), ["rawProofSize".to_string()]);
        assert_eq!(mapping.aliases(Field::SignatureCount), ["nSignatures".to_string()]);
    }

    #[test]
    fn test_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "target_signatures": 4, "signature_counts": [1, 2] }}"#).unwrap();
        let cfg = ReportConfig::from_json_file(file.path()).unwrap();
        assert_eq!(cfg.target_overhead().unwrap(), 284);
        assert_eq!(cfg.signature_counts, vec![1, 2]);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = ReportConfig::from_json_str("{ signature_size: }").unwrap_err();
        assert!(matches!(err, crate::ReportError::Config(_)));
    }

    #[test]
    fn test_overflowing_target_overhead_is_an_error() {
        let cfg = ReportConfig {
            signature_size: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(cfg.target_overhead(), Err(crate::ReportError::Overflow(_))));
        assert!(cfg.overhead_for(Scenario::Transferred).is_err());
        // Measured overhead never multiplies.
        assert_eq!(cfg.overhead_for(Scenario::Issued).unwrap(), SignatureOverhead::Measured);
    }
}
