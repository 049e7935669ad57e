use std::fmt;

use serde_json::{json, Value};

use nftsnap_store::{format_address, Address, U256};

/// Textual form used in reports. Addresses print lowercase so reports diff
/// cleanly against snapshot files.
pub trait Rendered {
    fn rendered(&self) -> String;
}

impl Rendered for Address {
    fn rendered(&self) -> String {
        format_address(self)
    }
}

impl Rendered for U256 {
    fn rendered(&self) -> String {
        self.to_string()
    }
}

impl Rendered for String {
    fn rendered(&self) -> String {
        self.clone()
    }
}

/// Classification of one checked record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<V> {
    Verified,
    Mismatch { expected: V, actual: V },
    /// The live read failed; says nothing about the ledger state.
    ReadError { reason: String },
}

/// A non-verified record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finding<K, V> {
    pub key: K,
    pub outcome: Outcome<V>,
}

impl<K: fmt::Display, V: Rendered> fmt::Display for Finding<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Verified => write!(f, "verified key={}", self.key),
            Outcome::Mismatch { expected, actual } => write!(
                f,
                "mismatch key={} expected={} actual={}",
                self.key,
                expected.rendered(),
                actual.rendered()
            ),
            Outcome::ReadError { reason } => {
                write!(f, "read_error key={} reason={reason}", self.key)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    Completed,
    /// Stopped early on request; `unchecked` selected records were not read.
    Cancelled { unchecked: usize },
}

/// Aggregate result of one verification pass.
///
/// `findings` holds mismatches and read errors in the order they were
/// checked (ascending key order).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyReport<K, V> {
    pub label: String,
    /// Records in the reference snapshot.
    pub reference_size: usize,
    /// Records chosen for checking (all of them in full mode).
    pub selected: usize,
    pub total_checked: usize,
    pub verified_count: usize,
    pub mismatch_count: usize,
    pub error_count: usize,
    pub findings: Vec<Finding<K, V>>,
    pub completion: Completion,
}

impl<K, V> VerifyReport<K, V> {
    pub fn new(label: impl Into<String>, reference_size: usize, selected: usize) -> Self {
        Self {
            label: label.into(),
            reference_size,
            selected,
            total_checked: 0,
            verified_count: 0,
            mismatch_count: 0,
            error_count: 0,
            findings: Vec::new(),
            completion: Completion::Completed,
        }
    }

    pub fn record(&mut self, key: K, outcome: Outcome<V>) {
        self.total_checked += 1;
        match outcome {
            Outcome::Verified => self.verified_count += 1,
            Outcome::Mismatch { .. } => {
                self.mismatch_count += 1;
                self.findings.push(Finding { key, outcome });
            }
            Outcome::ReadError { .. } => {
                self.error_count += 1;
                self.findings.push(Finding { key, outcome });
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Completed
    }

    /// Completed with every checked record verified.
    pub fn is_clean(&self) -> bool {
        self.is_complete() && self.mismatch_count == 0 && self.error_count == 0
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &Finding<K, V>> {
        self.findings
            .iter()
            .filter(|f| matches!(f.outcome, Outcome::Mismatch { .. }))
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding<K, V>> {
        self.findings
            .iter()
            .filter(|f| matches!(f.outcome, Outcome::ReadError { .. }))
    }
}

impl<K: fmt::Display, V: Rendered> VerifyReport<K, V> {
    /// `key=value` lines for the final summary.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut out = vec![
            format!("verify={}", self.label),
            format!("reference_size={}", self.reference_size),
            format!("selected={}", self.selected),
            format!("total_checked={}", self.total_checked),
            format!("verified_count={}", self.verified_count),
            format!("mismatch_count={}", self.mismatch_count),
            format!("error_count={}", self.error_count),
        ];
        match self.completion {
            Completion::Completed => out.push("completed=true".to_string()),
            Completion::Cancelled { unchecked } => {
                out.push("completed=false".to_string());
                out.push(format!("unchecked={unchecked}"));
            }
        }
        out
    }

    pub fn to_json(&self) -> Value {
        let findings: Vec<Value> = self
            .findings
            .iter()
            .map(|f| match &f.outcome {
                Outcome::Verified => json!({ "key": f.key.to_string(), "outcome": "verified" }),
                Outcome::Mismatch { expected, actual } => json!({
                    "key": f.key.to_string(),
                    "outcome": "mismatch",
                    "expected": expected.rendered(),
                    "actual": actual.rendered(),
                }),
                Outcome::ReadError { reason } => json!({
                    "key": f.key.to_string(),
                    "outcome": "read_error",
                    "reason": reason,
                }),
            })
            .collect();
        let unchecked = match self.completion {
            Completion::Completed => 0,
            Completion::Cancelled { unchecked } => unchecked,
        };
        json!({
            "label": self.label,
            "reference_size": self.reference_size,
            "selected": self.selected,
            "total_checked": self.total_checked,
            "verified_count": self.verified_count,
            "mismatch_count": self.mismatch_count,
            "error_count": self.error_count,
            "completed": self.is_complete(),
            "unchecked": unchecked,
            "findings": findings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nftsnap_store::parse_address;

    #[test]
    fn record_counts_and_keeps_only_findings() {
        let a = parse_address("0x00000000000000000000000000000000000000aa").unwrap();
        let b = parse_address("0x00000000000000000000000000000000000000bb").unwrap();
        let mut r: VerifyReport<U256, Address> = VerifyReport::new("owners", 3, 3);
        r.record(U256::from(1u8), Outcome::Verified);
        r.record(
            U256::from(2u8),
            Outcome::Mismatch {
                expected: a,
                actual: b,
            },
        );
        r.record(
            U256::from(3u8),
            Outcome::ReadError {
                reason: "timeout".to_string(),
            },
        );

        assert_eq!(r.total_checked, 3);
        assert_eq!(
            (r.verified_count, r.mismatch_count, r.error_count),
            (1, 1, 1)
        );
        assert_eq!(r.findings.len(), 2);
        assert_eq!(r.mismatches().count(), 1);
        assert!(!r.is_clean());
        assert_eq!(
            r.findings[0].to_string(),
            "mismatch key=2 expected=0x00000000000000000000000000000000000000aa \
             actual=0x00000000000000000000000000000000000000bb"
        );
    }

    #[test]
    fn cancelled_summary_flags_incomplete() {
        let mut r: VerifyReport<U256, U256> = VerifyReport::new("balances", 10, 10);
        r.completion = Completion::Cancelled { unchecked: 4 };
        let lines = r.summary_lines();
        assert!(lines.contains(&"completed=false".to_string()));
        assert!(lines.contains(&"unchecked=4".to_string()));
        assert_eq!(r.to_json()["completed"], json!(false));
    }
}
