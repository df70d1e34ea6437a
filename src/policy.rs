use std::collections::BTreeSet;

use crate::error::SignaturesError;
use crate::status::{SigStatus, SignatureRecord, TrustLevel};

/// Threshold policy: at least `min_count` distinct keys must have produced a
/// valid signature while trusted at `trust_level` or above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub min_count: usize,
    pub trust_level: TrustLevel,
}

impl Policy {
    /// Distinct key ids whose signatures count towards the threshold. A key
    /// that signed several times is one vote.
    pub fn qualifying_keys(&self, records: &[SignatureRecord]) -> BTreeSet<String> {
        records
            .iter()
            .filter(|r| r.status == SigStatus::Valid && r.trust >= self.trust_level)
            .filter(|r| !r.key.is_empty())
            .map(|r| r.key.to_ascii_uppercase())
            .collect()
    }

    /// Returns the number of qualifying keys, or `PolicyNotMet`.
    pub fn evaluate(
        &self,
        target: &str,
        records: &[SignatureRecord],
    ) -> Result<usize, SignaturesError> {
        let found = self.qualifying_keys(records).len();
        if found < self.min_count {
            return Err(SignaturesError::PolicyNotMet {
                target: target.to_string(),
                found,
                required: self.min_count,
                trust: self.trust_level.to_string(),
            });
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, status: SigStatus, trust: TrustLevel) -> SignatureRecord {
        SignatureRecord {
            key: key.to_string(),
            status,
            trust,
            date: "1709290000".to_string(),
            author: String::new(),
        }
    }

    fn ultimate() -> Policy {
        Policy {
            min_count: 2,
            trust_level: TrustLevel::Ultimate,
        }
    }

    #[test]
    fn same_key_signing_twice_counts_once() {
        let records = vec![
            record("AAAA000011112222", SigStatus::Valid, TrustLevel::Ultimate),
            record("aaaa000011112222", SigStatus::Valid, TrustLevel::Ultimate),
        ];
        let err = ultimate().evaluate("HEAD", &records).unwrap_err();
        match err {
            SignaturesError::PolicyNotMet {
                found, required, ..
            } => {
                assert_eq!(found, 1);
                assert_eq!(required, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn two_distinct_ultimate_keys_pass() {
        let records = vec![
            record("AAAA000011112222", SigStatus::Valid, TrustLevel::Ultimate),
            record("BBBB000011112222", SigStatus::Valid, TrustLevel::Ultimate),
            record("AAAA000011112222", SigStatus::Valid, TrustLevel::Ultimate),
        ];
        assert_eq!(ultimate().evaluate("HEAD", &records).unwrap(), 2);
    }

    #[test]
    fn lower_trust_and_failed_signatures_do_not_count() {
        let records = vec![
            record("AAAA000011112222", SigStatus::Valid, TrustLevel::Ultimate),
            record("BBBB000011112222", SigStatus::Valid, TrustLevel::Fully),
            record("CCCC000011112222", SigStatus::Bad, TrustLevel::Ultimate),
            record("DDDD000011112222", SigStatus::Error, TrustLevel::Unknown),
        ];
        let keys = ultimate().qualifying_keys(&records);
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["AAAA000011112222"]);
        assert!(ultimate().evaluate("HEAD", &records).is_err());
    }

    #[test]
    fn required_tier_is_a_floor() {
        let policy = Policy {
            min_count: 2,
            trust_level: TrustLevel::Fully,
        };
        let records = vec![
            record("AAAA000011112222", SigStatus::Valid, TrustLevel::Ultimate),
            record("BBBB000011112222", SigStatus::Valid, TrustLevel::Fully),
            record("CCCC000011112222", SigStatus::Valid, TrustLevel::Marginal),
        ];
        assert_eq!(policy.evaluate("HEAD", &records).unwrap(), 2);
    }

    #[test]
    fn no_signatures_fails_any_positive_threshold() {
        let policy = Policy {
            min_count: 1,
            trust_level: TrustLevel::Ultimate,
        };
        let err = policy.evaluate("main", &[]).unwrap_err().to_string();
        assert!(err.contains("found 0 distinct ULTIMATE signature(s) on main, 1 required"));
        assert!(err.contains("git signatures import"));
    }
}
