//! Parser for GnuPG's `--status-fd` protocol.
//!
//! Each verification run prints lines of the form `[GNUPG:] KEYWORD args...`.
//! The protocol is loosely specified and grows new keywords over time, so the
//! parser only reacts to the keywords it knows and ignores everything else.

use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

pub const STATUS_PREFIX: &str = "[GNUPG:]";

/// Outcome of verifying one signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SigStatus {
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "VALIDSIG")]
    Valid,
    #[serde(rename = "BADSIG")]
    Bad,
    #[serde(rename = "ERRSIG")]
    Error,
    #[serde(rename = "EXPSIG")]
    ExpiredSig,
    #[serde(rename = "EXPKEYSIG")]
    ExpiredKey,
    #[serde(rename = "REVKEYSIG")]
    RevokedKey,
}

impl SigStatus {
    pub fn keyword(self) -> &'static str {
        match self {
            SigStatus::Unknown => "UNKNOWN",
            SigStatus::Valid => "VALIDSIG",
            SigStatus::Bad => "BADSIG",
            SigStatus::Error => "ERRSIG",
            SigStatus::ExpiredSig => "EXPSIG",
            SigStatus::ExpiredKey => "EXPKEYSIG",
            SigStatus::RevokedKey => "REVKEYSIG",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            SigStatus::Unknown => "unknown",
            SigStatus::Valid => "valid signature",
            SigStatus::Bad => "bad signature",
            SigStatus::Error => "unverifiable",
            SigStatus::ExpiredSig => "expired signature",
            SigStatus::ExpiredKey => "expired key",
            SigStatus::RevokedKey => "revoked key",
        }
    }

    fn from_failure_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "BADSIG" => Some(SigStatus::Bad),
            "EXPSIG" => Some(SigStatus::ExpiredSig),
            "EXPKEYSIG" => Some(SigStatus::ExpiredKey),
            "REVKEYSIG" => Some(SigStatus::RevokedKey),
            _ => None,
        }
    }
}

impl fmt::Display for SigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Owner trust of the signing key, as reported by the `TRUST_*` keywords.
/// Ordered from least to most trusted.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum TrustLevel {
    Never,
    #[default]
    Unknown,
    Undefined,
    Marginal,
    Fully,
    Ultimate,
}

impl TrustLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            TrustLevel::Never => "NEVER",
            TrustLevel::Unknown => "UNKNOWN",
            TrustLevel::Undefined => "UNDEFINED",
            TrustLevel::Marginal => "MARGINAL",
            TrustLevel::Fully => "FULLY",
            TrustLevel::Ultimate => "ULTIMATE",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let tier = upper.strip_prefix("TRUST_").unwrap_or(&upper);
        match tier {
            "NEVER" => Ok(TrustLevel::Never),
            "UNKNOWN" => Ok(TrustLevel::Unknown),
            "UNDEFINED" => Ok(TrustLevel::Undefined),
            "MARGINAL" => Ok(TrustLevel::Marginal),
            "FULLY" | "FULL" => Ok(TrustLevel::Fully),
            "ULTIMATE" => Ok(TrustLevel::Ultimate),
            _ => Err(format!(
                "unknown trust level `{s}` (expected never, undefined, marginal, fully or ultimate)"
            )),
        }
    }
}

impl TryFrom<String> for TrustLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignatureRecord {
    pub key: String,
    pub status: SigStatus,
    pub trust: TrustLevel,
    /// Signature time as reported by gpg, usually seconds since the epoch.
    pub date: String,
    pub author: String,
}

impl SignatureRecord {
    /// Pipe-delimited `key|status|trust|date|author` form used by `show --raw`.
    /// Fields gpg never reported read `unknown`.
    pub fn to_raw(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            or_unknown(&self.key),
            self.status,
            self.trust,
            or_unknown(&self.date),
            or_unknown(&self.author)
        )
    }

    /// The signature date rendered as UTC, or the raw value when gpg reported
    /// something other than an epoch timestamp.
    pub fn display_date(&self) -> String {
        self.date
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| self.date.clone())
    }
}

/// Parses the status output of a single `gpg --verify` run.
pub fn parse_status(output: &str) -> SignatureRecord {
    let mut record = SignatureRecord::default();
    let mut display_name: Option<String> = None;
    let mut signer_uid: Option<String> = None;

    for line in output.lines() {
        let mut fields = line.split_whitespace();
        if fields.next() != Some(STATUS_PREFIX) {
            continue;
        }
        let Some(keyword) = fields.next() else {
            continue;
        };
        let args: Vec<&str> = fields.collect();

        match keyword {
            "GOODSIG" => {
                if let Some(key) = args.first() {
                    record.key = key.to_string();
                }
                display_name = non_empty(tail_after_fields(line, 3));
            }
            "VALIDSIG" => {
                record.status = SigStatus::Valid;
                if let Some(ts) = args.get(2) {
                    record.date = ts.to_string();
                }
                if record.key.is_empty() {
                    if let Some(fpr) = args.first() {
                        record.key = long_key_id(fpr).to_string();
                    }
                }
            }
            "ERRSIG" => {
                record.status = SigStatus::Error;
                if let Some(key) = args.first() {
                    record.key = key.to_string();
                }
                if let Some(ts) = args.get(4) {
                    record.date = ts.to_string();
                }
            }
            "NEWSIG" => {
                signer_uid = args.first().map(|s| s.to_string());
            }
            kw if kw.starts_with("TRUST_") => {
                if let Ok(trust) = kw.parse::<TrustLevel>() {
                    record.trust = trust;
                }
            }
            kw => {
                if let Some(status) = SigStatus::from_failure_keyword(kw) {
                    record.status = status;
                    if let Some(key) = args.first() {
                        record.key = key.to_string();
                    }
                    if let Some(name) = non_empty(tail_after_fields(line, 3)) {
                        display_name = Some(name);
                    }
                }
            }
        }
    }

    record.author = display_name.or(signer_uid).unwrap_or_default();
    record
}

/// Returns what follows the first `n` whitespace separated fields, keeping
/// the inner spacing of the remainder intact.
fn tail_after_fields(line: &str, n: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..n {
        match rest.find(char::is_whitespace) {
            Some(i) => rest = rest[i..].trim_start(),
            None => return "",
        }
    }
    rest.trim_end()
}

fn or_unknown(field: &str) -> &str {
    if field.is_empty() {
        "unknown"
    } else {
        field
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn long_key_id(fingerprint: &str) -> &str {
    let len = fingerprint.len();
    if len > 16 && fingerprint.is_ascii() {
        &fingerprint[len - 16..]
    } else {
        fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "\
[GNUPG:] NEWSIG ci@example.com
[GNUPG:] KEY_CONSIDERED 0123456789ABCDEF0123456789ABCDEF01234567 0
[GNUPG:] SIG_ID kWxTUQ4YxPF0oOVLIn3q4cjyl3g 2024-03-01 1709290000
[GNUPG:] GOODSIG 89ABCDEF01234567 Jane Q. Signer <jane@example.com>
[GNUPG:] VALIDSIG 0123456789ABCDEF0123456789ABCDEF01234567 2024-03-01 1709290000 0 4 0 22 8 00 0123456789ABCDEF0123456789ABCDEF01234567
[GNUPG:] TRUST_ULTIMATE 0 pgp
";

    #[test]
    fn good_signature_yields_full_record() {
        let rec = parse_status(GOOD);
        assert_eq!(rec.key, "89ABCDEF01234567");
        assert_eq!(rec.status, SigStatus::Valid);
        assert_eq!(rec.trust, TrustLevel::Ultimate);
        assert_eq!(rec.date, "1709290000");
        assert_eq!(rec.author, "Jane Q. Signer <jane@example.com>");
        assert_eq!(
            rec.to_raw(),
            "89ABCDEF01234567|VALIDSIG|ULTIMATE|1709290000|Jane Q. Signer <jane@example.com>"
        );
    }

    #[test]
    fn no_status_lines_leaves_everything_unknown() {
        let rec = parse_status("gpg: Signature made somewhere\nnot a status line\n");
        assert_eq!(rec, SignatureRecord::default());
        assert_eq!(rec.to_raw(), "unknown|UNKNOWN|UNKNOWN|unknown|unknown");
    }

    #[test]
    fn unknown_keywords_are_ignored() {
        let rec = parse_status(
            "[GNUPG:] PLAINTEXT 74 0\n[GNUPG:] SOMETHING_NEW a b c\n[GNUPG:]\n",
        );
        assert_eq!(rec.status, SigStatus::Unknown);
    }

    #[test]
    fn errsig_captures_key_and_timestamp() {
        let rec = parse_status(
            "[GNUPG:] ERRSIG 1122334455667788 1 8 00 1709290000 9 -\n[GNUPG:] NO_PUBKEY 1122334455667788\n",
        );
        assert_eq!(rec.status, SigStatus::Error);
        assert_eq!(rec.key, "1122334455667788");
        assert_eq!(rec.date, "1709290000");
        assert_eq!(rec.trust, TrustLevel::Unknown);
        assert_eq!(rec.to_raw(), "1122334455667788|ERRSIG|UNKNOWN|1709290000|unknown");
    }

    #[test]
    fn badsig_sets_status_and_signer() {
        let rec = parse_status("[GNUPG:] BADSIG 1122334455667788 Mallory <m@example.com>\n");
        assert_eq!(rec.status, SigStatus::Bad);
        assert_eq!(rec.key, "1122334455667788");
        assert_eq!(rec.author, "Mallory <m@example.com>");
    }

    #[test]
    fn expired_and_revoked_keywords_map_to_their_status() {
        for (kw, expected) in [
            ("EXPSIG", SigStatus::ExpiredSig),
            ("EXPKEYSIG", SigStatus::ExpiredKey),
            ("REVKEYSIG", SigStatus::RevokedKey),
        ] {
            let rec = parse_status(&format!("[GNUPG:] {kw} AABBCCDDEEFF0011 Old Key\n"));
            assert_eq!(rec.status, expected, "{kw}");
            assert_eq!(rec.key, "AABBCCDDEEFF0011");
            assert_eq!(rec.status.keyword(), kw);
        }
    }

    #[test]
    fn validsig_after_failure_keyword_wins() {
        let rec = parse_status(
            "[GNUPG:] EXPKEYSIG 89ABCDEF01234567 Jane <jane@example.com>\n\
             [GNUPG:] VALIDSIG 0123456789ABCDEF0123456789ABCDEF01234567 2024-03-02 1709380000 0 4 0 22 8 00 0123456789ABCDEF0123456789ABCDEF01234567\n",
        );
        assert_eq!(rec.status, SigStatus::Valid);
        assert_eq!(rec.date, "1709380000");
        assert_eq!(rec.key, "89ABCDEF01234567");
    }

    #[test]
    fn validsig_without_goodsig_derives_long_key_id() {
        let rec = parse_status(
            "[GNUPG:] VALIDSIG 0123456789ABCDEF0123456789ABCDEF01234567 2024-03-01 1709290000 0 4 0 22 8 00 X\n",
        );
        assert_eq!(rec.key, "89ABCDEF01234567");
    }

    #[test]
    fn trust_keywords_strip_prefix() {
        for (kw, expected) in [
            ("TRUST_NEVER", TrustLevel::Never),
            ("TRUST_UNDEFINED", TrustLevel::Undefined),
            ("TRUST_MARGINAL", TrustLevel::Marginal),
            ("TRUST_FULLY", TrustLevel::Fully),
            ("TRUST_ULTIMATE", TrustLevel::Ultimate),
        ] {
            let rec = parse_status(&format!("[GNUPG:] {kw} 0 pgp\n"));
            assert_eq!(rec.trust, expected, "{kw}");
        }
    }

    #[test]
    fn newsig_uid_is_author_fallback() {
        let rec = parse_status(
            "[GNUPG:] NEWSIG ci@example.com\n[GNUPG:] ERRSIG 1122334455667788 1 8 00 1709290000 9 -\n",
        );
        assert_eq!(rec.author, "ci@example.com");

        let named = parse_status(&format!("[GNUPG:] NEWSIG ci@example.com\n{GOOD}"));
        assert_eq!(named.author, "Jane Q. Signer <jane@example.com>");
    }

    #[test]
    fn trust_levels_are_ordered() {
        assert!(TrustLevel::Ultimate > TrustLevel::Fully);
        assert!(TrustLevel::Fully > TrustLevel::Marginal);
        assert!(TrustLevel::Undefined > TrustLevel::Unknown);
        assert!(TrustLevel::Unknown > TrustLevel::Never);
        assert_eq!("trust_fully".parse::<TrustLevel>(), Ok(TrustLevel::Fully));
        assert!("ultra".parse::<TrustLevel>().is_err());
    }

    #[test]
    fn display_date_renders_epoch_and_passes_through_other_formats() {
        let rec = SignatureRecord {
            date: "0".to_string(),
            ..Default::default()
        };
        assert_eq!(rec.display_date(), "1970-01-01 00:00:00 UTC");
        let iso = SignatureRecord {
            date: "20240301T120000".to_string(),
            ..Default::default()
        };
        assert_eq!(iso.display_date(), "20240301T120000");
    }
}
