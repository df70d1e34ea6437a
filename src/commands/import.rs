use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::git::Git;
use crate::gpg::Gpg;

use super::common;

const KEY_ID_PATTERN: &str = r"^(0[xX])?[0-9A-Fa-f]{8,40}$";

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Signers {
    pub(crate) keys: Vec<String>,
    /// `(line number, content)` of lines that are not key ids.
    pub(crate) rejected: Vec<(usize, String)>,
}

/// Parses a signers file: one key id or fingerprint per line, `#` comments.
pub(crate) fn parse_signers(raw: &str) -> Result<Signers> {
    let re = Regex::new(KEY_ID_PATTERN)?;
    let mut signers = Signers::default();
    for (i, line) in raw.lines().enumerate() {
        let entry = line.split('#').next().unwrap_or("").trim();
        if entry.is_empty() {
            continue;
        }
        // fingerprints are often written in groups of four
        let compact: String = entry.split_whitespace().collect();
        if re.is_match(&compact) {
            let key = compact.trim_start_matches("0x").trim_start_matches("0X");
            let key = key.to_ascii_uppercase();
            if !signers.keys.contains(&key) {
                signers.keys.push(key);
            }
        } else {
            signers.rejected.push((i + 1, entry.to_string()));
        }
    }
    Ok(signers)
}

pub(crate) fn cmd_import(git: &Git, config: &Config) -> Result<u8> {
    let gpg = common::load_gpg(config, None)?;
    let path = git.repo.workdir.join(&config.signers_file);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read signers file {}", path.display()))?;
    let signers = parse_signers(&raw)?;
    for (line, entry) in &signers.rejected {
        warn!("{}:{line}: `{entry}` is not a key id, skipping", config.signers_file);
    }
    if signers.keys.is_empty() {
        return Err(anyhow!("no key ids listed in {}", path.display()));
    }
    if config.keyservers.is_empty() {
        return Err(anyhow!("no keyservers configured"));
    }

    let timeout = Duration::from_secs(config.keyserver_timeout_secs);
    let mut failed = Vec::new();
    for key in &signers.keys {
        let Some(keyserver) = fetch_from_any(&gpg, &config.keyservers, key, timeout) else {
            eprintln!("git-signatures: could not fetch {key} from any keyserver");
            failed.push(key.as_str());
            continue;
        };
        match trust_key(&gpg, key, config.ownertrust) {
            Ok(fingerprint) => println!(
                "imported {fingerprint} from {keyserver} (ownertrust {})",
                config.ownertrust
            ),
            Err(err) => {
                eprintln!("git-signatures: {err:#}");
                failed.push(key.as_str());
            }
        }
    }

    if !failed.is_empty() {
        return Err(anyhow!(
            "failed to import {} of {} key(s): {}",
            failed.len(),
            signers.keys.len(),
            failed.join(", ")
        ));
    }
    Ok(0)
}

/// Looks up the fingerprint of a freshly received key and grants it
/// `ownertrust`. Returns the fingerprint.
fn trust_key(gpg: &Gpg, key: &str, ownertrust: u8) -> Result<String> {
    let fingerprint = gpg
        .fingerprint(key)?
        .ok_or_else(|| anyhow!("imported {key} but gpg cannot find its fingerprint"))?;
    gpg.import_ownertrust(&fingerprint, ownertrust)
        .with_context(|| format!("failed to set ownertrust for {key}"))?;
    Ok(fingerprint)
}

/// Tries keyservers in random order and stops at the first that delivers
/// the key.
fn fetch_from_any<'a>(
    gpg: &Gpg,
    keyservers: &'a [String],
    key: &str,
    timeout: Duration,
) -> Option<&'a str> {
    let mut order: Vec<&String> = keyservers.iter().collect();
    order.shuffle(&mut rand::rng());
    for keyserver in order {
        match gpg.recv_key(keyserver, key, timeout) {
            Ok(true) => return Some(keyserver.as_str()),
            Ok(false) => debug!(%keyserver, %key, "key not fetched"),
            Err(err) => warn!(%keyserver, %key, "keyserver error: {err:#}"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signers_file_accepts_ids_and_fingerprints() {
        let raw = "\
# release managers
0x89ABCDEF01234567
0123 4567 89AB CDEF 0123  4567 89AB CDEF 0123 4567   # jane

deadbeef
";
        let signers = parse_signers(raw).unwrap();
        assert_eq!(
            signers.keys,
            vec![
                "89ABCDEF01234567".to_string(),
                "0123456789ABCDEF0123456789ABCDEF01234567".to_string(),
                "DEADBEEF".to_string(),
            ]
        );
        assert!(signers.rejected.is_empty());
    }

    #[test]
    fn non_key_lines_are_rejected_with_line_numbers() {
        let raw = "89ABCDEF01234567\njane@example.com\nXYZ12345\n";
        let signers = parse_signers(raw).unwrap();
        assert_eq!(signers.keys, vec!["89ABCDEF01234567".to_string()]);
        assert_eq!(
            signers.rejected,
            vec![
                (2, "jane@example.com".to_string()),
                (3, "XYZ12345".to_string())
            ]
        );
    }

    #[test]
    fn duplicate_ids_are_listed_once() {
        let signers = parse_signers("89abcdef01234567\n0x89ABCDEF01234567\n").unwrap();
        assert_eq!(signers.keys, vec!["89ABCDEF01234567".to_string()]);
    }
}
