use anyhow::Result;
use tracing::{debug, warn};

use crate::cli::RangeArgs;
use crate::config::Config;
use crate::error::SignaturesError;
use crate::git::Git;
use crate::gpg::Gpg;
use crate::notes;
use crate::status::{self, SigStatus, SignatureRecord};

pub(crate) fn load_gpg(config: &Config, trustdb: Option<String>) -> Result<Gpg> {
    let gpg = Gpg::from_config(config)?.with_trustdb(trustdb);
    gpg.ensure_available()?;
    Ok(gpg)
}

pub(crate) fn remote_name(config: &Config, explicit: Option<String>) -> String {
    explicit.unwrap_or_else(|| config.remote.clone())
}

/// `--key`, then `signing_key` from the config file, then `user.signingkey`.
pub(crate) fn resolve_signing_key(
    git: &Git,
    config: &Config,
    explicit: Option<&str>,
) -> Result<String> {
    if let Some(key) = explicit.or(config.signing_key.as_deref()) {
        return Ok(key.to_string());
    }
    git.config_get("user.signingkey")?.ok_or_else(|| {
        SignaturesError::InvalidKey {
            reason: "no signing key configured".to_string(),
        }
        .into()
    })
}

/// Verifies every signature stored for `range` against the recomputed subject.
pub(crate) fn collect_records(
    git: &Git,
    gpg: &Gpg,
    range: &RangeArgs,
) -> Result<Vec<SignatureRecord>> {
    let commit = git.resolve_commit(&range.target)?;
    let lines = notes::read_lines(git, &commit)?;
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let subject = git.signing_subject(&range.target, range.base.as_deref())?;
    debug!(%commit, %subject, count = lines.len(), "verifying stored signatures");

    let mut records = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let record = match notes::decode_line(line) {
            Ok(sig) => status::parse_status(&gpg.verify(&sig, &subject)?),
            Err(err) => {
                warn!(%commit, index = i, "skipping undecodable signature: {err}");
                SignatureRecord {
                    status: SigStatus::Error,
                    ..Default::default()
                }
            }
        };
        records.push(record);
    }
    Ok(records)
}
