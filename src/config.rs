use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::git::GitRepo;
use crate::status::TrustLevel;

pub const CONFIG_FILE: &str = ".signatures.toml";

/// Repository-level settings, read from `.signatures.toml` at the work tree root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key used by `add` when `--key` is not given. Falls back to
    /// `git config user.signingkey`.
    pub signing_key: Option<String>,

    /// Minimum number of distinct trusted signers required by `verify`.
    pub min_count: usize,

    /// Lowest trust tier a signature must carry to count towards `min_count`.
    pub trust_level: TrustLevel,

    /// Remote used by `init`, `pull` and `push` when none is given.
    pub remote: String,

    /// Path, relative to the work tree, of the authorized signers list.
    pub signers_file: String,

    pub keyservers: Vec<String>,
    pub keyserver_timeout_secs: u64,

    /// Owner trust value granted to imported keys (gpg `--import-ownertrust`
    /// scale: 2 = unknown .. 5 = full, 6 = ultimate).
    pub ownertrust: u8,

    /// GnuPG invocation, e.g. "gpg" or "gpg2 --no-tty".
    pub gpg_program: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signing_key: None,
            min_count: 1,
            trust_level: TrustLevel::Ultimate,
            remote: "origin".to_string(),
            signers_file: ".gitsigners".to_string(),
            keyservers: vec![
                "hkps://keys.openpgp.org".to_string(),
                "hkps://keyserver.ubuntu.com".to_string(),
                "hkps://pgp.mit.edu".to_string(),
            ],
            keyserver_timeout_secs: 30,
            ownertrust: 6,
            gpg_program: "gpg".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_repo(repo: &GitRepo) -> Result<Self> {
        let path = repo.workdir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.min_count, 1);
        assert_eq!(cfg.trust_level, TrustLevel::Ultimate);
        assert_eq!(cfg.remote, "origin");
        assert_eq!(cfg.signers_file, ".gitsigners");
        assert_eq!(cfg.ownertrust, 6);
        assert!(!cfg.keyservers.is_empty());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let cfg = Config::from_toml_str(
            r#"
min_count = 2
trust_level = "fully"
keyservers = ["hkps://keys.example.org"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.min_count, 2);
        assert_eq!(cfg.trust_level, TrustLevel::Fully);
        assert_eq!(cfg.keyservers, vec!["hkps://keys.example.org".to_string()]);
        assert_eq!(cfg.gpg_program, "gpg");
    }

    #[test]
    fn unknown_trust_level_is_rejected() {
        assert!(Config::from_toml_str("trust_level = \"sorta\"").is_err());
    }
}
