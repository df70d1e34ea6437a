use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use crate::error::SignaturesError;

/// Object id of the empty tree, used as the base of a root commit.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

#[derive(Debug, Clone)]
pub struct GitRepo {
    pub workdir: PathBuf,
}

impl GitRepo {
    pub fn discover() -> Result<Self> {
        let out = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .context("failed to run git")?;
        if !out.status.success() {
            return Err(SignaturesError::NotARepository.into());
        }
        let workdir = PathBuf::from(String::from_utf8(out.stdout)?.trim());
        Ok(Self { workdir })
    }
}

#[derive(Debug, Clone)]
pub struct Git {
    pub repo: GitRepo,
}

impl Git {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo }
    }

    /// Resolves `rev` to the full id of the commit it names.
    pub fn resolve_commit(&self, rev: &str) -> Result<String> {
        let spec = format!("{rev}^{{commit}}");
        let s = self
            .git_output(["rev-parse", "--verify", "--quiet", spec.as_str()])
            .with_context(|| format!("unknown revision `{rev}`"))?;
        Ok(s.trim().to_string())
    }

    /// Like [`Git::resolve_commit`] but returns `None` when `rev` does not resolve.
    pub fn try_resolve(&self, rev: &str) -> Result<Option<String>> {
        let out = self.git_raw(["rev-parse", "--verify", "--quiet", rev], None)?;
        if !out.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8(out.stdout)?.trim().to_string()))
    }

    fn tree_of(&self, rev: &str) -> Result<String> {
        let spec = format!("{rev}^{{tree}}");
        let s = self
            .git_output(["rev-parse", "--verify", "--quiet", spec.as_str()])
            .with_context(|| format!("unknown revision `{rev}`"))?;
        Ok(s.trim().to_string())
    }

    /// Base of the signed range: the explicit base, else the first parent of
    /// `target`, else the empty tree for a root commit.
    pub fn resolve_base(&self, target: &str, base: Option<&str>) -> Result<String> {
        if let Some(base) = base {
            return Ok(base.to_string());
        }
        let parent = self.try_resolve(&format!("{target}^1^{{commit}}"))?;
        Ok(parent.unwrap_or_else(|| EMPTY_TREE.to_string()))
    }

    /// Raw bytes of `git diff base target`. Not decoded, since the diffed
    /// files may be in any encoding.
    pub fn diff(&self, base: &str, target: &str) -> Result<Vec<u8>> {
        let out = self.git_raw(["diff", "--no-color", "--no-ext-diff", base, target], None)?;
        if !out.status.success() {
            return Err(anyhow!(
                "git diff failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        Ok(out.stdout)
    }

    /// Computes the signing subject of `base..target`: the stable patch-id of
    /// the diff between the two trees.
    pub fn signing_subject(&self, target: &str, base: Option<&str>) -> Result<String> {
        let base = self.resolve_base(target, base)?;
        debug!(%base, rev = %target, "computing signing subject");

        let empty = || SignaturesError::EmptyDiff {
            base: base.clone(),
            target: target.to_string(),
        };
        if self.tree_of(&base)? == self.tree_of(target)? {
            return Err(empty().into());
        }
        let diff = self.diff(&base, target)?;
        if diff.iter().all(u8::is_ascii_whitespace) {
            return Err(empty().into());
        }
        let subject = self.patch_id_from_diff(&diff)?;
        debug!(%subject, "signing subject");
        Ok(subject)
    }

    pub fn patch_id_from_diff(&self, diff: &[u8]) -> Result<String> {
        let out = self
            .git_raw(["patch-id", "--stable"], Some(diff))
            .context("failed to run git patch-id")?;
        if !out.status.success() {
            return Err(anyhow!("git patch-id failed"));
        }
        let s = String::from_utf8(out.stdout)?;
        let patch_id = s
            .split_whitespace()
            .next()
            .ok_or_else(|| anyhow!("git patch-id returned no output"))?;
        Ok(patch_id.to_string())
    }

    pub fn config_get_all(&self, key: &str) -> Result<Vec<String>> {
        // exit status 1 just means the key is unset
        let out = self.git_raw(["config", "--get-all", key], None)?;
        if !out.status.success() {
            return Ok(Vec::new());
        }
        Ok(String::from_utf8(out.stdout)?
            .lines()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }

    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.config_get_all(key)?.pop())
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.git_output(["config", key, value])?;
        Ok(())
    }

    /// Adds `value` to a multi-valued key unless it is already present.
    /// Returns whether the config changed.
    pub fn config_add_unique(&self, key: &str, value: &str) -> Result<bool> {
        if self.config_get_all(key)?.iter().any(|v| v == value) {
            return Ok(false);
        }
        self.git_output(["config", "--add", key, value])?;
        Ok(true)
    }

    pub fn git_output<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let out = self.git_raw(args, None)?;
        if !out.status.success() {
            return Err(anyhow!(
                "git command failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        Ok(String::from_utf8(out.stdout)?)
    }

    /// Runs git without interpreting the exit status.
    pub fn git_raw<I, S>(&self, args: I, stdin: Option<&[u8]>) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo.workdir)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn().context("failed to run git")?;
        if let Some(input) = stdin {
            use std::io::Write;
            let mut pipe = child.stdin.take().context("failed to open stdin")?;
            pipe.write_all(input)?;
        }
        Ok(child.wait_with_output()?)
    }
}
