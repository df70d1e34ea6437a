use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::git::Git;

/// Short name of the notes ref, as accepted by `git notes --ref`.
pub const NOTES_NAME: &str = "signatures";
pub const NOTES_REF: &str = "refs/notes/signatures";
/// Tag kept pointing at the tip of [`NOTES_REF`] so the whole signature
/// history travels as one object.
pub const TAG_REF: &str = "refs/tags/signatures";

pub fn remote_notes_ref(remote: &str) -> String {
    format!("refs/notes/{remote}/{NOTES_NAME}")
}

pub fn remote_tag_ref(remote: &str) -> String {
    format!("refs/tags/{remote}/{NOTES_NAME}")
}

pub fn encode_signature(sig: &[u8]) -> String {
    STANDARD.encode(sig)
}

pub fn decode_line(line: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(line.trim())
        .context("stored signature is not valid base64")
}

/// Splits a note body into its signature lines. `git notes append` separates
/// entries with blank lines, which are dropped here.
pub fn note_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns every stored signature line for `commit`, in append order.
pub fn read_lines(git: &Git, commit: &str) -> Result<Vec<String>> {
    let listed = git.git_raw(["notes", "--ref", NOTES_NAME, "list", commit], None)?;
    if !listed.status.success() {
        debug!(%commit, "no signature note");
        return Ok(Vec::new());
    }
    let raw = git
        .git_output(["notes", "--ref", NOTES_NAME, "show", commit])
        .with_context(|| format!("failed to read signatures for {commit}"))?;
    Ok(note_lines(&raw))
}

pub fn append(git: &Git, commit: &str, line: &str) -> Result<()> {
    git.git_output(["notes", "--ref", NOTES_NAME, "append", "-m", line, commit])
        .with_context(|| format!("failed to store signature for {commit}"))?;
    Ok(())
}

/// Moves the signature tag to the current notes tip. Returns the tip.
pub fn tag_tip(git: &Git) -> Result<String> {
    let tip = git
        .try_resolve(NOTES_REF)?
        .ok_or_else(|| anyhow!("no signatures recorded yet ({NOTES_REF} does not exist)"))?;
    git.git_output(["update-ref", TAG_REF, tip.as_str()])
        .context("failed to move signature tag")?;
    debug!(%tip, "signature tag updated");
    Ok(tip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_lines_drop_append_separators() {
        let raw = "c2lnMQ==\n\nc2lnMg==\n\n  c2lnMw==  \n";
        assert_eq!(note_lines(raw), vec!["c2lnMQ==", "c2lnMg==", "c2lnMw=="]);
    }

    #[test]
    fn stored_lines_have_no_line_breaks() {
        let sig: Vec<u8> = (0..=255u8).cycle().take(600).collect();
        let line = encode_signature(&sig);
        assert!(!line.contains('\n'));
        assert_eq!(decode_line(&line).unwrap(), sig);
    }

    #[test]
    fn garbage_line_is_rejected() {
        assert!(decode_line("not*base64!").is_err());
    }

    #[test]
    fn remote_mirror_refs() {
        assert_eq!(remote_notes_ref("origin"), "refs/notes/origin/signatures");
        assert_eq!(remote_tag_ref("upstream"), "refs/tags/upstream/signatures");
    }
}
