use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use crate::cli::RemoteArgs;
use crate::config::Config;
use crate::git::Git;
use crate::notes::{self, NOTES_NAME, NOTES_REF, TAG_REF};

use super::common;

pub(crate) fn cmd_pull(git: &Git, config: &Config, args: RemoteArgs) -> Result<u8> {
    let remote = common::remote_name(config, args.remote);
    if pull(git, &remote)? {
        println!("pulled signatures from {remote}");
    } else {
        println!("no signatures on {remote}");
    }
    Ok(0)
}

pub(crate) fn cmd_push(git: &Git, config: &Config, args: RemoteArgs) -> Result<u8> {
    let remote = common::remote_name(config, args.remote);
    push(git, &remote)?;
    println!("pushed signatures to {remote}");
    Ok(0)
}

/// Fetches the remote signature notes into a mirror ref and merges them with
/// the `cat_sort_uniq` strategy. Returns false when the remote has none.
pub(crate) fn pull(git: &Git, remote: &str) -> Result<bool> {
    if !remote_has_ref(git, remote, NOTES_REF)? {
        info!(%remote, "remote has no signature notes");
        return Ok(false);
    }

    let mirror_notes = notes::remote_notes_ref(remote);
    let mut refspecs = vec![format!("+{NOTES_REF}:{mirror_notes}")];
    if remote_has_ref(git, remote, TAG_REF)? {
        refspecs.push(format!("+{TAG_REF}:{}", notes::remote_tag_ref(remote)));
    }

    let mut fetch = vec!["fetch", "--quiet", "--no-tags", remote];
    fetch.extend(refspecs.iter().map(String::as_str));
    git.git_output(&fetch)
        .with_context(|| format!("failed to fetch signatures from {remote}"))?;

    match git.try_resolve(NOTES_REF)? {
        Some(local) => {
            debug!(%local, %mirror_notes, "merging signature notes");
            git.git_output([
                "notes",
                "--ref",
                NOTES_NAME,
                "merge",
                "--quiet",
                "--strategy",
                "cat_sort_uniq",
                mirror_notes.as_str(),
            ])
            .context("failed to merge signature notes")?;
        }
        None => {
            let tip = git
                .try_resolve(&mirror_notes)?
                .ok_or_else(|| anyhow!("fetched {mirror_notes} is missing"))?;
            debug!(%tip, "no local signature notes, taking remote tip");
            git.git_output(["update-ref", NOTES_REF, tip.as_str()])?;
        }
    }

    notes::tag_tip(git)?;
    Ok(true)
}

/// Force-pushes the notes ref and the signature tag.
pub(crate) fn push(git: &Git, remote: &str) -> Result<()> {
    notes::tag_tip(git)?;
    let notes_spec = format!("+{NOTES_REF}:{NOTES_REF}");
    let tag_spec = format!("+{TAG_REF}:{TAG_REF}");
    git.git_output(["push", "--quiet", remote, notes_spec.as_str(), tag_spec.as_str()])
        .with_context(|| format!("failed to push signatures to {remote}"))?;
    Ok(())
}

fn remote_has_ref(git: &Git, remote: &str, refname: &str) -> Result<bool> {
    let out = git.git_raw(["ls-remote", "--exit-code", remote, refname], None)?;
    match out.status.code() {
        Some(0) => Ok(true),
        // --exit-code: the remote answered but has no matching ref
        Some(2) => Ok(false),
        _ => Err(anyhow!(
            "failed to query {remote}: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )),
    }
}
