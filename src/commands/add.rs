use anyhow::Result;
use tracing::debug;

use crate::cli::AddArgs;
use crate::config::Config;
use crate::error::SignaturesError;
use crate::git::Git;
use crate::notes;

use super::{common, sync};

pub(crate) fn cmd_add(git: &Git, config: &Config, args: AddArgs) -> Result<u8> {
    let gpg = common::load_gpg(config, None)?;

    let commit = git.resolve_commit(&args.range.target)?;
    let subject = git.signing_subject(&args.range.target, args.range.base.as_deref())?;

    let key = common::resolve_signing_key(git, config, args.key.as_deref())?;
    if !gpg.has_secret_key(&key)? {
        return Err(SignaturesError::InvalidKey {
            reason: format!("no usable private key for `{key}` in the local keyring"),
        }
        .into());
    }
    debug!(%key, %subject, %commit, "signing");

    let signature = gpg.detach_sign(&key, &subject)?;
    notes::append(git, &commit, &notes::encode_signature(&signature))?;
    let tip = notes::tag_tip(git)?;
    debug!(%tip, "signatures tip");

    println!("signed {} ({subject}) with {key}", args.range.target);

    if args.push {
        let remote = common::remote_name(config, None);
        sync::push(git, &remote)?;
    }
    Ok(0)
}
