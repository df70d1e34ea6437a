use anyhow::{anyhow, Result};

use crate::cli::RemoteArgs;
use crate::config::Config;
use crate::git::Git;
use crate::notes::{self, NOTES_NAME, NOTES_REF, TAG_REF};

use super::common;

pub(crate) fn cmd_init(git: &Git, config: &Config, args: RemoteArgs) -> Result<u8> {
    let remote = common::remote_name(config, args.remote);
    if git.config_get(&format!("remote.{remote}.url"))?.is_none() {
        return Err(anyhow!("remote `{remote}` is not configured"));
    }

    let fetch_key = format!("remote.{remote}.fetch");
    let push_key = format!("remote.{remote}.push");
    let entries = [
        (
            fetch_key.as_str(),
            format!("+{NOTES_REF}:{}", notes::remote_notes_ref(&remote)),
        ),
        (
            fetch_key.as_str(),
            format!("+{TAG_REF}:{}", notes::remote_tag_ref(&remote)),
        ),
        (push_key.as_str(), format!("+{NOTES_REF}:{NOTES_REF}")),
        (push_key.as_str(), format!("+{TAG_REF}:{TAG_REF}")),
    ];

    // Any remote.<name>.push entry replaces push.default, so keep plain
    // `git push` pushing the current branch.
    if git.config_get_all(&push_key)?.is_empty() {
        git.config_add_unique(&push_key, "HEAD")?;
        println!("added {push_key} HEAD");
    }
    for (key, value) in &entries {
        if git.config_add_unique(key, value)? {
            println!("added {key} {value}");
        }
    }
    git.config_set(&format!("notes.{NOTES_NAME}.mergeStrategy"), "cat_sort_uniq")?;

    println!("signatures configured for {remote}");
    Ok(0)
}
