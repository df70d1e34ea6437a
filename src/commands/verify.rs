use anyhow::Result;

use crate::cli::VerifyArgs;
use crate::config::Config;
use crate::git::Git;
use crate::policy::Policy;

use super::common;

pub(crate) fn cmd_verify(git: &Git, config: &Config, args: VerifyArgs) -> Result<u8> {
    let policy = Policy {
        min_count: args.min_count.unwrap_or(config.min_count),
        trust_level: args.trust_level.unwrap_or(config.trust_level),
    };
    let gpg = common::load_gpg(config, args.trust_db)?;
    let records = common::collect_records(git, &gpg, &args.range)?;

    let found = policy.evaluate(&args.range.target, &records)?;
    println!(
        "git-signatures verify: PASS ({}: {found} distinct {} signer(s), {} required)",
        args.range.target, policy.trust_level, policy.min_count
    );
    Ok(0)
}
