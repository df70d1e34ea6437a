use anyhow::Result;
use tracing::info;

use crate::cli::ShowArgs;
use crate::config::Config;
use crate::git::Git;
use crate::status::SignatureRecord;

use super::common;

pub(crate) fn cmd_show(git: &Git, config: &Config, args: ShowArgs) -> Result<u8> {
    let gpg = common::load_gpg(config, args.trust_db.clone())?;
    let records = common::collect_records(git, &gpg, &args.range)?;

    if args.json {
        serde_json::to_writer_pretty(std::io::stdout(), &records)?;
        println!();
        return Ok(0);
    }
    if records.is_empty() {
        info!(rev = %args.range.target, "no signatures");
        return Ok(0);
    }
    if args.raw {
        for record in &records {
            println!("{}", record.to_raw());
        }
    } else {
        print_table(&records);
    }
    Ok(0)
}

fn print_table(records: &[SignatureRecord]) {
    let key_width = records.iter().map(|r| r.key.len()).max().unwrap_or(0).max(3);
    let status_width = records
        .iter()
        .map(|r| r.status.describe().len())
        .max()
        .unwrap_or(0);
    let trust_width = records
        .iter()
        .map(|r| r.trust.as_str().len())
        .max()
        .unwrap_or(0);

    for r in records {
        let key = if r.key.is_empty() { "?" } else { r.key.as_str() };
        println!(
            "{key:<key_width$}  {:<status_width$}  {:<trust_width$}  {}  {}",
            r.status.describe(),
            r.trust.as_str(),
            r.display_date(),
            r.author
        );
    }
}
