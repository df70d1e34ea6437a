use anyhow::Result;

pub(crate) fn cmd_version() -> Result<u8> {
    println!("git-signatures {}", env!("CARGO_PKG_VERSION"));
    Ok(0)
}
