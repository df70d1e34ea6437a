use clap::{Args, Parser, Subcommand};

use crate::status::TrustLevel;

#[derive(Parser, Debug)]
#[command(
    name = "git-signatures",
    version,
    about = "Attach, verify and share detached GnuPG signatures on git refs via git notes"
)]
pub(crate) struct Cli {
    /// Verbose output (stderr)
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Configure fetch/push refspecs for signatures on a remote
    Init(RemoteArgs),
    /// Import and trust the keys listed in the signers file
    Import,
    /// Show the signatures attached to a ref
    Show(ShowArgs),
    /// Sign a ref and store the signature in git notes
    Add(AddArgs),
    /// Exit successfully only if enough trusted signers signed a ref
    Verify(VerifyArgs),
    /// Fetch signatures from a remote and merge them into the local notes
    Pull(RemoteArgs),
    /// Push local signatures to a remote
    Push(RemoteArgs),
    /// Print version information
    Version,
}

/// Signed range: `<base>..<ref>`.
#[derive(Args, Debug)]
pub(crate) struct RangeArgs {
    /// Ref to operate on
    #[arg(value_name = "REF", default_value = "HEAD")]
    pub(crate) target: String,

    /// Base of the signed diff (default: first parent of REF, or the empty tree)
    #[arg(value_name = "BASE")]
    pub(crate) base: Option<String>,
}

#[derive(Parser, Debug)]
pub(crate) struct RemoteArgs {
    /// Remote name (default: `remote` from .signatures.toml, else origin)
    pub(crate) remote: Option<String>,
}

#[derive(Parser, Debug)]
pub(crate) struct ShowArgs {
    /// Print pipe-delimited key|status|trust|date|author records
    #[arg(short, long, conflicts_with = "json")]
    pub(crate) raw: bool,

    /// Print records as a JSON array
    #[arg(long)]
    pub(crate) json: bool,

    /// GnuPG trust database to verify against
    #[arg(short = 't', long = "trust-db", value_name = "NAME")]
    pub(crate) trust_db: Option<String>,

    #[command(flatten)]
    pub(crate) range: RangeArgs,
}

#[derive(Parser, Debug)]
pub(crate) struct AddArgs {
    /// Key to sign with (default: signing_key from config, else user.signingkey)
    #[arg(short, long, value_name = "ID")]
    pub(crate) key: Option<String>,

    /// Push signatures to the default remote after signing
    #[arg(short, long)]
    pub(crate) push: bool,

    #[command(flatten)]
    pub(crate) range: RangeArgs,
}

#[derive(Parser, Debug)]
pub(crate) struct VerifyArgs {
    /// Minimum number of distinct trusted signers
    #[arg(short, long, value_name = "N")]
    pub(crate) min_count: Option<usize>,

    /// GnuPG trust database to verify against
    #[arg(short = 't', long = "trust-db", value_name = "NAME")]
    pub(crate) trust_db: Option<String>,

    /// Lowest owner trust a signer must have (default: ultimate)
    #[arg(long, value_name = "LEVEL")]
    pub(crate) trust_level: Option<TrustLevel>,

    #[command(flatten)]
    pub(crate) range: RangeArgs,
}
