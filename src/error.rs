use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignaturesError {
    #[error("not a git repository")]
    NotARepository,

    #[error("required tool `{tool}` not found: {hint}")]
    MissingTool { tool: String, hint: String },

    #[error(
        "{reason}\n\n\
         To sign you need a private key in your local keyring:\n\
         \x20 1. list usable keys with `gpg --list-secret-keys --keyid-format long`\n\
         \x20 2. pass one with `--key <id>`, or set it once with\n\
         \x20    `git config user.signingkey <id>`\n\
         \x20 3. if you have none, create one with `gpg --full-generate-key`"
    )]
    InvalidKey { reason: String },

    #[error("refusing to sign an empty diff: {base} and {target} have identical content")]
    EmptyDiff { base: String, target: String },

    #[error(
        "found {found} distinct {trust} signature(s) on {target}, {required} required\n\n\
         This does not necessarily mean the change is unapproved. Signatures only\n\
         count when the signer's public key is in your local keyring and trusted at\n\
         the required level. Run `git signatures import` to fetch and trust the keys\n\
         listed in the signers file, then `git signatures show {target}` to inspect."
    )]
    PolicyNotMet {
        target: String,
        found: usize,
        required: usize,
        trust: String,
    },
}
