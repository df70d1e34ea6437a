use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::debug;
use wait_timeout::ChildExt;

use crate::config::Config;
use crate::error::SignaturesError;

/// Thin wrapper around the configured GnuPG executable.
#[derive(Debug, Clone)]
pub struct Gpg {
    program: String,
    base_args: Vec<String>,
    trustdb: Option<String>,
}

impl Gpg {
    pub fn from_config(config: &Config) -> Result<Self> {
        let (program, base_args) = split_command_line(&config.gpg_program)?;
        Ok(Self {
            program,
            base_args,
            trustdb: None,
        })
    }

    /// Uses an alternative trust database for verification.
    pub fn with_trustdb(mut self, trustdb: Option<String>) -> Self {
        self.trustdb = trustdb;
        self
    }

    pub fn ensure_available(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.base_args)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(SignaturesError::MissingTool {
                tool: self.program.clone(),
                hint: "install GnuPG or set `gpg_program` in .signatures.toml".to_string(),
            }
            .into()),
            Err(err) => Err(err).with_context(|| format!("failed to run {}", self.program)),
        }
    }

    pub fn has_secret_key(&self, key: &str) -> Result<bool> {
        let out = self.run(&["--batch", "--list-secret-keys", "--with-colons", key], None)?;
        Ok(out.status.success())
    }

    /// Produces a binary detached signature over `subject`.
    pub fn detach_sign(&self, key: &str, subject: &str) -> Result<Vec<u8>> {
        let out = self.run(
            &["--detach-sign", "--local-user", key, "--output", "-"],
            Some(subject.as_bytes()),
        )?;
        if !out.status.success() {
            return Err(anyhow!(
                "gpg failed to sign with key {key}: {}",
                truncate_for_error(&String::from_utf8_lossy(&out.stderr))
            ));
        }
        if out.stdout.is_empty() {
            return Err(anyhow!("gpg produced an empty signature"));
        }
        Ok(out.stdout)
    }

    /// Verifies `signature` over `subject` and returns the status-fd output.
    /// A failed verification is still reported through the status lines, so
    /// the exit status of gpg is not treated as an error.
    pub fn verify(&self, signature: &[u8], subject: &str) -> Result<String> {
        let mut sig_file = tempfile::Builder::new()
            .prefix("git-signatures-")
            .suffix(".sig")
            .tempfile()
            .context("failed to create temp file for signature")?;
        sig_file.write_all(signature)?;
        sig_file.flush()?;
        let sig_path = path_arg(sig_file.path())?;

        let mut args = vec!["--batch", "--status-fd", "1"];
        if let Some(trustdb) = &self.trustdb {
            args.extend(["--trustdb-name", trustdb.as_str()]);
        }
        args.extend(["--verify", sig_path.as_str(), "-"]);

        let out = self.run(&args, Some(subject.as_bytes()))?;
        debug!(status = %out.status, "gpg --verify finished");
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    /// Fetches `key` from `keyserver`. Returns whether gpg reported success
    /// before the timeout.
    pub fn recv_key(&self, keyserver: &str, key: &str, timeout: Duration) -> Result<bool> {
        let mut child = Command::new(&self.program)
            .args(&self.base_args)
            .args(["--batch", "--keyserver", keyserver, "--recv-keys", key])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.program))?;

        let stdout_handle = child.stdout.take().map(read_to_end_thread);
        let stderr_handle = child.stderr.take().map(read_to_end_thread);

        let status = match child.wait_timeout(timeout)? {
            Some(s) => s,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                debug!(%keyserver, %key, "keyserver timed out after {}s", timeout.as_secs());
                return Ok(false);
            }
        };

        let _ = stdout_handle.map(|h| h.join());
        let stderr = stderr_handle
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();
        if !status.success() {
            debug!(%keyserver, %key, stderr = %truncate_for_error(&stderr), "recv-keys failed");
        }
        Ok(status.success())
    }

    /// Resolves `key` to the fingerprint of its primary key.
    pub fn fingerprint(&self, key: &str) -> Result<Option<String>> {
        let out = self.run(&["--batch", "--with-colons", "--fingerprint", key], None)?;
        if !out.status.success() {
            return Ok(None);
        }
        Ok(parse_first_fingerprint(&String::from_utf8_lossy(&out.stdout)))
    }

    pub fn import_ownertrust(&self, fingerprint: &str, level: u8) -> Result<()> {
        let line = format!("{fingerprint}:{level}:\n");
        let out = self.run(&["--batch", "--import-ownertrust"], Some(line.as_bytes()))?;
        if !out.status.success() {
            return Err(anyhow!(
                "gpg --import-ownertrust failed for {fingerprint}: {}",
                truncate_for_error(&String::from_utf8_lossy(&out.stderr))
            ));
        }
        Ok(())
    }

    fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<Output> {
        debug!(program = %self.program, ?args, "running gpg");
        let mut child = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.program))?;
        if let Some(input) = stdin {
            let mut pipe = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("gpg missing stdin"))?;
            pipe.write_all(input).context("failed to write to gpg stdin")?;
        }
        Ok(child.wait_with_output()?)
    }
}

/// Extracts field 10 of the first `fpr` record of `--with-colons` output.
fn parse_first_fingerprint(colons: &str) -> Option<String> {
    colons
        .lines()
        .filter(|l| l.starts_with("fpr:"))
        .filter_map(|l| l.split(':').nth(9))
        .find(|f| !f.is_empty())
        .map(str::to_string)
}

fn path_arg(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("temp path is not valid UTF-8: {}", path.display()))
}

fn read_to_end_thread(
    mut reader: impl std::io::Read + Send + 'static,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).to_string()
    })
}

fn truncate_for_error(s: &str) -> String {
    const MAX: usize = 2000;
    let s = s.trim();
    if s.len() <= MAX {
        return s.to_string();
    }
    let mut end = MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n[output truncated]", &s[..end])
}

fn split_command_line(input: &str) -> Result<(String, Vec<String>)> {
    let parts = shlex::split(input).ok_or_else(|| anyhow!("invalid gpg_program: {input}"))?;
    let mut parts_iter = parts.into_iter();
    let program = parts_iter
        .next()
        .ok_or_else(|| anyhow!("gpg_program is empty"))?;
    Ok((program, parts_iter.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fingerprint_is_the_primary_key() {
        let colons = "\
tru::1:1709290000:0:3:1:5
pub:u:255:22:89ABCDEF01234567:1709290000:::u:::scESC:::::ed25519:::0:
fpr:::::::::0123456789ABCDEF0123456789ABCDEF01234567:
uid:u::::1709290000::HASH::Jane <jane@example.com>::::::::::0:
sub:u:255:18:7766554433221100:1709290000::::::e:::::cv25519::
fpr:::::::::FFFFEEEEDDDDCCCCBBBBAAAA7766554433221100:
";
        assert_eq!(
            parse_first_fingerprint(colons).as_deref(),
            Some("0123456789ABCDEF0123456789ABCDEF01234567")
        );
        assert_eq!(parse_first_fingerprint("pub:u:255\n"), None);
    }

    #[test]
    fn gpg_program_may_carry_arguments() {
        let (program, args) = split_command_line("gpg2 --no-tty --homedir '/tmp/my keys'").unwrap();
        assert_eq!(program, "gpg2");
        assert_eq!(args, vec!["--no-tty", "--homedir", "/tmp/my keys"]);
        assert!(split_command_line("   ").is_err());
    }
}
