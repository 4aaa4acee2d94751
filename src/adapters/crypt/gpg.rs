use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::core::errors::{LayerlockError, Result};
use crate::core::models::key_entry::KeyEntry;

/// PGP backend that shells out to the system `gpg` binary.
///
/// Requires GPG to be installed. Intended for environments that already
/// run GPG infrastructure; the other backends need no external tools.
pub struct GpgClient {
    /// Path to the gpg binary (defaults to "gpg").
    gpg_path: PathBuf,
    /// GnuPG home directory; `None` means gpg's own default.
    homedir: Option<PathBuf>,
}

impl GpgClient {
    /// Create a client using the default `gpg` binary and homedir.
    pub fn new() -> Self {
        Self {
            gpg_path: PathBuf::from("gpg"),
            homedir: None,
        }
    }

    /// Create a client with an explicit binary path and/or homedir.
    pub fn with_options(binary: Option<&str>, homedir: Option<&str>) -> Self {
        Self {
            gpg_path: binary.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("gpg")),
            homedir: homedir.map(PathBuf::from),
        }
    }

    /// Check if GPG is available on the system.
    pub fn is_available(&self) -> bool {
        Command::new(&self.gpg_path)
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    /// Wrap data for the given PGP identities using the local keyring.
    pub fn encrypt_for(&self, identities: &[String], plaintext: &[u8]) -> Result<Vec<u8>> {
        if identities.is_empty() {
            return Err(LayerlockError::EncryptionFailed {
                reason: "No pgp identities provided".into(),
            });
        }

        let mut args = self.base_args();
        args.push("--encrypt".to_string());
        args.extend(["--trust-model".to_string(), "always".to_string()]);
        for identity in identities {
            args.push("--recipient".to_string());
            args.push(identity.clone());
        }

        self.run_gpg(&args, Some(plaintext))
    }

    /// Unwrap data using the default keyring in this client's homedir.
    pub fn decrypt_default(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let mut args = self.base_args();
        args.push("--decrypt".to_string());

        self.run_gpg(&args, Some(ciphertext))
    }

    /// Unwrap data with an explicit secret keyring: import it into a
    /// scratch homedir, then decrypt there.
    pub fn decrypt_with_keyring(&self, keyring: &KeyEntry, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let scratch = tempfile::tempdir().map_err(|e| LayerlockError::EncryptionFailed {
            reason: format!("could not create scratch gpg homedir: {e}"),
        })?;
        let homedir = scratch.path().to_string_lossy().into_owned();

        let import_args = vec![
            "--batch".to_string(),
            "--yes".to_string(),
            "--homedir".to_string(),
            homedir.clone(),
            "--import".to_string(),
        ];
        self.run_gpg(&import_args, Some(&keyring.data))?;

        let mut args = vec![
            "--batch".to_string(),
            "--yes".to_string(),
            "--homedir".to_string(),
            homedir,
            "--pinentry-mode".to_string(),
            "loopback".to_string(),
        ];
        if let Some(password) = &keyring.password {
            args.push("--passphrase".to_string());
            args.push(String::from_utf8_lossy(password).into_owned());
        }
        args.push("--decrypt".to_string());

        self.run_gpg(&args, Some(ciphertext))
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec!["--batch".to_string(), "--yes".to_string()];
        if let Some(homedir) = &self.homedir {
            args.push("--homedir".to_string());
            args.push(homedir.to_string_lossy().into_owned());
        }
        args
    }

    /// Run a gpg command and return stdout on success.
    fn run_gpg(&self, args: &[String], stdin_data: Option<&[u8]>) -> Result<Vec<u8>> {
        let mut cmd = Command::new(&self.gpg_path);
        cmd.args(args);

        if let Some(data) = stdin_data {
            cmd.stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            let mut child = cmd.spawn().map_err(|e| LayerlockError::EncryptionFailed {
                reason: format!("Failed to run gpg: {e}"),
            })?;

            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(data)
                    .map_err(|e| LayerlockError::EncryptionFailed {
                        reason: format!("Failed to write to gpg stdin: {e}"),
                    })?;
            }

            let output = child
                .wait_with_output()
                .map_err(|e| LayerlockError::EncryptionFailed {
                    reason: format!("gpg process failed: {e}"),
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(LayerlockError::EncryptionFailed {
                    reason: format!("gpg exited with error: {stderr}"),
                });
            }

            Ok(output.stdout)
        } else {
            let output = cmd.output().map_err(|e| LayerlockError::EncryptionFailed {
                reason: format!("Failed to run gpg: {e}"),
            })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(LayerlockError::EncryptionFailed {
                    reason: format!("gpg exited with error: {stderr}"),
                });
            }

            Ok(output.stdout)
        }
    }
}

impl Default for GpgClient {
    fn default() -> Self {
        Self::new()
    }
}
