use std::io::Read;
use std::path::{Path, PathBuf};

use crate::core::errors::{LayerlockError, Result};
use crate::core::models::key_entry::{KeyEntry, KeySet};
use crate::core::models::recipient::{RecipientSet, RecipientSpec};
use crate::core::traits::key_probe::KeyProbe;

/// Passwords read from a file descriptor are capped at this size; the
/// bytes actually read are what counts.
const PASSWORD_FD_BUF: usize = 64;

/// Sort a recipient list into its backend buckets.
///
/// Each entry is `<protocol>:<value>`: `pgp:` identities are taken
/// verbatim, `jwe:` and `pkcs7:` values are file paths whose contents
/// must probe as a public key or an x509 certificate. A content
/// mismatch is a terminal error, never a silent reclassification.
pub fn classify_recipients(recipients: &[String], probe: &dyn KeyProbe) -> Result<RecipientSet> {
    let mut set = RecipientSet::default();

    for recipient in recipients {
        let Some((protocol, value)) = recipient.split_once(':') else {
            return Err(LayerlockError::InvalidRecipientFormat {
                spec: recipient.clone(),
            });
        };

        match protocol {
            "pgp" => set.push(RecipientSpec::Pgp(value.to_string())),
            "jwe" => {
                let path = PathBuf::from(value);
                let data = read_key_file(&path)?;
                if !probe.is_public_key(&data) {
                    return Err(LayerlockError::NotAPublicKey { path });
                }
                set.push(RecipientSpec::PublicKey(data));
            }
            "pkcs7" => {
                let path = PathBuf::from(value);
                let data = read_key_file(&path)?;
                if !probe.is_certificate(&data) {
                    return Err(LayerlockError::NotACertificate { path });
                }
                set.push(RecipientSpec::Certificate(data));
            }
            other => {
                return Err(LayerlockError::UnsupportedProtocol {
                    protocol: other.to_string(),
                });
            }
        }
    }

    Ok(set)
}

/// Sort private-key inputs into plain private keys and GPG secret
/// keyrings. Each entry takes one of the forms:
/// - `<filename>`
/// - `<filename>:file=<passwordfile>`
/// - `<filename>:pass=<password>`
/// - `<filename>:fd=<filedescriptor>`
/// - `<filename>:<password>`
///
/// A wrong or missing password is reported as such and stops
/// classification; it never falls through to the keyring probe.
pub fn classify_private_keys(key_specs: &[String], probe: &dyn KeyProbe) -> Result<KeySet> {
    let mut set = KeySet::default();

    for spec in key_specs {
        let (file, password) = match spec.split_once(':') {
            Some((file, pwd_spec)) => (file, Some(resolve_password(pwd_spec)?)),
            None => (spec.as_str(), None),
        };

        let path = PathBuf::from(file);
        let data = read_key_file(&path)?;

        // The probe reports a bad password without knowing which file
        // it came from; name it here.
        let is_priv = match probe.is_private_key(&data, password.as_deref()) {
            Ok(found) => found,
            Err(LayerlockError::WrongPassword { .. }) => {
                return Err(LayerlockError::WrongPassword { path });
            }
            Err(e) => return Err(e),
        };

        if is_priv {
            set.private_keys.push(KeyEntry { data, password });
        } else if probe.is_gpg_keyring(&data) {
            set.gpg_keyrings.push(KeyEntry { data, password });
        } else {
            return Err(LayerlockError::UnidentifiedKey { path });
        }
    }

    Ok(set)
}

/// Resolve a password specifier to raw password bytes:
/// `file=<path>`, `pass=<literal>`, `fd=<descriptor>`, or a bare
/// literal.
pub fn resolve_password(pwd_spec: &str) -> Result<Vec<u8>> {
    if let Some(path) = pwd_spec.strip_prefix("file=") {
        let path = PathBuf::from(path);
        read_key_file(&path)
    } else if let Some(literal) = pwd_spec.strip_prefix("pass=") {
        Ok(literal.as_bytes().to_vec())
    } else if let Some(fd_str) = pwd_spec.strip_prefix("fd=") {
        let fd: i32 = fd_str.parse().map_err(|_| LayerlockError::InvalidPasswordFd {
            fd: fd_str.to_string(),
        })?;
        read_password_fd(fd)
    } else {
        Ok(pwd_spec.as_bytes().to_vec())
    }
}

/// Read up to [`PASSWORD_FD_BUF`] bytes from an already-open file
/// descriptor and trim to the bytes actually read.
#[cfg(unix)]
fn read_password_fd(fd: i32) -> Result<Vec<u8>> {
    use std::os::fd::FromRawFd;

    if fd < 0 {
        return Err(LayerlockError::InvalidPasswordFd { fd: fd.to_string() });
    }

    // Takes ownership; the descriptor is closed when the read is done.
    let mut file = unsafe { std::fs::File::from_raw_fd(fd) };
    let mut buf = [0u8; PASSWORD_FD_BUF];
    let n = file.read(&mut buf).map_err(|e| LayerlockError::Transport {
        fd,
        detail: format!("could not read password: {e}"),
    })?;

    Ok(buf[..n].to_vec())
}

fn read_key_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|_| LayerlockError::FileNotFound {
        path: path.to_path_buf(),
    })
}
