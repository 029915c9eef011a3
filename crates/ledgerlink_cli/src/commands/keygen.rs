//! Key generation.

use super::CommandResult;
use ledgerlink_protocol::{Signer, SigningIdentity};
use std::fs;
use std::path::Path;
use tracing::info;

/// Generates a signing key and writes it, hex-encoded, to `out` or stdout.
pub fn run(out: Option<&Path>) -> CommandResult {
    let identity = SigningIdentity::generate();
    let secret = identity.secret_hex();

    match out {
        Some(path) => {
            if path.exists() {
                return Err(format!("refusing to overwrite {}", path.display()).into());
            }
            fs::write(path, format!("{}\n", secret.as_str()))?;
            info!(path = %path.display(), "signing key written");
            println!("Identifier: {}", identity.identifier());
            println!("Public key: {}", identity.public_key());
        }
        None => println!("{}", secret.as_str()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_key_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.key");
        run(Some(&path)).unwrap();
        assert!(SigningIdentity::from_file(&path).is_ok());
    }

    #[test]
    fn existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.key");
        fs::write(&path, "keep me").unwrap();
        assert!(run(Some(&path)).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");
    }
}
