use colored::Colorize;
use ghostpass_sdk::KeyPair;
use ghostpass_token::{public_key_to_string, TokenError};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};

/// `<out>.pub` alongside the private key
fn public_key_path(private: &Path) -> PathBuf {
    let mut name = private.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}

fn write_private_key(path: &Path, pem: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, pem)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

pub fn handle_keygen(out: PathBuf, force: bool, json_output: bool) -> Result<()> {
    let public_path = public_key_path(&out);
    if !force && (out.exists() || public_path.exists()) {
        return Err(CliError::InvalidInput(format!(
            "{} already exists. Use --force to overwrite.",
            out.display()
        )));
    }

    let keypair = KeyPair::new();
    let private_pem = keypair
        .to_private_key_pem()
        .map_err(|e| TokenError::generic(format!("Failed to encode private key: {e}")))?;
    let public_pem = keypair
        .public()
        .to_pem()
        .map_err(|e| TokenError::generic(format!("Failed to encode public key: {e}")))?;

    write_private_key(&out, private_pem.as_str())?;
    fs::write(&public_path, public_pem)?;

    let public_key = public_key_to_string(&keypair.public());

    if json_output {
        let output = json!({
            "success": true,
            "private_key_path": out,
            "public_key_path": public_path,
            "public_key": public_key,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{} Key pair generated", "✓".green());
        println!("  Private key: {}", out.display());
        println!("  Public key:  {}", public_path.display());
        println!("  {}", public_key.bright_cyan());
    }

    Ok(())
}
