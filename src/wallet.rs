use solana_sdk::signature::{read_keypair_file, Keypair};
use std::{fs, path::Path};

use crate::error::{LauncherError, LauncherResult};

/// Loads the signing wallet. Accepts the CLI keypair file format, any file
/// holding the 64 secret bytes as a JSON array, or a base58 secret key string.
pub fn load_keypair(path: &str) -> LauncherResult<Keypair> {
    if !Path::new(path).exists() {
        return Err(LauncherError::Wallet(format!("wallet file not found: {}", path)));
    }
    if let Ok(kp) = read_keypair_file(path) {
        return Ok(kp);
    }

    let data = fs::read_to_string(path)?;
    if data.trim_start().starts_with('[') {
        let bytes: Vec<u8> = serde_json::from_str(&data)?;
        return Keypair::from_bytes(&bytes)
            .map_err(|e| LauncherError::Wallet(format!("invalid keypair in {}: {}", path, e)));
    }
    let bytes = bs58::decode(data.trim())
        .into_vec()
        .map_err(|_| LauncherError::Wallet(format!("unsupported keypair format: {}", path)))?;
    Keypair::from_bytes(&bytes)
        .map_err(|e| LauncherError::Wallet(format!("invalid keypair in {}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Signer;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("token-launcher-{}-{}", std::process::id(), name))
    }

    #[test]
    fn loads_json_array_keypair() {
        let kp = Keypair::new();
        let path = temp_path("wallet.json");
        fs::write(&path, serde_json::to_string(&kp.to_bytes().to_vec()).unwrap()).unwrap();

        let loaded = load_keypair(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.pubkey(), kp.pubkey());
        fs::remove_file(path).ok();
    }

    #[test]
    fn loads_base58_secret() {
        let kp = Keypair::new();
        let path = temp_path("wallet.b58");
        fs::write(&path, format!("{}\n", kp.to_base58_string())).unwrap();

        let loaded = load_keypair(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.pubkey(), kp.pubkey());
        fs::remove_file(path).ok();
    }

    #[test]
    fn missing_and_garbage_files_are_wallet_errors() {
        assert!(matches!(
            load_keypair("/nonexistent/wallet.json"),
            Err(LauncherError::Wallet(_))
        ));

        let path = temp_path("garbage.txt");
        fs::write(&path, "not a key").unwrap();
        assert!(matches!(
            load_keypair(path.to_str().unwrap()),
            Err(LauncherError::Wallet(_))
        ));
        fs::remove_file(path).ok();
    }
}
