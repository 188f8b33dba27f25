use mpl_token_metadata::accounts::Metadata;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;

use crate::error::{LauncherError, LauncherResult};

pub fn metadata_pda(mint: &Pubkey) -> Pubkey {
    Metadata::find_pda(mint).0
}

/// Strips the NUL padding the metadata program stores strings with.
pub fn trim_padded(s: &str) -> String {
    s.trim_matches('\0').to_string()
}

pub fn deserialize_metadata(address: &Pubkey, data: &[u8]) -> LauncherResult<Metadata> {
    Metadata::safe_deserialize(data).map_err(|e| LauncherError::InvalidAccount {
        address: *address,
        reason: format!("failed to deserialize metadata: {:?}", e),
    })
}

/// MIME type for an image, from its file extension.
pub fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "image/png",
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetadataFile {
    pub uri: String,
    #[serde(rename = "type")]
    pub mime: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetadataCreator {
    pub address: String,
    pub share: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetadataProperties {
    pub files: Vec<MetadataFile>,
    pub category: String,
    pub creators: Vec<MetadataCreator>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetadataLinks {
    pub website: String,
    pub twitter: String,
    pub telegram: String,
    pub discord: String,
}

/// Off-chain JSON document the on-chain `uri` points to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OffChainMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
    pub external_url: String,
    pub attributes: Vec<serde_json::Value>,
    pub properties: MetadataProperties,
    pub links: MetadataLinks,
}

impl OffChainMetadata {
    pub fn set_image(&mut self, url: &str, mime: &str) {
        self.image = url.to_string();
        self.properties.files = vec![MetadataFile {
            uri: url.to_string(),
            mime: mime.to_string(),
        }];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey;

    #[test]
    fn usdc_metadata_address() {
        let usdc = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
        assert_eq!(
            metadata_pda(&usdc),
            pubkey!("5x38Kp4hvdomTCnCrAny4UtMUt5rQBdB6px2K1Ui45Wq")
        );
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(image_mime(Path::new("logo.JPG")), "image/jpeg");
        assert_eq!(image_mime(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(image_mime(Path::new("logo")), "image/png");
    }

    #[test]
    fn document_shape() {
        let mut doc = OffChainMetadata {
            name: "Cosmic".to_string(),
            symbol: "CSMC".to_string(),
            ..Default::default()
        };
        doc.set_image("https://gw/ipfs/cid", "image/png");

        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v["image"], "https://gw/ipfs/cid");
        assert_eq!(v["properties"]["files"][0]["type"], "image/png");
        assert_eq!(v["links"]["discord"], "");
        assert!(v["attributes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn trims_nul_padding() {
        assert_eq!(trim_padded("ABC\0\0\0"), "ABC");
    }
}
