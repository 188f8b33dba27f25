// src/uploader.rs
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

use crate::config::PinataConfig;
use crate::error::{LauncherError, LauncherResult};
use crate::metadata::{image_mime, OffChainMetadata};

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAssets {
    pub image_url: String,
    pub metadata_url: String,
}

/// Pins token images and metadata documents to IPFS through Pinata.
#[derive(Clone)]
pub struct PinataUploader {
    http: Client,
    jwt: String,
    gateway: String,
    api_url: String,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn image_pin_metadata(ts: i64) -> Value {
    json!({
        "name": format!("token-image-{}", ts),
        "keyvalues": { "type": "token-image", "timestamp": ts.to_string() }
    })
}

fn document_pin_metadata(symbol: &str, ts: i64) -> Value {
    let symbol = symbol.to_lowercase();
    json!({
        "name": format!("token-metadata-{}-{}", symbol, ts),
        "keyvalues": { "type": "token-metadata", "symbol": symbol, "timestamp": ts.to_string() }
    })
}

impl PinataUploader {
    pub fn new(jwt: &str, gateway: &str, api_url: &str) -> LauncherResult<Self> {
        if jwt.trim().is_empty() {
            return Err(LauncherError::Config(
                "pinata.jwt (or PINATA_JWT) is required for uploads".to_string(),
            ));
        }
        let http = Client::builder().gzip(true).brotli(true).deflate(true).build()?;
        Ok(Self {
            http,
            jwt: jwt.trim().to_string(),
            gateway: gateway.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &PinataConfig) -> LauncherResult<Self> {
        Self::new(&cfg.jwt, &cfg.gateway, &cfg.api_url)
    }

    pub fn gateway_url(&self, cid: &str) -> String {
        if self.gateway.starts_with("http://") || self.gateway.starts_with("https://") {
            format!("{}/ipfs/{}", self.gateway, cid)
        } else {
            format!("https://{}/ipfs/{}", self.gateway, cid)
        }
    }

    async fn pin_file(
        &self,
        file_name: String,
        bytes: Vec<u8>,
        mime: &str,
        pin_metadata: Value,
        pin_options: Option<Value>,
    ) -> LauncherResult<String> {
        let url = format!("{}/pinning/pinFileToIPFS", self.api_url);
        let part = Part::bytes(bytes).file_name(file_name).mime_str(mime)?;
        let mut form = Form::new()
            .part("file", part)
            .text("pinataMetadata", pin_metadata.to_string());
        if let Some(opts) = pin_options {
            form = form.text("pinataOptions", opts.to_string());
        }

        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LauncherError::Upload { status: status.as_u16(), body });
        }
        let pinned: PinResponse = resp.json().await?;
        Ok(pinned.ipfs_hash)
    }

    pub async fn upload_image(&self, path: &Path) -> LauncherResult<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("token-image")
            .to_string();
        info!("uploading image {} ({} bytes) to IPFS", file_name, bytes.len());

        let cid = self
            .pin_file(
                file_name,
                bytes,
                image_mime(path),
                image_pin_metadata(now_millis()),
                Some(json!({ "cidVersion": 1, "wrapWithDirectory": false })),
            )
            .await?;
        let url = self.gateway_url(&cid);
        info!("image pinned: {}", url);
        Ok(url)
    }

    pub async fn upload_metadata(&self, doc: &OffChainMetadata) -> LauncherResult<String> {
        let bytes = serde_json::to_vec(doc)?;
        info!("uploading metadata for {} to IPFS", doc.symbol);

        let cid = self
            .pin_file(
                "metadata.json".to_string(),
                bytes,
                "application/json",
                document_pin_metadata(&doc.symbol, now_millis()),
                None,
            )
            .await?;
        let url = self.gateway_url(&cid);
        info!("metadata pinned: {}", url);
        Ok(url)
    }

    /// Image first, then the document pointing at it.
    pub async fn upload_token_assets(
        &self,
        image: &Path,
        mut doc: OffChainMetadata,
    ) -> LauncherResult<UploadedAssets> {
        let image_url = self.upload_image(image).await?;
        doc.set_image(&image_url, image_mime(image));
        let metadata_url = self.upload_metadata(&doc).await?;
        Ok(UploadedAssets { image_url, metadata_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_jwt() {
        assert!(matches!(
            PinataUploader::new("  ", "gateway.pinata.cloud", "https://api.pinata.cloud"),
            Err(LauncherError::Config(_))
        ));
    }

    #[test]
    fn gateway_urls() {
        let up = PinataUploader::new("jwt", "gateway.pinata.cloud", "https://api.pinata.cloud/")
            .unwrap();
        assert_eq!(up.gateway_url("bafy"), "https://gateway.pinata.cloud/ipfs/bafy");
        assert_eq!(up.api_url, "https://api.pinata.cloud");

        let up = PinataUploader::new("jwt", "https://my.mypinata.cloud/", "https://x").unwrap();
        assert_eq!(up.gateway_url("cid"), "https://my.mypinata.cloud/ipfs/cid");
    }

    #[test]
    fn pin_names() {
        assert_eq!(image_pin_metadata(42)["name"], "token-image-42");
        let m = document_pin_metadata("CSMC", 7);
        assert_eq!(m["name"], "token-metadata-csmc-7");
        assert_eq!(m["keyvalues"]["symbol"], "csmc");
    }

    #[test]
    fn parses_pin_response() {
        let r: PinResponse =
            serde_json::from_str(r#"{"IpfsHash":"bafkrei","PinSize":12,"Timestamp":"x"}"#).unwrap();
        assert_eq!(r.ipfs_hash, "bafkrei");
    }
}
