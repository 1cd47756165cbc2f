//! HTTP downloads.
//!
//! Only `http` and `https` URLs are fetched. The whole body is held in
//! memory; rules typically hand it straight to [`unpack`](super::unpack).

use std::sync::Arc;

use tracing::{debug, info};

use crate::computable::Computable;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::util::hash::hash_bytes;

/// Download `url`.
pub fn fetch_url(url: &str, config: &EngineConfig) -> Computable<Arc<[u8]>> {
  let url = url.to_string();
  let timeout = config.fetch_timeout;

  Computable::from_future(async move {
    let parsed = reqwest::Url::parse(&url).map_err(|e| fetch_failed(&url, e))?;
    match parsed.scheme() {
      "http" | "https" => {}
      other => return Err(fetch_failed(&url, format!("unsupported protocol: {other}"))),
    }

    info!(url = %url, "fetching URL");
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| fetch_failed(&url, e))?;

    let response = client.get(parsed).send().await.map_err(|e| fetch_failed(&url, e))?;
    if !response.status().is_success() {
      return Err(fetch_failed(&url, format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| fetch_failed(&url, e))?;
    info!(url = %url, size = bytes.len(), "download complete");
    Ok(Arc::from(bytes.as_ref()))
  })
}

/// Download `url` and check its SHA-256 against `expected_sha256` (hex).
pub fn fetch_url_verified(url: &str, expected_sha256: &str, config: &EngineConfig) -> Computable<Arc<[u8]>> {
  let url_owned = url.to_string();
  let expected = expected_sha256.to_ascii_lowercase();
  fetch_url(url, config).map(move |data| {
    verify_sha256(&url_owned, &data, &expected)?;
    Ok(data)
  })
}

fn verify_sha256(url: &str, data: &[u8], expected: &str) -> Result<()> {
  let actual = hash_bytes(data).0;
  if actual != expected {
    return Err(Error::HashMismatch {
      url: url.to_string(),
      expected: expected.to_string(),
      actual,
    });
  }
  debug!(url = %url, "hash verified");
  Ok(())
}

fn fetch_failed(url: &str, message: impl ToString) -> Error {
  Error::FetchFailed {
    url: url.to_string(),
    message: message.to_string(),
  }
}
