use anyhow::{anyhow, Result};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// POST `body` as JSON and decode the JSON reply. Non-2xx replies become
/// errors carrying the provider name, status and body.
pub(crate) async fn post_json<B, R>(
    http: &reqwest::Client,
    provider: &str,
    url: &str,
    headers: HeaderMap,
    body: &B,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = http.post(url).headers(headers).json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(anyhow!("{provider} API error ({status}): {detail}"));
    }
    Ok(response.json().await?)
}
