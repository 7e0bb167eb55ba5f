// src/fetch/mod.rs

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

const ANAPLAN_API: &str = "https://api.anaplan.com/2/0";

/// Basic-auth credentials for a protected export endpoint.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Read `<PREFIX>_USERNAME` / `<PREFIX>_PASSWORD` from the environment.
    pub fn from_env(prefix: &str) -> Option<Self> {
        let username = std::env::var(format!("{}_USERNAME", prefix)).ok()?;
        let password = std::env::var(format!("{}_PASSWORD", prefix)).ok()?;
        Some(Self { username, password })
    }
}

/// True if `input` looks like an `http(s)://` address rather than a path.
pub fn is_remote(input: &str) -> bool {
    Url::parse(input)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Export URL of the first chunk of a planning-model file.
pub fn anaplan_chunk_url(workspace_id: &str, model_id: &str, file_id: &str) -> Result<Url> {
    let url = format!(
        "{}/workspaces/{}/models/{}/files/{}/chunks/0",
        ANAPLAN_API, workspace_id, model_id, file_id
    );
    Url::parse(&url).with_context(|| format!("building export URL {}", url))
}

/// Last path segment of `url`, used to name reports for remote inputs.
pub fn source_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("download.csv")
        .to_string()
}

/// Download `url` and return the body bytes. Non-2xx statuses are errors.
pub async fn fetch_csv(
    client: &Client,
    url: &Url,
    credentials: Option<&Credentials>,
) -> Result<Vec<u8>> {
    let mut req = client.get(url.as_str());
    if let Some(c) = credentials {
        req = req.basic_auth(&c.username, Some(&c.password));
    }
    debug!(url = %url, auth = credentials.is_some(), "requesting CSV");

    let resp = req
        .send()
        .await
        .with_context(|| format!("requesting {}", url))?
        .error_for_status()
        .with_context(|| format!("fetching {}", url))?;
    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("reading body of {}", url))?;

    if bytes.is_empty() {
        return Err(anyhow!("{} returned an empty body", url));
    }
    info!(url = %url, bytes = bytes.len(), "downloaded");
    Ok(bytes.to_vec())
}
