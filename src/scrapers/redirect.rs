//! Redirect resolution for aggregator links.

use super::{FetchError, ResolveUrl};
use tracing::instrument;

/// Follows HTTP redirects and reports where a link ends up.
///
/// The redirect limit and timeout come from the client (see
/// [`super::http_client`]).
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    client: reqwest::Client,
}

impl RedirectResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ResolveUrl for RedirectResolver {
    #[instrument(level = "debug", skip(self))]
    async fn resolve(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.url().to_string())
    }
}
