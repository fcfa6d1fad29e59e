//! Network access to the MapShare feed endpoint.

use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder};
use tracing::debug;

use super::{FeedError, FeedUrl};

const KML_ACCEPT: &str = "application/vnd.google-earth.kml+xml, application/xml, text/xml";

/// Performs the raw feed request. Implementations do no caching or validation.
pub trait FeedSource: Send + Sync {
    fn fetch(
        &self,
        url: &FeedUrl,
        password: Option<&str>,
    ) -> impl Future<Output = Result<String, FeedError>> + Send;
}

/// reqwest-backed feed source.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn with_timeout(timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Build the feed request: a `POST` with Basic auth when a password is set.
    fn request(&self, url: &FeedUrl, password: Option<&str>) -> RequestBuilder {
        let request = self
            .client
            .post(url.as_str())
            .header(header::ACCEPT, KML_ACCEPT);

        match password {
            // MapShare uses the password alone; the username is empty
            Some(password) => request.basic_auth("", Some(password)),
            None => request,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, FeedError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(FeedError::from_status(status, &body))
        }
    }
}

impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &FeedUrl, password: Option<&str>) -> Result<String, FeedError> {
        let response = self.request(url, password).send().await?;
        let response = Self::check_response(response).await?;
        let body = response.text().await?;

        debug!(url = %url, bytes = body.len(), "Feed response received");
        Ok(body)
    }
}
