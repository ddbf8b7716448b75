//! A shared, pooled HTTP client and a small JSON-request helper, used by
//! every provider adapter and the download pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::StreamExt;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::errors::ExtentError;

/// A `hyper` client shared between every adapter and the download pool.
pub type SharedHttpClient = Arc<Client<HttpsConnector<HttpConnector>>>;

/// Build a shared, connection-pooled HTTPS client with keep-alive and HTTP/2
/// enabled.
pub fn shared_http_client(concurrency: usize) -> SharedHttpClient {
    Arc::new(
        Client::builder().pool_max_idle_per_host(concurrency).build(
            HttpsConnectorBuilder::new()
                .with_native_roots()
                .https_only()
                .enable_http2()
                .build(),
        ),
    )
}

/// Issue a `GET` request against `url`, expecting a JSON body, and decode it
/// as `T`. Adapters use this for every metadata/listing call.
///
/// Distinguishes transient failures (local HTTP stack errors, 5xx, 429) from
/// permanent ones (4xx other than 429) so callers can decide whether to
/// retry (spec §4.6: "network/server 5xx and 429 are transient; 4xx (other
/// than 429) are permanent").
#[instrument(level = "debug", skip(client), fields(url = %url))]
pub async fn json_request<T: DeserializeOwned>(
    client: &SharedHttpClient,
    url: &str,
    provider: &str,
    timeout: Duration,
) -> Result<T, ExtentError> {
    let start = Instant::now();
    let req = Request::builder()
        .method("GET")
        .uri(url)
        .header("Accept", "application/json")
        .body(Body::empty())
        .map_err(|err| ExtentError::ProviderPermanent {
            provider: provider.to_owned(),
            message: format!("could not build request: {err}"),
        })?;

    let response = tokio::time::timeout(timeout, client.request(req))
        .await
        .map_err(|_| ExtentError::ProviderTransient {
            provider: provider.to_owned(),
            message: format!("request to {url} timed out after {timeout:?}"),
        })?
        .map_err(|err| {
            counter!("geoextent.http.transport_errors.count", 1, "provider" => provider.to_owned());
            ExtentError::ProviderTransient {
                provider: provider.to_owned(),
                message: format!("transport error: {err}"),
            }
        })?;

    let status = response.status();
    let mut body_data = Vec::new();
    let mut body = response.into_body();
    while let Some(chunk_result) = body.next().await {
        let chunk = chunk_result.map_err(|err| ExtentError::ProviderTransient {
            provider: provider.to_owned(),
            message: format!("error reading response body: {err}"),
        })?;
        body_data.extend_from_slice(&chunk);
    }

    histogram!(
        "geoextent.http.request.duration_seconds",
        start.elapsed().as_secs_f64(),
        "provider" => provider.to_owned(),
    );

    if status.is_success() {
        serde_json::from_slice(&body_data).map_err(|err| ExtentError::ProviderPermanent {
            provider: provider.to_owned(),
            message: format!("could not decode JSON response from {url}: {err}"),
        })
    } else if status.is_server_error() || status.as_u16() == 429 {
        counter!("geoextent.http.retryable_errors.count", 1, "provider" => provider.to_owned());
        Err(ExtentError::ProviderTransient {
            provider: provider.to_owned(),
            message: format!("{status} from {url}"),
        })
    } else {
        counter!("geoextent.http.permanent_errors.count", 1, "provider" => provider.to_owned());
        Err(ExtentError::ProviderPermanent {
            provider: provider.to_owned(),
            message: format!("{status} from {url}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_client_can_be_constructed_and_cloned() {
        let client = shared_http_client(4);
        let _clone = client.clone();
    }
}
