//! Figshare, identified by a `10.6084/m9.figshare.<id>` DOI or a
//! `figshare.com/articles/.../<id>` URL. Figshare articles rarely declare a
//! spatial extent in metadata, so this adapter mostly supplies files for
//! the download strategy.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::adapter::{ProviderAdapter, ProviderMetadata};
use crate::descriptor::FileDescriptor;
use crate::errors::ExtentError;
use crate::http::{json_request, SharedHttpClient};
use crate::identifier::Identifier;

lazy_static! {
    static ref DOI_PATTERN: Regex = Regex::new(r"^10\.6084/m9\.figshare\.(\d+)").unwrap();
    static ref URL_PATTERN: Regex = Regex::new(r"figshare\.com/articles/[^/]+/(\d+)").unwrap();
    static ref TRAILING_DIGITS: Regex = Regex::new(r"(\d+)$").unwrap();
}

#[derive(Debug, Deserialize)]
struct FigshareArticle {
    #[serde(default)]
    files: Vec<FigshareFile>,
}

#[derive(Debug, Deserialize)]
struct FigshareFile {
    name: String,
    #[serde(default)]
    size: Option<u64>,
    download_url: String,
}

/// A Figshare-compatible instance: the public `api.figshare.com` by
/// default, or an institutional portal that mounts the same `/v2/articles`
/// API under its own base URL (spec §4.7: "Figshare incl. institutional
/// portals", e.g. Mendeley Data, 4TU.ResearchData).
pub struct Figshare {
    api_base_url: String,
    friendly_name: String,
    client: SharedHttpClient,
    timeout: Duration,
}

impl Figshare {
    pub fn new(client: SharedHttpClient, timeout: Duration) -> Figshare {
        Figshare {
            api_base_url: "https://api.figshare.com/v2".to_owned(),
            friendly_name: "Figshare".to_owned(),
            client,
            timeout,
        }
    }

    /// An institutional Figshare portal reachable at its own API base URL,
    /// reported under its own name rather than plain "Figshare".
    pub fn institutional(
        friendly_name: impl Into<String>,
        api_base_url: impl Into<String>,
        client: SharedHttpClient,
        timeout: Duration,
    ) -> Figshare {
        Figshare {
            api_base_url: api_base_url.into(),
            friendly_name: friendly_name.into(),
            client,
            timeout,
        }
    }

    /// The public `api.figshare.com`'s own DOI/URL shape. Used by
    /// [`ProviderAdapter::matches`] — institutional instances are matched
    /// by DOI prefix through a [`super::registry_data::HostMatched`]
    /// wrapper instead, so this is the only recognizer the public instance
    /// needs.
    fn public_article_id(&self, identifier: &Identifier) -> Option<String> {
        let s = identifier.as_str();
        DOI_PATTERN
            .captures(s)
            .or_else(|| URL_PATTERN.captures(s))
            .map(|caps| caps[1].to_owned())
    }

    /// The numeric article id to fetch, once an identifier is already known
    /// to belong to this instance (either via [`public_article_id`] or via
    /// the host-matched wrapper's DOI-prefix check). Institutional portals
    /// mint DOIs as `<prefix>/<numeric article id>`, the same convention
    /// the public instance uses after its `m9.figshare.` segment.
    ///
    /// [`public_article_id`]: Figshare::public_article_id
    fn article_id(&self, identifier: &Identifier) -> Option<String> {
        self.public_article_id(identifier)
            .or_else(|| TRAILING_DIGITS.captures(identifier.as_str()).map(|caps| caps[1].to_owned()))
    }
}

#[async_trait]
impl ProviderAdapter for Figshare {
    fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    fn matches(&self, identifier: &Identifier) -> bool {
        self.public_article_id(identifier).is_some()
    }

    fn supports_metadata(&self) -> bool {
        false
    }

    async fn fetch_metadata(
        &self,
        _identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError> {
        Ok(ProviderMetadata::default())
    }

    async fn enumerate_files(
        &self,
        identifier: &Identifier,
    ) -> Result<Vec<FileDescriptor>, ExtentError> {
        let article_id = self
            .article_id(identifier)
            .ok_or_else(|| ExtentError::UnrecognizedIdentifier {
                identifier: identifier.to_string(),
            })?;
        let url = format!("{}/articles/{article_id}", self.api_base_url);
        let article: FigshareArticle =
            json_request(&self.client, &url, self.friendly_name(), self.timeout).await?;
        Ok(article
            .files
            .into_iter()
            .map(|file| {
                let mut descriptor = FileDescriptor::new(file.name, file.download_url);
                if let Some(size) = file.size {
                    descriptor = descriptor.with_declared_size(size);
                }
                descriptor
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn figshare() -> Figshare {
        Figshare::new(crate::http::shared_http_client(1), Duration::from_secs(5))
    }

    #[test]
    fn matches_figshare_doi() {
        let identifier = Identifier::normalize("10.6084/m9.figshare.7890123").unwrap();
        assert!(figshare().matches(&identifier));
    }

    #[test]
    fn does_not_declare_metadata_support() {
        assert!(!figshare().supports_metadata());
    }

    #[test]
    fn public_instance_does_not_match_unrelated_dois() {
        // Regression guard: matches() must not fall back to the generic
        // trailing-digit article id extractor, or it would also claim
        // every other numeric-suffixed DOI (e.g. Dryad's).
        let identifier = Identifier::normalize("10.5061/dryad.abc123").unwrap();
        assert!(!figshare().matches(&identifier));
    }

    #[test]
    fn institutional_instance_resolves_article_id_by_trailing_digits() {
        let mendeley = Figshare::institutional(
            "Mendeley Data",
            "https://api.figshare.com/v2",
            crate::http::shared_http_client(1),
            Duration::from_secs(5),
        );
        let identifier = Identifier::normalize("10.17632/abcd1234ef.2").unwrap();
        assert_eq!(mendeley.article_id(&identifier).as_deref(), Some("2"));
    }
}
