//! Identifier normalization (spec §4.1).
//!
//! Turns an arbitrary, opaque user-supplied string — a DOI, a DOI URL, a
//! bare provider handle, or a provider landing page — into a canonical
//! [`Identifier`] that the [`crate::adapter::ProviderRegistry`] can dispatch
//! on. Normalization never contacts the network; that happens later, in
//! `matches()` for the handful of family adapters that need to probe a host.

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::ExtentError;

lazy_static! {
    static ref DOI_URL_PREFIX: Regex =
        Regex::new(r"(?i)^(?:doi:|https?://(?:dx\.)?doi\.org/)").unwrap();
    static ref DOI_SHAPE: Regex = Regex::new(r"^(10\.\d{4,9})/(.+)$").unwrap();
}

/// A normalized identifier, ready for dispatch through the provider
/// registry.
///
/// `raw` is the canonical string form (what [`Identifier::normalize`]
/// produced); adapters additionally get the parsed `(provider_tag,
/// dataset_key)` pair once a [`crate::adapter::ProviderAdapter`] has claimed
/// it — that pairing is adapter-specific and isn't computed here, since only
/// the adapter that claims an identifier knows how to carve a dataset key
/// out of it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identifier {
    raw: String,
}

impl Identifier {
    /// Normalize an arbitrary input string.
    ///
    /// Rules (spec §4.1):
    /// - reject empty input or input containing control characters
    /// - strip `doi:`/`DOI:`/`https://doi.org/`/`https://dx.doi.org/`
    ///   prefixes to expose the bare DOI
    /// - lowercase only the DOI registrant prefix (`10.xxxx`), preserving
    ///   the case of the suffix
    /// - URL-decode once
    ///
    /// This function does not itself check that the result matches a
    /// registered provider — that's the registry's job, since only it knows
    /// the set of registered adapters. Callers that want
    /// `ErrUnrecognizedIdentifier` semantics should normalize, dispatch
    /// through the registry, and raise that error themselves if nothing
    /// matches (see [`crate::adapter::ProviderRegistry::resolve`]).
    pub fn normalize(input: &str) -> Result<Identifier, ExtentError> {
        if input.is_empty() {
            return Err(ExtentError::MalformedIdentifier {
                reason: "identifier is empty".to_owned(),
            });
        }
        if input.chars().any(|c| c.is_control()) {
            return Err(ExtentError::MalformedIdentifier {
                reason: "identifier contains control characters".to_owned(),
            });
        }

        let trimmed = input.trim();
        let decoded = percent_decode_once(trimmed);
        let stripped = DOI_URL_PREFIX.replace(&decoded, "");

        let canonical = if let Some(caps) = DOI_SHAPE.captures(&stripped) {
            let prefix = caps.get(1).unwrap().as_str().to_ascii_lowercase();
            let suffix = caps.get(2).unwrap().as_str();
            format!("{}/{}", prefix, suffix)
        } else {
            stripped.into_owned()
        };

        Ok(Identifier { raw: canonical })
    }

    /// The canonical string form of this identifier.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True if this identifier, in canonical form, looks like a DOI (as
    /// opposed to a bare handle or a landing-page URL).
    pub fn is_doi(&self) -> bool {
        DOI_SHAPE.is_match(&self.raw)
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Decode a string as percent-encoded exactly once.
fn percent_decode_once(s: &str) -> std::borrow::Cow<'_, str> {
    percent_encoding::percent_decode_str(s)
        .decode_utf8()
        .unwrap_or(std::borrow::Cow::Borrowed(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            Identifier::normalize(""),
            Err(ExtentError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn rejects_control_characters() {
        assert!(matches!(
            Identifier::normalize("10.5281/zenodo.\u{0007}3446746"),
            Err(ExtentError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn strips_doi_url_prefix() {
        let a = Identifier::normalize("https://doi.org/10.5281/zenodo.3446746").unwrap();
        let b = Identifier::normalize("10.5281/zenodo.3446746").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn strips_doi_scheme_prefix_case_insensitively() {
        let a = Identifier::normalize("DOI:10.5281/zenodo.3446746").unwrap();
        let b = Identifier::normalize("doi:10.5281/zenodo.3446746").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn lowercases_only_the_registrant_prefix() {
        let id = Identifier::normalize("10.5281/Zenodo.3446746").unwrap();
        assert_eq!(id.as_str(), "10.5281/Zenodo.3446746");
    }

    #[test]
    fn lowercases_an_uppercase_prefix() {
        let id = Identifier::normalize("10.5281/ABC123").unwrap();
        assert_eq!(id.as_str(), "10.5281/ABC123");
        let id = Identifier::normalize("DOI:10.5281/ABC123").unwrap();
        assert_eq!(id.as_str(), "10.5281/ABC123");
    }

    #[test]
    fn idempotent() {
        let once = Identifier::normalize("https://doi.org/10.5281/zenodo.3446746").unwrap();
        let twice = Identifier::normalize(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn decodes_percent_encoding_once() {
        let id = Identifier::normalize("10.25532/OPARA-581%20A").unwrap();
        assert_eq!(id.as_str(), "10.25532/OPARA-581 A");
    }

    #[test]
    fn passes_through_bare_urls() {
        let id = Identifier::normalize(
            "https://earth-search.aws.element84.com/v1/collections/naip",
        )
        .unwrap();
        assert_eq!(
            id.as_str(),
            "https://earth-search.aws.element84.com/v1/collections/naip"
        );
        assert!(!id.is_doi());
    }
}
