// reqwest clients for the external collaborators.

pub mod rewards;
pub mod verifier;

pub use rewards::HttpRewards;
pub use verifier::HttpVerifier;

use std::fmt;

#[derive(Debug)]
pub enum ClientInitError {
    InvalidUrl(String),
    Http(reqwest::Error),
}

impl fmt::Display for ClientInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientInitError::InvalidUrl(reason) => write!(f, "invalid base url: {reason}"),
            ClientInitError::Http(e) => write!(f, "failed to build http client: {e}"),
        }
    }
}

impl std::error::Error for ClientInitError {}

impl From<reqwest::Error> for ClientInitError {
    fn from(e: reqwest::Error) -> Self {
        ClientInitError::Http(e)
    }
}

// Parses a collaborator base url that can take extra path segments.
pub(crate) fn parse_base_url(base_url: &str) -> Result<reqwest::Url, ClientInitError> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| ClientInitError::InvalidUrl(format!("{base_url}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ClientInitError::InvalidUrl(format!(
            "{base_url}: cannot carry path segments"
        )));
    }
    Ok(url)
}

// Base url with `segments` appended, each percent-encoded as one path segment.
pub(crate) fn join_segments(base: &reqwest::Url, segments: &[&str]) -> reqwest::Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_base_has_trailing_slash_then_segments_are_joined_once() {
        let base = parse_base_url("http://verifier.local/api/").expect("valid url");

        let url = join_segments(&base, &["verify-token", "abc"]);

        assert_eq!(url.as_str(), "http://verifier.local/api/verify-token/abc");
    }

    #[test]
    fn when_segment_contains_reserved_characters_then_it_stays_one_segment() {
        let base = parse_base_url("http://verifier.local").expect("valid url");

        let url = join_segments(&base, &["verify-token", "a/b?c d"]);

        assert_eq!(
            url.as_str(),
            "http://verifier.local/verify-token/a%2Fb%3Fc%20d"
        );
    }

    #[test]
    fn when_base_url_is_not_hierarchical_then_it_is_rejected() {
        assert!(matches!(
            parse_base_url("mailto:someone@example.com"),
            Err(ClientInitError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_base_url("not a url"),
            Err(ClientInitError::InvalidUrl(_))
        ));
    }
}
