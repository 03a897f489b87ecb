use std::time::Duration;

use reqwest::{Client, Response, Url};

use crate::errors::{CoreError, Result};

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

/// builds the shared client. `timeout` is the only cancellation applied to requests.
pub fn build_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder.build().map_err(|source| CoreError::BuildClient {
        context: "building reqwest client",
        source,
    })
}

/// passes successful responses through and turns anything else into [`CoreError::HttpStatus`].
pub async fn ensure_success(response: Response, context: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    Err(CoreError::HttpStatus {
        context: context.to_string(),
        status,
        body,
    })
}

/// `scheme://host[:port]` of a url, without trailing slash.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let scheme = parsed.scheme();
    Some(match parsed.port() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    })
}

/// resolves `href` against `base`; handles absolute, protocol-relative and relative links.
pub fn fix_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    if let Ok(absolute) = Url::parse(href) {
        return Some(absolute.to_string());
    }

    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_of_drops_path_and_keeps_port() {
        assert_eq!(
            origin_of("https://kuronime.biz/anime/foo/").as_deref(),
            Some("https://kuronime.biz")
        );
        assert_eq!(
            origin_of("http://127.0.0.1:8080/x?y=1").as_deref(),
            Some("http://127.0.0.1:8080")
        );
        assert_eq!(origin_of("not a url"), None);
    }

    #[test]
    fn fix_url_resolves_relative_forms() {
        let base = "https://kuronime.biz/";
        assert_eq!(
            fix_url(base, "/anime/x").as_deref(),
            Some("https://kuronime.biz/anime/x")
        );
        assert_eq!(
            fix_url(base, "//cdn.test/poster.jpg").as_deref(),
            Some("https://cdn.test/poster.jpg")
        );
        assert_eq!(
            fix_url(base, "https://other.test/a").as_deref(),
            Some("https://other.test/a")
        );
        assert_eq!(fix_url(base, "  "), None);
    }
}
