//! Shared HTTP client construction. Every network call of a run goes through a client built
//! here, so every call carries a connect and a request timeout.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("pdf-relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

pub fn build_client(settings: &HttpSettings) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .user_agent(settings.user_agent.clone())
        .build()
}

/// Joins a site root and a path without doubling or dropping the separating slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::join_url;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("https://x", "/sitemap.xml"), "https://x/sitemap.xml");
        assert_eq!(join_url("https://x/", "sitemap.xml"), "https://x/sitemap.xml");
        assert_eq!(join_url("https://x/", "/"), "https://x/");
        assert_eq!(join_url("https://x", "/regler/"), "https://x/regler/");
    }
}
