use anyhow::{anyhow, Result};
use std::str::FromStr;
use url::Url;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub app_mode: String,
    pub feed_page_size: usize,
    pub anchor_feed_page_size: usize,
    pub double_tap_window_ms: u64,
    pub heart_burst_ms: u64,
    pub http_timeout_seconds: u64,
    pub session_path: String,
    pub gallery_id: Option<i64>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(lookup);

        let api_base_url = vars.required("API_BASE_URL")?;
        Url::parse(&api_base_url).map_err(|err| anyhow!("invalid API_BASE_URL: {}", err))?;

        let feed_page_size: usize = vars.parse_or("FEED_PAGE_SIZE", "30")?;
        let anchor_feed_page_size: usize = vars.parse_or("ANCHOR_FEED_PAGE_SIZE", "10")?;
        if feed_page_size == 0 || anchor_feed_page_size == 0 {
            return Err(anyhow!("page sizes must be greater than zero"));
        }

        Ok(Self {
            api_base_url,
            app_mode: vars.or("APP_MODE", "feed"),
            feed_page_size,
            anchor_feed_page_size,
            double_tap_window_ms: vars.parse_or("DOUBLE_TAP_WINDOW_MS", "300")?,
            heart_burst_ms: vars.parse_or("HEART_BURST_MS", "800")?,
            http_timeout_seconds: vars.parse_or("HTTP_TIMEOUT_SECONDS", "15")?,
            session_path: vars.or("SESSION_PATH", ".pameran/session.json"),
            gallery_id: vars.optional_parse("GALLERY_ID")?,
        })
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn or(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> Result<String> {
        (self.0)(key).ok_or_else(|| anyhow!("missing required env var: {}", key))
    }

    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        self.or(key, default)
            .parse::<T>()
            .map_err(|err| anyhow!("invalid {}: {}", key, err))
    }

    fn optional_parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        match (self.0)(key) {
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|err| anyhow!("invalid {}: {}", key, err)),
            None => Ok(None),
        }
    }
}

