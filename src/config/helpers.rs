use serde::{Deserialize, Deserializer, de};
use std::time::Duration;
use url::Url;

/// Deserializes a `Duration` from a whole number of milliseconds.
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

/// Deserializes a `Duration` from a whole number of seconds.
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// Deserializes a list of endpoint URLs.
///
/// Accepts either a sequence or a single comma separated string, the latter
/// being what an environment variable override produces.
pub fn deserialize_urls<'de, D>(deserializer: D) -> Result<Vec<Url>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum UrlList {
        Many(Vec<String>),
        One(String),
    }

    let raw = match UrlList::deserialize(deserializer)? {
        UrlList::Many(urls) => urls,
        UrlList::One(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    };

    raw.into_iter().map(|url_str| Url::parse(&url_str).map_err(de::Error::custom)).collect()
}
