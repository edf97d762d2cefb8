//! Docset catalogs: the official feed repository and the user-contributed
//! index.

use crate::error::DocsetError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// GitHub contents listing of the official feed repository
pub const OFFICIAL_FEEDS_API: &str = "https://api.github.com/repos/Kapeli/feeds/contents/";
/// Raw feed XML for one official docset
pub const OFFICIAL_FEED_BASE: &str = "https://raw.githubusercontent.com/Kapeli/feeds/master";
/// Base of the user-contributed catalog
pub const CONTRIB_BASE: &str = "https://kapeli.com/feeds/zzz/user_contributed/build";

const USER_AGENT: &str = concat!("docset/", env!("CARGO_PKG_VERSION"));

/// A user-contributed docset and where to fetch it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContribDocset {
    pub name: String,
    pub archive_url: String,
}

#[derive(Deserialize)]
struct ContentsEntry {
    name: String,
}

#[derive(Deserialize)]
struct ContribIndex {
    docsets: BTreeMap<String, ContribEntry>,
}

#[derive(Deserialize)]
struct ContribEntry {
    name: String,
    archive: String,
}

/// Blocking HTTP client for the catalogs
pub struct FeedClient {
    client: reqwest::blocking::Client,
}

impl FeedClient {
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }

    /// Names of every official docset
    pub fn official_feed_names(&self) -> crate::Result<Vec<String>> {
        let body = fetch_text(&self.client, OFFICIAL_FEEDS_API)?;
        parse_official_listing(&body)
    }

    /// Archive URL for an official docset, taken from its feed
    pub fn official_archive_url(&self, name: &str) -> crate::Result<String> {
        let feed_url = format!("{}/{}.xml", OFFICIAL_FEED_BASE, name.replace(' ', "_"));
        let xml = fetch_text(&self.client, &feed_url)?;
        parse_feed_urls(&xml)
            .into_iter()
            .next()
            .ok_or_else(|| DocsetError::FeedParse(format!("no <url> in feed {}", feed_url)))
    }

    /// Every user-contributed docset
    pub fn contributed_docsets(&self) -> crate::Result<Vec<ContribDocset>> {
        let body = fetch_text(&self.client, &format!("{}/index.json", CONTRIB_BASE))?;
        parse_contributed(&body)
    }
}

pub(crate) fn http_client(timeout: Duration) -> crate::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| DocsetError::DownloadFailed {
            url: String::new(),
            message: e.to_string(),
        })
}

/// Map a transport error to the matching error kind
pub(crate) fn fetch_error(url: &str, err: reqwest::Error) -> DocsetError {
    if err.is_timeout() {
        DocsetError::TimeoutExceeded {
            url: url.to_string(),
        }
    } else {
        DocsetError::DownloadFailed {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// GET `url`, failing on transport errors and non-success statuses
pub(crate) fn fetch(
    client: &reqwest::blocking::Client,
    url: &str,
) -> crate::Result<reqwest::blocking::Response> {
    tracing::debug!(url, "fetching");
    let resp = client.get(url).send().map_err(|e| fetch_error(url, e))?;
    if !resp.status().is_success() {
        return Err(DocsetError::DownloadFailed {
            url: url.to_string(),
            message: format!("HTTP {}", resp.status()),
        });
    }
    Ok(resp)
}

fn fetch_text(client: &reqwest::blocking::Client, url: &str) -> crate::Result<String> {
    fetch(client, url)?.text().map_err(|e| fetch_error(url, e))
}

/// Docset names from the feed repository listing (`Name.xml` entries)
pub fn parse_official_listing(body: &str) -> crate::Result<Vec<String>> {
    let entries: Vec<ContentsEntry> = serde_json::from_str(body)?;
    Ok(entries
        .into_iter()
        .filter_map(|e| e.name.strip_suffix(".xml").map(|n| n.to_string()))
        .collect())
}

/// Contents of every `<url>` element in a feed, in document order
pub fn parse_feed_urls(xml: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<url>") {
        let after = &rest[start + "<url>".len()..];
        let Some(end) = after.find("</url>") else {
            break;
        };
        let url = after[..end].trim();
        if !url.is_empty() {
            urls.push(url.to_string());
        }
        rest = &after[end..];
    }
    urls
}

/// Entries of the contributed index, sorted by key
pub fn parse_contributed(body: &str) -> crate::Result<Vec<ContribDocset>> {
    let index: ContribIndex = serde_json::from_str(body)?;
    Ok(index
        .docsets
        .into_iter()
        .map(|(key, entry)| ContribDocset {
            archive_url: format!("{}/{}/{}", CONTRIB_BASE, key, entry.archive),
            name: entry.name,
        })
        .collect())
}
