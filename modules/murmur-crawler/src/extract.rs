//! Extraction strategy chain — pulls one structured record out of one
//! rendered post fragment.
//!
//! Only id resolution uses a fallback chain; every other field is a direct
//! mapping with empty/absent defaults that cannot fail once an id exists.

use std::collections::BTreeMap;

use chrono::Utc;
use headless_client::{DomNode, Result};
use regex::Regex;
use sha2::{Digest, Sha256};

use murmur_common::Record;

use crate::selectors;

/// Resolve the record id for a fragment, trying strategies in order:
///
/// 1. canonical permalink pattern in an anchor href;
/// 2. dedicated id attribute on the body container;
/// 3. content fingerprint of truncated author + body.
///
/// The ordering is load-bearing — mirrors differ in which signal is
/// present, and the fingerprint is intentionally the weakest. `Ok(None)`
/// means no strategy produced anything and the fragment is discarded.
pub async fn resolve_id(fragment: &dyn DomNode) -> Result<Option<String>> {
    if let Some(link) = fragment.query(selectors::PERMALINK).await? {
        if let Some(href) = link.attribute("href").await? {
            if let Some(id) = permalink_id(&href) {
                return Ok(Some(id));
            }
        }
    }

    if let Some(body) = fragment.query(selectors::BODY).await? {
        if let Some(id) = body.attribute(selectors::ID_ATTR).await? {
            if !id.is_empty() {
                return Ok(Some(id));
            }
        }
    }

    // Last resort. Known limitation: near-identical truncated author/body
    // pairs collide. A stronger hash would change dedup identity for
    // records persisted by earlier runs, so this stays as-is.
    let author = text_of(fragment, selectors::USERNAME).await?;
    let body = text_of(fragment, selectors::CONTENT).await?;
    if author.is_empty() && body.is_empty() {
        return Ok(None);
    }
    Ok(Some(fingerprint_id(&author, &body)))
}

/// Extract the numeric id segment from a `/status/<id>` permalink.
pub fn permalink_id(href: &str) -> Option<String> {
    let re = Regex::new(r"/status/(\d+)").expect("valid regex");
    re.captures(href).map(|caps| caps[1].to_string())
}

/// Synthetic id from truncated author + body. Prefixed so synthetic ids are
/// distinguishable from real ones in the store.
fn fingerprint_id(author: &str, body: &str) -> String {
    let author: String = author.chars().take(20).collect();
    let body: String = body.chars().take(100).collect();
    let mut hasher = Sha256::new();
    hasher.update(author.as_bytes());
    hasher.update(body.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(12).map(|b| format!("{b:02x}")).collect();
    format!("fp-{hex}")
}

/// Map the remaining fields of a fragment into a [`Record`]. Missing
/// elements become empty strings or absent fields; this never discards.
pub async fn extract_record(
    fragment: &dyn DomNode,
    id: &str,
    endpoint: &str,
    page_found: u32,
) -> Result<Record> {
    let author_handle = text_of(fragment, selectors::USERNAME).await?;
    let author_display_name = text_of(fragment, selectors::FULLNAME).await?;
    let body_text = text_of(fragment, selectors::CONTENT).await?;

    let published_at = match fragment.query(selectors::DATE_LINK).await? {
        Some(link) => link.attribute("title").await?.unwrap_or_default(),
        None => String::new(),
    };

    let mut engagement = BTreeMap::new();
    for (name, icon) in selectors::STAT_ICONS {
        engagement.insert((*name).to_string(), stat_value(fragment, icon).await);
    }

    let media = extract_media(fragment).await?;
    let (reply_target_handles, reply_target_id) = reply_signals(fragment).await?;

    Ok(Record {
        id: id.to_string(),
        url: record_url(endpoint, &author_handle, id),
        author_handle,
        author_display_name,
        body_text,
        published_at,
        engagement,
        media,
        reply_target_handles,
        reply_target_id,
        source_endpoint: endpoint.to_string(),
        fetched_at: Utc::now(),
        page_found,
        thread_position: None,
        thread_size: None,
        thread_key: None,
    })
}

async fn text_of(node: &dyn DomNode, selector: &str) -> Result<String> {
    Ok(match node.query(selector).await? {
        Some(element) => element.inner_text().await?.trim().to_string(),
        None => String::new(),
    })
}

/// Engagement counters live on the stat container enclosing each icon.
/// Anything that goes wrong reads as "0".
async fn stat_value(fragment: &dyn DomNode, icon_selector: &str) -> String {
    let icon = match fragment.query(icon_selector).await {
        Ok(Some(icon)) => icon,
        _ => return "0".to_string(),
    };
    let js = format!(
        "function() {{ const s = this.closest('{}'); return s ? s.innerText : '0'; }}",
        selectors::STAT_CONTAINER
    );
    match icon.call_js(&js).await {
        Ok(value) => value
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "0".to_string()),
        Err(_) => "0".to_string(),
    }
}

async fn extract_media(fragment: &dyn DomNode) -> Result<Option<Vec<String>>> {
    let Some(container) = fragment.query(selectors::ATTACHMENTS).await? else {
        return Ok(None);
    };
    let mut urls = Vec::new();
    for img in container.query_all("img").await? {
        if let Some(src) = img.attribute("src").await? {
            if !src.is_empty() {
                urls.push(src);
            }
        }
    }
    Ok(if urls.is_empty() { None } else { Some(urls) })
}

async fn reply_signals(
    fragment: &dyn DomNode,
) -> Result<(Option<Vec<String>>, Option<String>)> {
    let Some(replying) = fragment.query(selectors::REPLYING_TO).await? else {
        return Ok((None, None));
    };

    let mut handles = Vec::new();
    for link in replying.query_all("a").await? {
        let handle = link
            .inner_text()
            .await?
            .trim()
            .trim_start_matches('@')
            .to_string();
        if !handle.is_empty() {
            handles.push(handle);
        }
    }

    let parent = match replying.query(selectors::REPLY_PARENT).await? {
        Some(link) => link
            .attribute("href")
            .await?
            .as_deref()
            .and_then(permalink_id),
        None => None,
    };

    let handles = if handles.is_empty() { None } else { Some(handles) };
    Ok((handles, parent))
}

fn record_url(endpoint: &str, handle: &str, id: &str) -> String {
    let clean = handle.trim().trim_start_matches('@');
    if clean.is_empty() || id.is_empty() {
        return String::new();
    }
    format!("{}/{}/status/{}", endpoint.trim_end_matches('/'), clean, id)
}
