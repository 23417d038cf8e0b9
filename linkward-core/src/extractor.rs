use crate::record::{DeepLinkRecord, DeepLinkSource, MARKER_KEYS};
use crate::request::RequestDescriptor;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::debug;

/// Extract the deep-link record of `request`, stamped with the current time.
pub fn extract(request: &(impl RequestDescriptor + ?Sized)) -> DeepLinkRecord {
    extract_at(request, Utc::now())
}

/// Extract the deep-link record of `request`, stamped with `now`.
///
/// Never fails: a query that cannot be decoded simply contributes no markers.
pub fn extract_at(
    request: &(impl RequestDescriptor + ?Sized),
    now: DateTime<Utc>,
) -> DeepLinkRecord {
    let params = request
        .query()
        .map(marker_params)
        .unwrap_or_default();

    let source = DeepLinkSource::PRIORITY
        .iter()
        .find(|(_, keys)| keys.iter().any(|key| params.contains_key(*key)))
        .map(|(source, _)| *source)
        .unwrap_or_default();

    DeepLinkRecord::new(source, params, now.timestamp_millis()).with_client_info(
        request.referrer().map(str::to_string),
        request.user_agent().map(str::to_string),
    )
}

/// Collect the allow-listed markers present in `query`.
///
/// The first occurrence of a key wins and empty values count as absent.
pub fn marker_params(query: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for (key, value) in parse_query(query) {
        if value.is_empty() || !MARKER_KEYS.contains(&key.as_str()) {
            continue;
        }
        params.entry(key).or_insert(value);
    }
    params
}

/// Leniently split a query string into decoded key/value pairs.
///
/// Pairs whose key or value does not percent-decode to UTF-8 are skipped.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            match (decode_component(raw_key), decode_component(raw_value)) {
                (Some(key), Some(value)) => Some((key.into_owned(), value.into_owned())),
                _ => {
                    debug!(pair = %pair, "skipping undecodable query parameter");
                    None
                }
            }
        })
        .collect()
}

fn decode_component(raw: &str) -> Option<Cow<'_, str>> {
    if raw.contains('+') {
        let spaced = raw.replace('+', " ");
        urlencoding::decode(&spaced)
            .ok()
            .map(|decoded| Cow::Owned(decoded.into_owned()))
    } else {
        urlencoding::decode(raw).ok()
    }
}
