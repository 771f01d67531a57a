pub mod error;

use crate::{
    data::{Exchange, Headers, RequestBody, RequestData, ResponseData},
    ingest_configuration::IngestConfiguration,
    util,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::DateTime;
use error::Error;
use serde::Deserialize;
use std::convert::TryFrom;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct HarDocument {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    version: Option<String>,
    entries: Option<Vec<HarEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HarEntry {
    started_date_time: Option<String>,
    request: Option<HarRequest>,
    response: Option<HarResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HarRequest {
    method: Option<String>,
    url: Option<String>,
    headers: Option<Vec<HarNameValue>>,
    post_data: Option<HarPostData>,
}

#[derive(Debug, Deserialize)]
struct HarResponse {
    status: Option<i64>,
    headers: Option<Vec<HarNameValue>>,
    content: Option<HarContent>,
}

#[derive(Debug, Deserialize)]
struct HarNameValue {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HarPostData {
    mime_type: Option<String>,
    text: Option<String>,
    #[serde(default)]
    params: Vec<HarParam>,
}

#[derive(Debug, Deserialize)]
struct HarParam {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HarContent {
    text: Option<String>,
    encoding: Option<String>,
}

/// Parses a HAR capture with the default keyword set and no redactions.
pub fn ingest(raw_trace: &[u8]) -> Result<Vec<Exchange>, Error> {
    ingest_with(raw_trace, &IngestConfiguration::default())
}

/// Parses a HAR capture into exchanges ordered by start time, keeping the
/// login-relevant ones (or all of them, flagged, when configured to).
pub fn ingest_with(
    raw_trace: &[u8],
    configuration: &IngestConfiguration,
) -> Result<Vec<Exchange>, Error> {
    let document: HarDocument = serde_json::from_slice(raw_trace)?;
    let version = document.log.version.ok_or(Error::MissingVersion)?;
    if !version.starts_with("1.") {
        return Err(Error::UnsupportedVersion(version));
    }
    let entries = document.log.entries.ok_or(Error::MissingEntries)?;

    let mut exchanges = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| convert_entry(index, entry, configuration))
        .collect::<Result<Vec<_>, _>>()?;

    // Start times only reorder when every entry has one; otherwise file order stands.
    if exchanges.iter().all(|e| e.started_at.is_some()) {
        exchanges.sort_by_key(|e| e.started_at);
    }

    let total = exchanges.len();
    if !configuration.keep_irrelevant() {
        exchanges.retain(|e| e.login_relevant);
    }
    debug!(total, kept = exchanges.len(), "ingested HAR trace");

    for exchange in &mut exchanges {
        for redaction in configuration.request_redactions() {
            redaction.apply_to_request(&mut exchange.request_data);
        }
        for redaction in configuration.response_redactions() {
            redaction.apply_to_response(&mut exchange.response_data);
        }
    }

    Ok(exchanges)
}

fn convert_entry(
    index: usize,
    entry: HarEntry,
    configuration: &IngestConfiguration,
) -> Result<Exchange, Error> {
    let missing = |field: &'static str| Error::MissingField {
        entry: index,
        field,
    };

    let request = entry.request.ok_or_else(|| missing("request"))?;
    let response = entry.response.ok_or_else(|| missing("response"))?;

    let request_data = RequestData {
        url: request.url.ok_or_else(|| missing("request url"))?,
        method: request
            .method
            .ok_or_else(|| missing("request method"))?
            .to_uppercase(),
        headers: convert_headers(request.headers.ok_or_else(|| missing("request headers"))?),
        body: request.post_data.and_then(convert_post_data),
    };

    let status = response.status.unwrap_or(0);
    let status_code = u16::try_from(status).map_err(|_| Error::InvalidStatusCode {
        entry: index,
        status,
    })?;
    let mut body = response.content.map(decode_content).unwrap_or_default();
    util::truncate_on_char_boundary(&mut body, configuration.max_body_snippet());

    let response_data = ResponseData {
        status_code,
        headers: convert_headers(
            response
                .headers
                .ok_or_else(|| missing("response headers"))?,
        ),
        body,
    };

    let login_relevant = is_login_relevant(&request_data, configuration.login_keywords());
    debug!(
        index,
        url = %request_data.url,
        method = %request_data.method,
        login_relevant,
        "read HAR entry"
    );

    Ok(Exchange {
        index,
        started_at: entry
            .started_date_time
            .and_then(|t| DateTime::parse_from_rfc3339(&t).ok()),
        login_relevant,
        request_data,
        response_data,
    })
}

fn convert_headers(headers: Vec<HarNameValue>) -> Headers {
    headers.into_iter().map(|h| (h.name, h.value)).collect()
}

fn convert_post_data(post_data: HarPostData) -> Option<RequestBody> {
    if !post_data.params.is_empty() {
        return Some(RequestBody::Fields(
            post_data
                .params
                .into_iter()
                .map(|p| (p.name, p.value.unwrap_or_default()))
                .collect(),
        ));
    }

    let text = post_data.text?;
    let mime_type = post_data.mime_type.unwrap_or_default().to_lowercase();

    if mime_type.contains("x-www-form-urlencoded") {
        return Some(RequestBody::Fields(
            url::form_urlencoded::parse(text.as_bytes())
                .into_owned()
                .collect(),
        ));
    }

    if mime_type.contains("json") {
        if let Ok(serde_json::Value::Object(object)) = serde_json::from_str(&text) {
            return Some(RequestBody::Fields(
                object
                    .into_iter()
                    .map(|(key, value)| match value {
                        serde_json::Value::String(s) => (key, s),
                        other => (key, other.to_string()),
                    })
                    .collect(),
            ));
        }
    }

    Some(RequestBody::Raw(text))
}

fn decode_content(content: HarContent) -> String {
    let text = content.text.unwrap_or_default();

    match content.encoding.as_deref() {
        Some("base64") => BASE64
            .decode(text.as_bytes())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default(),
        _ => text,
    }
}

fn is_login_relevant(request_data: &RequestData, keywords: &[String]) -> bool {
    util::contains_any_ignore_case(&request_data.url, keywords)
        || request_data
            .fields()
            .iter()
            .any(|(name, _)| util::contains_any_ignore_case(name, keywords))
        || request_data
            .headers
            .iter()
            .any(|(name, _)| util::contains_any_ignore_case(name, keywords))
}
