use std::io::ErrorKind;
use std::net::IpAddr;

use axum::body::Body;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use shared::models::StoredFile;
use shared::tracking::record_download;
use tokio_util::io::ReaderStream;
use tracing::{Instrument, error, info_span, warn};

use super::AppState;
use super::client_ip::ClientIp;
use super::errors::{file_not_found_response, internal_error_response, store_error_response};
use super::observability::RequestContext;

// 30 days.
const CACHE_CONTROL_VALUE: &str = "max-age=2592000";

pub(super) async fn download_file(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    method: Method,
    ClientIp(client_ip): ClientIp,
    Extension(context): Extension<RequestContext>,
    request_headers: HeaderMap,
) -> Response {
    let file = match state.store.find_file_by_slug(&slug).await {
        Ok(Some(file)) => file,
        Ok(None) => return file_not_found_response(),
        Err(err) => return store_error_response(err),
    };

    let headers = file_headers(&file);
    let tracking = DownloadTracking {
        state: &state,
        file: &file,
        client_ip,
        request_id: &context.request_id,
        head: method == Method::HEAD,
    };

    if if_none_match_hits(&request_headers, &file.hash) {
        tracking.spawn(true);
        return (StatusCode::NOT_MODIFIED, headers).into_response();
    }

    let path = state.files_dir.join(&file.hash);
    let data = match tokio::fs::File::open(&path).await {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(
                request_id = %context.request_id,
                file_id = %file.id,
                "stored file missing from disk"
            );
            return file_not_found_response();
        }
        Err(err) => {
            error!(
                request_id = %context.request_id,
                file_id = %file.id,
                "failed to open stored file: {err}"
            );
            return internal_error_response();
        }
    };
    let content_length = data.metadata().await.ok().map(|metadata| metadata.len());

    tracking.spawn(false);

    let mut response = (
        StatusCode::OK,
        headers,
        Body::from_stream(ReaderStream::new(data)),
    )
        .into_response();
    if let Some(content_length) = content_length {
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    }

    response
}

struct DownloadTracking<'a> {
    state: &'a AppState,
    file: &'a StoredFile,
    client_ip: Option<IpAddr>,
    request_id: &'a str,
    head: bool,
}

impl DownloadTracking<'_> {
    fn spawn(&self, cache_hit: bool) {
        // HEAD never transfers the file, so it is not a download.
        if self.head {
            return;
        }
        let Some(client_ip) = self.client_ip else {
            warn!(
                request_id = %self.request_id,
                file_id = %self.file.id,
                "skipping download tracking: client address unavailable"
            );
            return;
        };

        let store = self.state.store.clone();
        let file_id = self.file.id.clone();
        let span = info_span!(
            "download_tracking",
            request_id = %self.request_id,
            file_id = %file_id
        );
        tokio::spawn(
            async move {
                record_download(&store, &file_id, &client_ip, cache_hit).await;
            }
            .instrument(span),
        );
    }
}

fn file_headers(file: &StoredFile) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Ok(value) = HeaderValue::from_str(&file.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", file.hash)) {
        headers.insert(header::ETAG, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL_VALUE),
    );
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&file.name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    headers
}

fn content_disposition(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_control() || !ch.is_ascii() => '_',
            ch => ch,
        })
        .collect();

    if sanitized == name {
        format!("inline; filename=\"{sanitized}\"")
    } else {
        // RFC 5987 extended value keeps names the ASCII fallback mangles.
        format!(
            "inline; filename=\"{sanitized}\"; filename*=UTF-8''{}",
            urlencoding::encode(name)
        )
    }
}

fn if_none_match_hits(request_headers: &HeaderMap, hash: &str) -> bool {
    request_headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|tag| {
            if tag == "*" {
                return true;
            }
            let tag = tag.strip_prefix("W/").unwrap_or(tag);
            tag.trim_matches('"') == hash
        })
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, header};
    use chrono::Utc;
    use shared::models::StoredFile;

    use super::{content_disposition, file_headers, if_none_match_hits};

    fn stored_file(name: &str) -> StoredFile {
        StoredFile {
            id: "file-123".to_string(),
            slug: "abc".to_string(),
            name: name.to_string(),
            hash: "d41d8cd98f00b204".to_string(),
            content_type: "image/png".to_string(),
            size: 42,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn if_none_match(values: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(header::IF_NONE_MATCH, HeaderValue::from_static(*value));
        }
        headers
    }

    #[test]
    fn matches_quoted_weak_and_listed_etags() {
        let hash = "d41d8cd98f00b204";
        assert!(if_none_match_hits(&if_none_match(&["\"d41d8cd98f00b204\""]), hash));
        assert!(if_none_match_hits(&if_none_match(&["W/\"d41d8cd98f00b204\""]), hash));
        assert!(if_none_match_hits(
            &if_none_match(&["\"other\", \"d41d8cd98f00b204\""]),
            hash
        ));
        assert!(if_none_match_hits(&if_none_match(&["\"other\"", "d41d8cd98f00b204"]), hash));
        assert!(if_none_match_hits(&if_none_match(&["*"]), hash));
    }

    #[test]
    fn ignores_missing_or_different_etags() {
        let hash = "d41d8cd98f00b204";
        assert!(!if_none_match_hits(&HeaderMap::new(), hash));
        assert!(!if_none_match_hits(&if_none_match(&["\"other\""]), hash));
        assert!(!if_none_match_hits(&if_none_match(&["\"d41d8cd98f00b2\""]), hash));
    }

    #[test]
    fn content_disposition_quotes_and_sanitizes_names() {
        assert_eq!(
            content_disposition("holiday photo.png"),
            "inline; filename=\"holiday photo.png\""
        );
        assert_eq!(
            content_disposition("a\"b\\c\nd.txt"),
            "inline; filename=\"a_b_c_d.txt\"; filename*=UTF-8''a%22b%5Cc%0Ad.txt"
        );
    }

    #[test]
    fn content_disposition_keeps_non_ascii_names_in_extended_parameter() {
        assert_eq!(
            content_disposition("résumé.pdf"),
            "inline; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
        );
        assert!(
            HeaderValue::from_str(&content_disposition("写真 2024.png")).is_ok(),
            "extended parameter must stay a valid header value"
        );
    }

    #[test]
    fn file_headers_carry_caching_metadata() {
        let headers = file_headers(&stored_file("cat.png"));

        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(headers[header::ETAG], "\"d41d8cd98f00b204\"");
        assert_eq!(headers[header::CACHE_CONTROL], "max-age=2592000");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "inline; filename=\"cat.png\""
        );
    }
}
