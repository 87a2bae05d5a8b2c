//! Shared request plumbing for the ERP resource clients.
//!
//! `fetch_json` is the single primitive every client call goes through:
//! 404 resolves to "no result" instead of an error, any other non-2xx
//! answer becomes an error carrying both the remote payload and the
//! outgoing request body, and 2xx bodies are parsed as JSON.
//!
//! Every request is sent exactly once. A failed ERP call surfaces through
//! the report item of the job that made it and is re-triggered by the next
//! batch run; re-sending a create behind the caller's back could duplicate
//! an agreement or a delivery note.
//!
//! Collections larger than one page are read with a `$count` probe followed
//! by parallel `$skip` pages; the ERP answers pages in whatever order the
//! requests land, so callers must not rely on record order.

use std::time::Duration;

use coopsync_domain::constants::ERP_PAGE_SIZE;
use coopsync_domain::{CoopsyncError, ErpSession, Result};
use reqwest::header::COOKIE;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::session::ErpSessionManager;

/// OData collection envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ODataList<T> {
    pub value: Vec<T>,
}

/// Build the HTTP client an ERP component sends through.
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .no_proxy()
        .build()
        .map_err(|e| CoopsyncError::Internal(format!("failed to build ERP http client: {e}")))
}

/// Map a transport-level failure onto the domain, naming the operation
/// that was on the wire so a report-item message stays self-explanatory.
pub(crate) fn transport_error(operation: &str, err: &reqwest::Error) -> CoopsyncError {
    if err.is_timeout() {
        CoopsyncError::Network(format!("{operation} timed out"))
    } else if err.is_connect() {
        CoopsyncError::Network(format!("{operation}: the ERP is unreachable"))
    } else {
        CoopsyncError::Network(format!("{operation}: {err}"))
    }
}

/// Execute one ERP request under an existing session.
///
/// Returns `Ok(None)` for 404 and for bodyless 204 answers; propagates any
/// other non-2xx status as `CoopsyncError::Erp` with the remote error
/// payload and the outgoing request body attached for diagnostics.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    http: &Client,
    session: &ErpSession,
    method: Method,
    url: &str,
    body: Option<&serde_json::Value>,
) -> Result<Option<T>> {
    let mut builder = http
        .request(method.clone(), url)
        .header(COOKIE, ErpSessionManager::session_cookie(session));
    if let Some(body) = body {
        builder = builder.json(body);
    }

    debug!(%method, %url, "sending ERP request");
    let response = builder
        .send()
        .await
        .map_err(|e| transport_error(&format!("{method} {url}"), &e))?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        debug!(%url, "ERP answered 404; treating as no result");
        return Ok(None);
    }

    if !status.is_success() {
        let remote = response.text().await.unwrap_or_else(|_| "<unreadable body>".into());
        let sent = body.map(ToString::to_string).unwrap_or_else(|| "<empty>".into());
        return Err(CoopsyncError::Erp(format!(
            "{method} {url} failed (HTTP {status}): {remote}; request body: {sent}"
        )));
    }

    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let parsed = response.json::<T>().await.map_err(|e| {
        CoopsyncError::Internal(format!("failed to parse ERP response from {url}: {e}"))
    })?;
    Ok(Some(parsed))
}

/// Read the collection size via the `$count` convention.
pub(crate) async fn fetch_count(
    http: &Client,
    session: &ErpSession,
    collection_url: &str,
    filter: Option<&str>,
) -> Result<usize> {
    let url = build_url(&format!("{collection_url}/$count"), filter, None)?;

    let response = http
        .get(url.as_str())
        .header(COOKIE, ErpSessionManager::session_cookie(session))
        .send()
        .await
        .map_err(|e| transport_error(&format!("GET {url}"), &e))?;
    let status = response.status();

    if !status.is_success() {
        let remote = response.text().await.unwrap_or_else(|_| "<unreadable body>".into());
        return Err(CoopsyncError::Erp(format!(
            "GET {url} failed (HTTP {status}): {remote}; request body: <empty>"
        )));
    }

    let text = response
        .text()
        .await
        .map_err(|e| CoopsyncError::Network(format!("failed to read count from {url}: {e}")))?;
    text.trim().parse::<usize>().map_err(|_| {
        CoopsyncError::Erp(format!("non-numeric count from {url}: {:?}", text.trim()))
    })
}

/// Fetch every record of a collection, paging in parallel.
///
/// Issues the `$count` probe first, then `ceil(count / page)` concurrent
/// page requests and flattens the results.
pub(crate) async fn fetch_all_pages<T: DeserializeOwned>(
    http: &Client,
    session: &ErpSession,
    collection_url: &str,
    filter: Option<&str>,
) -> Result<Vec<T>> {
    let total = fetch_count(http, session, collection_url, filter).await?;
    if total == 0 {
        return Ok(Vec::new());
    }

    let pages = total.div_ceil(ERP_PAGE_SIZE);
    debug!(%collection_url, total, pages, "paging ERP collection");

    let page_futures = (0..pages).map(|page| {
        let skip = page * ERP_PAGE_SIZE;
        async move {
            let url = build_url(collection_url, filter, Some(skip))?;
            fetch_json::<ODataList<T>>(http, session, Method::GET, url.as_str(), None)
                .await?
                .ok_or_else(|| {
                    CoopsyncError::Erp(format!(
                        "GET {url} answered no body for an existing collection page"
                    ))
                })
        }
    });

    let lists = futures::future::try_join_all(page_futures).await?;
    Ok(lists.into_iter().flat_map(|list| list.value).collect())
}

fn build_url(base: &str, filter: Option<&str>, skip: Option<usize>) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| CoopsyncError::InvalidInput(format!("invalid ERP URL {base}: {e}")))?;

    {
        let mut pairs = url.query_pairs_mut();
        if let Some(filter) = filter {
            pairs.append_pair("$filter", filter);
        }
        if let Some(skip) = skip {
            pairs.append_pair("$skip", &skip.to_string());
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_session() -> ErpSession {
        ErpSession { session_id: "sess".into(), route_id: ".node1".into(), expires_at: i64::MAX }
    }

    fn test_http() -> Client {
        build_http_client(Duration::from_secs(5)).expect("http client")
    }

    #[tokio::test]
    async fn not_found_resolves_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result: Option<serde_json::Value> = fetch_json(
            &test_http(),
            &test_session(),
            Method::GET,
            &format!("{}/BusinessPartners('X')", server.uri()),
            None,
        )
        .await
        .expect("404 is not an error");

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn error_carries_remote_payload_and_request_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error":{"message":"bad agreement"}}"#),
            )
            .mount(&server)
            .await;

        let body = json!({"BPCode": "C-100"});
        let err = fetch_json::<serde_json::Value>(
            &test_http(),
            &test_session(),
            Method::POST,
            &format!("{}/BlanketAgreements", server.uri()),
            Some(&body),
        )
        .await
        .expect_err("400 must be an error");

        let message = err.to_string();
        assert!(message.contains("bad agreement"));
        assert!(message.contains(r#""BPCode":"C-100""#));
    }

    #[tokio::test]
    async fn transport_failure_names_the_failing_operation() {
        // Bind a port and release it so nothing answers the request.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("ephemeral port");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let url = format!("http://127.0.0.1:{port}/ItemGroups(7)");
        let err = fetch_json::<serde_json::Value>(
            &test_http(),
            &test_session(),
            Method::GET,
            &url,
            None,
        )
        .await
        .expect_err("nothing is listening");

        // The report-item message must identify the call without a stack.
        match err {
            CoopsyncError::Network(msg) => {
                assert!(msg.contains("GET"));
                assert!(msg.contains("/ItemGroups(7)"));
            }
            other => panic!("expected network error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_numeric_count_is_a_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = fetch_count(
            &test_http(),
            &test_session(),
            &format!("{}/ItemGroups", server.uri()),
            None,
        )
        .await
        .expect_err("must fail");

        assert!(err.to_string().contains("non-numeric count"));
    }

    #[tokio::test]
    async fn pagination_issues_parallel_skip_requests_and_flattens() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ItemGroups/$count"))
            .respond_with(ResponseTemplate::new(200).set_body_string("250"))
            .mount(&server)
            .await;

        for (skip, first, len) in [(0usize, 0usize, 100usize), (100, 100, 100), (200, 200, 50)] {
            let value: Vec<_> = (first..first + len)
                .map(|n| json!({"Number": n, "GroupName": format!("G{n}")}))
                .collect();
            Mock::given(method("GET"))
                .and(path("/ItemGroups"))
                .and(query_param("$skip", skip.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": value})))
                .mount(&server)
                .await;
        }

        let records: Vec<coopsync_domain::ErpItemGroup> = fetch_all_pages(
            &test_http(),
            &test_session(),
            &format!("{}/ItemGroups", server.uri()),
            None,
        )
        .await
        .expect("pages fetched");

        assert_eq!(records.len(), 250);
        // All pages arrived; order across pages is not part of the contract.
        let mut numbers: Vec<_> = records.iter().map(|g| g.number).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (0..250).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn empty_collection_skips_page_requests() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/DeliveryPlaces/$count"))
            .respond_with(ResponseTemplate::new(200).set_body_string("0"))
            .expect(1)
            .mount(&server)
            .await;

        let records: Vec<coopsync_domain::ErpDeliveryPlace> = fetch_all_pages(
            &test_http(),
            &test_session(),
            &format!("{}/DeliveryPlaces", server.uri()),
            None,
        )
        .await
        .expect("count only");

        assert!(records.is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn filter_is_url_encoded() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/BlanketAgreements/$count"))
            .and(query_param("$filter", "BPCode eq 'C-100'"))
            .respond_with(ResponseTemplate::new(200).set_body_string("0"))
            .expect(1)
            .mount(&server)
            .await;

        let records: Vec<coopsync_domain::ErpAgreement> = fetch_all_pages(
            &test_http(),
            &test_session(),
            &format!("{}/BlanketAgreements", server.uri()),
            Some("BPCode eq 'C-100'"),
        )
        .await
        .expect("count only");

        assert!(records.is_empty());
    }
}
