use super::*;
use crate::types::Credential;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn item(owner: &str, name: &str, stars: u64) -> Value {
    json!({
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "clone_url": format!("https://github.com/{owner}/{name}.git"),
        "stargazers_count": stars,
        "owner": { "login": owner },
    })
}

/// A page of `n` distinct items whose stars decrease with the page number
fn generated_page(page: u32, n: usize) -> Value {
    let items: Vec<Value> = (0..n)
        .map(|i| {
            let stars = 1_000_000 - (u64::from(page) * 1000 + i as u64);
            item(&format!("owner{page}"), &format!("repo{i}"), stars)
        })
        .collect();
    json!({ "total_count": 100_000, "items": items })
}

fn page_param(request: &Request) -> u32 {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0)
}

fn client_for(server: &MockServer) -> SearchClient {
    let config = SearchConfig {
        api_url: server.uri(),
        request_timeout: Duration::from_millis(500),
        ..Default::default()
    };
    SearchClient::new(config).unwrap()
}

fn query(count: usize) -> SearchQuery {
    SearchQuery::new("X", count, None).unwrap()
}

#[tokio::test]
async fn top_results_are_kept_in_star_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "X"))
        .and(query_param("sort", "stars"))
        .and(query_param("order", "desc"))
        .and(query_param("per_page", "100"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                item("a", "r50", 50),
                item("b", "r40", 40),
                item("c", "r30", 30),
                item("d", "r20", 20),
                item("e", "r10", 10),
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let results = client_for(&server).search(&query(3)).await;

    let stars: Vec<u64> = results.repositories.iter().map(|r| r.stars).collect();
    assert_eq!(stars, vec![50, 40, 30]);
    assert_eq!(results.repositories[0].full_name, "a/r50");
    assert_eq!(results.repositories[0].owner, "a");
    assert_eq!(results.pages_requested, 1);
    assert!(results.interruption.is_none());
}

#[tokio::test]
async fn results_are_resorted_when_api_order_is_wrong() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("a", "low", 1), item("b", "high", 99), item("c", "mid", 50)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let results = client_for(&server).search(&query(10)).await;

    let names: Vec<&str> = results
        .repositories
        .iter()
        .map(|r| r.full_name.as_str())
        .collect();
    assert_eq!(names, vec!["b/high", "c/mid", "a/low"]);
    assert_eq!(results.pages_requested, 2, "empty page ends pagination");
}

#[tokio::test]
async fn rate_limit_on_second_page_keeps_first_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generated_page(1, 100)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let results = client_for(&server).search(&query(150)).await;

    assert_eq!(results.repositories.len(), 100);
    assert_eq!(
        results.interruption,
        Some(SearchError::RateLimited { page: 2 })
    );
    assert!(!results.auth_failed());
}

#[tokio::test]
async fn rejected_credential_aborts_with_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(header("authorization", "token bad_token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let query = SearchQuery::new("X", 5, Credential::new("bad_token")).unwrap();
    let results = client_for(&server).search(&query).await;

    assert!(results.repositories.is_empty());
    assert!(results.auth_failed());
}

#[tokio::test]
async fn auth_error_after_first_page_keeps_accumulated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generated_page(1, 100)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let results = client_for(&server).search(&query(200)).await;

    assert_eq!(results.repositories.len(), 100);
    assert!(results.auth_failed());
}

#[tokio::test]
async fn server_error_stops_pagination_without_failing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let results = client_for(&server).search(&query(5)).await;

    assert!(results.repositories.is_empty());
    assert_eq!(
        results.interruption,
        Some(SearchError::BadStatus {
            page: 1,
            status: 502
        })
    );
}

#[tokio::test]
async fn slow_response_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(generated_page(1, 1))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let results = client_for(&server).search(&query(5)).await;

    assert!(results.repositories.is_empty());
    assert!(matches!(
        results.interruption,
        Some(SearchError::Transport { page: 1, .. })
    ));
}

#[tokio::test]
async fn malformed_body_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let results = client_for(&server).search(&query(5)).await;

    assert!(matches!(
        results.interruption,
        Some(SearchError::Transport { .. })
    ));
}

#[tokio::test]
async fn never_requests_more_than_ten_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(|request: &Request| {
            ResponseTemplate::new(200).set_body_json(generated_page(page_param(request), 100))
        })
        .expect(10)
        .mount(&server)
        .await;

    let results = client_for(&server).search(&query(5000)).await;

    assert_eq!(results.pages_requested, 10);
    assert_eq!(results.repositories.len(), 1000);
    assert!(results.interruption.is_none());
}

#[tokio::test]
async fn stops_as_soon_as_the_limit_is_reached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(|request: &Request| {
            ResponseTemplate::new(200).set_body_json(generated_page(page_param(request), 100))
        })
        .expect(2)
        .mount(&server)
        .await;

    let results = client_for(&server).search(&query(150)).await;

    assert_eq!(results.repositories.len(), 150);
    assert_eq!(results.pages_requested, 2);
}

#[tokio::test]
async fn duplicates_across_pages_are_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("a", "one", 10), item("b", "two", 9)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("b", "two", 9), item("c", "three", 8)]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let results = client_for(&server).search(&query(10)).await;

    let names: Vec<&str> = results
        .repositories
        .iter()
        .map(|r| r.full_name.as_str())
        .collect();
    assert_eq!(names, vec!["a/one", "b/two", "c/three"]);
}

#[tokio::test]
async fn sends_forge_headers_without_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let results = client_for(&server).search(&query(5)).await;

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].headers.get("authorization").is_none());
    assert!(received[0].headers.get("user-agent").is_some());
    assert!(results.repositories.is_empty());
    assert!(results.interruption.is_none());
}

#[tokio::test]
async fn page_events_are_published() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generated_page(1, 3)))
        .mount(&server)
        .await;

    let (tx, mut rx) = broadcast::channel(16);
    let client = client_for(&server).with_events(tx);

    client.search(&query(3)).await;

    match rx.recv().await.unwrap() {
        Event::SearchPage {
            page,
            items,
            accumulated,
        } => {
            assert_eq!((page, items, accumulated), (1, 3, 3));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(matches!(
        rx.recv().await.unwrap(),
        Event::SearchComplete { found: 3 }
    ));
}
