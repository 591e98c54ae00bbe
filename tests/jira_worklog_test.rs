//! Jira work-log client integration tests

use std::time::Duration;

use chrono::TimeZone;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use autoclock::ticket::{JiraWorklogClient, TicketLogger};

fn client(server: &MockServer) -> JiraWorklogClient {
    JiraWorklogClient::new(
        &format!("{}/", server.uri()),
        "me@example.com",
        "secret-token",
        Duration::from_secs(5),
    )
    .expect("client")
}

#[tokio::test]
async fn test_log_work_posts_worklog_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue/OPS-42/worklog"))
        .and(header(
            "Authorization",
            "Basic bWVAZXhhbXBsZS5jb206c2VjcmV0LXRva2Vu",
        ))
        .and(body_json(serde_json::json!({
            "started": "2026-03-02T09:00:00.000+0000",
            "timeSpentSeconds": 1500
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let started = chrono::Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    client(&server)
        .log_work("OPS-42", started, 1500)
        .await
        .expect("worklog accepted");
}

#[tokio::test]
async fn test_log_work_surfaces_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Issue does not exist"))
        .mount(&server)
        .await;

    let err = client(&server)
        .log_work("NOPE-1", chrono::Utc::now(), 60)
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("NOPE-1"));
    assert!(message.contains("Issue does not exist"));
}
