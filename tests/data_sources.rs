//! List data sources against mocked Veeam servers.

mod common;

use hemmer_provider_veeam::ProviderError;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_vbr_proxies_single_page() {
    let server = MockServer::start().await;
    let tester = common::configured(&server, "vbr").await;

    Mock::given(method("GET"))
        .and(path("/api/v1/backupInfrastructure/proxies"))
        .and(query_param("typeFilter", "ViProxy"))
        .and(query_param("skip", "1"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "px-2",
                "name": "proxy02",
                "type": "ViProxy",
                "server": {"hostId": "h-2", "transportMode": "HotAdd", "maxTaskCount": 8}
            }],
            "pagination": {"total": 3, "count": 1, "skip": 1, "limit": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = tester
        .read_data_source(
            "veeam_vbr_proxies",
            json!({"type_filter": "ViProxy", "skip": 1, "limit": 1}),
        )
        .await
        .unwrap();

    assert_eq!(state["id"], "/backupInfrastructure/proxies?limit=1&skip=1&typeFilter=ViProxy");
    assert_eq!(state["total_count"], 3);
    assert_eq!(state["proxies"][0]["transport_mode"], "HotAdd");
    assert_eq!(state["proxies"][0]["max_task_count"], 8);
    assert_eq!(state["type_filter"], "ViProxy");
}

#[tokio::test]
async fn test_azure_subscriptions_all_pages() {
    let server = MockServer::start().await;
    let tester = common::configured(&server, "azure").await;

    let first: Vec<_> = (0..100)
        .map(|i| json!({"id": format!("s-{}", i), "name": format!("sub-{}", i), "tenantId": "t-1"}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/v8/cloudInfrastructure/subscriptions"))
        .and(query_param("TenantId", "t-1"))
        .and(query_param("Offset", "0"))
        .and(query_param("Limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": first,
            "totalCount": 101
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v8/cloudInfrastructure/subscriptions"))
        .and(query_param("Offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "s-100", "name": "sub-100", "tenantId": "t-1", "status": "Available"}
            ],
            "totalCount": 101
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = tester
        .read_data_source("veeam_azure_subscriptions", json!({"tenant_id": "t-1"}))
        .await
        .unwrap();

    assert_eq!(state["id"], "/cloudInfrastructure/subscriptions?TenantId=t-1");
    assert_eq!(state["total_count"], 101);
    let subscriptions = state["subscriptions"].as_array().unwrap();
    assert_eq!(subscriptions.len(), 101);
    assert_eq!(subscriptions[100]["status"], "Available");
    assert_eq!(subscriptions[0]["status"], "");
}

#[tokio::test]
async fn test_invalid_filter_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    let tester = common::configured(&server, "vbr").await;

    let err = tester
        .validate_data_source_config("veeam_vbr_repositories", json!({"type_filter": "Tape"}))
        .await
        .unwrap_err();
    assert_eq!(err.diagnostics()[0].attribute.as_deref(), Some("type_filter"));

    let err = tester
        .read_data_source("veeam_vbr_repositories", json!({"type_filter": "Tape"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Validation(_)));

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().all(|r| r.url.path() == "/api/oauth2/token"));
}

#[tokio::test]
async fn test_unknown_data_source() {
    let server = MockServer::start().await;
    let tester = common::configured(&server, "azure").await;

    let err = tester
        .read_data_source("veeam_azure_tapes", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::UnknownResource(_)));
}
