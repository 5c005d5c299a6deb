// Integration tests for `DashboardClient` using wiremock.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cirrus_api::{DashboardClient, Error, StatusValue};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, DashboardClient) {
    let server = MockServer::start().await;
    let client = DashboardClient::from_reqwest(&server.uri(), reqwest::Client::new())
        .expect("valid mock server url");
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_get_organization() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/O-100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "O-100",
            "name": "Acme Corp",
            "url": "https://dashboard.example.com/o/O-100"
        })))
        .mount(&server)
        .await;

    let org = client.get_organization("O-100").await.unwrap();

    assert_eq!(org.id, "O-100");
    assert_eq!(org.name, "Acme Corp");
    assert_eq!(
        org.url.as_deref(),
        Some("https://dashboard.example.com/o/O-100")
    );
}

#[tokio::test]
async fn test_list_networks() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/O-100/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "N_1",
                "name": "HQ",
                "organizationId": "O-100",
                "productTypes": ["sensor", "wireless"]
            },
            {
                "id": "N_2",
                "name": "Warehouse",
                "organizationId": "O-100",
                "productTypes": ["switch"]
            }
        ])))
        .mount(&server)
        .await;

    let networks = client.list_networks("O-100").await.unwrap();

    assert_eq!(networks.len(), 2);
    assert_eq!(networks[0].id, "N_1");
    assert_eq!(networks[0].product_types, vec!["sensor", "wireless"]);
    assert_eq!(networks[1].name, "Warehouse");
}

#[tokio::test]
async fn test_list_device_statuses() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/O-100/devices/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "serial": "Q2SN-0001", "status": "online", "lastReportedAt": "2024-05-01T12:00:00Z" },
            { "serial": "Q2SN-0002", "status": "offline", "lastReportedAt": null },
            { "serial": "Q2SN-0003", "status": "something-new", "lastReportedAt": null }
        ])))
        .mount(&server)
        .await;

    let statuses = client.list_device_statuses("O-100").await.unwrap();

    assert_eq!(statuses.len(), 3);
    assert_eq!(statuses[0].status, StatusValue::Online);
    assert!(statuses[0].last_reported_at.is_some());
    assert_eq!(statuses[1].status, StatusValue::Offline);
    // Unrecognized wire values degrade to Unknown instead of failing the decode.
    assert_eq!(statuses[2].status, StatusValue::Unknown);
}

#[tokio::test]
async fn test_sensor_readings_pass_serial_params() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/O-100/sensor/readings/latest"))
        .and(query_param("serials[]", "Q2SN-0001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "serial": "Q2SN-0001",
                "readings": [
                    { "metric": "temperature", "temperature": { "celsius": 21.5 } }
                ]
            }
        ])))
        .mount(&server)
        .await;

    let readings = client
        .latest_sensor_readings("O-100", &["Q2SN-0001".to_owned()])
        .await
        .unwrap();

    assert_eq!(readings[0]["serial"], "Q2SN-0001");
    assert_eq!(
        readings[0]["readings"][0]["temperature"]["celsius"],
        json!(21.5)
    );
}

#[tokio::test]
async fn test_wireless_stats_timespan_param() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/devices/Q2AP-0001/wireless/connectionStats"))
        .and(query_param("timespan", "300"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "assoc": 10, "auth": 9, "dhcp": 9, "dns": 9, "success": 8
        })))
        .mount(&server)
        .await;

    let stats = client
        .wireless_connection_stats("Q2AP-0001", 300)
        .await
        .unwrap();

    assert_eq!(stats["success"], json!(8));
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_error_401_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "errors": ["Invalid API key"] })),
        )
        .mount(&server)
        .await;

    let result = client.get_organization("O-100").await;

    match result {
        Err(Error::Authentication { ref message }) => {
            assert_eq!(message, "Invalid API key");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_403_authorization() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = client.list_networks("O-100").await;

    assert!(
        matches!(result, Err(Error::Authorization { .. })),
        "expected Authorization, got: {result:?}"
    );
}

#[tokio::test]
async fn test_error_429_with_retry_after() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let result = client.list_devices("O-100").await;

    match result {
        Err(Error::RateLimited { retry_after_secs }) => {
            assert_eq!(retry_after_secs, Some(7));
        }
        other => panic!("expected RateLimited error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_429_without_hint() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let result = client.list_devices("O-100").await;

    match result {
        Err(Error::RateLimited { retry_after_secs }) => assert_eq!(retry_after_secs, None),
        other => panic!("expected RateLimited error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_500_server() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client.licenses_overview("O-100").await;

    match result {
        Err(Error::Server { status, .. }) => assert_eq!(status, 500),
        other => panic!("expected Server error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_404_client() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "errors": ["Organization not found"] })),
        )
        .mount(&server)
        .await;

    let result = client.get_organization("O-999").await;

    match result {
        Err(Error::Client {
            status,
            ref message,
        }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Organization not found");
        }
        other => panic!("expected Client error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_deserialization_error_preserves_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = client.get_organization("O-100").await;

    match result {
        Err(Error::Deserialization { ref body, .. }) => assert_eq!(body, "not json"),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}
