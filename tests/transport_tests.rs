use meross_lan::{
    build_request, check_sign, Error, HttpTransport, HttpTransportBuilder, Message, MessageLogMode,
    Method, Namespace, Transport, TransportConfig,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn reply(namespace: Namespace, method: Method, payload: Value) -> String {
    let mut msg = build_request(namespace, Method::Push, payload, "", "device");
    msg.header.method = method;
    serde_json::to_string(&msg).unwrap()
}

fn transport(server: &MockServer) -> HttpTransport {
    let addr = server.address();
    HttpTransport::builder(format!("{}:{}", addr.ip(), addr.port()))
        .key("secret")
        .build()
        .expect("transport should build")
}

/// Echoes the request's message id back in a SETACK.
struct AckResponder;

impl Respond for AckResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let sent: Message = serde_json::from_slice(&request.body).unwrap();
        let mut ack = sent.clone();
        ack.header.method = Method::SetAck;
        ack.payload = json!({});
        ResponseTemplate::new(200).set_body_json(ack)
    }
}

#[tokio::test]
async fn request_posts_signed_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/config"))
        .and(body_string_contains("Appliance.Control.ToggleX"))
        .respond_with(AckResponder)
        .expect(1)
        .mount(&server)
        .await;

    let response = transport(&server)
        .request(Namespace::ToggleX, Method::Set, json!({"togglex": {"channel": 0, "onoff": 1}}))
        .await
        .unwrap();
    assert_eq!(response.header.method, Method::SetAck);

    let requests = server.received_requests().await.unwrap();
    let sent: Message = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent.header.method, Method::Set);
    assert!(check_sign(&sent.header, "secret"));
    assert_eq!(sent.payload["togglex"]["onoff"], 1);
}

#[tokio::test]
async fn get_ack_payload_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/config"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reply(
            Namespace::ThermostatMode,
            Method::GetAck,
            json!({"mode": [{"channel": 0, "onoff": 1, "mode": 0}]}),
        )))
        .mount(&server)
        .await;

    let response = transport(&server)
        .request(Namespace::ThermostatMode, Method::Get, json!({"mode": []}))
        .await
        .unwrap();
    assert_eq!(response.header.method, Method::GetAck);
    assert_eq!(response.payload["mode"][0]["onoff"], 1);
}

#[tokio::test]
async fn http_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = transport(&server)
        .request(Namespace::ToggleX, Method::Get, json!({"togglex": []}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Http(_)));
}

#[tokio::test]
async fn namespace_mismatch_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reply(
            Namespace::Toggle,
            Method::GetAck,
            json!({"toggle": {"onoff": 1}}),
        )))
        .mount(&server)
        .await;

    let err = transport(&server)
        .request(Namespace::ToggleX, Method::Get, json!({"togglex": []}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn garbage_body_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = transport(&server)
        .request(Namespace::ToggleX, Method::Get, json!({"togglex": []}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn message_log_records_both_directions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(AckResponder)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("messages.ndjson");
    let addr = server.address();
    let config: TransportConfig = serde_json::from_value(json!({
        "host": format!("{}:{}", addr.ip(), addr.port()),
        "key": "secret",
        "timeout_secs": 2
    }))
    .unwrap();
    let transport = HttpTransportBuilder::from_config(config)
        .message_log(MessageLogMode::Full, &log_path)
        .build()
        .unwrap();

    transport
        .request(Namespace::ToggleX, Method::Set, json!({"togglex": {"channel": 0, "onoff": 0}}))
        .await
        .unwrap();

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["dir"], "req");
    assert_eq!(lines[1]["dir"], "resp");
    assert_eq!(lines[1]["method"], "SETACK");
}
