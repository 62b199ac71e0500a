use super::*;

fn frame(kind: &str, payload: serde_json::Value) -> Frame {
    Frame { id: "corr-1".into(), kind: kind.to_owned(), payload, timestamp: 1 }
}

#[test]
fn parses_ping() {
    let req = ClientRequest::parse(&frame("ping", serde_json::Value::Null)).expect("parse");
    assert!(matches!(req, ClientRequest::Ping));
}

#[test]
fn parses_device_command() {
    let payload = serde_json::json!({
        "device_id": "dev-1",
        "kind": "vibrate",
        "intensity": 50,
    });
    let req = ClientRequest::parse(&frame("device_command", payload)).expect("parse");
    match req {
        ClientRequest::DeviceCommand(cmd) => {
            assert_eq!(cmd.device_id, "dev-1");
            assert_eq!(cmd.intensity, 50);
        }
        _ => panic!("expected device_command"),
    }
}

#[test]
fn parses_subscribe_device() {
    let req = ClientRequest::parse(&frame("subscribe_device", serde_json::json!({ "device_id": "dev-1" }))).expect("parse");
    assert!(matches!(req, ClientRequest::SubscribeDevice { device_id } if device_id == "dev-1"));
}

#[test]
fn parses_list_devices_with_capability_filter() {
    let req = ClientRequest::parse(&frame("list_devices", serde_json::json!({ "capability": "vibrate" }))).expect("parse");
    assert!(matches!(req, ClientRequest::ListDevices { capability } if capability.as_deref() == Some("vibrate")));
}

#[test]
fn parses_list_devices_without_capability_filter() {
    let req = ClientRequest::parse(&frame("list_devices", serde_json::Value::Null)).expect("parse");
    assert!(matches!(req, ClientRequest::ListDevices { capability: None }));
}

#[test]
fn parses_auth_refresh() {
    let req = ClientRequest::parse(&frame("auth_refresh", serde_json::json!({ "token": "tok-123" }))).expect("parse");
    assert!(matches!(req, ClientRequest::AuthRefresh { token } if token == "tok-123"));
}

#[test]
fn auth_refresh_missing_token_is_validation_error() {
    let err = ClientRequest::parse(&frame("auth_refresh", serde_json::json!({}))).unwrap_err();
    assert_eq!(err.kind, crate::error::ErrorKind::Validation);
}

#[test]
fn rejects_unknown_type_without_panicking() {
    let err = ClientRequest::parse(&frame("not_a_real_type", serde_json::Value::Null)).unwrap_err();
    assert_eq!(err.kind, crate::error::ErrorKind::Protocol);
}

#[test]
fn subscribe_missing_device_id_is_validation_error() {
    let err = ClientRequest::parse(&frame("subscribe_device", serde_json::json!({}))).unwrap_err();
    assert_eq!(err.kind, crate::error::ErrorKind::Validation);
}

#[test]
fn server_reply_round_trips_through_frame() {
    let frame = ServerReply::Welcome { session_id: "s-1".into(), ping_interval_ms: 15_000, ping_timeout_ms: 5_000 }.into_frame("corr-1", 42);
    assert_eq!(frame.kind, "welcome");
    assert_eq!(frame.payload["session_id"], "s-1");
    assert_eq!(frame.payload["heartbeat"]["ping_interval_ms"], 15_000);
    assert_eq!(frame.timestamp, 42);
}

#[test]
fn error_reply_carries_code_and_message() {
    let err = GatewayError::new(ErrorKind::Validation, "bad input");
    let frame = ServerReply::Error(err).into_frame("corr-1", 1);
    assert_eq!(frame.kind, "error");
    assert_eq!(frame.payload["code"], "VALIDATION_ERROR");
    assert_eq!(frame.payload["message"], "bad input");
}
