use super::*;

#[test]
fn parses_hello_with_capabilities() {
    let raw = r#"{"type":"hello","token":"secret","capabilities":{"sessionsPatchV1":true}}"#;
    let msg: ClientMessage = serde_json::from_str(raw).unwrap();
    match msg {
        ClientMessage::Hello { token, capabilities } => {
            assert_eq!(token, "secret");
            assert!(capabilities.sessions_patch_v1);
            assert!(!capabilities.terminal_attach_chunk_v1);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn parses_terminal_create_with_defaults() {
    let raw = r#"{"type":"terminal.create","requestId":"r1","mode":"shell"}"#;
    let msg: ClientMessage = serde_json::from_str(raw).unwrap();
    match msg {
        ClientMessage::TerminalCreate { request_id, mode, cwd, cols, .. } => {
            assert_eq!(request_id, "r1");
            assert_eq!(mode, "shell");
            assert_eq!(cwd, None);
            assert_eq!(cols, None);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn rejects_unknown_message_type() {
    let raw = r#"{"type":"not.a.real.message"}"#;
    let result: Result<ClientMessage, _> = serde_json::from_str(raw);
    assert!(result.is_err());
}

#[test]
fn terminal_output_serializes_with_snake_case_tag() {
    let msg = ServerMessage::TerminalOutput { terminal_id: "t1".to_owned(), data: "hi".to_owned() };
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains(r#""type":"terminal.output""#));
    assert!(json.contains(r#""terminal_id":"t1""#));
}

#[test]
fn error_omits_request_id_when_absent() {
    let msg = ws_error(ErrorCode::Internal, "boom");
    let json = serde_json::to_string(&msg).unwrap();
    assert!(!json.contains("request_id"));
}

#[test]
fn error_for_request_includes_request_id() {
    let msg = ws_error_for_request(ErrorCode::InvalidMessage, "bad", "r9");
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains(r#""request_id":"r9""#));
}
