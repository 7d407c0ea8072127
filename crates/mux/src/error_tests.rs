use super::*;

#[test]
fn as_str_is_stable() {
    assert_eq!(ErrorCode::InvalidMessage.as_str(), "INVALID_MESSAGE");
    assert_eq!(ErrorCode::NotAuthenticated.as_str(), "NOT_AUTHENTICATED");
    assert_eq!(ErrorCode::MaxTerminalsReached.as_str(), "MAX_TERMINALS_REACHED");
}

#[test]
fn display_matches_as_str() {
    for code in [
        ErrorCode::InvalidMessage,
        ErrorCode::NotAuthenticated,
        ErrorCode::InvalidTerminalId,
        ErrorCode::MaxTerminalsReached,
        ErrorCode::RateLimited,
        ErrorCode::Internal,
    ] {
        assert_eq!(code.to_string(), code.as_str());
    }
}
