use super::*;

#[test]
fn claude_requires_uuid_session_id() {
    assert!(Mode::Claude.requires_uuid_session_id());
    assert!(!Mode::Codex.requires_uuid_session_id());
    assert!(!Mode::Shell.requires_uuid_session_id());
}

#[test]
fn normalize_rejects_non_uuid_for_claude() {
    let err = normalize_resume_session_id(Mode::Claude, Some("not-a-uuid"));
    assert!(err.is_err());
}

#[test]
fn normalize_accepts_uuid_for_claude() {
    let id = Uuid::new_v4().to_string();
    let out = normalize_resume_session_id(Mode::Claude, Some(&id)).unwrap();
    assert_eq!(out, Some(id));
}

#[test]
fn normalize_passes_through_opaque_ids_for_other_providers() {
    let out = normalize_resume_session_id(Mode::Codex, Some("anything-goes")).unwrap();
    assert_eq!(out, Some("anything-goes".to_owned()));
}

#[test]
fn normalize_none_and_empty_are_absent() {
    assert_eq!(normalize_resume_session_id(Mode::Claude, None).unwrap(), None);
    assert_eq!(normalize_resume_session_id(Mode::Claude, Some("")).unwrap(), None);
}

#[test]
fn resume_args_absent_for_providers_without_resume() {
    assert_eq!(Mode::Gemini.resume_args("x"), None);
    assert_eq!(Mode::Kimi.resume_args("x"), None);
    assert_eq!(Mode::Shell.resume_args("x"), None);
}

#[test]
fn resume_args_present_for_claude_and_codex() {
    assert_eq!(
        Mode::Claude.resume_args("abc"),
        Some(vec!["--resume".to_owned(), "abc".to_owned()])
    );
    assert_eq!(
        Mode::Codex.resume_args("abc"),
        Some(vec!["resume".to_owned(), "abc".to_owned()])
    );
}

#[test]
fn executable_override_takes_precedence() {
    let mut config = Config::parse_test();
    config.claude_cmd = Some("/opt/claude-beta".to_owned());
    assert_eq!(Mode::Claude.executable(&config), "/opt/claude-beta");
    assert_eq!(Mode::Codex.executable(&config), "codex");
}

#[test]
fn permission_mode_args_only_for_claude_non_default() {
    assert_eq!(Mode::Claude.permission_mode_args(Some("default")), Vec::<String>::new());
    assert_eq!(
        Mode::Claude.permission_mode_args(Some("plan")),
        vec!["--permission-mode".to_owned(), "plan".to_owned()]
    );
    assert_eq!(Mode::Codex.permission_mode_args(Some("plan")), Vec::<String>::new());
}
