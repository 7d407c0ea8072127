use super::*;

#[test]
fn cmd_escape_applies_substitutions_in_order() {
    assert_eq!(escape_cmd_exe("^"), "^^");
    assert_eq!(escape_cmd_exe("&"), "^&");
    assert_eq!(escape_cmd_exe("|"), "^|");
    assert_eq!(escape_cmd_exe("<"), "^<");
    assert_eq!(escape_cmd_exe(">"), "^>");
    assert_eq!(escape_cmd_exe("%"), "%%");
    assert_eq!(escape_cmd_exe("\""), "\\\"");
}

#[test]
fn cmd_escape_leaves_plain_text_alone() {
    assert_eq!(escape_cmd_exe("hello world"), "hello world");
}

#[test]
fn cmd_escape_composes_mixed_specials() {
    assert_eq!(escape_cmd_exe("a&b|c"), "a^&b^|c");
}

#[test]
fn powershell_quote_wraps_in_single_quotes() {
    assert_eq!(quote_powershell("hello"), "'hello'");
}

#[test]
fn powershell_quote_doubles_embedded_single_quotes() {
    assert_eq!(quote_powershell("it's"), "'it''s'");
}

#[test]
fn windows_path_to_wsl_translates_drive_letter() {
    assert_eq!(
        windows_path_to_wsl(r"C:\Users\me\project", "/mnt"),
        Some("/mnt/c/Users/me/project".to_owned())
    );
}

#[test]
fn windows_path_to_wsl_handles_bare_drive_root() {
    assert_eq!(windows_path_to_wsl(r"D:\", "/mnt"), Some("/mnt/d".to_owned()));
}

#[test]
fn windows_path_to_wsl_rejects_non_drive_paths() {
    assert_eq!(windows_path_to_wsl("/already/unix", "/mnt"), None);
    assert_eq!(windows_path_to_wsl("relative\\path", "/mnt"), None);
}

#[test]
fn is_unix_style_path_detects_leading_slash() {
    assert!(is_unix_style_path("/home/me"));
    assert!(!is_unix_style_path(r"C:\Users\me"));
    assert!(!is_unix_style_path("relative"));
}
