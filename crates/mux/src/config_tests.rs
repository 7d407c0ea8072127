use super::*;
use clap::Parser;

fn base() -> Config {
    Config::parse_from(["freeshell-mux"])
}

#[test]
fn defaults_validate() {
    assert!(base().validate().is_ok());
}

#[test]
fn warn_before_kill_must_be_smaller() {
    let mut cfg = base();
    cfg.auto_kill_idle_minutes = 10;
    cfg.warn_before_kill_minutes = 10;
    assert!(cfg.validate().is_err());
    cfg.warn_before_kill_minutes = 9;
    assert!(cfg.validate().is_ok());
}

#[test]
fn idle_disabled_ignores_warn_value() {
    let mut cfg = base();
    cfg.auto_kill_idle_minutes = 0;
    cfg.warn_before_kill_minutes = 999;
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_unknown_windows_shell() {
    let mut cfg = base();
    cfg.windows_shell = "bash".to_owned();
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_unknown_log_format() {
    let mut cfg = base();
    cfg.log_format = "xml".to_owned();
    assert!(cfg.validate().is_err());
}
