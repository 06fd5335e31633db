use assert_cmd::Command;
use predicates::prelude::*;

/// Check if running as root
fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[test]
fn test_help_command() {
    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("NTP test fleet"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("logs"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("cleanup"));
}

#[test]
fn test_version_command() {
    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ntpfleet"));
}

#[test]
fn test_invalid_command() {
    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("invalid")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_create_requires_root() {
    // Skip if running as root
    if is_root() {
        return;
    }

    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("create")
        .arg("--instance")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));
}

#[test]
fn test_list_requires_root() {
    // Skip if running as root
    if is_root() {
        return;
    }

    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));
}

#[test]
fn test_cleanup_requires_root() {
    // Skip if running as root
    if is_root() {
        return;
    }

    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("cleanup")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));
}

#[test]
fn test_create_help() {
    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("create")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--instance"))
        .stdout(predicate::str::contains("--subnet"))
        .stdout(predicate::str::contains("--offset"))
        .stdout(predicate::str::contains("--stratum"))
        .stdout(predicate::str::contains("--leap"));
}

#[test]
fn test_batch_help() {
    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("batch")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--start"))
        .stdout(predicate::str::contains("--end"))
        .stdout(predicate::str::contains("--subnet"));
}

#[test]
fn test_invalid_instance_value() {
    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("create")
        .arg("--instance")
        .arg("abc")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn test_invalid_offset_value() {
    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("batch")
        .arg("--offset")
        .arg("soon")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn test_negative_instance_value() {
    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("create")
        .arg("--instance")
        .arg("-5")
        .assert()
        .failure();
}

#[test]
#[ignore] // Requires root
fn test_invalid_leap_rejected_before_any_action() {
    // Skip if not root
    if !is_root() {
        return;
    }

    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("create")
        .arg("--instance")
        .arg("200")
        .arg("--leap")
        .arg("7")
        .assert()
        .failure()
        .stderr(predicate::str::contains("leap indicator"));
}

#[test]
#[ignore] // Requires root
fn test_out_of_range_instance_rejected() {
    // Skip if not root
    if !is_root() {
        return;
    }

    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("create")
        .arg("--instance")
        .arg("300")
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
#[ignore] // Requires root
fn test_delete_nonexistent_is_noop() {
    // Skip if not root
    if !is_root() {
        return;
    }

    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("delete")
        .arg("--instance")
        .arg("199")
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted"));
}

#[test]
#[ignore] // Requires root
fn test_logs_on_missing_instance_fails() {
    // Skip if not root
    if !is_root() {
        return;
    }

    Command::new(env!("CARGO_BIN_EXE_ntpfleet"))
        .arg("logs")
        .arg("--instance")
        .arg("198")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
