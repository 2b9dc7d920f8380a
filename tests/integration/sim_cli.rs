//! Integration tests for the `pgas-sim` binary.

use std::process::Command;

fn sim() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pgas-sim"));
    cmd.env("PGAS_LOG", "off");
    cmd
}

#[test]
fn test_sim_finalize_all_ranks() {
    let output = sim().args(["--ranks", "3"]).output().unwrap();
    assert!(
        output.status.success(),
        "stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    for rank in 0..3 {
        assert!(stdout.contains(&format!("rank {}: done", rank)), "{}", stdout);
    }
}

#[test]
fn test_sim_trigger_reports_local_statuses() {
    let output = sim()
        .args(["--ranks", "4", "--trigger", "2", "--status", "7"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rank 0: zapped status=0"), "{}", stdout);
    assert!(stdout.contains("rank 2: zapped status=7"), "{}", stdout);
    assert!(stdout.contains("rank 3: zapped status=0"), "{}", stdout);
}

#[test]
fn test_sim_trigger_ends_process_with_status() {
    let output = sim()
        .args([
            "--ranks",
            "2",
            "--trigger",
            "1",
            "--status",
            "7",
            "--exit-process",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn test_sim_rejects_out_of_range_trigger() {
    let output = sim()
        .args(["--ranks", "2", "--trigger", "5"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
