//! CLI integration tests
//!
//! Every command runs against the emulated backend inside an empty
//! temporary directory, so no jlbridge.toml or Julia installation leaks in.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

fn jlbridge_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("jlbridge").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("JLBRIDGE_BACKEND")
        .env_remove("JLBRIDGE_OUTPUT")
        .env_remove("JULIA_DIR")
        .env_remove("RUST_LOG")
        .arg("--backend")
        .arg("emulated");
    cmd
}

mod help_messages {
    use super::*;

    #[test]
    fn test_main_help_lists_commands() {
        let dir = TempDir::new().unwrap();
        jlbridge_cmd(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("eval"))
            .stdout(predicate::str::contains("matmul"))
            .stdout(predicate::str::contains("invert"))
            .stdout(predicate::str::contains("typeof"))
            .stdout(predicate::str::contains("JULIA_DIR"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let dir = TempDir::new().unwrap();
        Command::cargo_bin("jlbridge")
            .unwrap()
            .current_dir(dir.path())
            .args(["--backend", "octave", "eval", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("must be 'emulated' or 'libjulia'"));
    }
}

mod eval {
    use super::*;

    #[test]
    fn test_eval_scalar() {
        let dir = TempDir::new().unwrap();
        jlbridge_cmd(&dir)
            .args(["eval", "1 + 2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("type:   Int64"))
            .stdout(predicate::str::contains("value:  3"));
    }

    #[test]
    fn test_eval_vector() {
        let dir = TempDir::new().unwrap();
        jlbridge_cmd(&dir)
            .args(["eval", "[1, 2, 3] * 2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Vector{Int64}"))
            .stdout(predicate::str::contains("length: 3"))
            .stdout(predicate::str::contains("[2, 4, 6]"));
    }

    #[test]
    fn test_eval_json() {
        let dir = TempDir::new().unwrap();
        let output = jlbridge_cmd(&dir)
            .args(["--json", "eval", "[0x01, 0x02]"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(parsed["type"], "Vector{UInt8}");
        assert_eq!(parsed["length"], 2);
        assert_eq!(parsed["value"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_eval_string_is_opaque() {
        let dir = TempDir::new().unwrap();
        jlbridge_cmd(&dir)
            .args(["eval", "\"hello\""])
            .assert()
            .success()
            .stdout(predicate::str::contains("type:   String"))
            .stdout(predicate::str::contains("value:").not());
    }

    #[test]
    fn test_eval_error_reports_julia_message() {
        let dir = TempDir::new().unwrap();
        jlbridge_cmd(&dir)
            .args(["eval", "using JSON2"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Package JSON2 not found"));
    }
}

mod matrices {
    use super::*;

    #[test]
    fn test_matmul_prints_identity_sized_matrix() {
        let dir = TempDir::new().unwrap();
        let output = jlbridge_cmd(&dir)
            .args(["--json", "matmul", "--size", "3"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(parsed["dims"], serde_json::json!([3, 3]));
        let elms = parsed["elms"].as_array().unwrap();
        assert_eq!(elms.len(), 9);
        for (index, value) in elms.iter().enumerate() {
            let expected = if index % 4 == 0 { 1.0 } else { 0.0 };
            assert!((value.as_f64().unwrap() - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_invert_prints_rows() {
        let dir = TempDir::new().unwrap();
        let output = jlbridge_cmd(&dir).args(["invert", "--size", "2"]).output().unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).unwrap();
        assert_eq!(stdout.lines().count(), 2);
    }

    #[test]
    fn test_zero_size_rejected() {
        let dir = TempDir::new().unwrap();
        jlbridge_cmd(&dir)
            .args(["matmul", "--size", "0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--size must be at least 1"));
    }
}

mod type_names {
    use super::*;

    #[test]
    fn test_bool_maps_to_int8() {
        let dir = TempDir::new().unwrap();
        jlbridge_cmd(&dir)
            .args(["typeof", "--kind", "Bool", "--shape", "4"])
            .assert()
            .success()
            .stdout(predicate::str::diff("Vector{Int8}\n"));
    }

    #[test]
    fn test_three_dimensional() {
        let dir = TempDir::new().unwrap();
        jlbridge_cmd(&dir)
            .args(["typeof", "--kind", "f64", "--shape", "2,3,4"])
            .assert()
            .success()
            .stdout(predicate::str::diff("Array{Float64, 3}\n"));
    }

    #[test]
    fn test_zero_extent_rejected() {
        let dir = TempDir::new().unwrap();
        jlbridge_cmd(&dir)
            .args(["typeof", "--kind", "u8", "--shape", "2,0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid dimensions"));
    }
}

mod configuration {
    use super::*;
    use std::fs;

    #[test]
    fn test_project_config_selects_backend() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("jlbridge.toml"), "[runtime]\nbackend = \"emulated\"\n").unwrap();
        Command::cargo_bin("jlbridge")
            .unwrap()
            .current_dir(dir.path())
            .env("HOME", dir.path())
            .env_remove("JLBRIDGE_BACKEND")
            .env_remove("JULIA_DIR")
            .args(["eval", "typeof(1.5f0)"])
            .assert()
            .success()
            .stdout(predicate::str::contains("type:   DataType"));
    }

    #[test]
    fn test_invalid_config_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("jlbridge.toml"), "[runtime\n").unwrap();
        jlbridge_cmd(&dir)
            .args(["eval", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to load jlbridge configuration"));
    }
}
