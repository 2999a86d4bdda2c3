use std::path::Path;

use assert_cmd::Command;
use car_ipld::testing::{directory_block, file_block, CarBuilder};
use cid::Cid;

fn write_car(dir: &Path) -> (std::path::PathBuf, Cid) {
    let hello = file_block(b"hello");
    let root = directory_block(&[("hello.txt", hello.0)]);
    let root_cid = root.0;
    let car = CarBuilder::new(vec![root_cid])
        .block(root)
        .block(hello)
        .build();
    let path = dir.join("archive.car");
    std::fs::write(&path, car).unwrap();
    (path, root_cid)
}

fn car_reader(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("car-reader").unwrap();
    cmd.arg("--config").arg(dir.join("config.toml"));
    cmd
}

#[test]
fn test_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let (car, root) = write_car(dir.path());

    let output = car_reader(dir.path())
        .arg("inspect")
        .arg(&car)
        .args(["--chunk-size", "7"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();

    assert!(stdout.starts_with(&format!("header\troots={root}")));
    assert!(stdout.contains(&format!("{root}\tmetadata\tverified")));
    assert!(stdout.contains("2 blocks, 0 failed verification"));
    // Inspecting never writes a configuration file.
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn test_inspect_truncated_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (car, _) = write_car(dir.path());
    let bytes = std::fs::read(&car).unwrap();
    std::fs::write(&car, &bytes[..bytes.len() - 1]).unwrap();

    car_reader(dir.path())
        .arg("inspect")
        .arg(&car)
        .assert()
        .failure();
}

#[test]
fn test_extract() {
    let dir = tempfile::tempdir().unwrap();
    let (car, root) = write_car(dir.path());
    let out = dir.path().join("out");

    car_reader(dir.path())
        .arg("extract")
        .arg(&car)
        .arg(&out)
        .assert()
        .success();

    let hello = out.join(root.to_string()).join("hello.txt");
    assert_eq!(std::fs::read(hello).unwrap(), b"hello");
}

#[test]
fn test_print_config() {
    let dir = tempfile::tempdir().unwrap();

    let output = car_reader(dir.path())
        .args(["print-config", "--default"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();
    assert!(stdout.contains("max_block_size = 4194304"));
    assert!(stdout.contains("gateway_timeout = \"5s\""));

    car_reader(dir.path()).arg("print-config").assert().success();
    assert!(dir.path().join("config.toml").exists());
}
