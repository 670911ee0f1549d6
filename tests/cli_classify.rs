use assert_cmd::prelude::*;
use std::process::Command;

#[test]
fn command_classify() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("bgcnet")?;
    let output = cmd
        .arg("classify")
        .arg("tests/bgc/records.tsv")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().count(), 8);
    assert!(stdout.contains("bgc1\tnrps\tNRPS\tNRPS\n"));
    assert!(stdout.contains("bgc3\tt1pks\tPKSI\tPKSI\n"));
    assert!(stdout.contains("bgc5\tterpene\tTerpene\tTerpene\n"));
    assert!(stdout.contains("bgc8\tt1pks-nrps\tPKS-NRP_Hybrids\tPKS-NRP_Hybrids\n"));

    Ok(())
}

#[test]
fn command_classify_hybrids() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("bgcnet")?;
    let output = cmd
        .arg("classify")
        .arg("tests/bgc/records.tsv")
        .arg("--hybrids")
        .arg("--banned-classes")
        .arg("terpene")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(stdout.contains("bgc8\tt1pks-nrps\tPKS-NRP_Hybrids\tNRPS,PKS-NRP_Hybrids,PKSI\n"));
    // banned classes are case-insensitive
    assert!(stdout.contains("bgc5\tterpene\tTerpene\t\n"));

    Ok(())
}
