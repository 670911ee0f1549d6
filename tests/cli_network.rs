use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn data_lines(path: &std::path::Path) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().skip(1).map(|l| l.to_string()).collect())
}

#[test]
fn command_network() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("bgcnet")?;
    cmd.arg("network")
        .arg("tests/bgc")
        .arg("-o")
        .arg(temp.path())
        .assert()
        .success();

    let nrps = data_lines(&temp.path().join("networks_all/NRPS/all_NRPS_c1.0.network"))?;
    assert_eq!(nrps.len(), 3);
    assert!(nrps.iter().any(|l| l.starts_with("bgc1\tbgc2\tNRPS\t")));
    assert!(nrps
        .iter()
        .any(|l| l.starts_with("bgc2\tbgc6\tNRPS\t") && l.contains("\t0.75\t")));

    let pksi = data_lines(&temp.path().join("networks_all/PKSI/all_PKSI_c1.0.network"))?;
    assert_eq!(pksi.len(), 1);
    assert!(pksi[0].starts_with("bgc3\tbgc4\tPKSI\t"));

    // a single terpene record
    assert!(!temp.path().join("networks_all/Terpene").exists());
    assert!(!temp.path().join("networks_all/all_mix_c1.0.network").exists());

    let excluded = fs::read_to_string(temp.path().join("excluded.tsv"))?;
    assert_eq!(excluded.lines().count(), 3);
    assert!(excluded.contains("bgc7\tno domains"));
    assert!(excluded.contains("bgc8\tmissing domain list"));

    let diagnostics = fs::read_to_string(temp.path().join("diagnostics.tsv"))?;
    assert!(diagnostics.contains("realigned\tbgc3\tbgc4\tPKSI\t"));

    assert!(temp.path().join("index.json").is_file());
    assert!(temp.path().join("parameters.txt").is_file());

    Ok(())
}

#[test]
fn command_network_cutoffs() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("bgcnet")?;
    cmd.arg("network")
        .arg("tests/bgc")
        .arg("-o")
        .arg(temp.path())
        .arg("--cutoffs")
        .arg("0.5")
        .arg("-p")
        .arg("2")
        .assert()
        .success();

    let dir = temp.path().join("networks_all/NRPS");
    // c1.0 is always written
    assert_eq!(data_lines(&dir.join("all_NRPS_c1.0.network"))?.len(), 3);

    let edges = data_lines(&dir.join("all_NRPS_c0.5.network"))?;
    assert_eq!(edges.len(), 1);
    assert!(edges[0].starts_with("bgc1\tbgc2\t"));

    Ok(())
}

#[test]
fn command_network_disc_nodes() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("bgcnet")?;
    cmd.arg("network")
        .arg("tests/bgc")
        .arg("-o")
        .arg(temp.path())
        .arg("--cutoffs")
        .arg("0.5")
        .arg("--include-disc-nodes")
        .assert()
        .success();

    let lines = data_lines(&temp.path().join("networks_all/NRPS/all_NRPS_c0.5.network"))?;
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("bgc6\tbgc6\tNRPS\t"));

    Ok(())
}

#[test]
fn command_network_min_size() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("bgcnet")?;
    cmd.arg("network")
        .arg("tests/bgc")
        .arg("-o")
        .arg(temp.path())
        .arg("--min-size")
        .arg("1000")
        .assert()
        .success();

    let nrps = data_lines(&temp.path().join("networks_all/NRPS/all_NRPS_c1.0.network"))?;
    assert_eq!(nrps.len(), 1);

    let excluded = fs::read_to_string(temp.path().join("excluded.tsv"))?;
    assert!(excluded.contains("bgc6\t"));

    Ok(())
}

#[test]
fn command_network_samples() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("bgcnet")?;
    cmd.arg("network")
        .arg("tests/bgc")
        .arg("-o")
        .arg(temp.path())
        .arg("--samples")
        .arg("--mix")
        .assert()
        .success();

    let all_mix = data_lines(&temp.path().join("networks_all/all_mix_c1.0.network"))?;
    // bgc1 to bgc6
    assert_eq!(all_mix.len(), 15);

    let samples = temp.path().join("networks_samples");
    let soil = data_lines(&samples.join("sample_soil_mix_c1.0.network"))?;
    assert_eq!(soil.len(), 6);
    assert!(soil.iter().all(|l| all_mix.contains(l)));

    let marine = data_lines(&samples.join("sample_marine_mix_c1.0.network"))?;
    assert_eq!(marine.len(), 3);
    assert!(marine.iter().all(|l| all_mix.contains(l)));

    let all_nrps = data_lines(&temp.path().join("networks_all/NRPS/all_NRPS_c1.0.network"))?;
    let soil_nrps = data_lines(&samples.join("soil/NRPS/sample_soil_NRPS_c1.0.network"))?;
    assert_eq!(soil_nrps, all_nrps);

    // bgc2 is the only marine NRPS record
    assert!(!samples.join("marine/NRPS").exists());
    assert!(samples
        .join("marine/PKSI/sample_marine_PKSI_c1.0.network")
        .is_file());

    Ok(())
}

#[test]
fn command_network_resume() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("bgcnet")?;
    cmd.arg("network")
        .arg("tests/bgc")
        .arg("-o")
        .arg(temp.path())
        .assert()
        .success();
    let path = temp.path().join("networks_all/NRPS/all_NRPS_c1.0.network");
    let first = fs::read_to_string(&path)?;

    let mut cmd = Command::cargo_bin("bgcnet")?;
    cmd.arg("network")
        .arg("tests/bgc")
        .arg("-o")
        .arg(temp.path())
        .arg("--resume")
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&path)?, first);

    Ok(())
}

fn run_network(outdir: &std::path::Path, extra: &[&str]) -> anyhow::Result<String> {
    let mut cmd = Command::cargo_bin("bgcnet")?;
    cmd.arg("network")
        .arg("tests/bgc")
        .arg("-o")
        .arg(outdir)
        .args(extra)
        .assert()
        .success();
    Ok(fs::read_to_string(
        outdir.join("networks_all/NRPS/all_NRPS_c1.0.network"),
    )?)
}

#[test]
fn command_network_resume_other_weights() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let weights = temp.path().join("weights.tsv");
    fs::write(&weights, "NRPS\t1\t0\t0\t1\n")?;
    let weights = weights.display().to_string();

    let outdir = temp.path().join("out");
    let custom = run_network(&outdir, &["--weights", &weights])?;
    // bgc1 and bgc2 share all domain types
    assert!(custom.contains("bgc1\tbgc2\tNRPS\tnrps\tStreptomyces sp. NRPS cluster\tnrps\tStreptomyces sp. NRPS cluster 2\tinf\t0\t"));

    let resumed = run_network(&outdir, &["--resume"])?;
    let fresh = run_network(&temp.path().join("fresh"), &[])?;
    assert_ne!(resumed, custom);
    assert_eq!(resumed, fresh);

    // same settings again, reused as is
    assert_eq!(run_network(&outdir, &["--resume"])?, fresh);

    Ok(())
}

#[test]
fn command_network_resume_fragment() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let outdir = temp.path().join("out");
    let plain = run_network(&outdir, &[])?;
    let resumed = run_network(&outdir, &["--resume", "--fragment"])?;
    let fresh = run_network(&temp.path().join("fresh"), &["--fragment"])?;
    assert_ne!(resumed, plain);
    assert_eq!(resumed, fresh);

    let settings = fs::read_to_string(outdir.join("settings.json"))?;
    assert!(settings.contains("all_NRPS"));

    Ok(())
}

#[test]
fn command_network_nothing_to_do() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("bgcnet")?;
    cmd.arg("network")
        .arg("tests/bgc")
        .arg("--no-all")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to do"));

    Ok(())
}
