//! Network pipeline: partitions, reuse between them and the output layout.
//!
//! ```text
//! outdir/
//!     networks_all/all_mix_c1.0.network
//!     networks_all/<Class>/all_<Class>_c1.0.network
//!     networks_samples/sample_<s>_mix_c1.0.network
//!     networks_samples/<s>/<Class>/sample_<s>_<Class>_c1.0.network
//!     index.json  settings.json  diagnostics.tsv  excluded.tsv  parameters.txt
//! ```

use crate::libs::align::AlignmentStore;
use crate::libs::batch::{BatchReport, Diagnostic, ResultTable, Scheduler};
use crate::libs::dist::DistanceContext;
use crate::libs::domain::{AnchorSet, DomainIndex, Exclusion};
use crate::libs::network::{format_cutoff, rows_from_table, write_network, NetworkFile};
use crate::libs::record::{Catalogue, ClassPlan};
use crate::libs::stage;
use crate::libs::weights::{ClassWeights, WeightTable, MIX};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const NETWORKS_ALL: &str = "networks_all";
pub const NETWORKS_SAMPLES: &str = "networks_samples";
pub const INDEX_CACHE: &str = "index.json";
pub const SETTINGS_CACHE: &str = "settings.json";

/// Input files and the output directory.
#[derive(Debug, Clone)]
pub struct Layout {
    pub records: PathBuf,
    pub pfs: PathBuf,
    pub pfd: PathBuf,
    pub domains: PathBuf,
    pub anchors: PathBuf,
    pub weights: Option<PathBuf>,
    pub outdir: PathBuf,
}

impl Layout {
    /// Default locations below an input directory.
    pub fn new(input: &Path, outdir: &Path) -> Self {
        Self {
            records: input.join("records.tsv"),
            pfs: input.join("pfs"),
            pfd: input.join("pfd"),
            domains: input.join("domains"),
            anchors: input.join("anchor_domains.txt"),
            weights: None,
            outdir: outdir.to_path_buf(),
        }
    }

    pub fn index_cache(&self) -> PathBuf {
        self.outdir.join(INDEX_CACHE)
    }

    pub fn settings_cache(&self) -> PathBuf {
        self.outdir.join(SETTINGS_CACHE)
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub parallel: usize,
    pub tasks_per_worker: usize,
    pub cutoffs: Vec<f64>,
    pub include_disc: bool,
    pub min_size: usize,
    /// All records together
    pub all: bool,
    /// Each sample separately
    pub samples: bool,
    /// One network mixing all classes
    pub mix: bool,
    /// One network per class
    pub classify: bool,
    pub classes: ClassPlan,
    pub fragment: bool,
    pub resume: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            parallel: 1,
            tasks_per_worker: 100,
            cutoffs: vec![1.0],
            include_disc: false,
            min_size: 0,
            all: true,
            samples: false,
            mix: false,
            classify: true,
            classes: ClassPlan::default(),
            fragment: false,
            resume: false,
        }
    }
}

/// Where a partition takes its results from and where they go afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    AllMix,
    AllClass,
    SampleMix,
    SampleClass,
}

/// A set of records compared with the weights of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub scope: Scope,
    /// File name prefix, e.g. `all_NRPS`
    pub label: String,
    pub class: String,
    pub dir: PathBuf,
    pub members: Vec<String>,
}

impl Partition {
    pub fn network_path(&self, cutoff: f64) -> PathBuf {
        self.dir
            .join(format!("{}_c{}.network", self.label, format_cutoff(cutoff)))
    }
}

/// Lists the partitions to compute, in processing order.
pub fn plan(catalogue: &Catalogue, opts: &Options, outdir: &Path) -> Vec<Partition> {
    let mut partitions = vec![];
    let mut members = catalogue.ids();
    members.sort();

    let all_dir = outdir.join(NETWORKS_ALL);
    if opts.all {
        if opts.mix {
            partitions.push(Partition {
                scope: Scope::AllMix,
                label: format!("all_{}", MIX),
                class: MIX.to_string(),
                dir: all_dir.clone(),
                members: members.clone(),
            });
        }
        if opts.classify {
            for (class, ms) in opts.classes.partition(&members, catalogue) {
                if ms.len() < 2 {
                    log::info!("Skipping class {}: only {} record", class, ms.len());
                    continue;
                }
                partitions.push(Partition {
                    scope: Scope::AllClass,
                    label: format!("all_{}", class),
                    class: class.to_string(),
                    dir: all_dir.join(class),
                    members: ms,
                });
            }
        }
    }

    if opts.samples {
        let samples = catalogue.samples();
        if samples.len() == 1 && opts.all {
            log::info!("Not generating networks per sample: only one sample, covered by the analysis of all records");
            return partitions;
        }

        let samples_dir = outdir.join(NETWORKS_SAMPLES);
        for (sample, ms) in samples {
            if ms.len() < 2 {
                log::warn!(
                    "Sample size = 1 detected, not generating networks for sample {}",
                    sample
                );
                continue;
            }
            if opts.mix {
                partitions.push(Partition {
                    scope: Scope::SampleMix,
                    label: format!("sample_{}_{}", sample, MIX),
                    class: MIX.to_string(),
                    dir: samples_dir.clone(),
                    members: ms.clone(),
                });
            }
            if opts.classify {
                for (class, cms) in opts.classes.partition(&ms, catalogue) {
                    if cms.len() < 2 {
                        continue;
                    }
                    partitions.push(Partition {
                        scope: Scope::SampleClass,
                        label: format!("sample_{}_{}", sample, class),
                        class: class.to_string(),
                        dir: samples_dir.join(&sample).join(class),
                        members: cms,
                    });
                }
            }
        }
    }

    partitions
}

// Domain Index cache, valid for exactly the same record ids
#[derive(Debug, Serialize, Deserialize)]
struct IndexCache {
    ids: Vec<String>,
    index: DomainIndex,
    excluded: Vec<Exclusion>,
}

/// Loads the Domain Index, from `index.json` when it is fresh for the same records.
pub fn load_index(layout: &Layout, ids: &[String]) -> anyhow::Result<(DomainIndex, Vec<Exclusion>)> {
    let cache = layout.index_cache();
    let mut inputs = vec![layout.records.clone()];
    inputs.extend(stage::files_with_extension(&layout.pfs, "pfs"));
    inputs.extend(stage::files_with_extension(&layout.pfd, "pfd"));

    if stage::is_fresh(&cache, &inputs) {
        let reader = crate::reader(&cache.display().to_string())?;
        match serde_json::from_reader::<_, IndexCache>(reader) {
            Ok(cached) if cached.ids == ids => {
                log::info!("Reusing the domain index of {}", cache.display());
                return Ok((cached.index, cached.excluded));
            }
            Ok(_) => log::info!("Record list changed, rebuilding the domain index"),
            Err(e) => log::warn!("Cannot read {}: {}", cache.display(), e),
        }
    }

    let (index, excluded) = DomainIndex::load(&layout.pfs, &layout.pfd, ids);
    let cached = IndexCache {
        ids: ids.to_vec(),
        index,
        excluded,
    };
    let mut writer = crate::writer(&cache.display().to_string())?;
    serde_json::to_writer(&mut writer, &cached)?;
    writer.flush()?;

    Ok((cached.index, cached.excluded))
}

/// What the distances of a written partition depend on besides the input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSettings {
    pub fragment: bool,
    pub weights: ClassWeights,
}

/// Settings of the partitions written into an output directory, keyed by label.
pub fn load_settings(path: &Path) -> BTreeMap<String, PartitionSettings> {
    if !path.is_file() {
        return BTreeMap::new();
    }
    let parsed: anyhow::Result<BTreeMap<String, PartitionSettings>> =
        crate::reader(&path.display().to_string())
            .and_then(|reader| Ok(serde_json::from_reader(reader)?));
    match parsed {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Cannot read {}: {}", path.display(), e);
            BTreeMap::new()
        }
    }
}

fn save_settings(
    path: &Path,
    settings: &BTreeMap<String, PartitionSettings>,
) -> anyhow::Result<()> {
    let mut writer = crate::writer(&path.display().to_string())?;
    serde_json::to_writer_pretty(&mut writer, settings)?;
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct Summary {
    pub records: usize,
    pub partitions: usize,
    pub networks: usize,
    pub report: BatchReport,
}

/// Runs the whole analysis.
pub fn run(layout: &Layout, opts: &Options) -> anyhow::Result<Summary> {
    std::fs::create_dir_all(&layout.outdir)?;

    //----------------------------
    // Records and domains
    //----------------------------
    let mut catalogue = Catalogue::load(&layout.records.display().to_string())?;
    let mut excluded = catalogue.retain_min_size(opts.min_size);

    let ids = catalogue.ids();
    let (index, mut missing) = load_index(layout, &ids)?;
    excluded.append(&mut missing);
    let indexed: BTreeSet<String> = index.ids().cloned().collect();
    catalogue.retain_ids(&indexed);
    excluded.sort();

    if catalogue.len() < 2 {
        anyhow::bail!(
            "{} records left after excluding {}, at least 2 are needed",
            catalogue.len(),
            excluded.len()
        );
    }
    log::info!(
        "{} records in the analysis, {} excluded",
        catalogue.len(),
        excluded.len()
    );

    let anchors = AnchorSet::load(&layout.anchors)?;
    log::info!("{} anchor domains", anchors.len());
    let mut weights = WeightTable::default();
    if let Some(path) = &layout.weights {
        weights.update_from_file(&path.display().to_string())?;
    }
    let alignments = AlignmentStore::load(&layout.domains)?;

    let ctx = DistanceContext::new(index, alignments, anchors, weights).with_fragment(opts.fragment);
    let scheduler = Scheduler::new(&ctx, &layout.domains, opts.parallel)
        .with_tasks_per_worker(opts.tasks_per_worker);

    //----------------------------
    // Partitions
    //----------------------------
    let mut resume_inputs = vec![layout.index_cache(), layout.anchors.clone()];
    resume_inputs.extend(stage::files_with_extension(&layout.domains, "algn"));
    if let Some(path) = &layout.weights {
        resume_inputs.push(path.clone());
    }

    let settings_path = layout.settings_cache();
    let mut settings = load_settings(&settings_path);

    let partitions = plan(&catalogue, opts, &layout.outdir);
    let mut summary = Summary {
        records: catalogue.len(),
        partitions: partitions.len(),
        ..Default::default()
    };

    // kept for the per-sample analyses only
    let mut mix_table = ResultTable::new();
    let mut class_table = ResultTable::new();

    for part in &partitions {
        log::info!("{} ({} records)", part.label, part.members.len());
        std::fs::create_dir_all(&part.dir)?;

        let broader = match part.scope {
            Scope::SampleMix => Some(&mix_table),
            Scope::SampleClass => Some(&class_table),
            _ => None,
        };
        let current = PartitionSettings {
            fragment: opts.fragment,
            weights: ctx.weights.get(&part.class),
        };
        let mut resume = opts.resume;
        if resume && settings.get(&part.label) != Some(&current) {
            log::info!("  {} was written with other settings, recomputing", part.label);
            resume = false;
        }
        let table = match resumed(part, &scheduler, &resume_inputs, resume)? {
            Some(table) => table,
            None => {
                let (table, report) = scheduler.run(&part.members, &part.class, broader)?;
                log::info!(
                    "  {} pairs computed, {} reused, {} failed",
                    report.computed,
                    report.reused,
                    report.failed
                );
                summary.report.merge(report);
                table
            }
        };

        // no entry while the files are being replaced
        if settings.remove(&part.label).is_some() {
            save_settings(&settings_path, &settings)?;
        }
        let edges = rows_from_table(&table, &catalogue);
        for &cutoff in &opts.cutoffs {
            let path = part.network_path(cutoff).display().to_string();
            write_network(
                &path,
                &edges,
                &part.members,
                &part.class,
                cutoff,
                opts.include_disc,
                &catalogue,
            )?;
            summary.networks += 1;
        }
        settings.insert(part.label.clone(), current);
        save_settings(&settings_path, &settings)?;

        if opts.samples {
            match part.scope {
                Scope::AllMix => mix_table.merge(table),
                Scope::AllClass => class_table.merge(table),
                _ => {}
            }
        }
    }

    //----------------------------
    // Reports
    //----------------------------
    excluded.append(&mut summary.report.excluded);
    excluded.sort();
    excluded.dedup();
    write_excluded(&layout.outdir.join("excluded.tsv"), &excluded)?;

    summary.report.diagnostics.sort();
    summary.report.diagnostics.dedup();
    write_diagnostics(&layout.outdir.join("diagnostics.tsv"), &summary.report.diagnostics)?;
    write_parameters(&layout.outdir.join("parameters.txt"), layout, opts)?;
    summary.report.excluded = excluded;

    Ok(summary)
}

// The table of a partition read back from its cutoff-1.0 network.
// `resume` is false when the partition was last written with other settings.
fn resumed(
    part: &Partition,
    scheduler: &Scheduler,
    inputs: &[PathBuf],
    resume: bool,
) -> anyhow::Result<Option<ResultTable>> {
    let path = part.network_path(1.0);
    if !resume || !stage::is_fresh(&path, inputs) {
        return Ok(None);
    }

    let file = NetworkFile::read(&path.display().to_string())?;
    let mut table = file.table();
    let n = part.members.len();
    let complete = table.len() == n * (n - 1) / 2
        && file.edges.iter().all(|r| {
            r.key.class == part.class
                && part.members.contains(&r.key.a)
                && part.members.contains(&r.key.b)
        });
    if !complete {
        log::info!("  {} does not match the partition, recomputing", path.display());
        return Ok(None);
    }

    log::info!("  Reusing {}", path.display());
    let weights = scheduler.context().weights.get(&part.class);
    table.mark_covered(&part.class, weights, &part.members);
    Ok(Some(table))
}

fn write_excluded(path: &Path, excluded: &[Exclusion]) -> anyhow::Result<()> {
    let mut writer = crate::writer(&path.display().to_string())?;
    writer.write_fmt(format_args!("record\treason\n"))?;
    for e in excluded {
        writer.write_fmt(format_args!("{}\t{}\n", e.record, e.reason))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_diagnostics(path: &Path, diagnostics: &[Diagnostic]) -> anyhow::Result<()> {
    let mut writer = crate::writer(&path.display().to_string())?;
    writer.write_fmt(format_args!("kind\trecord A\trecord B\tclass\tdetail\n"))?;
    for d in diagnostics {
        writer.write_fmt(format_args!(
            "{}\t{}\t{}\t{}\t{}\n",
            d.kind, d.a, d.b, d.class, d.detail
        ))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parameters(path: &Path, layout: &Layout, opts: &Options) -> anyhow::Result<()> {
    let cutoffs: Vec<String> = opts.cutoffs.iter().map(|c| format_cutoff(*c)).collect();
    let weights = layout
        .weights
        .as_ref()
        .map_or("default".to_string(), |p| p.display().to_string());

    let mut writer = crate::writer(&path.display().to_string())?;
    for (key, value) in [
        ("records", layout.records.display().to_string()),
        ("pfs", layout.pfs.display().to_string()),
        ("pfd", layout.pfd.display().to_string()),
        ("domains", layout.domains.display().to_string()),
        ("anchors", layout.anchors.display().to_string()),
        ("weights", weights),
        ("parallel", opts.parallel.to_string()),
        ("tasks_per_worker", opts.tasks_per_worker.to_string()),
        ("cutoffs", cutoffs.join(",")),
        ("include_disc_nodes", opts.include_disc.to_string()),
        ("min_size", opts.min_size.to_string()),
        ("all", opts.all.to_string()),
        ("samples", opts.samples.to_string()),
        ("mix", opts.mix.to_string()),
        ("classify", opts.classify.to_string()),
        ("fragment", opts.fragment.to_string()),
    ] {
        writer.write_fmt(format_args!("{}\t{}\n", key, value))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::record::RecordMeta;

    fn catalogue() -> Catalogue {
        let mut catalogue = Catalogue::new();
        for (id, product, samples) in [
            ("a", "nrps", "s1"),
            ("b", "nrps", "s1"),
            ("c", "t1pks-nrps", "s1,s2"),
            ("d", "t1pks", "s2"),
            ("e", "terpene", "s3"),
        ] {
            catalogue.insert(RecordMeta {
                id: id.to_string(),
                product: product.to_string(),
                description: String::new(),
                size: 100,
                samples: samples.split(',').map(|s| s.to_string()).collect(),
            });
        }
        catalogue
    }

    fn labels(partitions: &[Partition]) -> Vec<&str> {
        partitions.iter().map(|p| p.label.as_str()).collect()
    }

    #[test]
    fn test_plan_all() {
        let opts = Options {
            mix: true,
            ..Default::default()
        };
        let partitions = plan(&catalogue(), &opts, Path::new("out"));
        // PKS-NRP_Hybrids, PKSI and Terpene have a single record each
        assert_eq!(labels(&partitions), vec!["all_mix", "all_NRPS"]);
        assert_eq!(partitions[0].members.len(), 5);
        assert_eq!(
            partitions[1].network_path(0.3),
            Path::new("out/networks_all/NRPS/all_NRPS_c0.3.network")
        );
    }

    #[test]
    fn test_plan_hybrids_and_samples() {
        let opts = Options {
            mix: true,
            samples: true,
            classes: ClassPlan::new("", true),
            ..Default::default()
        };
        let partitions = plan(&catalogue(), &opts, Path::new("out"));
        assert_eq!(
            labels(&partitions),
            vec![
                "all_mix",
                "all_NRPS",
                "all_PKSI",
                "sample_s1_mix",
                "sample_s1_NRPS",
                "sample_s2_mix",
                "sample_s2_PKSI",
            ]
        );
        assert_eq!(partitions[1].members, vec!["a", "b", "c"]);
        assert_eq!(partitions[3].scope, Scope::SampleMix);
        assert_eq!(
            partitions[4].dir,
            Path::new("out/networks_samples/s1/NRPS")
        );
    }

    #[test]
    fn test_plan_single_sample() {
        let mut catalogue = Catalogue::new();
        for id in ["a", "b"] {
            catalogue.insert(RecordMeta {
                id: id.to_string(),
                product: "nrps".to_string(),
                description: String::new(),
                size: 100,
                samples: vec!["default".to_string()],
            });
        }
        let opts = Options {
            samples: true,
            ..Default::default()
        };
        assert_eq!(labels(&plan(&catalogue, &opts, Path::new("out"))), vec!["all_NRPS"]);

        let opts = Options {
            all: false,
            samples: true,
            ..Default::default()
        };
        assert_eq!(
            labels(&plan(&catalogue, &opts, Path::new("out"))),
            vec!["sample_default_NRPS"]
        );
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_CACHE);
        assert!(load_settings(&path).is_empty());

        let mut settings = BTreeMap::new();
        settings.insert(
            "all_NRPS".to_string(),
            PartitionSettings {
                fragment: true,
                weights: ClassWeights::new(1.0, 0.0, 0.0, 1.0),
            },
        );
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path), settings);

        std::fs::write(&path, "not json").unwrap();
        assert!(load_settings(&path).is_empty());
    }
}
