use bgcnet::libs::network::parse_cutoffs;
use bgcnet::libs::pipeline::{Layout, Options};
use bgcnet::libs::record::ClassPlan;
use clap::*;
use std::path::Path;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("network")
        .about("Computes the distances between records and writes the networks")
        .after_help(
            r###"
Every pair of records is compared with the weights of its class; the networks keep the pairs
whose distance is not larger than each cutoff.

Analyses:
* all records in one network per class (default) and/or mixing all classes (--mix)
* each sample separately (--samples); skipped when there is a single sample that the
  analysis of all records already covers

Distance:
    1 - Jw * Jaccard - DDSw * DDS - AIw * AI

Notes:
* Records without domains, or with missing or inconsistent domain tables, are excluded and
  listed in <outdir>/excluded.tsv
* Pairs aligned on the fly, length mismatches, numerical anomalies and failed pairs are listed
  in <outdir>/diagnostics.tsv
* The cutoff 1.0 is always written; it is the complete table
* Results of the analysis of all records are reused by the per-sample analyses
* --resume reuses networks whose c1.0 file is newer than the domain index, the alignments,
  the anchor file and the weights file, and that were written with the same fragment mode
  and class weights (<outdir>/settings.json)
* --fragment compares the shorter record to the most similar region of the longer one
* Weights file: class, J, DDS, AI, anchor boost; tab separated

Examples:
1. Networks per class:
   bgcnet network input/ -o out/

2. Mix all classes, two cutoffs, isolated nodes, 8 threads:
   bgcnet network input/ -o out/ --mix --cutoffs 0.3,0.5 --include-disc-nodes -p 8

3. Per sample, hybrids also in the NRPS and PKS classes:
   bgcnet network input/ -o out/ --samples --hybrids --banned-classes Others

"###,
        )
        .arg(
            Arg::new("indir")
                .required(true)
                .index(1)
                .help("Input directory"),
        )
        .arg(
            Arg::new("records")
                .long("records")
                .num_args(1)
                .help("Record table, default <indir>/records.tsv"),
        )
        .arg(
            Arg::new("pfs")
                .long("pfs")
                .num_args(1)
                .help("Directory of domain lists, default <indir>/pfs"),
        )
        .arg(
            Arg::new("pfd")
                .long("pfd")
                .num_args(1)
                .help("Directory of domain tables, default <indir>/pfd"),
        )
        .arg(
            Arg::new("domains")
                .long("domains")
                .num_args(1)
                .help("Directory of domain sequences, default <indir>/domains"),
        )
        .arg(
            Arg::new("anchorfile")
                .long("anchorfile")
                .num_args(1)
                .help("Anchor domains, default <indir>/anchor_domains.txt"),
        )
        .arg(
            Arg::new("weights")
                .long("weights")
                .num_args(1)
                .help("Weights of classes"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('o')
                .num_args(1)
                .default_value("bgcnet_out")
                .help("Output directory"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .num_args(1)
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Number of threads"),
        )
        .arg(
            Arg::new("tasks_per_worker")
                .long("tasks-per-worker")
                .num_args(1)
                .default_value("100")
                .value_parser(value_parser!(usize))
                .help("Pairs computed by a worker before it is replaced"),
        )
        .arg(
            Arg::new("cutoffs")
                .long("cutoffs")
                .num_args(1)
                .default_value("1.0")
                .help("Comma separated distance cutoffs in (0, 1]"),
        )
        .arg(
            Arg::new("include_disc_nodes")
                .long("include-disc-nodes")
                .action(ArgAction::SetTrue)
                .help("Write records without edges as self rows"),
        )
        .arg(
            Arg::new("min_size")
                .long("min-size")
                .num_args(1)
                .default_value("0")
                .value_parser(value_parser!(usize))
                .help("Records not larger than this (bp) are excluded"),
        )
        .arg(
            Arg::new("samples")
                .long("samples")
                .action(ArgAction::SetTrue)
                .help("Networks of each sample"),
        )
        .arg(
            Arg::new("no_all")
                .long("no-all")
                .action(ArgAction::SetTrue)
                .help("No networks of all records"),
        )
        .arg(
            Arg::new("mix")
                .long("mix")
                .action(ArgAction::SetTrue)
                .help("Networks mixing all classes"),
        )
        .arg(
            Arg::new("no_classify")
                .long("no-classify")
                .action(ArgAction::SetTrue)
                .help("No networks per class"),
        )
        .arg(
            Arg::new("banned_classes")
                .long("banned-classes")
                .num_args(1)
                .default_value("")
                .help("Comma separated classes without networks"),
        )
        .arg(
            Arg::new("hybrids")
                .long("hybrids")
                .action(ArgAction::SetTrue)
                .help("Also put PKS/NRPS hybrids into the PKSI, PKSother and NRPS classes"),
        )
        .arg(
            Arg::new("fragment")
                .long("fragment")
                .action(ArgAction::SetTrue)
                .help("Compare fragments to the best matching region"),
        )
        .arg(
            Arg::new("resume")
                .long("resume")
                .action(ArgAction::SetTrue)
                .help("Reuse up-to-date networks"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let indir = Path::new(args.get_one::<String>("indir").unwrap());
    let outdir = Path::new(args.get_one::<String>("outdir").unwrap());

    let mut layout = Layout::new(indir, outdir);
    if let Some(path) = args.get_one::<String>("records") {
        layout.records = path.into();
    }
    if let Some(path) = args.get_one::<String>("pfs") {
        layout.pfs = path.into();
    }
    if let Some(path) = args.get_one::<String>("pfd") {
        layout.pfd = path.into();
    }
    if let Some(path) = args.get_one::<String>("domains") {
        layout.domains = path.into();
    }
    if let Some(path) = args.get_one::<String>("anchorfile") {
        layout.anchors = path.into();
    }
    layout.weights = args.get_one::<String>("weights").map(|p| p.into());

    let opts = Options {
        parallel: *args.get_one::<usize>("parallel").unwrap(),
        tasks_per_worker: *args.get_one::<usize>("tasks_per_worker").unwrap(),
        cutoffs: parse_cutoffs(args.get_one::<String>("cutoffs").unwrap())?,
        include_disc: args.get_flag("include_disc_nodes"),
        min_size: *args.get_one::<usize>("min_size").unwrap(),
        all: !args.get_flag("no_all"),
        samples: args.get_flag("samples"),
        mix: args.get_flag("mix"),
        classify: !args.get_flag("no_classify"),
        classes: ClassPlan::new(
            args.get_one::<String>("banned_classes").unwrap(),
            args.get_flag("hybrids"),
        ),
        fragment: args.get_flag("fragment"),
        resume: args.get_flag("resume"),
    };
    if !opts.all && !opts.samples {
        anyhow::bail!("--no-all without --samples leaves nothing to do");
    }
    if !opts.mix && !opts.classify {
        anyhow::bail!("--no-classify without --mix leaves nothing to do");
    }

    // Set the number of threads for rayon
    rayon::ThreadPoolBuilder::new()
        .num_threads(opts.parallel)
        .build_global()?;

    //----------------------------
    // Ops
    //----------------------------
    let summary = bgcnet::libs::pipeline::run(&layout, &opts)?;

    log::info!(
        "{} records, {} partitions, {} networks written to {}",
        summary.records,
        summary.partitions,
        summary.networks,
        layout.outdir.display()
    );
    log::info!(
        "{} pairs computed, {} reused, {} failed, {} diagnostics, {} records excluded",
        summary.report.computed,
        summary.report.reused,
        summary.report.failed,
        summary.report.diagnostics.len(),
        summary.report.excluded.len()
    );

    Ok(())
}
