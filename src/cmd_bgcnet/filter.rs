use bgcnet::libs::network::{format_cutoff, parse_cutoffs, write_network, NetworkFile};
use bgcnet::libs::weights::MIX;
use clap::*;
use std::path::Path;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("filter")
        .about("Re-filters a complete network at new cutoffs")
        .after_help(
            r###"
Reads a network written at the cutoff 1.0 and writes `<name>_c<cutoff>.network` files into
the output directory, without computing any distance.

Notes:
* <name> is the input file name without `_c1.0.network`
* Records named in the input are the nodes of the new networks
* The input file is never overwritten

Examples:
1. Two new cutoffs:
   bgcnet filter out/networks_all/NRPS/all_NRPS_c1.0.network --cutoffs 0.3,0.5 -o filtered/

2. Keep isolated nodes:
   bgcnet filter all_mix_c1.0.network --cutoffs 0.4 --include-disc-nodes

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .index(1)
                .help("Network file at the cutoff 1.0"),
        )
        .arg(
            Arg::new("cutoffs")
                .long("cutoffs")
                .num_args(1)
                .required(true)
                .help("Comma separated distance cutoffs in (0, 1]"),
        )
        .arg(
            Arg::new("include_disc_nodes")
                .long("include-disc-nodes")
                .action(ArgAction::SetTrue)
                .help("Write records without edges as self rows"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('o')
                .num_args(1)
                .default_value(".")
                .help("Output directory"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let infile = args.get_one::<String>("infile").unwrap();
    let cutoffs = parse_cutoffs(args.get_one::<String>("cutoffs").unwrap())?;
    let include_disc = args.get_flag("include_disc_nodes");
    let outdir = Path::new(args.get_one::<String>("outdir").unwrap());

    let file_name = Path::new(infile)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = file_name
        .strip_suffix(".network")
        .unwrap_or(&file_name)
        .trim_end_matches("_c1.0")
        .to_string();

    //----------------------------
    // Ops
    //----------------------------
    let network = NetworkFile::read(infile)?;
    let class = network
        .classes()
        .into_iter()
        .next()
        .unwrap_or(MIX)
        .to_string();
    log::info!(
        "{} edges between {} records read from {}",
        network.edges.len(),
        network.members.len(),
        infile
    );

    std::fs::create_dir_all(outdir)?;
    let input = std::fs::canonicalize(infile)?;
    for cutoff in cutoffs {
        let path = outdir.join(format!("{}_c{}.network", name, format_cutoff(cutoff)));
        if path.exists() && std::fs::canonicalize(&path)? == input {
            log::warn!("Not overwriting the input {}", infile);
            continue;
        }
        let n = write_network(
            &path.display().to_string(),
            &network.edges,
            &network.members,
            &class,
            cutoff,
            include_disc,
            &network.groups,
        )?;
        log::info!("{} edges at cutoff {}", n, format_cutoff(cutoff));
    }

    Ok(())
}
