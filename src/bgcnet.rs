extern crate clap;
use clap::*;

mod cmd_bgcnet;

fn main() -> anyhow::Result<()> {
    let app = Command::new("bgcnet")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`bgcnet` - Biosynthetic Gene Cluster similarity NETworks")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log debug messages"),
        )
        .subcommand(cmd_bgcnet::network::make_subcommand())
        .subcommand(cmd_bgcnet::pair::make_subcommand())
        .subcommand(cmd_bgcnet::filter::make_subcommand())
        .subcommand(cmd_bgcnet::classify::make_subcommand())
        .after_help(
            r###"Subcommands:

* network  - Distances between all records and the networks at each cutoff
* pair     - Distance between two records
* filter   - Re-filter a complete (c1.0) network at new cutoffs
* classify - Classes of the records

Input directory:
    records.tsv             id, product, description, size, samples
    pfs/<id>.pfs            domains of each record in genome order
    pfd/<id>.pfd            domain table of each record
    domains/<domain>.algn   aligned domain sequences
    domains/<domain>.fasta  unaligned domain sequences
    anchor_domains.txt      anchor domain families, optional

Logging follows RUST_LOG; the default level is info, debug with --verbose.

"###,
        );

    let matches = app.get_matches();
    init_logger(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("network", sub_matches)) => cmd_bgcnet::network::execute(sub_matches),
        Some(("pair", sub_matches)) => cmd_bgcnet::pair::execute(sub_matches),
        Some(("filter", sub_matches)) => cmd_bgcnet::filter::execute(sub_matches),
        Some(("classify", sub_matches)) => cmd_bgcnet::classify::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}
