use bgcnet::libs::record::{Catalogue, ClassPlan};
use clap::*;
use std::collections::BTreeMap;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("classify")
        .about("Classes of the records")
        .after_help(
            r###"
Lists each record of a record table with its product, its class and the class networks it
would be part of.

Output columns:
    id  product  class  networks

Classes:
* PKSI            t1pks
* PKSother        transatpks, t2pks, t3pks, otherks, hglks
* NRPS            nrps
* RiPPs           lantipeptide, thiopeptide, bacteriocin, lassopeptide, ...
* Saccharides     amglyccycl, oligosaccharide, cf_saccharide
* Terpene         terpene
* PKS-NRP_Hybrids `-` joined PKS and NRPS products
* Others          everything else

Examples:
1. Default classes:
   bgcnet classify input/records.tsv

2. Hybrids also in their pure classes, without Others:
   bgcnet classify input/records.tsv --hybrids --banned-classes Others

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .index(1)
                .help("Record table"),
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
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let catalogue = Catalogue::load(args.get_one::<String>("infile").unwrap())?;
    let plan = ClassPlan::new(
        args.get_one::<String>("banned_classes").unwrap(),
        args.get_flag("hybrids"),
    );
    let mut writer = bgcnet::writer(args.get_one::<String>("outfile").unwrap())?;

    //----------------------------
    // Ops
    //----------------------------
    let mut networks_of: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for (class, members) in plan.partition(&catalogue.ids(), &catalogue) {
        for id in members {
            networks_of.entry(id).or_default().push(class);
        }
    }

    for meta in catalogue.iter() {
        let networks = networks_of
            .get(&meta.id)
            .map(|v| v.join(","))
            .unwrap_or_default();
        writer.write_fmt(format_args!(
            "{}\t{}\t{}\t{}\n",
            meta.id,
            meta.product,
            meta.class(),
            networks
        ))?;
    }

    Ok(())
}
