use bgcnet::libs::align::{AlignmentStore, Realigner};
use bgcnet::libs::dist::{evaluate, DistanceContext, PairKey};
use bgcnet::libs::domain::{AnchorSet, DomainIndex, DomainRecord};
use bgcnet::libs::network::{NetworkRow, HEADER};
use bgcnet::libs::pipeline::Layout;
use bgcnet::libs::record::Catalogue;
use bgcnet::libs::weights::WeightTable;
use clap::*;
use std::io::Write;
use std::path::Path;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("pair")
        .about("Distance between two records")
        .after_help(
            r###"
Writes the header and the network row of the two records.

Notes:
* Records are ordered by id in the output
* A record without domains gives the maximal distance
* The class only selects the weights; unknown classes use the weights of `mix`

Examples:
1. With the weights of mixed classes:
   bgcnet pair input/ BGC0000001 BGC0000002

2. With the NRPS weights, comparing the fragment to the best region:
   bgcnet pair input/ BGC0000001 BGC0000002 --class NRPS --fragment

"###,
        )
        .arg(
            Arg::new("indir")
                .required(true)
                .index(1)
                .help("Input directory"),
        )
        .arg(
            Arg::new("a")
                .required(true)
                .index(2)
                .help("Id of the first record"),
        )
        .arg(
            Arg::new("b")
                .required(true)
                .index(3)
                .help("Id of the second record"),
        )
        .arg(
            Arg::new("class")
                .long("class")
                .num_args(1)
                .default_value("mix")
                .help("Weights of this class"),
        )
        .arg(
            Arg::new("weights")
                .long("weights")
                .num_args(1)
                .help("Weights of classes"),
        )
        .arg(
            Arg::new("fragment")
                .long("fragment")
                .action(ArgAction::SetTrue)
                .help("Compare fragments to the best matching region"),
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
    let layout = Layout::new(Path::new(args.get_one::<String>("indir").unwrap()), Path::new("."));
    let id_a = args.get_one::<String>("a").unwrap();
    let id_b = args.get_one::<String>("b").unwrap();
    let class = args.get_one::<String>("class").unwrap();

    let mut weights = WeightTable::default();
    if let Some(path) = args.get_one::<String>("weights") {
        weights.update_from_file(path)?;
    }

    let mut writer = bgcnet::writer(args.get_one::<String>("outfile").unwrap())?;

    //----------------------------
    // Ops
    //----------------------------
    let mut ids = vec![id_a.clone(), id_b.clone()];
    ids.dedup();
    let (mut index, excluded) = DomainIndex::load(&layout.pfs, &layout.pfd, &ids);
    for e in excluded {
        // records without domains still get a distance
        if e.reason == "no domains" {
            index.insert(&e.record, DomainRecord::default());
        } else {
            anyhow::bail!("{}: {}", e.record, e.reason);
        }
    }

    let catalogue = if layout.records.is_file() {
        Catalogue::load(&layout.records.display().to_string())?
    } else {
        Catalogue::new()
    };

    let ctx = DistanceContext::new(
        index,
        AlignmentStore::load(&layout.domains)?,
        AnchorSet::load(&layout.anchors)?,
        weights,
    )
    .with_fragment(args.get_flag("fragment"));

    let mut realigner = Realigner::new(&layout.domains, 4);
    let eval = evaluate(&ctx, &mut realigner, id_a, id_b, class)?;
    for note in &eval.notes {
        log::info!("{}: {}", note.kind(), note);
    }

    let row = NetworkRow::new(PairKey::new(id_a, id_b, class), eval.result, &catalogue);
    writer.write_fmt(format_args!("{}\n", HEADER))?;
    writer.write_fmt(format_args!("{}\n", row.to_line()))?;

    Ok(())
}
