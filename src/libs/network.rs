//! Network Writer: cutoff-filtered, deterministic edge lists.
//!
//! Every file opens with a header line followed by one row per edge:
//!
//! ```text
//! A  B  class  group A  description A  group B  description B  -log2 score  distance
//! squared similarity  Jaccard  DDS  AI  raw DDS non-anchor  raw DDS anchor  S  Sa
//! ```
//!
//! Rows are sorted by `(A, B, class)`. Isolated nodes, when requested, follow the edges as self
//! rows `A A class ...` carrying identity values.

use crate::libs::batch::ResultTable;
use crate::libs::dist::{PairKey, PairResult};
use crate::libs::error::BgcError;
use crate::libs::record::Catalogue;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

pub const HEADER: &str = "Clustername 1\tClustername 2\tClass\tGroup 1\tDefinition 1\tGroup 2\tDefinition 2\t-log2 score\tRaw distance\tSquared similarity\tJaccard index\tDDS index\tAdjacency index\traw DDS non-anchor\traw DDS anchor\tNon-anchor domains\tAnchor domains";

const COLUMNS: usize = 17;

/// Parses a comma-separated cutoff list.
///
/// Values not above 0 are dropped, values above 1 are rejected and 1.0 is always added.
///
/// ```
/// use bgcnet::libs::network::parse_cutoffs;
/// assert_eq!(parse_cutoffs("0.5,0.3,0,0.5").unwrap(), vec![0.3, 0.5, 1.0]);
/// assert!(parse_cutoffs("1.5").is_err());
/// ```
pub fn parse_cutoffs(list: &str) -> Result<Vec<f64>, BgcError> {
    let mut cutoffs = vec![1.0];
    for part in list.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let c: f64 = part
            .parse()
            .map_err(|_| BgcError::InvalidCutoff(part.to_string()))?;
        if !c.is_finite() || c > 1.0 {
            return Err(BgcError::InvalidCutoff(part.to_string()));
        }
        if c <= 0.0 {
            log::warn!("Ignoring cutoff {}", part);
            continue;
        }
        cutoffs.push(c);
    }
    cutoffs.sort_by(|a, b| a.total_cmp(b));
    cutoffs.dedup();
    Ok(cutoffs)
}

/// `1.0`, `0.5`, `0.35`
pub fn format_cutoff(cutoff: f64) -> String {
    format!("{:?}", cutoff)
}

/// Group and description of a record.
pub trait GroupLookup {
    fn group(&self, id: &str) -> (&str, &str);
}

impl GroupLookup for Catalogue {
    fn group(&self, id: &str) -> (&str, &str) {
        Catalogue::group(self, id)
    }
}

impl GroupLookup for BTreeMap<String, (String, String)> {
    fn group(&self, id: &str) -> (&str, &str) {
        match self.get(id) {
            Some((g, d)) => (g.as_str(), d.as_str()),
            None => ("", ""),
        }
    }
}

/// One line of a network file.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRow {
    pub key: PairKey,
    pub group_a: String,
    pub description_a: String,
    pub group_b: String,
    pub description_b: String,
    pub result: PairResult,
}

impl NetworkRow {
    pub fn new<G: GroupLookup>(key: PairKey, result: PairResult, groups: &G) -> Self {
        let (group_a, description_a) = groups.group(&key.a);
        let (group_b, description_b) = groups.group(&key.b);
        Self {
            group_a: group_a.to_string(),
            description_a: description_a.to_string(),
            group_b: group_b.to_string(),
            description_b: description_b.to_string(),
            key,
            result,
        }
    }

    /// Self row of a node without edges.
    pub fn isolated<G: GroupLookup>(id: &str, class: &str, groups: &G) -> Self {
        let result = PairResult {
            distance: 0.0,
            jaccard: 1.0,
            dds: 1.0,
            ai: 1.0,
            dds_non_anchor: 0.0,
            dds_anchor: 0.0,
            norm: 0,
            norm_anchor: 0,
            flagged: false,
        };
        Self::new(PairKey::new(id, id, class), result, groups)
    }

    pub fn is_self(&self) -> bool {
        self.key.a == self.key.b
    }

    pub fn to_line(&self) -> String {
        let r = &self.result;
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.key.a,
            self.key.b,
            self.key.class,
            self.group_a,
            self.description_a,
            self.group_b,
            self.description_b,
            r.log_score(),
            r.distance,
            r.squared_similarity(),
            r.jaccard,
            r.dds,
            r.ai,
            r.dds_non_anchor,
            r.dds_anchor,
            r.norm,
            r.norm_anchor
        )
    }

    pub fn parse(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != COLUMNS {
            return Err(format!("expected {} columns, got {}", COLUMNS, fields.len()));
        }
        let float = |i: usize| -> Result<f64, String> {
            fields[i]
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", fields[i]))
        };
        let count = |i: usize| -> Result<usize, String> {
            fields[i]
                .parse::<usize>()
                .map_err(|_| format!("'{}' is not a count", fields[i]))
        };

        Ok(Self {
            key: PairKey::new(fields[0], fields[1], fields[2]),
            group_a: fields[3].to_string(),
            description_a: fields[4].to_string(),
            group_b: fields[5].to_string(),
            description_b: fields[6].to_string(),
            result: PairResult {
                distance: float(8)?,
                jaccard: float(10)?,
                dds: float(11)?,
                ai: float(12)?,
                dds_non_anchor: float(13)?,
                dds_anchor: float(14)?,
                norm: count(15)?,
                norm_anchor: count(16)?,
                flagged: false,
            },
        })
    }
}

/// Edge rows of a table, sorted by key.
pub fn rows_from_table<G: GroupLookup>(table: &ResultTable, groups: &G) -> Vec<NetworkRow> {
    table
        .sorted()
        .into_iter()
        .map(|(key, result)| NetworkRow::new(key.clone(), *result, groups))
        .collect()
}

/// Writes the edges with `distance <= cutoff`; returns the number of edges written.
///
/// `edges` must be sorted. With `include_disc`, members without any written edge follow as
/// self rows.
pub fn write_network<G: GroupLookup>(
    path: &str,
    edges: &[NetworkRow],
    members: &[String],
    class: &str,
    cutoff: f64,
    include_disc: bool,
    groups: &G,
) -> anyhow::Result<usize> {
    let mut writer = crate::writer(path)?;
    writer.write_fmt(format_args!("{}\n", HEADER))?;

    let mut connected = BTreeSet::new();
    let mut written = 0;
    for row in edges.iter().filter(|r| r.result.distance <= cutoff) {
        writer.write_fmt(format_args!("{}\n", row.to_line()))?;
        connected.insert(row.key.a.as_str());
        connected.insert(row.key.b.as_str());
        written += 1;
    }

    if include_disc {
        let isolated: BTreeSet<&str> = members
            .iter()
            .map(|m| m.as_str())
            .filter(|m| !connected.contains(m))
            .collect();
        for id in isolated {
            let row = NetworkRow::isolated(id, class, groups);
            writer.write_fmt(format_args!("{}\n", row.to_line()))?;
        }
    }
    writer.flush()?;
    log::debug!("{} edges written to {}", written, path);

    Ok(written)
}

/// A network file read back.
#[derive(Debug, Clone, Default)]
pub struct NetworkFile {
    /// Rows between distinct records, sorted
    pub edges: Vec<NetworkRow>,
    /// Every record named in the file
    pub members: Vec<String>,
    pub groups: BTreeMap<String, (String, String)>,
}

impl NetworkFile {
    pub fn read(path: &str) -> anyhow::Result<Self> {
        let mut file = Self::default();
        let mut members = BTreeSet::new();

        for (i, line) in crate::libs::io::read_lines(path)?.iter().enumerate() {
            if line.starts_with("Clustername 1\t") {
                continue;
            }
            let row = NetworkRow::parse(line).map_err(|message| BgcError::Malformed {
                file: path.to_string(),
                line: i + 1,
                message,
            })?;
            for (id, group, desc) in [
                (&row.key.a, &row.group_a, &row.description_a),
                (&row.key.b, &row.group_b, &row.description_b),
            ] {
                members.insert(id.clone());
                file.groups
                    .entry(id.clone())
                    .or_insert_with(|| (group.clone(), desc.clone()));
            }
            if !row.is_self() {
                file.edges.push(row);
            }
        }
        file.edges.sort_by(|a, b| a.key.cmp(&b.key));
        file.members = members.into_iter().collect();

        Ok(file)
    }

    /// Classes found in the edges.
    pub fn classes(&self) -> BTreeSet<&str> {
        self.edges.iter().map(|r| r.key.class.as_str()).collect()
    }

    pub fn table(&self) -> ResultTable {
        let mut table = ResultTable::new();
        for row in &self.edges {
            table.insert(row.key.clone(), row.result);
        }
        table
    }
}
