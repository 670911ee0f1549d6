//! Domain Index: ordered domain lists and occurrence tags per record.
//!
//! Built once from the upstream per-record tables:
//!
//! * `<id>.pfs` - domain types in genome order, whitespace separated
//! * `<id>.pfd` - one row per domain occurrence: `record, score, gene, start, end, domain, ..., orf`
//!
//! An occurrence tag is `<orf>:<start>:<end>`, the header used for the domain in the
//! per-domain alignment files.

use crate::libs::error::BgcError;
use fxhash::FxHashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::Path;

/// Domains of a single record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    /// Domain types in genome order, duplicates included
    pub domains: Vec<String>,
    /// Occurrence tags of each domain type, in genome order
    pub occurrences: BTreeMap<String, Vec<String>>,
}

impl DomainRecord {
    /// Groups `(domain, tag)` pairs listed in genome order.
    pub fn new(domains: Vec<String>, tagged: &[(String, String)]) -> Self {
        let mut occurrences: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (domain, tag) in tagged {
            occurrences
                .entry(domain.clone())
                .or_default()
                .push(tag.clone());
        }
        Self {
            domains,
            occurrences,
        }
    }

    /// A record whose tags are derived from its id and the position of each domain.
    ///
    /// ```
    /// let rec = bgcnet::libs::domain::DomainRecord::synthetic("bgc1", &["PF1", "PF2", "PF1"]);
    /// assert_eq!(rec.count("PF1"), 2);
    /// assert_eq!(rec.tags("PF1"), &["bgc1:PF1:0".to_string(), "bgc1:PF1:2".to_string()]);
    /// ```
    pub fn synthetic(id: &str, domains: &[&str]) -> Self {
        let tagged: Vec<(String, String)> = domains
            .iter()
            .enumerate()
            .map(|(i, d)| (d.to_string(), format!("{}:{}:{}", id, d, i)))
            .collect();
        Self::new(domains.iter().map(|d| d.to_string()).collect(), &tagged)
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Distinct domain types.
    pub fn types(&self) -> BTreeSet<&str> {
        self.domains.iter().map(|d| d.as_str()).collect()
    }

    /// Number of occurrences of a domain type.
    pub fn count(&self, domain: &str) -> usize {
        self.occurrences.get(domain).map_or(0, |v| v.len())
    }

    pub fn tags(&self, domain: &str) -> &[String] {
        self.occurrences
            .get(domain)
            .map_or(&[] as &[String], |v| v.as_slice())
    }
}

/// A record dropped before any pair involving it is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Exclusion {
    pub record: String,
    pub reason: String,
}

impl Exclusion {
    pub fn new(record: &str, reason: impl ToString) -> Self {
        Self {
            record: record.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainIndex {
    records: BTreeMap<String, DomainRecord>,
}

impl DomainIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, record: DomainRecord) {
        self.records.insert(id.to_string(), record);
    }

    pub fn get(&self, id: &str) -> Option<&DomainRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    /// Loads `<id>.pfs` and `<id>.pfd` for every requested record in parallel.
    ///
    /// Records with missing, malformed or inconsistent tables, or without any domain, are
    /// returned as exclusions instead of failing the whole load.
    pub fn load(pfs_dir: &Path, pfd_dir: &Path, ids: &[String]) -> (Self, Vec<Exclusion>) {
        let loaded: Vec<Result<(String, DomainRecord), Exclusion>> = ids
            .par_iter()
            .map(|id| {
                load_record(id, pfs_dir, pfd_dir)
                    .map(|rec| (id.clone(), rec))
                    .map_err(|e| Exclusion::new(id, e))
            })
            .collect();

        let mut index = Self::new();
        let mut excluded = vec![];
        for item in loaded {
            match item {
                Ok((id, rec)) if rec.is_empty() => {
                    log::warn!("No domains were found in {}, removing it from the analysis", id);
                    excluded.push(Exclusion::new(&id, "no domains"));
                }
                Ok((id, rec)) => index.insert(&id, rec),
                Err(exclusion) => {
                    log::warn!(
                        "Excluding {} from the analysis: {}",
                        exclusion.record,
                        exclusion.reason
                    );
                    excluded.push(exclusion);
                }
            }
        }
        excluded.sort();

        (index, excluded)
    }
}

fn load_record(id: &str, pfs_dir: &Path, pfd_dir: &Path) -> Result<DomainRecord, BgcError> {
    let pfs = pfs_dir.join(format!("{}.pfs", id));
    let pfd = pfd_dir.join(format!("{}.pfd", id));
    for (kind, path) in [("domain list", &pfs), ("domain table", &pfd)] {
        if !path.is_file() {
            return Err(BgcError::MissingArtifact {
                record: id.to_string(),
                kind,
                path: path.display().to_string(),
            });
        }
    }

    let domains = read_pfs(&pfs)?;
    let tagged = read_pfd(&pfd)?;
    build_record(id, domains, &tagged)
}

/// Reads the ordered domain list of a record.
pub fn read_pfs(path: &Path) -> Result<Vec<String>, BgcError> {
    let file = path.display().to_string();
    let reader = crate::reader(&file).map_err(|e| BgcError::Malformed {
        file: file.clone(),
        line: 0,
        message: e.to_string(),
    })?;

    let mut domains = vec![];
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| BgcError::Malformed {
            file: file.clone(),
            line: i + 1,
            message: e.to_string(),
        })?;
        domains.extend(line.split_whitespace().map(|s| s.to_string()));
    }
    Ok(domains)
}

/// Reads `(domain type, occurrence tag)` pairs of a record, in file order.
pub fn read_pfd(path: &Path) -> Result<Vec<(String, String)>, BgcError> {
    let file = path.display().to_string();
    let reader = crate::reader(&file).map_err(|e| BgcError::Malformed {
        file: file.clone(),
        line: 0,
        message: e.to_string(),
    })?;

    let mut tagged = vec![];
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| BgcError::Malformed {
            file: file.clone(),
            line: i + 1,
            message: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').map(|s| s.trim()).collect();
        if fields.len() < 7 {
            return Err(BgcError::Malformed {
                file: file.clone(),
                line: i + 1,
                message: format!("expected at least 7 columns, got {}", fields.len()),
            });
        }
        let start = fields[3];
        let end = fields[4];
        let domain = fields[5];
        let orf = fields[fields.len() - 1];
        tagged.push((domain.to_string(), format!("{}:{}:{}", orf, start, end)));
    }
    Ok(tagged)
}

/// Combines the two tables, checking that both list the same occurrences.
pub fn build_record(
    id: &str,
    domains: Vec<String>,
    tagged: &[(String, String)],
) -> Result<DomainRecord, BgcError> {
    let record = DomainRecord::new(domains, tagged);

    let mut listed: BTreeMap<&str, usize> = BTreeMap::new();
    for d in &record.domains {
        *listed.entry(d.as_str()).or_default() += 1;
    }
    for (domain, n) in &listed {
        let found = record.count(domain);
        if found != *n {
            return Err(BgcError::Inconsistent {
                record: id.to_string(),
                message: format!(
                    "{} appears {} times in the domain list but {} times in the domain table",
                    domain, n, found
                ),
            });
        }
    }
    if let Some(extra) = record
        .occurrences
        .keys()
        .find(|d| !listed.contains_key(d.as_str()))
    {
        return Err(BgcError::Inconsistent {
            record: id.to_string(),
            message: format!("{} is missing from the domain list", extra),
        });
    }

    Ok(record)
}

/// Curated domain families that get boosted weight in DDS.
#[derive(Debug, Clone, Default)]
pub struct AnchorSet {
    families: FxHashSet<String>,
}

impl AnchorSet {
    /// Reads one family id per line. A missing file yields an empty set.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            log::warn!(
                "File with list of anchor domains not found: {}",
                path.display()
            );
            return Ok(Self::default());
        }
        let lines = crate::libs::io::read_lines(&path.display().to_string())?;
        Ok(lines
            .iter()
            .filter_map(|l| l.split_whitespace().next())
            .collect())
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Versions are ignored: `PF00109.23` matches the family `PF00109`.
    pub fn is_anchor(&self, domain: &str) -> bool {
        let family = domain.split('.').next().unwrap_or(domain);
        self.families.contains(family)
    }
}

impl<S: AsRef<str>> FromIterator<S> for AnchorSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let families = iter
            .into_iter()
            .map(|s| {
                let s = s.as_ref().trim();
                s.split('.').next().unwrap_or(s).to_string()
            })
            .collect();
        Self { families }
    }
}
