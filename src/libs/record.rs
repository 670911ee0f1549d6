//! Record catalogue: metadata of every record and product -> class sorting.

use crate::libs::domain::Exclusion;
use crate::libs::error::BgcError;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const PKSI: &str = "PKSI";
pub const PKS_OTHER: &str = "PKSother";
pub const NRPS: &str = "NRPS";
pub const RIPPS: &str = "RiPPs";
pub const SACCHARIDES: &str = "Saccharides";
pub const TERPENE: &str = "Terpene";
pub const HYBRIDS: &str = "PKS-NRP_Hybrids";
pub const OTHERS: &str = "Others";

/// All classes records can be sorted into.
pub const CLASSES: [&str; 8] = [
    PKSI,
    PKS_OTHER,
    NRPS,
    RIPPS,
    SACCHARIDES,
    TERPENE,
    HYBRIDS,
    OTHERS,
];

/// Sample of records listed without any.
pub const DEFAULT_SAMPLE: &str = "default";

lazy_static! {
    static ref PKS1_PRODUCTS: HashSet<&'static str> = ["t1pks"].into_iter().collect();
    static ref PKSOTHER_PRODUCTS: HashSet<&'static str> =
        ["transatpks", "t2pks", "t3pks", "otherks", "hglks"]
            .into_iter()
            .collect();
    static ref NRPS_PRODUCTS: HashSet<&'static str> = ["nrps"].into_iter().collect();
    static ref RIPPS_PRODUCTS: HashSet<&'static str> = [
        "lantipeptide",
        "thiopeptide",
        "bacteriocin",
        "linaridin",
        "cyanobactin",
        "glycocin",
        "LAP",
        "lassopeptide",
        "sactipeptide",
        "bottromycin",
        "head_to_tail",
        "microcin",
        "microviridin",
        "proteusin",
    ]
    .into_iter()
    .collect();
    static ref SACCHARIDE_PRODUCTS: HashSet<&'static str> =
        ["amglyccycl", "oligosaccharide", "cf_saccharide"]
            .into_iter()
            .collect();
}

/// Maps an annotated product to its class.
///
/// Hybrid products are joined by `-`. Combinations of NRPS and PKS subtypes only are
/// PKS-NRP hybrids, unless all parts are NRPS (`NRPS`) or all are PKS (`PKSother`).
///
/// ```
/// use bgcnet::libs::record::sort_bgc;
/// assert_eq!(sort_bgc("t1pks"), "PKSI");
/// assert_eq!(sort_bgc("t1pks-nrps"), "PKS-NRP_Hybrids");
/// assert_eq!(sort_bgc("t1pks-t3pks"), "PKSother");
/// assert_eq!(sort_bgc("siderophore"), "Others");
/// ```
pub fn sort_bgc(product: &str) -> &'static str {
    let product = product.trim();
    if PKS1_PRODUCTS.contains(product) {
        PKSI
    } else if PKSOTHER_PRODUCTS.contains(product) {
        PKS_OTHER
    } else if NRPS_PRODUCTS.contains(product) {
        NRPS
    } else if RIPPS_PRODUCTS.contains(product) {
        RIPPS
    } else if SACCHARIDE_PRODUCTS.contains(product) {
        SACCHARIDES
    } else if product == "terpene" {
        TERPENE
    } else if product.contains('-') {
        let subtypes: BTreeSet<&str> = product.split('-').map(|s| s.trim()).collect();
        let is_pks = |s: &&str| PKS1_PRODUCTS.contains(*s) || PKSOTHER_PRODUCTS.contains(*s);
        let is_nrps = |s: &&str| NRPS_PRODUCTS.contains(*s);

        if subtypes.iter().all(|s| is_pks(s) || is_nrps(s)) {
            if subtypes.iter().all(is_nrps) {
                NRPS
            } else if subtypes.iter().all(is_pks) {
                PKS_OTHER
            } else {
                HYBRIDS
            }
        } else {
            OTHERS
        }
    } else {
        OTHERS
    }
}

/// Metadata of one record, as listed in `records.tsv`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMeta {
    pub id: String,
    pub product: String,
    pub description: String,
    pub size: usize,
    pub samples: Vec<String>,
}

impl RecordMeta {
    pub fn class(&self) -> &'static str {
        sort_bgc(&self.product)
    }
}

/// Records in listing order.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    records: IndexMap<String, RecordMeta>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, meta: RecordMeta) {
        self.records.insert(meta.id.clone(), meta);
    }

    /// Reads `id, product, description, size, samples` rows.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut catalogue = Self::new();
        for (i, line) in crate::libs::io::read_lines(path)?.iter().enumerate() {
            let malformed = |message: String| BgcError::Malformed {
                file: path.to_string(),
                line: i + 1,
                message,
            };

            let fields: Vec<&str> = line.split('\t').map(|s| s.trim()).collect();
            if fields.len() < 4 {
                return Err(malformed(format!(
                    "expected at least 4 columns, got {}",
                    fields.len()
                ))
                .into());
            }
            let id = fields[0];
            if id.is_empty() {
                return Err(malformed("empty record id".to_string()).into());
            }
            if catalogue.contains(id) {
                return Err(malformed(format!("duplicated record {}", id)).into());
            }
            let size = fields[3]
                .parse::<usize>()
                .map_err(|_| malformed(format!("'{}' is not a size", fields[3])))?;

            let mut samples: Vec<String> = fields
                .get(4)
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim())
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string())
                        .collect()
                })
                .unwrap_or_default();
            if samples.is_empty() {
                samples.push(DEFAULT_SAMPLE.to_string());
            }

            catalogue.insert(RecordMeta {
                id: id.to_string(),
                product: fields[1].to_string(),
                description: fields[2].to_string(),
                size,
                samples,
            });
        }
        log::info!("Read {} records from {}", catalogue.len(), path);

        Ok(catalogue)
    }

    pub fn get(&self, id: &str) -> Option<&RecordMeta> {
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

    pub fn ids(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordMeta> {
        self.records.values()
    }

    /// `(product, description)` of a record; empty for unlisted ids.
    pub fn group(&self, id: &str) -> (&str, &str) {
        match self.records.get(id) {
            Some(meta) => (meta.product.as_str(), meta.description.as_str()),
            None => ("", ""),
        }
    }

    /// Drops records not larger than `min_size`.
    pub fn retain_min_size(&mut self, min_size: usize) -> Vec<Exclusion> {
        let mut excluded = vec![];
        self.records.retain(|id, meta| {
            if meta.size > min_size {
                true
            } else {
                log::info!(
                    "Discarding {} (size less than {} bp, was {})",
                    id,
                    min_size,
                    meta.size
                );
                excluded.push(Exclusion::new(
                    id,
                    format!("size {} <= minimal size {}", meta.size, min_size),
                ));
                false
            }
        });
        excluded
    }

    /// Keeps the listed ids only.
    pub fn retain_ids(&mut self, keep: &BTreeSet<String>) {
        self.records.retain(|id, _| keep.contains(id));
    }

    /// Members of each sample, sorted.
    pub fn samples(&self) -> BTreeMap<String, Vec<String>> {
        let mut samples: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for meta in self.records.values() {
            for sample in &meta.samples {
                samples
                    .entry(sample.clone())
                    .or_default()
                    .push(meta.id.clone());
            }
        }
        for members in samples.values_mut() {
            members.sort();
            members.dedup();
        }
        samples
    }
}

/// Which classes get their own analysis.
#[derive(Debug, Clone, Default)]
pub struct ClassPlan {
    banned: BTreeSet<String>,
    hybrids: bool,
}

impl ClassPlan {
    /// `banned` is a comma-separated list of class names, compared case-insensitively.
    pub fn new(banned: &str, hybrids: bool) -> Self {
        let banned = banned
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { banned, hybrids }
    }

    pub fn is_allowed(&self, class: &str) -> bool {
        !self.banned.contains(&class.to_lowercase())
    }

    /// Sorts members into classes; PKS-NRP hybrids are also added to the NRPS class and
    /// to PKSI (`t1pks` hybrids) or PKSother when hybrids expansion is on.
    pub fn partition(
        &self,
        members: &[String],
        catalogue: &Catalogue,
    ) -> BTreeMap<&'static str, Vec<String>> {
        let mut classes: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for id in members {
            let product = catalogue.group(id).0;
            let class = sort_bgc(product);
            let mut targets = vec![];
            if self.is_allowed(class) {
                targets.push(class);
            }
            if self.hybrids && class == HYBRIDS {
                if self.is_allowed(NRPS) {
                    targets.push(NRPS);
                }
                let pks = if product.contains("t1pks") {
                    PKSI
                } else {
                    PKS_OTHER
                };
                if self.is_allowed(pks) {
                    targets.push(pks);
                }
            }
            for class in targets {
                classes.entry(class).or_default().push(id.clone());
            }
        }
        for members in classes.values_mut() {
            members.sort();
            members.dedup();
        }
        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn meta(id: &str, product: &str) -> RecordMeta {
        RecordMeta {
            id: id.to_string(),
            product: product.to_string(),
            description: format!("{} cluster", product),
            size: 1000,
            samples: vec![DEFAULT_SAMPLE.to_string()],
        }
    }

    #[test]
    fn test_sort_bgc() {
        assert_eq!(sort_bgc("transatpks"), PKS_OTHER);
        assert_eq!(sort_bgc("nrps"), NRPS);
        assert_eq!(sort_bgc("lantipeptide"), RIPPS);
        assert_eq!(sort_bgc("oligosaccharide"), SACCHARIDES);
        assert_eq!(sort_bgc("terpene"), TERPENE);
        assert_eq!(sort_bgc("nrps-t2pks"), HYBRIDS);
        assert_eq!(sort_bgc("nrps-nrps"), NRPS);
        assert_eq!(sort_bgc("terpene-t1pks"), OTHERS);
        assert_eq!(sort_bgc("no type"), OTHERS);
    }

    #[test]
    fn test_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# id\tproduct\tdescription\tsize\tsamples").unwrap();
        writeln!(file, "b1\tt1pks\tStreptomyces sp.\t45000\tsoil,marine").unwrap();
        writeln!(file, "b2\tnrps\tBacillus\t30000\t").unwrap();
        writeln!(file, "b3\tterpene\tsmall one\t200").unwrap();
        let path = file.path().display().to_string();

        let mut catalogue = Catalogue::load(&path).unwrap();
        assert_eq!(catalogue.ids(), vec!["b1", "b2", "b3"]);
        assert_eq!(catalogue.group("b1"), ("t1pks", "Streptomyces sp."));
        assert_eq!(catalogue.get("b2").unwrap().samples, vec![DEFAULT_SAMPLE]);

        let samples = catalogue.samples();
        assert_eq!(samples["default"], vec!["b2", "b3"]);
        assert_eq!(samples["soil"], vec!["b1"]);

        let excluded = catalogue.retain_min_size(1000);
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].record, "b3");
        assert_eq!(catalogue.len(), 2);
    }

    #[test]
    fn test_load_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "b1\tt1pks\tdesc\tlarge").unwrap();
        let path = file.path().display().to_string();
        let err = Catalogue::load(&path).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_class_partition() {
        let mut catalogue = Catalogue::new();
        catalogue.insert(meta("a", "t1pks"));
        catalogue.insert(meta("b", "t1pks-nrps"));
        catalogue.insert(meta("c", "nrps-t3pks"));
        catalogue.insert(meta("d", "terpene"));
        let members = catalogue.ids();

        let plain = ClassPlan::new("", false).partition(&members, &catalogue);
        assert_eq!(plain[PKSI], vec!["a"]);
        assert_eq!(plain[HYBRIDS], vec!["b", "c"]);
        assert!(!plain.contains_key(NRPS));

        let expanded = ClassPlan::new("terpene, pks-nrp_hybrids", true).partition(&members, &catalogue);
        assert_eq!(expanded[PKSI], vec!["a", "b"]);
        assert_eq!(expanded[NRPS], vec!["b", "c"]);
        assert_eq!(expanded[PKS_OTHER], vec!["c"]);
        assert!(!expanded.contains_key(HYBRIDS));
        assert!(!expanded.contains_key(TERPENE));
    }
}
