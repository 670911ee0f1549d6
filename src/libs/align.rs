//! Aligned domain sequences.
//!
//! [`AlignmentStore`] holds the per-domain multiple alignments (`<domain>.algn`) and is shared
//! read-only by all workers. [`Realigner`] is owned by a single worker: when two occurrences are
//! not part of the same multiple alignment it globally aligns their raw sequences, read from
//! `<domain>.fasta`, keeping the parsed files in a small LRU cache.

use crate::libs::error::BgcError;
use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation;
use fxhash::FxHashMap;
use lru::LruCache;
use rayon::prelude::*;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Substitution scores and gap penalties are scaled by 3 so that the
/// gap extension of -6.67 stays (almost) exact in integers.
const SCORE_SCALE: i32 = 3;
/// Gap of length k costs `GAP_OPEN + (k - 1) * GAP_EXTEND` (scaled): -15 and -6.67.
const GAP_OPEN: i32 = -45;
const GAP_EXTEND: i32 = -20;

#[derive(Debug, Default)]
pub struct AlignmentStore {
    groups: Vec<String>,
    seqs: FxHashMap<String, (usize, Vec<u8>)>,
}

impl AlignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one aligned occurrence to the alignment of `group`.
    pub fn insert(&mut self, group: &str, tag: &str, seq: &[u8]) {
        let gid = match self.groups.iter().position(|g| g == group) {
            Some(i) => i,
            None => {
                self.groups.push(group.to_string());
                self.groups.len() - 1
            }
        };
        if self.seqs.contains_key(tag) {
            log::warn!("Occurrence {} is aligned more than once, keeping the first", tag);
            return;
        }
        self.seqs.insert(tag.to_string(), (gid, seq.to_vec()));
    }

    /// Reads every `*.algn` file of a directory.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let files = crate::libs::stage::files_with_extension(dir, "algn");

        let parsed: Vec<(String, Vec<(String, Vec<u8>)>)> = files
            .par_iter()
            .map(|path| -> anyhow::Result<_> {
                let group = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                Ok((group, read_fasta(path)?))
            })
            .collect::<anyhow::Result<_>>()?;

        let mut store = Self::new();
        for (group, entries) in parsed {
            if entries.is_empty() {
                log::warn!("Alignment file for {} is empty", group);
            }
            for (tag, seq) in entries {
                store.insert(&group, &tag, &seq);
            }
        }
        log::info!(
            "Loaded {} aligned domain sequences from {} alignments",
            store.len(),
            store.groups.len()
        );

        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Aligned sequences of two occurrences when both belong to the same alignment.
    pub fn pair(&self, tag_a: &str, tag_b: &str) -> Option<(&[u8], &[u8])> {
        let (ga, sa) = self.seqs.get(tag_a)?;
        let (gb, sb) = self.seqs.get(tag_b)?;
        if ga == gb {
            Some((sa.as_slice(), sb.as_slice()))
        } else {
            None
        }
    }
}

/// Reads a FASTA file into `(id, sequence)` pairs, in file order.
pub fn read_fasta(path: &Path) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
    let reader = bio::io::fasta::Reader::new(crate::reader(&path.display().to_string())?);
    let mut entries = vec![];
    for record in reader.records() {
        let record = record?;
        entries.push((record.id().to_string(), record.seq().to_vec()));
    }
    Ok(entries)
}

/// Difference between two aligned sequences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeqDistance {
    /// `1 - matches / (aligned length - gap-gap columns)`
    pub distance: f64,
    /// The sequences had different lengths and were compared up to the shorter one
    pub truncated: bool,
}

/// ```
/// use bgcnet::libs::align::seq_distance;
/// let d = seq_distance(b"AC-DE", b"AC-DF");
/// assert_eq!(d.distance, 0.25);
/// assert!(!d.truncated);
/// ```
pub fn seq_distance(a: &[u8], b: &[u8]) -> SeqDistance {
    let len = a.len().min(b.len());
    let truncated = a.len() != b.len();

    let mut matches = 0usize;
    let mut gaps = 0usize;
    for (x, y) in a[..len].iter().zip(&b[..len]) {
        if x == y {
            if *x == b'-' {
                gaps += 1;
            } else {
                matches += 1;
            }
        }
    }

    let distance = if len > gaps {
        1.0 - matches as f64 / (len - gaps) as f64
    } else {
        1.0
    };

    SeqDistance {
        distance,
        truncated,
    }
}

// Residues outside of PAM250 are scored as X
fn protein_code(c: u8) -> u8 {
    let c = c.to_ascii_uppercase();
    if b"ARNDCQEGHILKMFPSTWYVBZX*".contains(&c) {
        c
    } else {
        b'X'
    }
}

/// Global alignment with PAM250, returning both gapped rows.
pub fn global_align(x: &[u8], y: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let x: Vec<u8> = x.iter().map(|&c| protein_code(c)).collect();
    let y: Vec<u8> = y.iter().map(|&c| protein_code(c)).collect();

    let score = |a: u8, b: u8| SCORE_SCALE * bio::scores::pam250(a, b);
    let mut aligner = Aligner::with_capacity(
        x.len(),
        y.len(),
        GAP_OPEN - GAP_EXTEND,
        GAP_EXTEND,
        score,
    );
    let alignment = aligner.global(&x, &y);

    let mut row_x = Vec::with_capacity(alignment.operations.len());
    let mut row_y = Vec::with_capacity(alignment.operations.len());
    let (mut i, mut j) = (alignment.xstart, alignment.ystart);
    for op in &alignment.operations {
        match op {
            AlignmentOperation::Match | AlignmentOperation::Subst => {
                row_x.push(x.get(i).copied().unwrap_or(b'-'));
                row_y.push(y.get(j).copied().unwrap_or(b'-'));
                i += 1;
                j += 1;
            }
            AlignmentOperation::Del => {
                row_x.push(b'-');
                row_y.push(y.get(j).copied().unwrap_or(b'-'));
                j += 1;
            }
            AlignmentOperation::Ins => {
                row_x.push(x.get(i).copied().unwrap_or(b'-'));
                row_y.push(b'-');
                i += 1;
            }
            AlignmentOperation::Xclip(n) => i += n,
            AlignmentOperation::Yclip(n) => j += n,
        }
    }

    (row_x, row_y)
}

type DomainSeqs = Option<FxHashMap<String, Vec<u8>>>;

/// Worker-local pairwise realignment from unaligned domain sequences.
pub struct Realigner {
    domains_dir: PathBuf,
    cache: LruCache<String, DomainSeqs>,
    realigned: usize,
}

impl Realigner {
    pub fn new(domains_dir: &Path, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            domains_dir: domains_dir.to_path_buf(),
            cache: LruCache::new(capacity),
            realigned: 0,
        }
    }

    /// Number of pairwise alignments computed so far.
    pub fn realigned(&self) -> usize {
        self.realigned
    }

    /// Aligns two occurrences of `domain`.
    ///
    /// The pair is always aligned in the same orientation, so that swapping the arguments
    /// only swaps the returned rows.
    pub fn align(
        &mut self,
        domain: &str,
        tag_a: &str,
        tag_b: &str,
    ) -> Result<(Vec<u8>, Vec<u8>), BgcError> {
        if tag_b < tag_a {
            let (b, a) = self.align(domain, tag_b, tag_a)?;
            return Ok((a, b));
        }

        let key = domain.to_string();
        if !self.cache.contains(&key) {
            let path = self.domains_dir.join(format!("{}.fasta", domain));
            let seqs: DomainSeqs = match read_fasta(&path) {
                Ok(entries) => Some(
                    entries
                        .into_iter()
                        .map(|(id, seq)| {
                            let seq = seq.into_iter().filter(|&c| c != b'-' && c != b'.');
                            (id, seq.collect::<Vec<u8>>())
                        })
                        .collect(),
                ),
                Err(e) => {
                    log::warn!("Cannot read sequences of {}: {}", domain, e);
                    None
                }
            };
            self.cache.put(key.clone(), seqs);
        }

        let seqs = self.cache.get(&key).and_then(|s| s.as_ref());
        let seq_a = lookup(seqs, domain, tag_a)?;
        let seq_b = lookup(seqs, domain, tag_b)?;

        let rows = global_align(seq_a, seq_b);
        self.realigned += 1;
        Ok(rows)
    }
}

fn lookup<'s>(
    seqs: Option<&'s FxHashMap<String, Vec<u8>>>,
    domain: &str,
    tag: &str,
) -> Result<&'s [u8], BgcError> {
    seqs.and_then(|s| s.get(tag))
        .filter(|seq| !seq.is_empty())
        .map(|seq| seq.as_slice())
        .ok_or_else(|| BgcError::MissingSequence {
            tag: tag.to_string(),
            domain: domain.to_string(),
        })
}
