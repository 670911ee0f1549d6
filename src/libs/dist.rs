//! Pair Distance Evaluator.
//!
//! The distance between two records combines three similarities of their domain content:
//!
//! * **Jaccard** - shared distinct domain types over all distinct domain types
//! * **DDS** - domain sequence similarity; copies of a shared domain are paired by an optimal
//!   assignment over their sequence distances, unshared domains count as fully different, and
//!   anchor domains can be boosted
//! * **AI** - adjacency index, the Jaccard index of unordered pairs of neighbouring domains
//!
//! `distance = 1 - wJ * Jaccard - wDDS * DDS - wAI * AI`, with the weights of the class.

use crate::libs::align::{seq_distance, AlignmentStore, Realigner, SeqDistance};
use crate::libs::assign;
use crate::libs::domain::{AnchorSet, DomainIndex, DomainRecord};
use crate::libs::error::BgcError;
use crate::libs::weights::{ClassWeights, WeightTable};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Negative distances above this are rounding noise.
pub const NEGATIVE_TOLERANCE: f64 = -1e-6;

/// Canonical identity of a pairwise result: `a <= b`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    pub a: String,
    pub b: String,
    pub class: String,
}

impl PairKey {
    /// ```
    /// use bgcnet::libs::dist::PairKey;
    /// assert_eq!(PairKey::new("b", "a", "mix"), PairKey::new("a", "b", "mix"));
    /// ```
    pub fn new(x: &str, y: &str, class: &str) -> Self {
        let (a, b) = if y < x { (y, x) } else { (x, y) };
        Self {
            a: a.to_string(),
            b: b.to_string(),
            class: class.to_string(),
        }
    }
}

/// Scores of one pair of records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairResult {
    pub distance: f64,
    pub jaccard: f64,
    /// DDS as a similarity
    pub dds: f64,
    pub ai: f64,
    /// Raw difference ratio of non-anchor domains
    pub dds_non_anchor: f64,
    /// Raw difference ratio of anchor domains
    pub dds_anchor: f64,
    /// Normalization total of non-anchor domains
    pub norm: usize,
    /// Normalization total of anchor domains
    pub norm_anchor: usize,
    /// Sentinel or anomalous result
    pub flagged: bool,
}

impl PairResult {
    /// Maximal distance, used when a pair cannot be evaluated.
    pub fn sentinel() -> Self {
        Self {
            distance: 1.0,
            jaccard: 0.0,
            dds: 0.0,
            ai: 0.0,
            dds_non_anchor: 1.0,
            dds_anchor: 1.0,
            norm: 0,
            norm_anchor: 0,
            flagged: true,
        }
    }

    /// `-log2(distance)`, infinite for identical records.
    pub fn log_score(&self) -> f64 {
        if self.distance == 0.0 {
            f64::INFINITY
        } else {
            // + 0.0 turns -0 into 0
            -self.distance.log2() + 0.0
        }
    }

    pub fn squared_similarity(&self) -> f64 {
        (1.0 - self.distance).powi(2)
    }
}

/// Something worth reporting about an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    /// Records without any domain
    NoDomains(Vec<String>),
    /// Occurrences of a domain were aligned pairwise
    Realigned { domain: String },
    /// Aligned sequences of different lengths were truncated
    LengthMismatch { domain: String },
    /// Distance below the tolerance, clamped to 0
    NegativeDistance(f64),
    /// The pair could not be evaluated
    Failed(String),
}

impl Note {
    pub fn kind(&self) -> &'static str {
        match self {
            Note::NoDomains(_) => "no_domains",
            Note::Realigned { .. } => "realigned",
            Note::LengthMismatch { .. } => "length_mismatch",
            Note::NegativeDistance(_) => "negative_distance",
            Note::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::NoDomains(ids) => write!(f, "{}", ids.join(",")),
            Note::Realigned { domain } | Note::LengthMismatch { domain } => {
                write!(f, "{}", domain)
            }
            Note::NegativeDistance(d) => write!(f, "{}", d),
            Note::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub result: PairResult,
    pub notes: Vec<Note>,
}

/// Read-only inputs of the evaluator, shared by all workers.
#[derive(Debug, Default)]
pub struct DistanceContext {
    pub index: DomainIndex,
    pub alignments: AlignmentStore,
    pub anchors: AnchorSet,
    pub weights: WeightTable,
    /// Compare the shorter record to the best matching region of the longer one
    pub fragment: bool,
}

impl DistanceContext {
    pub fn new(
        index: DomainIndex,
        alignments: AlignmentStore,
        anchors: AnchorSet,
        weights: WeightTable,
    ) -> Self {
        Self {
            index,
            alignments,
            anchors,
            weights,
            fragment: false,
        }
    }

    pub fn with_fragment(mut self, fragment: bool) -> Self {
        self.fragment = fragment;
        self
    }
}

// The part of a record taking part in a comparison
struct View<'r> {
    record: &'r DomainRecord,
    domains: &'r [String],
    // occurrences of each type before and inside the window
    skipped: BTreeMap<&'r str, usize>,
    copies: BTreeMap<&'r str, usize>,
}

impl<'r> View<'r> {
    fn full(record: &'r DomainRecord) -> Self {
        Self::window(record, 0, record.domains.len())
    }

    fn window(record: &'r DomainRecord, start: usize, len: usize) -> Self {
        let mut skipped = BTreeMap::new();
        for d in &record.domains[..start] {
            *skipped.entry(d.as_str()).or_insert(0) += 1;
        }
        let domains = &record.domains[start..start + len];
        let mut copies = BTreeMap::new();
        for d in domains {
            *copies.entry(d.as_str()).or_insert(0) += 1;
        }
        Self {
            record,
            domains,
            skipped,
            copies,
        }
    }

    fn types(&self) -> BTreeSet<&'r str> {
        self.copies.keys().copied().collect()
    }

    fn tags(&self, domain: &str, id: &str) -> Result<&'r [String], BgcError> {
        let lo = self.skipped.get(domain).copied().unwrap_or(0);
        let n = self.copies.get(domain).copied().unwrap_or(0);
        self.record
            .tags(domain)
            .get(lo..lo + n)
            .ok_or_else(|| BgcError::Inconsistent {
                record: id.to_string(),
                message: format!("fewer occurrence tags than listed copies of {}", domain),
            })
    }
}

/// Index of the window of `long` sharing the most domain types with `short`.
///
/// The window has the length of `short`; the first of equally good windows wins.
pub fn best_window(short: &[String], long: &[String]) -> usize {
    let n = short.len();
    if n == 0 || n > long.len() {
        return 0;
    }
    let short_set: BTreeSet<&str> = short.iter().map(|s| s.as_str()).collect();

    let mut best = 0;
    let mut best_start = 0;
    for (start, window) in long.windows(n).enumerate() {
        let window: BTreeSet<&str> = window.iter().map(|s| s.as_str()).collect();
        let shared = window.intersection(&short_set).count();
        if shared > best {
            best = shared;
            best_start = start;
        }
    }
    best_start
}

/// Unordered pairs of adjacent domain types.
pub fn adjacent_pairs(domains: &[String]) -> BTreeSet<(&str, &str)> {
    domains
        .windows(2)
        .map(|w| {
            let (x, y) = (w[0].as_str(), w[1].as_str());
            if y < x {
                (y, x)
            } else {
                (x, y)
            }
        })
        .collect()
}

/// Three-case blending of the anchor and non-anchor difference ratios.
///
/// Returns `(non-anchor ratio, anchor ratio, blended difference)`.
pub fn blend_dds(
    diff: f64,
    norm: usize,
    diff_anchor: f64,
    norm_anchor: usize,
    anchor_boost: f64,
) -> (f64, f64, f64) {
    if norm_anchor != 0 && norm != 0 {
        let non_anchor = diff / norm as f64;
        let anchor = diff_anchor / norm_anchor as f64;

        let total = (norm + norm_anchor) as f64;
        let non_anchor_prct = norm as f64 / total;
        let anchor_prct = norm_anchor as f64 / total;

        let boosted = anchor_prct * anchor_boost + non_anchor_prct;
        let non_anchor_weight = non_anchor_prct / boosted;
        let anchor_weight = anchor_prct * anchor_boost / boosted;

        (
            non_anchor,
            anchor,
            non_anchor_weight * non_anchor + anchor_weight * anchor,
        )
    } else if norm_anchor == 0 {
        let non_anchor = diff / norm as f64;
        (non_anchor, 0.0, non_anchor)
    } else {
        let anchor = diff_anchor / norm_anchor as f64;
        (0.0, anchor, anchor)
    }
}

/// `1 - wJ*J - wDDS*DDS - wAI*AI`, before clamping.
pub fn composite(weights: &ClassWeights, jaccard: f64, dds: f64, ai: f64) -> f64 {
    1.0 - weights.jaccard * jaccard - weights.dds * dds - weights.ai * ai
}

/// Evaluates the distance between two indexed records with the weights of `class`.
///
/// The pair is oriented by id before any arithmetic, so the result does not depend on the
/// argument order.
pub fn evaluate(
    ctx: &DistanceContext,
    realigner: &mut Realigner,
    x: &str,
    y: &str,
    class: &str,
) -> Result<Evaluation, BgcError> {
    let (id_a, id_b) = if y < x { (y, x) } else { (x, y) };
    let rec_a = ctx
        .index
        .get(id_a)
        .ok_or_else(|| BgcError::UnknownRecord(id_a.to_string()))?;
    let rec_b = ctx
        .index
        .get(id_b)
        .ok_or_else(|| BgcError::UnknownRecord(id_b.to_string()))?;
    let weights = ctx.weights.get(class);
    let anchors = &ctx.anchors;
    let mut notes = vec![];

    if rec_a.is_empty() || rec_b.is_empty() {
        let empty: Vec<String> = [(id_a, rec_a), (id_b, rec_b)]
            .iter()
            .filter(|(_, r)| r.is_empty())
            .map(|(id, _)| id.to_string())
            .collect();
        log::warn!(
            "Distance between {} and {} set to 1: no identified domains in {}",
            id_a,
            id_b,
            empty.join(" and ")
        );
        return Ok(Evaluation {
            result: PairResult::sentinel(),
            notes: vec![Note::NoDomains(empty)],
        });
    }

    // Totally unrelated pairs only need the domain counts
    if rec_a.types().is_disjoint(&rec_b.types()) {
        let mut norm = 0;
        let mut norm_anchor = 0;
        for rec in [rec_a, rec_b] {
            for d in rec.types() {
                if anchors.is_anchor(d) {
                    norm_anchor += rec.count(d);
                } else {
                    norm += rec.count(d);
                }
            }
        }
        return Ok(Evaluation {
            result: PairResult {
                distance: 1.0,
                jaccard: 0.0,
                dds: 0.0,
                ai: 0.0,
                dds_non_anchor: 1.0,
                dds_anchor: 1.0,
                norm,
                norm_anchor,
                flagged: false,
            },
            notes,
        });
    }

    let (view_a, view_b) = if ctx.fragment && rec_a.domains.len() != rec_b.domains.len() {
        let a_is_short = rec_a.domains.len() < rec_b.domains.len();
        let (short, long) = if a_is_short {
            (rec_a, rec_b)
        } else {
            (rec_b, rec_a)
        };
        let start = best_window(&short.domains, &long.domains);
        let short_view = View::full(short);
        let long_view = View::window(long, start, short.domains.len());
        if a_is_short {
            (short_view, long_view)
        } else {
            (long_view, short_view)
        }
    } else {
        (View::full(rec_a), View::full(rec_b))
    };

    let set_a = view_a.types();
    let set_b = view_b.types();
    let shared: Vec<&str> = set_a.intersection(&set_b).copied().collect();

    // Jaccard
    let jaccard = shared.len() as f64 / (set_a.len() + set_b.len() - shared.len()) as f64;

    // DDS
    let mut diff = 0.0;
    let mut diff_anchor = 0.0;
    let mut norm = 0usize;
    let mut norm_anchor = 0usize;

    for d in set_a.symmetric_difference(&set_b) {
        let n = if set_a.contains(d) {
            rec_a.count(d)
        } else {
            rec_b.count(d)
        };
        if anchors.is_anchor(d) {
            diff_anchor += n as f64;
            norm_anchor += n;
        } else {
            diff += n as f64;
            norm += n;
        }
    }

    for d in &shared {
        let tags_a = view_a.tags(d, id_a)?;
        let tags_b = view_b.tags(d, id_b)?;

        let mut realigned = false;
        let mut truncated = false;
        let mut costs = vec![vec![1.0; tags_b.len()]; tags_a.len()];
        for (i, ta) in tags_a.iter().enumerate() {
            for (j, tb) in tags_b.iter().enumerate() {
                let (dist, fallback) = occurrence_distance(ctx, realigner, d, ta, tb)?;
                realigned |= fallback;
                if dist.truncated {
                    truncated = true;
                    log::warn!(
                        "Mismatch in aligned sequence lengths of {} ({} - {}), truncating",
                        d,
                        ta,
                        tb
                    );
                }
                costs[i][j] = dist.distance;
            }
        }
        if realigned {
            log::debug!(
                "{} - {}: {} not found in the alignments, aligned pairwise",
                id_a,
                id_b,
                d
            );
            notes.push(Note::Realigned {
                domain: d.to_string(),
            });
        }
        if truncated {
            notes.push(Note::LengthMismatch {
                domain: d.to_string(),
            });
        }

        let assignment = assign::solve(&costs);
        let seq_diff = tags_a.len().abs_diff(tags_b.len()) as f64 + assignment.cost;
        let n = tags_a.len().max(tags_b.len());

        if anchors.is_anchor(d) {
            diff_anchor += seq_diff;
            norm_anchor += n;
        } else {
            diff += seq_diff;
            norm += n;
        }
    }

    let (dds_non_anchor, dds_anchor, dds_diff) =
        blend_dds(diff, norm, diff_anchor, norm_anchor, weights.anchor_boost);
    let dds = 1.0 - dds_diff;

    // Adjacency index
    let ai = if view_a.domains.len() < 2 || view_b.domains.len() < 2 {
        0.0
    } else {
        let pairs_a = adjacent_pairs(view_a.domains);
        let pairs_b = adjacent_pairs(view_b.domains);
        pairs_a.intersection(&pairs_b).count() as f64 / pairs_a.union(&pairs_b).count() as f64
    };

    let mut distance = composite(&weights, jaccard, dds, ai);
    let mut flagged = false;
    if distance < 0.0 {
        if distance < NEGATIVE_TOLERANCE {
            log::error!(
                "Negative distance detected: {} for {} - {} (J: {}, DDS: {}, AI: {}; Jw: {}, DDSw: {}, AIw: {})",
                distance,
                id_a,
                id_b,
                jaccard,
                dds,
                ai,
                weights.jaccard,
                weights.dds,
                weights.ai
            );
            notes.push(Note::NegativeDistance(distance));
            flagged = true;
        }
        distance = 0.0;
    }

    Ok(Evaluation {
        result: PairResult {
            distance,
            jaccard,
            dds,
            ai,
            dds_non_anchor,
            dds_anchor,
            norm,
            norm_anchor,
            flagged,
        },
        notes,
    })
}

// Distance of two occurrences and whether it needed a pairwise alignment
fn occurrence_distance(
    ctx: &DistanceContext,
    realigner: &mut Realigner,
    domain: &str,
    tag_a: &str,
    tag_b: &str,
) -> Result<(SeqDistance, bool), BgcError> {
    match ctx.alignments.pair(tag_a, tag_b) {
        Some((sa, sb)) => Ok((seq_distance(sa, sb), false)),
        None => {
            let (ra, rb) = realigner.align(domain, tag_a, tag_b)?;
            Ok((seq_distance(&ra, &rb), true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Write;
    use std::path::Path;

    const SEQ: &[u8] = b"MKVLAAGIVG";

    // Records with synthetic tags; every occurrence aligned to SEQ unless overridden
    fn context(records: &[(&str, &[&str])], overrides: &[(&str, &[u8])]) -> DistanceContext {
        let mut index = DomainIndex::new();
        let mut store = AlignmentStore::new();
        for (tag, seq) in overrides {
            let domain = tag.split(':').nth(1).unwrap();
            store.insert(domain, tag, seq);
        }
        for (id, domains) in records {
            let rec = DomainRecord::synthetic(id, domains);
            for (d, tags) in &rec.occurrences {
                for t in tags {
                    if store.pair(t, t).is_none() {
                        store.insert(d, t, SEQ);
                    }
                }
            }
            index.insert(id, rec);
        }

        let mut weights = WeightTable::default();
        weights.set("jaccard", ClassWeights::new(1.0, 0.0, 0.0, 1.0));
        weights.set("dds", ClassWeights::new(0.0, 1.0, 0.0, 4.0));
        weights.set("all", ClassWeights::new(1.0, 1.0, 1.0, 1.0));

        let anchors: AnchorSet = ["K"].iter().collect();
        DistanceContext::new(index, store, anchors, weights)
    }

    fn no_fallback() -> Realigner {
        Realigner::new(Path::new("tests/bgc/not_there"), 1)
    }

    fn eval(ctx: &DistanceContext, a: &str, b: &str, class: &str) -> Evaluation {
        evaluate(ctx, &mut no_fallback(), a, b, class).unwrap()
    }

    #[test]
    fn test_jaccard_example() {
        let ctx = context(&[("A", &["X", "Y"]), ("B", &["Y", "Z"])], &[]);
        let e = eval(&ctx, "A", "B", "jaccard");

        assert_abs_diff_eq!(e.result.jaccard, 1.0 / 3.0);
        assert_abs_diff_eq!(e.result.distance, 2.0 / 3.0);
        assert_eq!(e.result.ai, 0.0);
        assert!(!e.result.flagged);
    }

    #[test]
    fn test_identity() {
        let ctx = context(&[("A", &["X", "Y", "X", "Z"])], &[]);
        let e = eval(&ctx, "A", "A", "mix");

        assert_eq!(e.result.jaccard, 1.0);
        assert_eq!(e.result.dds, 1.0);
        assert_eq!(e.result.ai, 1.0);
        assert_abs_diff_eq!(e.result.distance, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_disjoint() {
        let ctx = context(&[("A", &["X", "K", "X"]), ("B", &["Y", "Z"])], &[]);
        for class in ["mix", "jaccard", "dds", "all", "NRPS"] {
            let e = eval(&ctx, "A", "B", class);
            assert_eq!(e.result.distance, 1.0);
            assert_eq!(e.result.jaccard, 0.0);
            assert_eq!(e.result.dds, 0.0);
            assert_eq!(e.result.norm, 4);
            assert_eq!(e.result.norm_anchor, 1);
        }
    }

    #[test]
    fn test_degenerate() {
        let ctx = context(&[("A", &[]), ("B", &["Y", "Z"])], &[]);
        let e = eval(&ctx, "B", "A", "mix");
        assert_eq!(e.result, PairResult::sentinel());
        assert_eq!(e.notes, vec![Note::NoDomains(vec!["A".to_string()])]);
        assert_eq!(eval(&ctx, "A", "B", "mix"), e);
    }

    #[test]
    fn test_repeated_domains_assignment() {
        // A:P:0 matches B:P:0 exactly, A:P:1 shares 5 of 10 residues
        let ctx = context(
            &[("A", &["P", "P"]), ("B", &["P"])],
            &[("A:P:1", b"MKVLAWWWWW")],
        );
        let e = eval(&ctx, "A", "B", "dds");

        // assignment cost 0, one unmatched copy, two copies at most
        assert_abs_diff_eq!(e.result.dds_non_anchor, 0.5);
        assert_abs_diff_eq!(e.result.dds, 0.5);
        assert_eq!(e.result.norm, 2);
        assert_abs_diff_eq!(e.result.distance, 0.5);
    }

    #[test]
    fn test_length_mismatch_truncated() {
        // the aligned copy of B is two columns short; MKVLA of the first 8 columns match
        let ctx = context(&[("A", &["X"]), ("B", &["X"])], &[("B:X:0", b"MKVLAWWW")]);
        let e = eval(&ctx, "B", "A", "dds");

        assert_abs_diff_eq!(e.result.dds_non_anchor, 1.0 - 5.0 / 8.0);
        assert_abs_diff_eq!(e.result.distance, 1.0 - 5.0 / 8.0);
        assert!(!e.result.flagged);
        assert_eq!(
            e.notes,
            vec![Note::LengthMismatch {
                domain: "X".to_string()
            }]
        );
        assert_eq!(e.notes[0].kind(), "length_mismatch");
        assert_eq!(e, eval(&ctx, "A", "B", "dds"));
    }

    #[test]
    fn test_anchor_blending() {
        // K is an anchor; its copies share half of their residues
        let ctx = context(
            &[("A", &["X", "K"]), ("B", &["X", "K"])],
            &[("A:K:1", b"MKVLAWWWWW")],
        );
        let e = eval(&ctx, "A", "B", "dds");
        assert_abs_diff_eq!(e.result.dds_non_anchor, 0.0);
        assert_abs_diff_eq!(e.result.dds_anchor, 0.5);
        // boost 4: weights 0.2 / 0.8
        assert_abs_diff_eq!(e.result.dds, 1.0 - 0.8 * 0.5, epsilon = 1e-12);

        let ctx = context(&[("A", &["K"]), ("B", &["K"])], &[("A:K:0", b"MKVLAWWWWW")]);
        let e = eval(&ctx, "A", "B", "dds");
        assert_eq!(e.result.dds_non_anchor, 0.0);
        assert_abs_diff_eq!(e.result.dds_anchor, 0.5);
        assert_abs_diff_eq!(e.result.dds, 0.5);
        assert_eq!((e.result.norm, e.result.norm_anchor), (0, 1));
    }

    #[test]
    fn test_blend_cases() {
        assert_eq!(blend_dds(1.0, 2, 0.0, 0, 4.0), (0.5, 0.0, 0.5));
        assert_eq!(blend_dds(0.0, 0, 1.0, 4, 4.0), (0.0, 0.25, 0.25));
        // without boost both sides count by their share
        let (_, _, d) = blend_dds(1.0, 1, 0.0, 1, 1.0);
        assert_abs_diff_eq!(d, 0.5);
    }

    #[test]
    fn test_fragment_window() {
        let short: Vec<String> = ["P", "Q"].iter().map(|s| s.to_string()).collect();
        let long: Vec<String> = ["R", "P", "Q", "S", "P", "Q"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(best_window(&short, &long), 1);

        let mut ctx = context(
            &[("A", &["P", "Q"]), ("B", &["R", "P", "Q", "S", "T"])],
            &[],
        );
        let whole = eval(&ctx, "A", "B", "mix");
        assert_abs_diff_eq!(whole.result.jaccard, 2.0 / 5.0);

        ctx.fragment = true;
        let e = eval(&ctx, "A", "B", "mix");
        assert_eq!(e.result.jaccard, 1.0);
        assert_eq!(e.result.ai, 1.0);
        assert_eq!(e, eval(&ctx, "B", "A", "mix"));
    }

    #[test]
    fn test_symmetry() {
        let records: &[(&str, &[&str])] = &[
            ("A", &["X", "Y", "X", "K"]),
            ("B", &["Y", "X", "Z"]),
            ("C", &["K", "K", "Y"]),
            ("D", &[]),
        ];
        let overrides: &[(&str, &[u8])] = &[
            ("A:X:2", b"MKVLAAGIWW"),
            ("B:X:1", b"MKVLAAGWWW"),
            ("C:K:1", b"WKVLAAGIVG"),
        ];
        for fragment in [false, true] {
            let mut ctx = context(records, overrides);
            ctx.fragment = fragment;
            for (x, _) in records {
                for (y, _) in records {
                    for class in ["mix", "dds", "all"] {
                        assert_eq!(eval(&ctx, x, y, class), eval(&ctx, y, x, class));
                    }
                }
            }
        }
    }

    #[test]
    fn test_weighted_sum() {
        let ctx = context(
            &[("A", &["X", "Y", "Z", "X"]), ("B", &["X", "Y", "W"])],
            &[("A:X:3", b"MKVLAAGIWW")],
        );
        for class in ["mix", "PKSI", "RiPPs", "Terpene", "Others"] {
            let w = ctx.weights.get(class);
            let r = eval(&ctx, "A", "B", class).result;
            let expected = 1.0 - (w.jaccard * r.jaccard + w.dds * r.dds + w.ai * r.ai);
            assert_abs_diff_eq!(r.distance, expected.max(0.0), epsilon = 1e-12);
            assert!((0.0..=1.0).contains(&r.distance));
        }
    }

    #[test]
    fn test_negative_distance_flagged() {
        let ctx = context(&[("A", &["X", "Y"])], &[]);
        let e = eval(&ctx, "A", "A", "all");
        assert_eq!(e.result.distance, 0.0);
        assert!(e.result.flagged);
        assert_eq!(e.notes, vec![Note::NegativeDistance(-2.0)]);
    }

    #[test]
    fn test_fallback_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("X.fasta")).unwrap();
        writeln!(f, ">A:X:0\nMKVLAAGIVG\n>B:X:0\nMKVLAAGIVG").unwrap();

        let mut index = DomainIndex::new();
        index.insert("A", DomainRecord::synthetic("A", &["X"]));
        index.insert("B", DomainRecord::synthetic("B", &["X"]));
        let mut weights = WeightTable::default();
        weights.set("dds", ClassWeights::new(0.0, 1.0, 0.0, 1.0));
        let ctx = DistanceContext::new(
            index,
            AlignmentStore::new(),
            AnchorSet::default(),
            weights,
        );

        let mut realigner = Realigner::new(dir.path(), 2);
        let e = evaluate(&ctx, &mut realigner, "A", "B", "dds").unwrap();
        assert_eq!(e.result.distance, 0.0);
        assert_eq!(
            e.notes,
            vec![Note::Realigned {
                domain: "X".to_string()
            }]
        );

        let err = evaluate(&ctx, &mut no_fallback(), "A", "B", "dds").unwrap_err();
        assert!(matches!(err, BgcError::MissingSequence { .. }));
        let err = evaluate(&ctx, &mut realigner, "A", "Q", "dds").unwrap_err();
        assert_eq!(err, BgcError::UnknownRecord("Q".to_string()));
    }

    #[test]
    fn test_scores() {
        let mut r = PairResult::sentinel();
        assert_eq!(r.log_score(), 0.0);
        r.distance = 0.25;
        assert_eq!(r.log_score(), 2.0);
        assert_eq!(r.squared_similarity(), 0.5625);
        r.distance = 0.0;
        assert!(r.log_score().is_infinite());
    }
}
