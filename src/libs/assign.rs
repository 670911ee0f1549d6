//! Minimum-cost assignment (Hungarian method with potentials).
//!
//! Rows are matched to columns so that min(rows, cols) pairs are formed and the summed cost is
//! minimal. Costs must be finite. Runs in O(n² m) for n ≤ m.

/// A solved assignment: `(row, column)` pairs sorted by row, and their total cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub pairs: Vec<(usize, usize)>,
    pub cost: f64,
}

/// Solves the rectangular assignment problem for a row-major cost matrix.
///
/// Ties are broken towards the lowest column index found during each augmenting search,
/// so the result only depends on the matrix.
///
/// ```
/// use bgcnet::libs::assign::solve;
/// let assignment = solve(&[vec![1.0, 4.0], vec![3.0, 2.0]]);
/// assert_eq!(assignment.pairs, vec![(0, 0), (1, 1)]);
/// assert_eq!(assignment.cost, 3.0);
/// ```
pub fn solve(costs: &[Vec<f64>]) -> Assignment {
    let rows = costs.len();
    let cols = costs.first().map_or(0, |r| r.len());
    if rows == 0 || cols == 0 {
        return Assignment {
            pairs: vec![],
            cost: 0.0,
        };
    }
    debug_assert!(costs.iter().all(|r| r.len() == cols));

    let mut pairs = if rows <= cols {
        hungarian(rows, cols, |i, j| costs[i][j])
    } else {
        hungarian(cols, rows, |i, j| costs[j][i])
            .into_iter()
            .map(|(c, r)| (r, c))
            .collect()
    };
    pairs.sort_unstable();

    let cost = pairs.iter().map(|&(i, j)| costs[i][j]).sum();
    Assignment { pairs, cost }
}

// n <= m; returns (row, col) pairs, one per row
fn hungarian<F>(n: usize, m: usize, cost: F) -> Vec<(usize, usize)>
where
    F: Fn(usize, usize) -> f64,
{
    // 1-based, index 0 is the virtual row/column
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            // only reachable with non-finite costs
            if j1 == 0 {
                break;
            }

            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // augmenting path
        while j0 != 0 {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
        }
    }

    (1..=m)
        .filter(|&j| p[j] != 0)
        .map(|j| (p[j] - 1, j - 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_square() {
        let a = solve(&[vec![1.0, 4.0], vec![3.0, 2.0]]);
        assert_eq!(a.cost, 3.0);

        let a = solve(&[
            vec![4.0, 1.0, 3.0],
            vec![2.0, 0.0, 5.0],
            vec![3.0, 2.0, 2.0],
        ]);
        assert_eq!(a.pairs, vec![(0, 1), (1, 0), (2, 2)]);
        assert_eq!(a.cost, 5.0);
    }

    #[test]
    fn test_solve_rectangular() {
        let wide = solve(&[vec![1.0, 2.0, 3.0], vec![2.0, 4.0, 6.0]]);
        assert_eq!(wide.pairs, vec![(0, 1), (1, 0)]);
        assert_eq!(wide.cost, 4.0);

        let tall = solve(&[vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]]);
        assert_eq!(tall.pairs, vec![(0, 1), (1, 0)]);
        assert_eq!(tall.cost, 4.0);

        let single = solve(&[vec![0.7], vec![0.2], vec![0.5]]);
        assert_eq!(single.pairs, vec![(1, 0)]);
        assert_eq!(single.cost, 0.2);
    }

    #[test]
    fn test_solve_ties_and_empty() {
        let a = solve(&[vec![0.0, 0.0], vec![0.0, 0.0]]);
        assert_eq!(a.pairs, vec![(0, 0), (1, 1)]);
        assert_eq!(a.cost, 0.0);

        let a = solve(&[]);
        assert!(a.pairs.is_empty());
        assert_eq!(a.cost, 0.0);
    }
}
