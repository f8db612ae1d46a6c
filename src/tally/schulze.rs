//! Schulze method counting.
//!
//! `prefer[i][j]` is the number of ballots ranking candidate `i` above `j`.
//! The strongest path from `i` to `j` is the best, over all chains of
//! candidates from `i` to `j`, of the weakest link along the chain. Candidate
//! `a` beats `b` if its strongest path to `b` is stronger than the other way
//! around; this relation is transitive, so ordering by the number of
//! candidates each one beats gives a ranking consistent with it.

use std::cmp::Reverse;
use std::collections::HashMap;

use rand::{seq::SliceRandom, Rng};

use crate::model::{
    db::{ballot::RankedBallot, election::Candidate},
    mongodb::Id,
};

pub type Matrix = Vec<Vec<u64>>;

/// A full ranking with the matrices it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Best first.
    pub ranking: Vec<Candidate>,
    pub total_votes: usize,
    /// Rows and columns in ranking order.
    pub prefer: Matrix,
    /// Rows and columns in ranking order.
    pub strongest_paths: Matrix,
}

/// Pairwise preference counts, indexed like `candidates`.
pub fn prefer_matrix(candidates: &[Candidate], ballots: &[RankedBallot]) -> Matrix {
    let index: HashMap<Id, usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id, i))
        .collect();
    let n = candidates.len();
    let mut prefer = vec![vec![0; n]; n];
    for ballot in ballots {
        let positions: Vec<usize> = ballot
            .ranking
            .iter()
            .filter_map(|id| index.get(id).copied())
            .collect();
        for (rank, &above) in positions.iter().enumerate() {
            for &below in &positions[rank + 1..] {
                prefer[above][below] += 1;
            }
        }
    }
    prefer
}

/// Close `prefer` under strongest paths (Floyd–Warshall over widest paths).
pub fn strongest_paths(prefer: &Matrix) -> Matrix {
    let n = prefer.len();
    let mut p = prefer.clone();
    for k in 0..n {
        for i in 0..n {
            if i == k {
                continue;
            }
            for j in 0..n {
                if j != i && j != k {
                    p[i][j] = p[i][j].max(p[i][k].min(p[k][j]));
                }
            }
        }
    }
    p
}

/// Rank the candidates. Candidates that neither beats the other end up in
/// random relative order.
pub fn count<R: Rng + ?Sized>(
    candidates: &[Candidate],
    ballots: &[RankedBallot],
    rng: &mut R,
) -> Outcome {
    let prefer = prefer_matrix(candidates, ballots);
    let p = strongest_paths(&prefer);
    let n = candidates.len();

    let wins: Vec<usize> = (0..n)
        .map(|a| (0..n).filter(|&b| p[a][b] > p[b][a]).count())
        .collect();

    // Stable sort after a shuffle: ties keep their random order.
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    order.sort_by_key(|&i| Reverse(wins[i]));

    let reorder = |m: &Matrix| -> Matrix {
        order
            .iter()
            .map(|&i| order.iter().map(|&j| m[i][j]).collect())
            .collect()
    };

    Outcome {
        ranking: order.iter().map(|&i| candidates[i].clone()).collect(),
        total_votes: ballots.len(),
        prefer: reorder(&prefer),
        strongest_paths: reorder(&p),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn candidates(names: &[&str]) -> Vec<Candidate> {
        names
            .iter()
            .map(|name| Candidate {
                id: Id::new(),
                name: name.to_string(),
                presentation: String::new(),
                symbolic: false,
            })
            .collect()
    }

    /// `n` ballots ranking the candidates in the order given by indices.
    fn ballots<const N: usize>(
        candidates: &[Candidate],
        groups: &[(usize, [usize; N])],
    ) -> Vec<RankedBallot> {
        let election_id = Id::new();
        groups
            .iter()
            .flat_map(|(n, order)| {
                let ranking: Vec<Id> = order.iter().map(|&i| candidates[i].id).collect();
                (0..*n).map(move |_| RankedBallot {
                    id: Id::new(),
                    election_id,
                    vote_time: Utc::now(),
                    ranking: ranking.clone(),
                })
            })
            .collect()
    }

    fn names(outcome: &Outcome) -> Vec<&str> {
        outcome.ranking.iter().map(|c| c.name.as_str()).collect()
    }

    const A: usize = 0;
    const B: usize = 1;
    const C: usize = 2;

    /// A beats B 5-3, B beats C 6-2, A and C tie 4-4.
    fn indirect_win() -> (Vec<Candidate>, Vec<RankedBallot>) {
        let cands = candidates(&["A", "B", "C"]);
        let ballots = ballots(
            &cands,
            &[(3, [A, B, C]), (1, [B, A, C]), (2, [B, C, A]), (2, [C, A, B])],
        );
        (cands, ballots)
    }

    #[test]
    fn pairwise_counts() {
        let (cands, ballots) = indirect_win();
        let prefer = prefer_matrix(&cands, &ballots);
        assert_eq!(prefer[A][B], 5);
        assert_eq!(prefer[B][A], 3);
        assert_eq!(prefer[B][C], 6);
        assert_eq!(prefer[C][B], 2);
        assert_eq!(prefer[A][C], 4);
        assert_eq!(prefer[C][A], 4);
        assert!((0..3).all(|i| prefer[i][i] == 0));
    }

    #[test]
    fn strongest_path_goes_through_intermediate() {
        let (cands, ballots) = indirect_win();
        let p = strongest_paths(&prefer_matrix(&cands, &ballots));
        assert_eq!(p[A][C], 5);
        assert_eq!(p[C][A], 4);
        assert_eq!(p[A][B], 5);
        assert_eq!(p[B][A], 4);
        assert_eq!(p[B][C], 6);
        assert_eq!(p[C][B], 4);
    }

    #[test]
    fn ranking_follows_strongest_paths() {
        let (cands, ballots) = indirect_win();
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = count(&cands, &ballots, &mut rng);

        assert_eq!(names(&outcome), vec!["A", "B", "C"]);
        assert_eq!(outcome.total_votes, 8);
        // Matrices are in ranking order, which here is the input order.
        assert_eq!(outcome.prefer, prefer_matrix(&cands, &ballots));
        assert_eq!(outcome.strongest_paths[0][2], 5);
    }

    #[test]
    fn condorcet_winner_first() {
        let cands = candidates(&["A", "B", "C", "D"]);
        // C beats everyone head to head.
        let ballots = ballots(
            &cands,
            &[
                (4, [C, A, B, 3]),
                (3, [A, C, 3, B]),
                (3, [B, 3, C, A]),
                (2, [3, C, B, A]),
            ],
        );
        for seed in 0..10 {
            let outcome = count(&cands, &ballots, &mut StdRng::seed_from_u64(seed));
            assert_eq!(outcome.ranking[0].name, "C");
        }
    }

    #[test]
    fn ranking_is_consistent_with_paths() {
        let cands = candidates(&["A", "B", "C", "D", "E"]);
        let ballots = ballots(
            &cands,
            &[
                (5, [0, 2, 1, 4, 3]),
                (5, [0, 3, 4, 2, 1]),
                (8, [1, 4, 3, 0, 2]),
                (3, [2, 0, 1, 4, 3]),
                (7, [2, 0, 4, 1, 3]),
                (2, [2, 1, 0, 3, 4]),
                (7, [3, 2, 4, 1, 0]),
                (8, [4, 1, 0, 3, 2]),
            ],
        );
        let mut rng = StdRng::seed_from_u64(42);
        let outcome = count(&cands, &ballots, &mut rng);
        let p = &outcome.strongest_paths;
        for a in 0..cands.len() {
            for b in a + 1..cands.len() {
                assert!(p[a][b] >= p[b][a], "{a} ranked above {b} but loses");
            }
        }
        // The well-known 45-voter example: E, A, C, B, D.
        assert_eq!(names(&outcome), vec!["E", "A", "C", "B", "D"]);
    }

    #[test]
    fn ties_are_shuffled() {
        let cands = candidates(&["A", "B", "C", "D"]);
        let mut rng = StdRng::seed_from_u64(1);
        // No ballots: everyone ties with everyone.
        let firsts: std::collections::HashSet<String> = (0..50)
            .map(|_| count(&cands, &[], &mut rng).ranking[0].name.clone())
            .collect();
        assert!(firsts.len() > 1);
    }
}
