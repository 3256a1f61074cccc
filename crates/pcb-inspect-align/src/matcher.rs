//! Brute-force Hamming matching with a mutual-best constraint.

use crate::Descriptor;

/// A correspondence between `query[query]` and `train[train]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub query: usize,
    pub train: usize,
    /// Hamming distance between the two descriptors.
    pub distance: u32,
}

// First index with the smallest distance.
fn nearest(d: &Descriptor, candidates: &[Descriptor]) -> Option<(usize, u32)> {
    let mut best: Option<(usize, u32)> = None;
    for (i, c) in candidates.iter().enumerate() {
        let h = d.hamming(c);
        match best {
            Some((_, bh)) if h >= bh => {}
            _ => {
                best = Some((i, h));
                if h == 0 {
                    break;
                }
            }
        }
    }
    best
}

/// Match every query descriptor to its nearest train descriptor and keep the
/// pair only if the query is also the nearest neighbour of that train
/// descriptor. Output is ordered by query index.
pub fn match_cross_checked(query: &[Descriptor], train: &[Descriptor]) -> Vec<Match> {
    if query.is_empty() || train.is_empty() {
        return Vec::new();
    }
    let backward: Vec<Option<usize>> = train
        .iter()
        .map(|t| nearest(t, query).map(|(i, _)| i))
        .collect();

    query
        .iter()
        .enumerate()
        .filter_map(|(qi, q)| {
            let (ti, distance) = nearest(q, train)?;
            (backward[ti] == Some(qi)).then_some(Match {
                query: qi,
                train: ti,
                distance,
            })
        })
        .collect()
}

/// Sort ascending by distance (ties keep their order) and keep the first
/// `floor(len * fraction)` matches.
pub fn retain_best_fraction(mut matches: Vec<Match>, fraction: f32) -> Vec<Match> {
    matches.sort_by_key(|m| m.distance);
    let keep = (matches.len() as f64 * fraction.clamp(0.0, 1.0) as f64).floor() as usize;
    matches.truncate(keep);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(bits: &[usize]) -> Descriptor {
        let mut d = [0u8; 32];
        for &b in bits {
            d[b / 8] |= 1 << (b % 8);
        }
        Descriptor(d)
    }

    #[test]
    fn cross_check_rejects_one_sided_matches() {
        let query = [desc(&[0, 1, 2]), desc(&[0, 1, 2, 3])];
        let train = [desc(&[0, 1, 2])];
        let m = match_cross_checked(&query, &train);
        assert_eq!(
            m,
            vec![Match {
                query: 0,
                train: 0,
                distance: 0
            }]
        );
    }

    #[test]
    fn empty_sets_give_no_matches() {
        assert!(match_cross_checked(&[], &[desc(&[1])]).is_empty());
        assert!(match_cross_checked(&[desc(&[1])], &[]).is_empty());
    }

    #[test]
    fn ties_resolve_to_first_candidate() {
        let query = [desc(&[5])];
        let train = [desc(&[6]), desc(&[7])];
        let m = match_cross_checked(&query, &train);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].train, 0);
        assert_eq!(m[0].distance, 2);
    }

    #[test]
    fn retains_floor_of_fraction_in_distance_order() {
        let matches: Vec<Match> = [9u32, 3, 7, 3, 1, 5, 8]
            .iter()
            .enumerate()
            .map(|(i, &d)| Match {
                query: i,
                train: i,
                distance: d,
            })
            .collect();
        let kept = retain_best_fraction(matches.clone(), 0.5);
        assert_eq!(kept.len(), 3);
        assert_eq!(
            kept.iter().map(|m| m.query).collect::<Vec<_>>(),
            vec![4, 1, 3]
        );
        assert!(retain_best_fraction(matches[..6].to_vec(), 0.15).is_empty());
    }
}
