use cv_core::{Correspondence, Descriptor, Descriptors};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Mutual-best brute-force matcher.
///
/// A pair `(i, j)` survives only when `j` is the nearest neighbour of query
/// descriptor `i` and `i` is the nearest neighbour of train descriptor `j`.
/// Equal distances resolve to the lower index on both sides, so matching
/// `(a, b)` yields exactly the swapped pairs of matching `(b, a)`.
#[derive(Debug, Clone)]
pub struct Matcher {
    max_matches: usize,
    ratio_threshold: Option<f32>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            max_matches: 50,
            ratio_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Nearest {
    index: usize,
    distance: f32,
    second: Option<f32>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_matches(mut self, max_matches: usize) -> Self {
        self.max_matches = max_matches;
        self
    }

    /// Lowe's ratio test, applied from both sides so the result stays
    /// symmetric.
    pub fn with_ratio_test(mut self, threshold: f32) -> Self {
        self.ratio_threshold = Some(threshold);
        self
    }

    pub fn max_matches(&self) -> usize {
        self.max_matches
    }

    pub fn match_descriptors(&self, query: &Descriptors, train: &Descriptors) -> Vec<Correspondence> {
        self.match_with_limit(query, train, self.max_matches)
    }

    pub fn match_with_limit(
        &self,
        query: &Descriptors,
        train: &Descriptors,
        max_count: usize,
    ) -> Vec<Correspondence> {
        if query.is_empty() || train.is_empty() || max_count == 0 {
            return Vec::new();
        }

        let forward = nearest_neighbours(&query.descriptors, &train.descriptors);
        let backward = nearest_neighbours(&train.descriptors, &query.descriptors);

        let mut matches: Vec<Correspondence> = forward
            .iter()
            .enumerate()
            .filter_map(|(q, nn)| {
                let nn = (*nn)?;
                let back = backward[nn.index]?;
                if back.index != q {
                    return None;
                }
                if !self.passes_ratio(&nn) || !self.passes_ratio(&back) {
                    return None;
                }
                Some(Correspondence::new(q, nn.index, nn.distance))
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then(a.query_idx.cmp(&b.query_idx))
                .then(a.train_idx.cmp(&b.train_idx))
        });
        matches.truncate(max_count);
        matches
    }

    fn passes_ratio(&self, nn: &Nearest) -> bool {
        match (self.ratio_threshold, nn.second) {
            (Some(ratio), Some(second)) => nn.distance < ratio * second,
            _ => true,
        }
    }
}

/// Convenience wrapper with the default policy.
pub fn match_descriptors(query: &Descriptors, train: &Descriptors, max_count: usize) -> Vec<Correspondence> {
    Matcher::new().match_with_limit(query, train, max_count)
}

fn nearest_neighbours(from: &[Descriptor], to: &[Descriptor]) -> Vec<Option<Nearest>> {
    from.par_iter()
        .map(|d| {
            let mut best: Option<Nearest> = None;
            for (idx, candidate) in to.iter().enumerate() {
                let Some(distance) = d.distance(candidate) else {
                    continue;
                };
                best = match best {
                    None => Some(Nearest {
                        index: idx,
                        distance,
                        second: None,
                    }),
                    // strict comparison keeps the lowest index on ties
                    Some(b) if distance < b.distance => Some(Nearest {
                        index: idx,
                        distance,
                        second: Some(b.distance),
                    }),
                    Some(mut b) => {
                        if b.second.map_or(true, |s| distance < s) {
                            b.second = Some(distance);
                        }
                        Some(b)
                    }
                };
            }
            best
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(bytes: &[u8]) -> Descriptor {
        Descriptor::Binary(bytes.to_vec())
    }

    #[test]
    fn empty_input_gives_no_matches() {
        let a: Descriptors = vec![bin(&[1])].into();
        assert!(match_descriptors(&a, &Descriptors::new(), 10).is_empty());
        assert!(match_descriptors(&Descriptors::new(), &a, 10).is_empty());
    }

    #[test]
    fn mutual_best_drops_many_to_one() {
        // both queries prefer train 0, but train 0 prefers query 0
        let q: Descriptors = vec![bin(&[0b0000_0000]), bin(&[0b0000_0001])].into();
        let t: Descriptors = vec![bin(&[0b0000_0000]), bin(&[0b1111_1111])].into();
        let m = match_descriptors(&q, &t, 10);
        assert_eq!(m, vec![Correspondence::new(0, 0, 0.0)]);
    }

    #[test]
    fn sorted_by_distance_and_truncated() {
        let q: Descriptors = vec![bin(&[0b0000_0011]), bin(&[0b1111_0000]), bin(&[0b0011_1100])].into();
        let t: Descriptors = vec![bin(&[0b0000_0001]), bin(&[0b1111_0000]), bin(&[0b0011_1111])].into();
        let m = match_descriptors(&q, &t, 10);
        let d: Vec<f32> = m.iter().map(|c| c.distance).collect();
        assert_eq!(d, vec![0.0, 1.0, 2.0]);
        assert_eq!(m[0], Correspondence::new(1, 1, 0.0));

        let capped = match_descriptors(&q, &t, 2);
        assert_eq!(capped, m[..2].to_vec());
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        let q: Descriptors = vec![bin(&[0b0000_0000])].into();
        let t: Descriptors = vec![bin(&[0b0000_0001]), bin(&[0b0000_0010])].into();
        let m = match_descriptors(&q, &t, 10);
        assert_eq!(m, vec![Correspondence::new(0, 0, 1.0)]);
    }

    #[test]
    fn float_descriptors_use_euclidean() {
        let q: Descriptors = vec![Descriptor::Float(vec![0.0, 0.0])].into();
        let t: Descriptors = vec![Descriptor::Float(vec![3.0, 4.0]), Descriptor::Float(vec![10.0, 0.0])].into();
        let m = match_descriptors(&q, &t, 10);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].train_idx, 0);
        assert!((m[0].distance - 5.0).abs() < 1e-6);
    }

    #[test]
    fn mixed_kinds_never_match() {
        let q: Descriptors = vec![bin(&[0])].into();
        let t: Descriptors = vec![Descriptor::Float(vec![0.0])].into();
        assert!(match_descriptors(&q, &t, 10).is_empty());
    }

    #[test]
    fn ratio_test_rejects_ambiguous_pairs() {
        let q: Descriptors = vec![bin(&[0b0000_0000])].into();
        let t: Descriptors = vec![bin(&[0b0000_0001]), bin(&[0b0000_0011])].into();
        assert_eq!(match_descriptors(&q, &t, 10).len(), 1);
        let strict = Matcher::new().with_ratio_test(0.4);
        assert!(strict.match_descriptors(&q, &t).is_empty());
    }
}
