/// Feature vector attached one-to-one to a keypoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    /// Bit string compared with Hamming distance.
    Binary(Vec<u8>),
    /// Real vector compared with Euclidean distance.
    Float(Vec<f32>),
}

impl Descriptor {
    pub fn size(&self) -> usize {
        match self {
            Descriptor::Binary(data) => data.len(),
            Descriptor::Float(data) => data.len(),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Descriptor::Binary(_))
    }

    pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
    }

    pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }

    /// Dissimilarity under the metric matching the descriptor type, or `None`
    /// when the two descriptors are of different kinds or lengths.
    pub fn distance(&self, other: &Descriptor) -> Option<f32> {
        match (self, other) {
            (Descriptor::Binary(a), Descriptor::Binary(b)) if a.len() == b.len() => {
                Some(Self::hamming_distance(a, b) as f32)
            }
            (Descriptor::Float(a), Descriptor::Float(b)) if a.len() == b.len() => {
                Some(Self::euclidean_distance(a, b))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Descriptors {
    pub descriptors: Vec<Descriptor>,
}

impl Descriptors {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            descriptors: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, desc: Descriptor) {
        self.descriptors.push(desc);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        self.descriptors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }
}

impl From<Vec<Descriptor>> for Descriptors {
    fn from(descriptors: Vec<Descriptor>) -> Self {
        Self { descriptors }
    }
}

impl FromIterator<Descriptor> for Descriptors {
    fn from_iter<I: IntoIterator<Item = Descriptor>>(iter: I) -> Self {
        Self {
            descriptors: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hamming_identical_is_zero() {
        let d = Descriptor::Binary(vec![0b1010_1010, 0b1111_0000, 0b0000_1111]);
        assert_eq!(d.distance(&d), Some(0.0));
    }

    #[test]
    fn hamming_all_different_is_max() {
        let a = Descriptor::Binary(vec![0xFF; 4]);
        let b = Descriptor::Binary(vec![0x00; 4]);
        assert_eq!(a.distance(&b), Some(32.0)); // 4 bytes × 8 bits
    }

    #[test]
    fn hamming_partial_overlap() {
        let a = Descriptor::Binary(vec![0b1111_0000]);
        let b = Descriptor::Binary(vec![0b1110_0001]);
        assert_eq!(a.distance(&b), Some(2.0));
    }

    #[test]
    fn euclidean_distance() {
        let a = Descriptor::Float(vec![0.0, 0.0]);
        let b = Descriptor::Float(vec![3.0, 4.0]);
        assert_eq!(a.distance(&b), Some(5.0));
    }

    #[test]
    fn mixed_kinds_do_not_compare() {
        let a = Descriptor::Binary(vec![0; 4]);
        let b = Descriptor::Float(vec![0.0; 4]);
        assert_eq!(a.distance(&b), None);
        let c = Descriptor::Binary(vec![0; 8]);
        assert_eq!(a.distance(&c), None);
    }

    #[test]
    fn descriptors_collect_and_len() {
        let ds: Descriptors = (0..3u8).map(|i| Descriptor::Binary(vec![i; 8])).collect();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.get(1).map(Descriptor::size), Some(8));
        assert!(Descriptors::default().is_empty());
    }
}
