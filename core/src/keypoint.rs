use nalgebra::Point2;

/// Detected location in the pixel frame of the raster it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub response: f64,
}

impl KeyPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            size: 1.0,
            response: 0.0,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_response(mut self, response: f64) -> Self {
        self.response = response;
        self
    }

    pub fn pt(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    pub fn scaled_pt(&self, scale: f64) -> Point2<f64> {
        Point2::new(self.x * scale, self.y * scale)
    }
}

impl Default for KeyPoint {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// One matched pair: `query_idx` indexes the source keypoints, `train_idx`
/// the destination keypoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

impl Correspondence {
    pub fn new(query_idx: usize, train_idx: usize, distance: f32) -> Self {
        Self {
            query_idx,
            train_idx,
            distance,
        }
    }

    /// Same pair seen from the other side.
    pub fn swapped(&self) -> Self {
        Self::new(self.train_idx, self.query_idx, self.distance)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyPoints {
    pub keypoints: Vec<KeyPoint>,
}

impl KeyPoints {
    pub fn new() -> Self {
        Self {
            keypoints: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keypoints: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, kp: KeyPoint) {
        self.keypoints.push(kp);
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&KeyPoint> {
        self.keypoints.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyPoint> {
        self.keypoints.iter()
    }
}

impl From<Vec<KeyPoint>> for KeyPoints {
    fn from(keypoints: Vec<KeyPoint>) -> Self {
        Self { keypoints }
    }
}

impl FromIterator<KeyPoint> for KeyPoints {
    fn from_iter<I: IntoIterator<Item = KeyPoint>>(iter: I) -> Self {
        Self {
            keypoints: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypoint_builder() {
        let kp = KeyPoint::new(3.0, 4.0).with_response(12.5).with_size(31.0);
        assert_eq!(kp.pt(), Point2::new(3.0, 4.0));
        assert_eq!(kp.response, 12.5);
        assert_eq!(kp.size, 31.0);
    }

    #[test]
    fn scaled_pt_multiplies_both_axes() {
        let kp = KeyPoint::new(10.0, 20.0);
        assert_eq!(kp.scaled_pt(0.5), Point2::new(5.0, 10.0));
    }

    #[test]
    fn correspondence_swap() {
        let c = Correspondence::new(2, 7, 3.0);
        assert_eq!(c.swapped(), Correspondence::new(7, 2, 3.0));
        assert_eq!(c.swapped().swapped(), c);
    }

    #[test]
    fn keypoints_collect() {
        let kps: KeyPoints = (0..3).map(|i| KeyPoint::new(i as f64, 0.0)).collect();
        assert_eq!(kps.len(), 3);
        assert_eq!(kps.get(2).map(|k| k.x), Some(2.0));
        assert!(kps.get(3).is_none());
    }
}
