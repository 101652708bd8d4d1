//! Body landmark types
//!
//! Landmarks use the 33-point body topology: coordinates are normalized to
//! the frame (0.0..1.0, y grows downward).

use serde::{Deserialize, Serialize};

/// Number of keypoints in the full body topology
pub const BODY_KEYPOINT_COUNT: usize = 33;

/// A single normalized keypoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Depth relative to the hips, when the estimator provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            visibility: None,
        }
    }

    /// Euclidean distance in the image plane, ignoring depth
    pub fn planar_distance(&self, other: &Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Keypoints the trigger classifier reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKeypoint {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
}

impl BodyKeypoint {
    pub const REQUIRED: [BodyKeypoint; 7] = [
        BodyKeypoint::Nose,
        BodyKeypoint::LeftShoulder,
        BodyKeypoint::RightShoulder,
        BodyKeypoint::LeftElbow,
        BodyKeypoint::RightElbow,
        BodyKeypoint::LeftWrist,
        BodyKeypoint::RightWrist,
    ];

    /// Slot index in a body landmark set
    pub fn index(self) -> usize {
        match self {
            BodyKeypoint::Nose => 0,
            BodyKeypoint::LeftShoulder => 11,
            BodyKeypoint::RightShoulder => 12,
            BodyKeypoint::LeftElbow => 13,
            BodyKeypoint::RightElbow => 14,
            BodyKeypoint::LeftWrist => 15,
            BodyKeypoint::RightWrist => 16,
        }
    }
}

/// All landmarks of one subject in one frame.
///
/// Slots may be empty when the estimator could not place a keypoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Option<Landmark>>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self {
            points: points.into_iter().map(Some).collect(),
        }
    }

    pub fn from_slots(points: Vec<Option<Landmark>>) -> Self {
        Self { points }
    }

    /// A full-size set with every slot empty
    pub fn empty_body() -> Self {
        Self {
            points: vec![None; BODY_KEYPOINT_COUNT],
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.iter().all(Option::is_none)
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index).and_then(Option::as_ref)
    }

    pub fn keypoint(&self, keypoint: BodyKeypoint) -> Option<&Landmark> {
        self.get(keypoint.index())
    }

    /// Place a landmark, growing the set when the index is past the end
    pub fn set(&mut self, index: usize, landmark: Landmark) {
        if index >= self.points.len() {
            self.points.resize(index + 1, None);
        }
        self.points[index] = Some(landmark);
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(slot) = self.points.get_mut(index) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_distance_ignores_depth() {
        let a = Landmark {
            x: 0.0,
            y: 0.0,
            z: Some(5.0),
            visibility: None,
        };
        let b = Landmark::new(0.3, 0.4);
        assert!((a.planar_distance(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_slot_is_absent() {
        let set = LandmarkSet::new(vec![Landmark::new(0.5, 0.5)]);
        assert!(set.keypoint(BodyKeypoint::Nose).is_some());
        assert!(set.keypoint(BodyKeypoint::RightWrist).is_none());
    }

    #[test]
    fn test_set_grows_and_clear_empties() {
        let mut set = LandmarkSet::default();
        set.set(BodyKeypoint::LeftWrist.index(), Landmark::new(0.1, 0.2));
        assert_eq!(set.len(), 16);
        assert!(set.keypoint(BodyKeypoint::LeftWrist).is_some());

        set.clear(BodyKeypoint::LeftWrist.index());
        assert!(set.is_empty());
    }

    #[test]
    fn test_deserializes_null_slots() {
        let set: LandmarkSet =
            serde_json::from_str(r#"[{"x":0.5,"y":0.2},null,{"x":0.1,"y":0.9,"visibility":0.8}]"#)
                .unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.get(1).is_none());
        assert_eq!(set.get(2).and_then(|l| l.visibility), Some(0.8));
    }
}
