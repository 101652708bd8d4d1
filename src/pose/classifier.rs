//! Trigger pose classification
//!
//! Both trigger poses start with the wrists brought together (palms joined).
//! Where the joined wrists sit vertically decides the label: level with the
//! elbows is START, level with the nose is STOP.

use super::landmarks::{BodyKeypoint, LandmarkSet};
use serde::{Deserialize, Serialize};

/// Default wrist proximity, as a fraction of shoulder width
pub const DEFAULT_PROXIMITY_RATIO: f32 = 0.4;

/// Default vertical alignment margin, as a fraction of shoulder width
pub const DEFAULT_ALIGNMENT_RATIO: f32 = 0.5;

/// Pose vocabulary understood by the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseLabel {
    None,
    Start,
    Stop,
}

impl Default for PoseLabel {
    fn default() -> Self {
        Self::None
    }
}

/// Geometric classifier with fixed thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseClassifier {
    proximity_ratio: f32,
    alignment_ratio: f32,
}

impl PoseClassifier {
    pub fn new(proximity_ratio: f32, alignment_ratio: f32) -> Self {
        Self {
            proximity_ratio,
            alignment_ratio,
        }
    }

    /// Classify the first subject of a detection; no subject means no pose
    pub fn classify_first(&self, subjects: &[LandmarkSet]) -> PoseLabel {
        subjects
            .first()
            .map(|landmarks| self.classify(landmarks))
            .unwrap_or(PoseLabel::None)
    }

    pub fn classify(&self, landmarks: &LandmarkSet) -> PoseLabel {
        let (
            Some(nose),
            Some(left_shoulder),
            Some(right_shoulder),
            Some(left_elbow),
            Some(right_elbow),
            Some(left_wrist),
            Some(right_wrist),
        ) = (
            landmarks.keypoint(BodyKeypoint::Nose),
            landmarks.keypoint(BodyKeypoint::LeftShoulder),
            landmarks.keypoint(BodyKeypoint::RightShoulder),
            landmarks.keypoint(BodyKeypoint::LeftElbow),
            landmarks.keypoint(BodyKeypoint::RightElbow),
            landmarks.keypoint(BodyKeypoint::LeftWrist),
            landmarks.keypoint(BodyKeypoint::RightWrist),
        )
        else {
            return PoseLabel::None;
        };

        let shoulder_width = left_shoulder.planar_distance(right_shoulder);
        let wrist_distance = left_wrist.planar_distance(right_wrist);

        if wrist_distance > shoulder_width * self.proximity_ratio {
            return PoseLabel::None;
        }

        let wrist_center_y = (left_wrist.y + right_wrist.y) / 2.0;
        let elbow_center_y = (left_elbow.y + right_elbow.y) / 2.0;
        let alignment_margin = shoulder_width * self.alignment_ratio;

        if (wrist_center_y - elbow_center_y).abs() < alignment_margin {
            PoseLabel::Start
        } else if (wrist_center_y - nose.y).abs() < alignment_margin {
            PoseLabel::Stop
        } else {
            PoseLabel::None
        }
    }
}

impl Default for PoseClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PROXIMITY_RATIO, DEFAULT_ALIGNMENT_RATIO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::landmarks::Landmark;
    use crate::pose::scripted::{synthesize, ScriptedPose};

    #[test]
    fn test_start_geometry() {
        let classifier = PoseClassifier::default();
        assert_eq!(classifier.classify(&synthesize(ScriptedPose::Start)), PoseLabel::Start);
    }

    #[test]
    fn test_stop_geometry() {
        let classifier = PoseClassifier::default();
        assert_eq!(classifier.classify(&synthesize(ScriptedPose::Stop)), PoseLabel::Stop);
    }

    #[test]
    fn test_neutral_geometry() {
        let classifier = PoseClassifier::default();
        assert_eq!(classifier.classify(&synthesize(ScriptedPose::Neutral)), PoseLabel::None);
        assert_eq!(classifier.classify(&synthesize(ScriptedPose::Absent)), PoseLabel::None);
    }

    #[test]
    fn test_any_missing_required_keypoint_is_none() {
        let classifier = PoseClassifier::default();
        for pose in [ScriptedPose::Start, ScriptedPose::Stop] {
            for keypoint in BodyKeypoint::REQUIRED {
                let mut landmarks = synthesize(pose);
                landmarks.clear(keypoint.index());
                assert_eq!(
                    classifier.classify(&landmarks),
                    PoseLabel::None,
                    "{:?} without {:?}",
                    pose,
                    keypoint
                );
            }
        }
    }

    #[test]
    fn test_short_landmark_set_is_none() {
        let classifier = PoseClassifier::default();
        let landmarks = LandmarkSet::new(vec![Landmark::new(0.5, 0.5); 12]);
        assert_eq!(classifier.classify(&landmarks), PoseLabel::None);
    }

    #[test]
    fn test_wrists_apart_is_none_regardless_of_height() {
        let classifier = PoseClassifier::default();
        // Shoulder width is 0.2, so anything past 0.08 apart is rejected.
        for y in [0.2_f32, 0.22, 0.6] {
            let mut landmarks = synthesize(ScriptedPose::Start);
            landmarks.set(BodyKeypoint::LeftWrist.index(), Landmark::new(0.45, y));
            landmarks.set(BodyKeypoint::RightWrist.index(), Landmark::new(0.55, y));
            assert_eq!(classifier.classify(&landmarks), PoseLabel::None);
        }
    }

    #[test]
    fn test_elbow_alignment_wins_over_nose() {
        // Nose and elbows at the same height: START is checked first.
        let classifier = PoseClassifier::default();
        let mut landmarks = synthesize(ScriptedPose::Start);
        landmarks.set(BodyKeypoint::Nose.index(), Landmark::new(0.5, 0.6));
        assert_eq!(classifier.classify(&landmarks), PoseLabel::Start);
    }

    #[test]
    fn test_ratios_are_configurable() {
        let strict = PoseClassifier::new(0.05, 0.5);
        assert_eq!(strict.classify(&synthesize(ScriptedPose::Start)), PoseLabel::None);

        let narrow = PoseClassifier::new(0.4, 0.05);
        assert_eq!(narrow.classify(&synthesize(ScriptedPose::Stop)), PoseLabel::None);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = PoseClassifier::default();
        let landmarks = synthesize(ScriptedPose::Stop);
        let first = classifier.classify(&landmarks);
        for _ in 0..10 {
            assert_eq!(classifier.classify(&landmarks), first);
        }
    }

    #[test]
    fn test_only_first_subject_counts() {
        let classifier = PoseClassifier::default();
        let subjects = vec![synthesize(ScriptedPose::Neutral), synthesize(ScriptedPose::Start)];
        assert_eq!(classifier.classify_first(&subjects), PoseLabel::None);
        assert_eq!(classifier.classify_first(&[]), PoseLabel::None);
    }
}
