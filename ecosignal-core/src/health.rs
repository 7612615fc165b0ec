//! Public health guidance per AQI level
//!
//! Fixed advice attached to the network snapshot for its average AQI level.
//! Very Poor conditions fall in the Severe band here, so they get the
//! Severe text.

use serde::Serialize;

use crate::classifier::AqiLevel;

/// Groups the sensitive-group advice is addressed to
pub const SENSITIVE_GROUPS: [&str; 3] = ["Children", "Elderly", "People with respiratory diseases"];

/// Activities to stop when `restrict_strenuous_activity` is set
pub const STRENUOUS_ACTIVITIES: [&str; 3] = ["Outdoor sports", "Construction", "Heavy exercise"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthGuidance {
    pub level: AqiLevel,
    pub general: &'static str,
    pub sensitive_groups: &'static str,
    pub driving_caution: bool,
    pub work_from_home: bool,
    pub mask_recommended: bool,
    pub restrict_strenuous_activity: bool,
}

/// One row per level, ascending
pub const HEALTH_GUIDANCE: [HealthGuidance; 5] = [
    HealthGuidance {
        level: AqiLevel::Good,
        general: "Air quality is good. Outdoor activities are safe.",
        sensitive_groups: "No restrictions.",
        driving_caution: false,
        work_from_home: false,
        mask_recommended: false,
        restrict_strenuous_activity: false,
    },
    HealthGuidance {
        level: AqiLevel::Satisfactory,
        general: "Air quality is satisfactory for most people.",
        sensitive_groups: "Limit prolonged outdoor exertion.",
        driving_caution: false,
        work_from_home: false,
        mask_recommended: false,
        restrict_strenuous_activity: false,
    },
    HealthGuidance {
        level: AqiLevel::Moderate,
        general: "Reduce time outdoors and wear a mask when outside.",
        sensitive_groups: "Stay indoors where possible.",
        driving_caution: true,
        work_from_home: false,
        mask_recommended: true,
        restrict_strenuous_activity: false,
    },
    HealthGuidance {
        level: AqiLevel::Poor,
        general: "Limit outdoor activity and use N95 masks.",
        sensitive_groups: "Stay indoors and avoid all outdoor activity.",
        driving_caution: true,
        work_from_home: true,
        mask_recommended: true,
        restrict_strenuous_activity: true,
    },
    HealthGuidance {
        level: AqiLevel::Severe,
        general: "Health emergency. Stay indoors and minimise travel.",
        sensitive_groups: "Keep windows closed and seek medical advice on symptoms.",
        driving_caution: true,
        work_from_home: true,
        mask_recommended: true,
        restrict_strenuous_activity: true,
    },
];

pub fn health_guidance(level: AqiLevel) -> &'static HealthGuidance {
    match level {
        AqiLevel::Good => &HEALTH_GUIDANCE[0],
        AqiLevel::Satisfactory => &HEALTH_GUIDANCE[1],
        AqiLevel::Moderate => &HEALTH_GUIDANCE[2],
        AqiLevel::Poor => &HEALTH_GUIDANCE[3],
        AqiLevel::Severe => &HEALTH_GUIDANCE[4],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_row_per_level_in_order() {
        for (row, level) in HEALTH_GUIDANCE.iter().zip(AqiLevel::ALL) {
            assert_eq!(row.level, level);
            assert_eq!(health_guidance(level).level, level);
        }
    }

    #[test]
    fn precautions_only_tighten() {
        for pair in HEALTH_GUIDANCE.windows(2) {
            let (lower, higher) = (&pair[0], &pair[1]);
            assert!(higher.driving_caution >= lower.driving_caution);
            assert!(higher.work_from_home >= lower.work_from_home);
            assert!(higher.mask_recommended >= lower.mask_recommended);
            assert!(higher.restrict_strenuous_activity >= lower.restrict_strenuous_activity);
        }
    }

    #[test]
    fn poor_air_sends_people_home() {
        let guidance = health_guidance(AqiLevel::Poor);
        assert!(guidance.work_from_home);
        assert!(guidance.restrict_strenuous_activity);
        assert!(!health_guidance(AqiLevel::Moderate).work_from_home);
    }
}
