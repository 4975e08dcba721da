// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Constraint grammar for light effect assignments.
//!
//! Checks are pure functions of a single candidate record. Violation
//! messages are tagged with the beat index and group key so they can be
//! relayed verbatim to the generation service as corrective feedback.

use std::fmt;

use super::{
    CandidateEffect, FieldValue, GroupLightEffect, GroupType, COLOR_EFFECT, GROUP_LIGHT_KEY,
    INTENSITY_EFFECT, MAX_COLOR_EFFECT, MAX_GROUP_LIGHT_KEY, MAX_INTENSITY_EFFECT,
    MAX_MOTION_EFFECT, MAX_VFX_EFFECT, MOTION_EFFECT, REQUIRED_FIELDS, VFX_EFFECT,
};

/// Valid range per field, in report order
const RANGES: [(&str, i64); 5] = [
    (MOTION_EFFECT, MAX_MOTION_EFFECT),
    (COLOR_EFFECT, MAX_COLOR_EFFECT),
    (INTENSITY_EFFECT, MAX_INTENSITY_EFFECT),
    (VFX_EFFECT, MAX_VFX_EFFECT),
    (GROUP_LIGHT_KEY, MAX_GROUP_LIGHT_KEY),
];

/// What rule a violation broke
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    /// A required field is absent
    MissingField { field: &'static str },
    /// A field value lies outside its enum domain
    OutOfRange { field: &'static str, value: FieldValue },
    /// The group type requires this field to be off
    MustBeZero {
        group: GroupType,
        field: &'static str,
        value: FieldValue,
    },
    /// VFX groups must carry a VFX effect
    VfxRequired,
    /// Motion effect not in the group's allowed subset
    MotionNotAllowed { group: GroupType, value: FieldValue },
    /// The beat has no effects while empty beats are disallowed
    EmptySet,
    /// A light group has every effect field off while empty beats are disallowed
    NoActiveEffect,
}

/// A single constraint violation
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Beat the offending record belongs to
    pub beat_index: usize,
    /// Raw group key of the offending record, if it had one
    pub group_key: Option<FieldValue>,
    /// The broken rule
    pub kind: ViolationKind,
}

impl Violation {
    fn new(beat_index: usize, group_key: Option<FieldValue>, kind: ViolationKind) -> Self {
        Self {
            beat_index,
            group_key,
            kind,
        }
    }

    /// True for policy violations, as opposed to grammar violations
    pub fn is_policy(&self) -> bool {
        matches!(self.kind, ViolationKind::EmptySet | ViolationKind::NoActiveEffect)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let beat = self.beat_index;
        let key = match &self.group_key {
            Some(k) => k.to_string(),
            None => "None".to_string(),
        };
        match &self.kind {
            ViolationKind::MissingField { field } => {
                write!(f, "Beat {}: missing field '{}'", beat, field)
            }
            ViolationKind::OutOfRange { field, value } => {
                write!(f, "Beat {}, key {}: {}={} out of range", beat, key, field, value)
            }
            ViolationKind::MustBeZero {
                group,
                field,
                value,
            } => write!(
                f,
                "Beat {}, {} key {}: {} should be 0, got {}",
                beat,
                group.label(),
                key,
                field,
                value
            ),
            ViolationKind::VfxRequired => {
                write!(f, "Beat {}, VFX key {}: VfxEffect should not be 0", beat, key)
            }
            ViolationKind::MotionNotAllowed { group, value } => {
                let hint = match group {
                    GroupType::Single => "use 3-6",
                    _ => "use 1-2",
                };
                write!(
                    f,
                    "Beat {}, {} key {}: MotionEffect={} not recommended ({})",
                    beat,
                    group.label(),
                    key,
                    value,
                    hint
                )
            }
            ViolationKind::EmptySet => write!(
                f,
                "Beat {}: effects list is empty, at least one active groupLight is required",
                beat
            ),
            ViolationKind::NoActiveEffect => write!(
                f,
                "Beat {}, key {}: every effect is 0, each groupLight needs at least one active effect",
                beat, key
            ),
        }
    }
}

fn is_zero(value: &FieldValue) -> bool {
    value.as_int() == Some(0)
}

/// Validate one candidate record against the constraint grammar.
///
/// Returns an empty list when the record is valid. A missing required field
/// is reported alone, with no further checks on that record.
pub fn validate(candidate: &CandidateEffect, beat_index: usize) -> Vec<Violation> {
    let key = candidate.group_light_key.clone();

    for field in REQUIRED_FIELDS {
        if candidate.field(field).is_none() {
            return vec![Violation::new(
                beat_index,
                key,
                ViolationKind::MissingField { field },
            )];
        }
    }

    let mut violations = Vec::new();
    let value = |field: &str| candidate.field(field).cloned().unwrap_or(FieldValue::Int(0));

    for (field, max) in RANGES {
        let v = value(field);
        let in_range = matches!(v.as_int(), Some(n) if (0..=max).contains(&n));
        if !in_range {
            violations.push(Violation::new(
                beat_index,
                key.clone(),
                ViolationKind::OutOfRange { field, value: v },
            ));
        }
    }

    let group = match key.as_ref().and_then(FieldValue::as_int).and_then(GroupType::from_key) {
        Some(group) => group,
        None => return violations,
    };

    let motion = value(MOTION_EFFECT);
    let vfx = value(VFX_EFFECT);

    match group {
        GroupType::Vfx => {
            for field in [MOTION_EFFECT, COLOR_EFFECT, INTENSITY_EFFECT] {
                let v = value(field);
                if !is_zero(&v) {
                    violations.push(Violation::new(
                        beat_index,
                        key.clone(),
                        ViolationKind::MustBeZero {
                            group,
                            field,
                            value: v,
                        },
                    ));
                }
            }
            if is_zero(&vfx) {
                violations.push(Violation::new(beat_index, key, ViolationKind::VfxRequired));
            }
        }
        GroupType::Single | GroupType::Multi => {
            let allowed =
                matches!(motion.as_int(), Some(m) if group.allowed_motions().contains(&m));
            if !allowed {
                violations.push(Violation::new(
                    beat_index,
                    key.clone(),
                    ViolationKind::MotionNotAllowed {
                        group,
                        value: motion,
                    },
                ));
            }
            if !is_zero(&vfx) {
                violations.push(Violation::new(
                    beat_index,
                    key,
                    ViolationKind::MustBeZero {
                        group,
                        field: VFX_EFFECT,
                        value: vfx,
                    },
                ));
            }
        }
    }

    violations
}

/// Validate every record proposed for one beat
pub fn validate_all(candidates: &[CandidateEffect], beat_index: usize) -> Vec<Violation> {
    candidates
        .iter()
        .flat_map(|c| validate(c, beat_index))
        .collect()
}

/// Policy checks for configurations that forbid empty beats.
///
/// These sit outside the grammar: with `allow_empty` set they never fire.
pub fn policy_violations(
    candidates: &[CandidateEffect],
    beat_index: usize,
    allow_empty: bool,
) -> Vec<Violation> {
    if allow_empty {
        return Vec::new();
    }
    if candidates.is_empty() {
        return vec![Violation::new(beat_index, None, ViolationKind::EmptySet)];
    }
    candidates
        .iter()
        .filter(|c| {
            [MOTION_EFFECT, COLOR_EFFECT, INTENSITY_EFFECT, VFX_EFFECT]
                .iter()
                .all(|field| c.int(field) == Some(0))
        })
        .map(|c| {
            Violation::new(
                beat_index,
                c.group_light_key.clone(),
                ViolationKind::NoActiveEffect,
            )
        })
        .collect()
}

/// Non-blocking recommendations for an accepted effect.
///
/// Light groups with active motion should also set color and intensity.
pub fn advisories(effect: &GroupLightEffect, beat_index: usize) -> Vec<String> {
    let mut notes = Vec::new();
    if let Some(group @ (GroupType::Single | GroupType::Multi)) = effect.group_type() {
        if effect.motion != 0 {
            if effect.color == 0 {
                notes.push(format!(
                    "Beat {}, {} key {}: MotionEffect active without ColorEffect",
                    beat_index,
                    group.label(),
                    effect.group_light_key
                ));
            }
            if effect.intensity == 0 {
                notes.push(format!(
                    "Beat {}, {} key {}: MotionEffect active without IntensityEffect",
                    beat_index,
                    group.label(),
                    effect.group_light_key
                ));
            }
        }
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn messages(violations: &[Violation]) -> Vec<String> {
        violations.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_valid_examples() {
        let valid = [
            CandidateEffect::from_values(0, 0, 0, 0, 1),
            CandidateEffect::from_values(1, 0, 0, 0, 2),
            CandidateEffect::from_values(2, 3, 1, 1, 0),
            CandidateEffect::from_values(3, 6, 3, 4, 0),
            CandidateEffect::from_values(3, 0, 2, 0, 0),
            CandidateEffect::from_values(4, 1, 2, 3, 0),
            CandidateEffect::from_values(6, 2, 0, 0, 0),
            CandidateEffect::from_values(5, 0, 0, 0, 0),
        ];
        for candidate in &valid {
            assert!(validate(candidate, 0).is_empty(), "{:?}", candidate);
        }
    }

    #[test]
    fn test_vfx_group_rules() {
        let v = validate(&CandidateEffect::from_values(0, 2, 1, 3, 0), 10);
        assert_eq!(
            messages(&v),
            vec![
                "Beat 10, VFX key 0: MotionEffect should be 0, got 2",
                "Beat 10, VFX key 0: ColorEffect should be 0, got 1",
                "Beat 10, VFX key 0: IntensityEffect should be 0, got 3",
                "Beat 10, VFX key 0: VfxEffect should not be 0",
            ]
        );
    }

    #[test]
    fn test_single_group_rules() {
        for motion in [1, 2] {
            let v = validate(&CandidateEffect::from_values(2, motion, 1, 1, 0), 4);
            assert_eq!(v.len(), 1);
            assert_eq!(
                v[0].to_string(),
                format!("Beat 4, Single key 2: MotionEffect={} not recommended (use 3-6)", motion)
            );
        }
        let v = validate(&CandidateEffect::from_values(3, 4, 1, 1, 2), 4);
        assert_eq!(messages(&v), vec!["Beat 4, Single key 3: VfxEffect should be 0, got 2"]);
    }

    #[test]
    fn test_multi_group_rules() {
        for motion in 3..=6 {
            let v = validate(&CandidateEffect::from_values(5, motion, 1, 1, 0), 1);
            assert_eq!(v.len(), 1);
            assert!(matches!(
                v[0].kind,
                ViolationKind::MotionNotAllowed { group: GroupType::Multi, .. }
            ));
            assert!(v[0].to_string().ends_with("not recommended (use 1-2)"));
        }
        let v = validate(&CandidateEffect::from_values(6, 1, 1, 1, 1), 1);
        assert_eq!(messages(&v), vec!["Beat 1, Multi key 6: VfxEffect should be 0, got 1"]);
    }

    #[test]
    fn test_out_of_range() {
        let v = validate(&CandidateEffect::from_values(9, 0, 4, 5, 3), 2);
        assert_eq!(
            messages(&v),
            vec![
                "Beat 2, key 9: ColorEffect=4 out of range",
                "Beat 2, key 9: IntensityEffect=5 out of range",
                "Beat 2, key 9: VfxEffect=3 out of range",
                "Beat 2, key 9: groupLightKey=9 out of range",
            ]
        );
    }

    #[test]
    fn test_negative_and_non_integer_values() {
        let v = validate(&CandidateEffect::from_values(2, -1, 0, 0, 0), 0);
        assert!(v.iter().any(|x| x.to_string() == "Beat 0, key 2: MotionEffect=-1 out of range"));

        let raw = json!({"groupLightKey": 4, "MotionEffect": "fan", "ColorEffect": 1, "IntensityEffect": 1, "VfxEffect": 0});
        let candidate = CandidateEffect::from_object(raw.as_object().unwrap());
        let v = validate(&candidate, 3);
        assert_eq!(
            messages(&v),
            vec![
                "Beat 3, key 4: MotionEffect=\"fan\" out of range",
                "Beat 3, Multi key 4: MotionEffect=\"fan\" not recommended (use 1-2)",
            ]
        );
    }

    #[test]
    fn test_missing_field_short_circuits() {
        let raw = json!({"groupLightKey": 0, "MotionEffect": 5, "ColorEffect": 9});
        let candidate = CandidateEffect::from_object(raw.as_object().unwrap());
        let v = validate(&candidate, 7);
        assert_eq!(messages(&v), vec!["Beat 7: missing field 'IntensityEffect'"]);

        let v = validate(&CandidateEffect::default(), 7);
        assert_eq!(messages(&v), vec!["Beat 7: missing field 'groupLightKey'"]);
    }

    #[test]
    fn test_validation_is_deterministic() {
        let candidate = CandidateEffect::from_values(1, 3, 0, 0, 0);
        assert_eq!(validate(&candidate, 5), validate(&candidate, 5));

        let accepted = GroupLightEffect::new(4, 2, 1, 1, 0);
        assert!(validate(&accepted.to_candidate(), 5).is_empty());
        assert!(validate(&accepted.to_candidate(), 5).is_empty());
    }

    #[test]
    fn test_group_properties_exhaustive() {
        for key in 0..=6i64 {
            for motion in 0..=6 {
                for color in 0..=3 {
                    for intensity in 0..=4 {
                        for vfx in 0..=2 {
                            let c =
                                CandidateEffect::from_values(key, motion, color, intensity, vfx);
                            if !validate(&c, 0).is_empty() {
                                continue;
                            }
                            match key {
                                0 | 1 => {
                                    assert_eq!((motion, color, intensity), (0, 0, 0));
                                    assert!(vfx == 1 || vfx == 2);
                                }
                                2 | 3 => {
                                    assert_eq!(vfx, 0);
                                    assert!([0, 3, 4, 5, 6].contains(&motion));
                                }
                                _ => {
                                    assert_eq!(vfx, 0);
                                    assert!([0, 1, 2].contains(&motion));
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_policy_violations() {
        assert!(policy_violations(&[], 0, true).is_empty());

        let v = policy_violations(&[], 3, false);
        assert_eq!(v.len(), 1);
        assert!(v[0].is_policy());
        assert!(v[0].to_string().starts_with("Beat 3: effects list is empty"));

        let candidates = [
            CandidateEffect::from_values(4, 0, 0, 0, 0),
            CandidateEffect::from_values(2, 3, 1, 1, 0),
        ];
        let v = policy_violations(&candidates, 8, false);
        assert_eq!(v.len(), 1);
        assert!(v[0].to_string().starts_with("Beat 8, key 4: every effect is 0"));
    }

    #[test]
    fn test_advisories() {
        assert!(advisories(&GroupLightEffect::new(2, 3, 1, 1, 0), 0).is_empty());
        assert!(advisories(&GroupLightEffect::new(0, 0, 0, 0, 1), 0).is_empty());
        assert!(advisories(&GroupLightEffect::new(4, 0, 0, 0, 0), 0).is_empty());

        let notes = advisories(&GroupLightEffect::new(5, 1, 0, 0, 0), 2);
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains("without ColorEffect"));
        assert!(notes[1].contains("without IntensityEffect"));
    }
}
