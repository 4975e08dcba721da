// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Light effect model.
//!
//! This module defines the per-group effect assignment produced for each
//! beat, the light group categories, and the effect enums with their
//! display names. Field names and value domains here are the wire contract
//! shared by the generator, the validator and the timeline files.

pub mod validate;

pub use validate::{advisories, policy_violations, validate, validate_all, Violation, ViolationKind};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire name of the group key field
pub const GROUP_LIGHT_KEY: &str = "groupLightKey";
/// Wire name of the motion field
pub const MOTION_EFFECT: &str = "MotionEffect";
/// Wire name of the color field
pub const COLOR_EFFECT: &str = "ColorEffect";
/// Wire name of the intensity field
pub const INTENSITY_EFFECT: &str = "IntensityEffect";
/// Wire name of the VFX field
pub const VFX_EFFECT: &str = "VfxEffect";

/// Required fields, in the order they are checked
pub const REQUIRED_FIELDS: [&str; 5] = [
    GROUP_LIGHT_KEY,
    MOTION_EFFECT,
    COLOR_EFFECT,
    INTENSITY_EFFECT,
    VFX_EFFECT,
];

/// Largest valid value for each field
pub const MAX_GROUP_LIGHT_KEY: i64 = 6;
pub const MAX_MOTION_EFFECT: i64 = 6;
pub const MAX_COLOR_EFFECT: i64 = 3;
pub const MAX_INTENSITY_EFFECT: i64 = 4;
pub const MAX_VFX_EFFECT: i64 = 2;

/// Light group category, determined solely by the group key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupType {
    /// Keys 0-1: special effects (fireworks, smoke, ...)
    Vfx,
    /// Keys 2-3: individual lights with flexible movement
    Single,
    /// Keys 4-6: multiple lights with synchronized patterns
    Multi,
}

impl GroupType {
    /// Classify a group key (None when out of range)
    pub fn from_key(key: i64) -> Option<Self> {
        match key {
            0 | 1 => Some(GroupType::Vfx),
            2 | 3 => Some(GroupType::Single),
            4..=6 => Some(GroupType::Multi),
            _ => None,
        }
    }

    /// Label used in violation messages
    pub fn label(&self) -> &'static str {
        match self {
            GroupType::Vfx => "VFX",
            GroupType::Single => "Single",
            GroupType::Multi => "Multi",
        }
    }

    /// Motion values this group accepts
    pub fn allowed_motions(&self) -> &'static [i64] {
        match self {
            GroupType::Vfx => &[0],
            GroupType::Single => &[0, 3, 4, 5, 6],
            GroupType::Multi => &[0, 1, 2],
        }
    }
}

/// Motion effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MotionEffect {
    None = 0,
    LaserCone = 1,
    LaserFan = 2,
    Wave = 3,
    Rotate = 4,
    CircleRotate = 5,
    PingPong = 6,
}

impl MotionEffect {
    pub const ALL: [MotionEffect; 7] = [
        MotionEffect::None,
        MotionEffect::LaserCone,
        MotionEffect::LaserFan,
        MotionEffect::Wave,
        MotionEffect::Rotate,
        MotionEffect::CircleRotate,
        MotionEffect::PingPong,
    ];

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            MotionEffect::None => "None",
            MotionEffect::LaserCone => "LaserCone",
            MotionEffect::LaserFan => "LaserFan",
            MotionEffect::Wave => "Wave",
            MotionEffect::Rotate => "Rotate",
            MotionEffect::CircleRotate => "Circle_Rotate",
            MotionEffect::PingPong => "PingPong",
        }
    }
}

/// Color effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColorEffect {
    None = 0,
    StaticColor = 1,
    RandomPerBeam = 2,
    PingPongColor = 3,
}

impl ColorEffect {
    pub const ALL: [ColorEffect; 4] = [
        ColorEffect::None,
        ColorEffect::StaticColor,
        ColorEffect::RandomPerBeam,
        ColorEffect::PingPongColor,
    ];

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorEffect::None => "None",
            ColorEffect::StaticColor => "StaticColor",
            ColorEffect::RandomPerBeam => "RandomPerBeam",
            ColorEffect::PingPongColor => "PingPongColor",
        }
    }
}

/// Intensity effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntensityEffect {
    None = 0,
    SpectrumBased = 1,
    PingPongIntensity = 2,
    AlternatingBeams = 3,
    WaveIntensity = 4,
}

impl IntensityEffect {
    pub const ALL: [IntensityEffect; 5] = [
        IntensityEffect::None,
        IntensityEffect::SpectrumBased,
        IntensityEffect::PingPongIntensity,
        IntensityEffect::AlternatingBeams,
        IntensityEffect::WaveIntensity,
    ];

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            IntensityEffect::None => "None",
            IntensityEffect::SpectrumBased => "SpectrumBased",
            IntensityEffect::PingPongIntensity => "PingPongIntensity",
            IntensityEffect::AlternatingBeams => "AlternatingBeams",
            IntensityEffect::WaveIntensity => "WaveIntensity",
        }
    }
}

/// VFX effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VfxEffect {
    None = 0,
    Simultaneous = 1,
    Wave = 2,
}

impl VfxEffect {
    pub const ALL: [VfxEffect; 3] = [VfxEffect::None, VfxEffect::Simultaneous, VfxEffect::Wave];

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            VfxEffect::None => "None",
            VfxEffect::Simultaneous => "VFX_Simultaneous",
            VfxEffect::Wave => "VFX_Wave",
        }
    }
}

/// One light group's validated effect assignment for a beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupLightEffect {
    /// Light group (0-6)
    #[serde(rename = "groupLightKey")]
    pub group_light_key: u8,
    /// Motion effect (0-6)
    #[serde(rename = "MotionEffect")]
    pub motion: u8,
    /// Color effect (0-3)
    #[serde(rename = "ColorEffect")]
    pub color: u8,
    /// Intensity effect (0-4)
    #[serde(rename = "IntensityEffect")]
    pub intensity: u8,
    /// VFX effect (0-2)
    #[serde(rename = "VfxEffect")]
    pub vfx: u8,
}

impl GroupLightEffect {
    /// Create a new effect assignment
    pub fn new(group_light_key: u8, motion: u8, color: u8, intensity: u8, vfx: u8) -> Self {
        Self {
            group_light_key,
            motion,
            color,
            intensity,
            vfx,
        }
    }

    /// Group category of this assignment
    pub fn group_type(&self) -> Option<GroupType> {
        GroupType::from_key(self.group_light_key as i64)
    }

    /// True when every effect field is off
    pub fn is_all_off(&self) -> bool {
        self.motion == 0 && self.color == 0 && self.intensity == 0 && self.vfx == 0
    }

    /// Convert back into an unchecked candidate
    pub fn to_candidate(&self) -> CandidateEffect {
        CandidateEffect {
            group_light_key: Some(FieldValue::Int(self.group_light_key as i64)),
            motion: Some(FieldValue::Int(self.motion as i64)),
            color: Some(FieldValue::Int(self.color as i64)),
            intensity: Some(FieldValue::Int(self.intensity as i64)),
            vfx: Some(FieldValue::Int(self.vfx as i64)),
        }
    }
}

impl fmt::Display for GroupLightEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.group_type().map(|g| g.label()).unwrap_or("?");
        write!(f, "{} group {}:", label, self.group_light_key)?;
        if let Some(m) = MotionEffect::from_value(self.motion) {
            write!(f, " motion={}", m.name())?;
        }
        if let Some(c) = ColorEffect::from_value(self.color) {
            write!(f, " color={}", c.name())?;
        }
        if let Some(i) = IntensityEffect::from_value(self.intensity) {
            write!(f, " intensity={}", i.name())?;
        }
        if let Some(v) = VfxEffect::from_value(self.vfx) {
            write!(f, " vfx={}", v.name())?;
        }
        Ok(())
    }
}

/// A raw field value as it arrived on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Integral number
    Int(i64),
    /// Anything else (string, fractional number, bool, ...), kept as JSON text
    Other(String),
}

impl FieldValue {
    /// Decode a JSON value; integral floats such as `2.0` count as integers
    pub fn from_json(value: &Value) -> Self {
        if let Some(n) = value.as_i64() {
            return FieldValue::Int(n);
        }
        if let Some(f) = value.as_f64() {
            if f.fract() == 0.0 && f.is_finite() && f.abs() < i64::MAX as f64 {
                return FieldValue::Int(f as i64);
            }
        }
        FieldValue::Other(value.to_string())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Other(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Other(s) => write!(f, "{}", s),
        }
    }
}

/// An unchecked effect record, as proposed by the generation service or
/// read from a timeline file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandidateEffect {
    pub group_light_key: Option<FieldValue>,
    pub motion: Option<FieldValue>,
    pub color: Option<FieldValue>,
    pub intensity: Option<FieldValue>,
    pub vfx: Option<FieldValue>,
}

impl CandidateEffect {
    /// Build a fully-populated integer candidate
    pub fn from_values(key: i64, motion: i64, color: i64, intensity: i64, vfx: i64) -> Self {
        Self {
            group_light_key: Some(FieldValue::Int(key)),
            motion: Some(FieldValue::Int(motion)),
            color: Some(FieldValue::Int(color)),
            intensity: Some(FieldValue::Int(intensity)),
            vfx: Some(FieldValue::Int(vfx)),
        }
    }

    /// Read a candidate from a JSON object, ignoring unknown keys
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let field = |name: &str| object.get(name).map(FieldValue::from_json);
        Self {
            group_light_key: field(GROUP_LIGHT_KEY),
            motion: field(MOTION_EFFECT),
            color: field(COLOR_EFFECT),
            intensity: field(INTENSITY_EFFECT),
            vfx: field(VFX_EFFECT),
        }
    }

    /// Field lookup by wire name
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        match name {
            GROUP_LIGHT_KEY => self.group_light_key.as_ref(),
            MOTION_EFFECT => self.motion.as_ref(),
            COLOR_EFFECT => self.color.as_ref(),
            INTENSITY_EFFECT => self.intensity.as_ref(),
            VFX_EFFECT => self.vfx.as_ref(),
            _ => None,
        }
    }

    /// Integer value of a field, if present and integral
    pub fn int(&self, name: &str) -> Option<i64> {
        self.field(name).and_then(FieldValue::as_int)
    }
}

/// Error converting a candidate that does not fit the typed model
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field '{field}' is missing or out of range")]
pub struct CandidateRangeError {
    pub field: &'static str,
}

impl TryFrom<&CandidateEffect> for GroupLightEffect {
    type Error = CandidateRangeError;

    fn try_from(candidate: &CandidateEffect) -> Result<Self, Self::Error> {
        let get = |field: &'static str, max: i64| -> Result<u8, CandidateRangeError> {
            match candidate.int(field) {
                Some(v) if (0..=max).contains(&v) => Ok(v as u8),
                _ => Err(CandidateRangeError { field }),
            }
        };
        Ok(GroupLightEffect {
            group_light_key: get(GROUP_LIGHT_KEY, MAX_GROUP_LIGHT_KEY)?,
            motion: get(MOTION_EFFECT, MAX_MOTION_EFFECT)?,
            color: get(COLOR_EFFECT, MAX_COLOR_EFFECT)?,
            intensity: get(INTENSITY_EFFECT, MAX_INTENSITY_EFFECT)?,
            vfx: get(VFX_EFFECT, MAX_VFX_EFFECT)?,
        })
    }
}

/// Ordered effect assignments for one beat (empty = breathing room)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeatEffectSet {
    pub effects: Vec<GroupLightEffect>,
}

impl BeatEffectSet {
    pub fn new(effects: Vec<GroupLightEffect>) -> Self {
        Self { effects }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupLightEffect> {
        self.effects.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_type_from_key() {
        assert_eq!(GroupType::from_key(0), Some(GroupType::Vfx));
        assert_eq!(GroupType::from_key(1), Some(GroupType::Vfx));
        assert_eq!(GroupType::from_key(2), Some(GroupType::Single));
        assert_eq!(GroupType::from_key(3), Some(GroupType::Single));
        assert_eq!(GroupType::from_key(4), Some(GroupType::Multi));
        assert_eq!(GroupType::from_key(6), Some(GroupType::Multi));
        assert_eq!(GroupType::from_key(7), None);
        assert_eq!(GroupType::from_key(-1), None);
    }

    #[test]
    fn test_effect_names() {
        assert_eq!(MotionEffect::from_value(5).unwrap().name(), "Circle_Rotate");
        assert_eq!(ColorEffect::from_value(2).unwrap().name(), "RandomPerBeam");
        assert_eq!(IntensityEffect::from_value(4).unwrap().name(), "WaveIntensity");
        assert_eq!(VfxEffect::from_value(1).unwrap().name(), "VFX_Simultaneous");
        assert!(MotionEffect::from_value(7).is_none());
        assert!(VfxEffect::from_value(3).is_none());
    }

    #[test]
    fn test_wire_field_names() {
        let effect = GroupLightEffect::new(4, 1, 2, 3, 0);
        let value = serde_json::to_value(effect).unwrap();
        assert_eq!(
            value,
            json!({"groupLightKey": 4, "MotionEffect": 1, "ColorEffect": 2, "IntensityEffect": 3, "VfxEffect": 0})
        );
    }

    #[test]
    fn test_candidate_from_object() {
        let value = json!({"groupLightKey": 2, "MotionEffect": 3.0, "ColorEffect": "1", "extra": true});
        let candidate = CandidateEffect::from_object(value.as_object().unwrap());

        assert_eq!(candidate.int(GROUP_LIGHT_KEY), Some(2));
        assert_eq!(candidate.int(MOTION_EFFECT), Some(3));
        assert_eq!(candidate.color, Some(FieldValue::Other("\"1\"".to_string())));
        assert!(candidate.intensity.is_none());
        assert!(candidate.vfx.is_none());
    }

    #[test]
    fn test_try_from_candidate() {
        let ok = CandidateEffect::from_values(5, 2, 1, 1, 0);
        let effect = GroupLightEffect::try_from(&ok).unwrap();
        assert_eq!(effect, GroupLightEffect::new(5, 2, 1, 1, 0));
        assert_eq!(effect.to_candidate(), ok);

        let bad = CandidateEffect::from_values(5, 2, 9, 1, 0);
        let err = GroupLightEffect::try_from(&bad).unwrap_err();
        assert_eq!(err.field, COLOR_EFFECT);
    }

    #[test]
    fn test_display() {
        let effect = GroupLightEffect::new(2, 3, 1, 4, 0);
        let text = effect.to_string();
        assert!(text.starts_with("Single group 2:"));
        assert!(text.contains("motion=Wave"));
        assert!(text.contains("intensity=WaveIntensity"));
    }

    #[test]
    fn test_beat_effect_set_serializes_as_array() {
        let set = BeatEffectSet::new(vec![GroupLightEffect::new(0, 0, 0, 0, 2)]);
        let value = serde_json::to_value(&set).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["VfxEffect"], 2);
        assert!(BeatEffectSet::empty().is_empty());
    }
}
