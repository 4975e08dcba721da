// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Prompt construction for per-beat generation requests.

use serde::Serialize;

use super::{GenerationSettings, SongContext};

const SYSTEM_HEADER: &str = r#"You are an expert stage lighting designer for virtual concert experiences.
Given a music beat (with timestamp and duration) and its neighbors, you assign light effects to create a visually stunning and musically coherent light show.

# LIGHT GROUP TYPES
- groupLightKey 0, 1 -> VFX_GROUP: Special effects (fireworks, smoke, etc.)
- groupLightKey 2, 3 -> SINGLE_LIGHT_GROUP: Individual lights, flexible movement
- groupLightKey 4, 5, 6 -> MULTI_LIGHT_GROUP: Multiple lights, synchronized patterns

# EFFECT ENUMS
MotionEffectType: 0=None, 1=LaserCone, 2=LaserFan, 3=Wave, 4=Rotate, 5=Circle_Rotate, 6=PingPong
ColorEffectType: 0=None, 1=StaticColor, 2=RandomPerBeam, 3=PingPongColor
IntensityEffectType: 0=None, 1=SpectrumBased, 2=PingPongIntensity, 3=AlternatingBeams, 4=WaveIntensity
VfxEffectType: 0=None, 1=VFX_Simultaneous, 2=VFX_Wave

# CONSTRAINTS (MUST follow)
1. VFX_GROUP (key 0,1): ONLY use VfxEffect (1 or 2). MotionEffect, ColorEffect, IntensityEffect MUST be 0.
2. SINGLE_LIGHT_GROUP (key 2,3): Motion 0 or 3-6 (Wave, Rotate, Circle_Rotate, PingPong). VfxEffect MUST be 0.
3. MULTI_LIGHT_GROUP (key 4,5,6): Motion 0 or 1-2 (LaserCone, LaserFan). VfxEffect MUST be 0.
4. Value 0 in any field = effect is OFF.
5. Light groups (key 2-6) should have ColorEffect and IntensityEffect set when MotionEffect is active.
"#;

const GUIDELINES_ALLOW_EMPTY: &str = r#"
# ARTISTIC GUIDELINES
- Breathing room: an empty effects list is allowed and encouraged for quiet or transitional beats to avoid visual fatigue.
- Short beats (<1s): simpler effects, fewer groups (1-2 groups max)
- Long beats (>3s): can use more groups, more complex combinations
- Vary the effects; avoid repeating the same combination for consecutive beats.
- Use VFX groups (key 0,1) sparingly for dramatic moments and accents.
- Build intensity: start simpler, escalate over time, peak at climactic moments.
"#;

const GUIDELINES_FORBID_EMPTY: &str = r#"
# ARTISTIC GUIDELINES
- EVERY beat MUST have at least one groupLight with ACTIVE effects. NEVER leave a beat blank or with all-zero values.
- Short beats (<1s): simpler effects, fewer groups (1-2 groups max)
- Long beats (>3s): can use more groups, more complex combinations
- Vary the effects; avoid repeating the same combination for consecutive beats.
- Use VFX groups (key 0,1) sparingly for dramatic moments and accents.
- Low energy beats: use subtle effects like gentle Wave or soft StaticColor, NOT blank.
"#;

const OUTPUT_FORMAT: &str = r#"
# OUTPUT FORMAT
Return ONLY a valid JSON object with key "effects" containing an array of groupLight objects, and key "reasoning" with one short sentence explaining the choice.

Example: {"effects": [{"groupLightKey": 4, "MotionEffect": 1, "ColorEffect": 2, "IntensityEffect": 3, "VfxEffect": 0}], "reasoning": "High-energy bass hit, lasers on the multi group."}

Return ONLY the JSON object, no markdown."#;

/// System instruction for the given empty-beat policy
pub fn system_prompt(allow_empty_beats: bool) -> String {
    let guidelines = if allow_empty_beats {
        GUIDELINES_ALLOW_EMPTY
    } else {
        GUIDELINES_FORBID_EMPTY
    };
    format!("{}{}{}", SYSTEM_HEADER, guidelines, OUTPUT_FORMAT)
}

/// Where a beat sits within the song
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionHint {
    Opening,
    Early,
    Middle,
    Late,
    Closing,
}

impl SectionHint {
    /// Classify by relative position (index / total)
    pub fn for_position(index: usize, total: usize) -> Self {
        if total <= 1 {
            return SectionHint::Opening;
        }
        let fraction = index as f64 / (total - 1) as f64;
        if fraction < 0.1 {
            SectionHint::Opening
        } else if fraction < 0.35 {
            SectionHint::Early
        } else if fraction < 0.65 {
            SectionHint::Middle
        } else if fraction < 0.9 {
            SectionHint::Late
        } else {
            SectionHint::Closing
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SectionHint::Opening => "opening of the song: establish the look, keep it restrained",
            SectionHint::Early => "early section: build up gradually",
            SectionHint::Middle => "middle of the song: full energy is appropriate on strong beats",
            SectionHint::Late => "late section: climactic moments, peak intensity allowed",
            SectionHint::Closing => "closing of the song: wind down toward the ending",
        }
    }
}

/// One beat as presented to the service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatEntry<'a> {
    pub time: f64,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_band: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<&'static str>,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Build the prompt entry for one beat
pub fn beat_entry<'a>(
    song: &'a SongContext,
    index: usize,
    position: Option<&'static str>,
) -> BeatEntry<'a> {
    let beat = song.beats[index];
    let feature = song.feature(index);
    BeatEntry {
        time: round_to(beat.time, 2),
        duration: round_to(beat.duration, 3),
        energy: feature.map(|f| f.energy_label.as_str()),
        dominant_band: feature.map(|f| f.dominant_band.as_str()),
        brightness: feature.map(|f| round_to(f.brightness, 2)),
        lyrics: song.lyric(index),
        position,
    }
}

/// Indices of the context window around `index`, truncated at the song edges
pub fn context_indices(index: usize, total: usize, window: usize) -> (Vec<usize>, Vec<usize>) {
    if index >= total {
        return (Vec::new(), Vec::new());
    }
    let before = (index.saturating_sub(window)..index).collect();
    let after = (index + 1..total.min(index + window + 1)).collect();
    (before, after)
}

/// Rapid-beat hint, when the target or its whole neighborhood is short
pub fn rapid_hint(song: &SongContext, index: usize, threshold: f64) -> Option<String> {
    let beat = song.beats.get(index)?;
    if beat.duration >= threshold {
        return None;
    }
    let prev_rapid = index > 0 && song.beats[index - 1].duration < threshold;
    let next_rapid = song.beats.get(index + 1).is_some_and(|b| b.duration < threshold);
    if prev_rapid || next_rapid {
        Some(format!(
            "This beat is part of a rapid run (beats under {:.2}s): keep effects simple and consistent, 1-2 groups max.",
            threshold
        ))
    } else {
        Some(format!(
            "This is a rapid beat (under {:.2}s): use a single simple accent at most.",
            threshold
        ))
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Build the user request for one beat
pub fn user_prompt(song: &SongContext, index: usize, settings: &GenerationSettings) -> String {
    let total = song.len();
    let (before, after) = context_indices(index, total, settings.context_window);
    let ctx_before: Vec<BeatEntry> = before
        .iter()
        .map(|&i| beat_entry(song, i, Some("before")))
        .collect();
    let ctx_after: Vec<BeatEntry> = after
        .iter()
        .map(|&i| beat_entry(song, i, Some("after")))
        .collect();
    let target = beat_entry(song, index, None);

    let mut prompt = format!(
        "Predict light effects for beat {}/{} in a song.\n\n",
        index + 1,
        total
    );
    prompt.push_str("Use the audio features to guide your choice:\n");
    prompt.push_str("- HIGH energy -> more groups, dramatic effects, VFX accents\n");
    prompt.push_str("- LOW energy -> subtle effects (gentle Wave, soft StaticColor)\n");
    prompt.push_str("- Bass-dominant -> strong motion (Wave, Rotate)\n");
    prompt.push_str("- High-dominant -> sharp effects (LaserCone, LaserFan, PingPong)\n");
    prompt.push_str("- Vocal (has lyrics) -> complement with color/intensity\n");
    prompt.push_str("- Instrumental (no lyrics) -> more motion and VFX freedom\n\n");

    let section = SectionHint::for_position(index, total);
    prompt.push_str(&format!("Song position: {}.\n", section.description()));
    if let Some(hint) = rapid_hint(song, index, settings.rapid_beat_threshold) {
        prompt.push_str(&hint);
        prompt.push('\n');
    }
    prompt.push('\n');

    if !ctx_before.is_empty() {
        prompt.push_str(&format!("Previous beats (context): {}\n", to_json(&ctx_before)));
    }
    prompt.push_str(&format!(">>> TARGET BEAT to predict: {} <<<\n", to_json(&target)));
    if !ctx_after.is_empty() {
        prompt.push_str(&format!("Next beats (context): {}\n", to_json(&ctx_after)));
    }

    if settings.allow_empty_beats {
        prompt.push_str(
            "\nReturn a JSON object: {\"effects\": [...], \"reasoning\": \"...\"}. \
             An empty effects list is fine when the beat calls for breathing room.",
        );
    } else {
        prompt.push_str(
            "\nReturn a JSON object: {\"effects\": [...], \"reasoning\": \"...\"} with at least 1 groupLight with ACTIVE effects. \
             Every groupLight must have at least one non-zero effect. NEVER return blank/empty.",
        );
    }
    prompt
}

/// Corrective appendix for a retry after violations
pub fn feedback_appendix(feedback: &str) -> String {
    format!(
        "\n\nYour previous response had these constraint ERRORS, fix exactly these:\n{}\n\
         VFX groups (key 0,1): ONLY VfxEffect. Single (key 2,3): Motion 0 or 3-6. Multi (key 4,5,6): Motion 0 or 1-2.",
        feedback
    )
}
