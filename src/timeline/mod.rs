// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song timeline files.
//!
//! A timeline is a JSON document with a `beats` array. Each beat carries a
//! `time` and `duration` and, once effects are assigned, a `groupLights`
//! array. Fields this crate does not know about are preserved verbatim.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::effects::{BeatEffectSet, CandidateEffect};

/// File name prefix shared by all timeline files
pub const TIMELINE_PREFIX: &str = "TimeLine_";

/// A timestamped beat, the scheduling unit for lighting changes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    /// Start time in seconds
    pub time: f64,
    /// Duration in seconds
    pub duration: f64,
}

impl Beat {
    pub fn new(time: f64, duration: f64) -> Self {
        Self { time, duration }
    }

    /// End time in seconds
    pub fn end(&self) -> f64 {
        self.time + self.duration
    }

    /// Check the beat invariants (time >= 0, duration > 0)
    pub fn is_valid(&self) -> bool {
        self.time.is_finite()
            && self.duration.is_finite()
            && self.time >= 0.0
            && self.duration > 0.0
    }
}

/// One beat entry of a timeline file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineBeat {
    pub time: f64,
    pub duration: f64,
    /// Raw effect records (may be invalid when auditing foreign files)
    #[serde(rename = "groupLights", default, skip_serializing_if = "Option::is_none")]
    pub group_lights: Option<Vec<Value>>,
    /// Free-text rationale, only present in rationale artifacts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TimelineBeat {
    pub fn beat(&self) -> Beat {
        Beat::new(self.time, self.duration)
    }

    /// Effect records decoded for validation; non-object entries are skipped
    pub fn candidates(&self) -> Vec<CandidateEffect> {
        self.group_lights
            .iter()
            .flatten()
            .filter_map(Value::as_object)
            .map(CandidateEffect::from_object)
            .collect()
    }

    /// Number of effect records on this beat
    pub fn effect_count(&self) -> usize {
        self.group_lights.as_ref().map_or(0, Vec::len)
    }
}

/// A song timeline document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineFile {
    pub beats: Vec<TimelineBeat>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TimelineFile {
    /// Build a bare timeline from beats
    pub fn from_beats(beats: &[Beat]) -> Self {
        Self {
            beats: beats
                .iter()
                .map(|b| TimelineBeat {
                    time: b.time,
                    duration: b.duration,
                    group_lights: None,
                    reasoning: None,
                    extra: Map::new(),
                })
                .collect(),
            extra: Map::new(),
        }
    }

    /// Load a timeline from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read timeline file: {:?}", path.as_ref()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to load timeline: {:?}", path.as_ref()))
    }

    /// Parse a timeline from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse timeline JSON")
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize timeline")
    }

    /// Save to a JSON file, creating parent directories as needed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {:?}", parent))?;
            }
        }
        let json = self.to_json()?;
        fs::write(path, json).with_context(|| format!("Failed to write timeline file: {:?}", path))
    }

    /// Checked beat list
    pub fn beats(&self) -> Result<Vec<Beat>> {
        self.beats
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let beat = entry.beat();
                if !beat.is_valid() {
                    bail!(
                        "Beat {} has invalid timing (time={}, duration={})",
                        i,
                        beat.time,
                        beat.duration
                    );
                }
                Ok(beat)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Replace the effects of one beat
    pub fn set_effects(&mut self, index: usize, effects: &BeatEffectSet) -> Result<()> {
        let values = effects
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to encode effects")?;
        match self.beats.get_mut(index) {
            Some(beat) => {
                beat.group_lights = Some(values);
                Ok(())
            }
            None => bail!("Beat index {} out of range ({} beats)", index, self.beats.len()),
        }
    }
}

/// Timeline file name of a song
pub fn timeline_file_name(song: &str) -> String {
    format!("{}{}.json", TIMELINE_PREFIX, song)
}

/// Rationale artifact file name of a song
pub fn reasoning_file_name(song: &str) -> String {
    format!("{}{}_reasoning.json", TIMELINE_PREFIX, song)
}

/// Reference timeline file name of a song
pub fn groundtruth_file_name(song: &str) -> String {
    format!("{}{}_groundtruth.json", TIMELINE_PREFIX, song)
}

/// Song name from a timeline file name, if it is one
pub fn song_name_from_file(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(TIMELINE_PREFIX)?
        .strip_suffix(".json")
        .filter(|name| !name.is_empty())
}

/// List song names with a timeline file in `dir`, sorted
pub fn list_songs<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read beats directory: {:?}", dir))?;

    let mut songs = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(song) = name.to_str().and_then(song_name_from_file) {
            songs.push(song.to_string());
        }
    }
    songs.sort();
    Ok(songs)
}

/// Path of a song's timeline in `dir`
pub fn timeline_path<P: AsRef<Path>>(dir: P, song: &str) -> PathBuf {
    dir.as_ref().join(timeline_file_name(song))
}
