// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-beat audio features and lyrics.
//!
//! Feature extraction and speech transcription run outside this crate; their
//! results arrive as per-song cache files. This module models those inputs,
//! loads the caches, and maps lyric segments onto beats by time overlap.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::timeline::Beat;

/// Coarse energy classification of a beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLabel {
    Low,
    Medium,
    High,
}

impl EnergyLabel {
    /// Classify normalized RMS energy (0.0 - 1.0)
    pub fn from_energy(energy: f64) -> Self {
        if energy < 0.3 {
            EnergyLabel::Low
        } else if energy < 0.65 {
            EnergyLabel::Medium
        } else {
            EnergyLabel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyLabel::Low => "low",
            EnergyLabel::Medium => "medium",
            EnergyLabel::High => "high",
        }
    }
}

impl fmt::Display for EnergyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frequency band with the largest energy share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Bass,
    Mid,
    High,
}

impl Band {
    /// Band with the largest share; ties resolve toward the lower band
    pub fn dominant(bass: f64, mid: f64, high: f64) -> Self {
        if bass >= mid && bass >= high {
            Band::Bass
        } else if mid >= high {
            Band::Mid
        } else {
            Band::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Bass => "bass",
            Band::Mid => "mid",
            Band::High => "high",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio features of one beat segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeature {
    /// Normalized RMS energy (0.0 - 1.0)
    pub energy: f64,
    pub energy_label: EnergyLabel,
    /// Low frequency (< 250 Hz) energy ratio
    pub bass: f64,
    /// Mid frequency (250 - 2000 Hz) energy ratio
    pub mid: f64,
    /// High frequency (>= 2000 Hz) energy ratio
    pub high: f64,
    pub dominant_band: Band,
    /// Normalized spectral centroid (0.0 - 1.0)
    pub brightness: f64,
}

impl AudioFeature {
    /// Build a feature record, deriving the label and dominant band
    pub fn new(energy: f64, bass: f64, mid: f64, high: f64, brightness: f64) -> Self {
        Self {
            energy,
            energy_label: EnergyLabel::from_energy(energy),
            bass,
            mid,
            high,
            dominant_band: Band::dominant(bass, mid, high),
            brightness,
        }
    }
}

/// A transcribed lyric segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Map lyric segments onto beats.
///
/// Each beat gets the space-joined text of every segment overlapping its
/// time window, or an empty string.
pub fn lyrics_for_beats(beats: &[Beat], segments: &[LyricSegment]) -> Vec<String> {
    beats
        .iter()
        .map(|beat| {
            let start = beat.time;
            let end = beat.end();
            segments
                .iter()
                .filter(|seg| seg.end > start && seg.start < end)
                .map(|seg| seg.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Per-song cache of analysis results
#[derive(Debug, Clone)]
pub struct AnalysisCache {
    dir: PathBuf,
}

impl AnalysisCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of a cached artifact for a song
    pub fn path(&self, song: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.json", song, suffix))
    }

    fn load_json<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache file: {:?}", path))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {:?}", path))?;
        Ok(Some(value))
    }

    fn save_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {:?}", self.dir))?;
        let json = serde_json::to_string(value).context("Failed to serialize cache data")?;
        fs::write(path, json).with_context(|| format!("Failed to write cache file: {:?}", path))
    }

    /// Cached audio features, only when there is one record per beat
    pub fn load_features(
        &self,
        song: &str,
        beat_count: usize,
    ) -> Result<Option<Vec<AudioFeature>>> {
        let path = self.path(song, "features");
        let features: Option<Vec<AudioFeature>> = self.load_json(&path)?;
        match features {
            Some(features) if features.len() == beat_count => {
                info!("Audio features loaded from cache ({} beats)", features.len());
                Ok(Some(features))
            }
            Some(features) => {
                warn!(
                    "Ignoring cached audio features for {}: {} records for {} beats",
                    song,
                    features.len(),
                    beat_count
                );
                Ok(None)
            }
            None => {
                debug!("No cached audio features at {:?}", path);
                Ok(None)
            }
        }
    }

    pub fn save_features(&self, song: &str, features: &[AudioFeature]) -> Result<()> {
        self.save_json(&self.path(song, "features"), &features)
    }

    /// Cached lyric segments
    pub fn load_lyrics(&self, song: &str) -> Result<Option<Vec<LyricSegment>>> {
        let path = self.path(song, "lyrics");
        let segments: Option<Vec<LyricSegment>> = self.load_json(&path)?;
        if let Some(segments) = &segments {
            info!("Lyrics loaded from cache ({} segments)", segments.len());
        } else {
            debug!("No cached lyrics at {:?}", path);
        }
        Ok(segments)
    }

    pub fn save_lyrics(&self, song: &str, segments: &[LyricSegment]) -> Result<()> {
        self.save_json(&self.path(song, "lyrics"), &segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_energy_label_thresholds() {
        assert_eq!(EnergyLabel::from_energy(0.0), EnergyLabel::Low);
        assert_eq!(EnergyLabel::from_energy(0.29), EnergyLabel::Low);
        assert_eq!(EnergyLabel::from_energy(0.3), EnergyLabel::Medium);
        assert_eq!(EnergyLabel::from_energy(0.64), EnergyLabel::Medium);
        assert_eq!(EnergyLabel::from_energy(0.65), EnergyLabel::High);
        assert_eq!(EnergyLabel::from_energy(1.0), EnergyLabel::High);
    }

    #[test]
    fn test_dominant_band() {
        assert_eq!(Band::dominant(0.6, 0.3, 0.1), Band::Bass);
        assert_eq!(Band::dominant(0.2, 0.5, 0.3), Band::Mid);
        assert_eq!(Band::dominant(0.1, 0.2, 0.7), Band::High);
        assert_eq!(Band::dominant(0.4, 0.4, 0.2), Band::Bass);
    }

    #[test]
    fn test_feature_serde_names() {
        let feature = AudioFeature::new(0.8, 0.5, 0.3, 0.2, 0.4);
        let value = serde_json::to_value(&feature).unwrap();
        assert_eq!(value["energy_label"], "high");
        assert_eq!(value["dominant_band"], "bass");
    }

    #[test]
    fn test_lyrics_for_beats() {
        let beats = vec![
            Beat::new(0.0, 1.0),
            Beat::new(1.0, 1.0),
            Beat::new(2.0, 1.0),
            Beat::new(5.0, 1.0),
        ];
        let segments = vec![
            LyricSegment {
                start: 0.5,
                end: 1.5,
                text: "hello".to_string(),
            },
            LyricSegment {
                start: 1.2,
                end: 2.0,
                text: "world".to_string(),
            },
        ];

        let lyrics = lyrics_for_beats(&beats, &segments);
        assert_eq!(lyrics, vec!["hello", "hello world", "", ""]);
    }

    #[test]
    fn test_cache_features_round_trip() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path().join("cache"));
        let features = vec![AudioFeature::new(0.1, 0.3, 0.3, 0.4, 0.2); 3];

        assert!(cache.load_features("Song", 3).unwrap().is_none());
        cache.save_features("Song", &features).unwrap();
        assert!(cache.path("Song", "features").ends_with("Song_features.json"));

        assert_eq!(cache.load_features("Song", 3).unwrap(), Some(features));
        // Stale cache for a different beat count is ignored
        assert!(cache.load_features("Song", 4).unwrap().is_none());
    }

    #[test]
    fn test_cache_lyrics() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        let segments = vec![LyricSegment {
            start: 0.0,
            end: 1.0,
            text: "la".to_string(),
        }];

        assert!(cache.load_lyrics("Song").unwrap().is_none());
        cache.save_lyrics("Song", &segments).unwrap();
        assert_eq!(cache.load_lyrics("Song").unwrap(), Some(segments));
    }

    #[test]
    fn test_corrupt_cache_is_error() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        fs::write(cache.path("Song", "lyrics"), "not json").unwrap();
        assert!(cache.load_lyrics("Song").is_err());
    }
}
