// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Constraint-validated effect generation.
//!
//! This module provides the per-beat generation loop and its collaborators:
//! - Prompt construction with a local context window
//! - Tolerant decoding of service responses
//! - A retry state machine that feeds violations back as feedback
//! - A bounded-concurrency scheduler over all beats of a song

pub mod decode;
pub mod generator;
pub mod prompt;
pub mod retry;
pub mod scheduler;

pub use decode::{decode_response, DecodeError, DecodedResponse};
pub use generator::EffectGenerator;
pub use retry::{AttemptOutcome, RetryMachine, RetryState};
pub use scheduler::generate_all;

use std::future::Future;

use anyhow::Result;

use crate::analysis::AudioFeature;
use crate::effects::BeatEffectSet;
use crate::timeline::Beat;

/// One request to the generation service
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Beat the request is for (0-indexed)
    pub beat_index: usize,
    /// Attempt number (1-indexed)
    pub attempt: u32,
    /// System instruction
    pub system: String,
    /// Per-beat user request, including any corrective feedback
    pub user: String,
}

/// Trait for generation service implementations.
///
/// A service receives a system instruction plus a per-beat request and
/// returns the raw response text. Any error is treated as a failed attempt
/// for that beat only.
pub trait GenerationService: Send + Sync + 'static {
    /// Issue one request and return the response text
    fn complete(&self, request: &GenerationRequest) -> impl Future<Output = Result<String>> + Send;
}

/// Tunables of the per-beat generation loop
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Neighboring beats supplied on each side of the target
    pub context_window: usize,
    /// Attempts per beat before falling back to an empty set
    pub max_retries: u32,
    /// Whether an empty effect set is an acceptable result
    pub allow_empty_beats: bool,
    /// Beats shorter than this (seconds) get the rapid-beat hint
    pub rapid_beat_threshold: f64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            context_window: 2,
            max_retries: 3,
            allow_empty_beats: true,
            rapid_beat_threshold: 0.5,
        }
    }
}

/// Read-only inputs shared by every beat of a song
#[derive(Debug, Clone, Default)]
pub struct SongContext {
    pub beats: Vec<Beat>,
    /// One record per beat, when analysis is available
    pub features: Option<Vec<AudioFeature>>,
    /// One (possibly empty) lyric text per beat, when transcription is available
    pub lyrics: Option<Vec<String>>,
}

impl SongContext {
    pub fn new(beats: Vec<Beat>) -> Self {
        Self {
            beats,
            features: None,
            lyrics: None,
        }
    }

    pub fn with_features(mut self, features: Vec<AudioFeature>) -> Self {
        self.features = Some(features);
        self
    }

    pub fn with_lyrics(mut self, lyrics: Vec<String>) -> Self {
        self.lyrics = Some(lyrics);
        self
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn feature(&self, index: usize) -> Option<&AudioFeature> {
        self.features.as_ref().and_then(|f| f.get(index))
    }

    /// Lyric text of a beat, None when absent or empty
    pub fn lyric(&self, index: usize) -> Option<&str> {
        self.lyrics
            .as_ref()
            .and_then(|l| l.get(index))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// How a beat's generation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatStatus {
    /// A candidate set passed validation
    Accepted,
    /// Every attempt failed; the empty fallback was used
    Exhausted,
    /// The task died unexpectedly; the empty fallback was used
    Crashed,
}

/// Result of generating one beat
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedBeat {
    pub beat_index: usize,
    pub effects: BeatEffectSet,
    pub rationale: String,
    /// Attempts spent on this beat
    pub attempts: u32,
    pub status: BeatStatus,
}

impl GeneratedBeat {
    /// Empty result used when generation did not succeed
    pub fn fallback(beat_index: usize, attempts: u32, status: BeatStatus) -> Self {
        Self {
            beat_index,
            effects: BeatEffectSet::empty(),
            rationale: String::new(),
            attempts,
            status,
        }
    }

    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }
}
