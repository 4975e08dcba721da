// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! End-to-end song processing.
//!
//! Loads a song's beats and cached analysis, generates effects for every
//! beat, writes the clean and rationale timelines, and audits the result.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::analysis::{lyrics_for_beats, AnalysisCache};
use crate::config::PipelineConfig;
use crate::generation::{
    generate_all, BeatStatus, EffectGenerator, GeneratedBeat, GenerationService, SongContext,
};
use crate::report::{merge, validate_file, validate_timeline, ComparisonReport, ValidationReport};
use crate::timeline::{
    groundtruth_file_name, list_songs, reasoning_file_name, timeline_file_name, timeline_path,
    Beat, TimelineFile,
};

/// Per-run switches
#[derive(Debug, Clone, PartialEq)]
pub struct PredictOptions {
    /// Feed cached lyrics into prompts
    pub use_lyrics: bool,
    /// Audit against the song's groundtruth timeline afterwards
    pub compare: bool,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            use_lyrics: true,
            compare: false,
        }
    }
}

/// Everything produced for one song
#[derive(Debug, Clone)]
pub struct SongOutcome {
    pub song: String,
    pub results: Vec<GeneratedBeat>,
    pub output_path: PathBuf,
    pub reasoning_path: PathBuf,
    pub report: ValidationReport,
    pub comparison: Option<ComparisonReport>,
}

impl SongOutcome {
    /// Beats whose generation fell back to the empty set
    pub fn fallback_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status != BeatStatus::Accepted)
            .count()
    }
}

/// Song processing pipeline over a generation service
pub struct Pipeline<S> {
    config: PipelineConfig,
    service: Arc<S>,
}

impl<S: GenerationService> Pipeline<S> {
    pub fn new(config: PipelineConfig, service: Arc<S>) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the song's timeline; missing or malformed beats are fatal
    pub fn load_timeline(&self, song: &str) -> Result<(TimelineFile, Vec<Beat>)> {
        let path = timeline_path(&self.config.paths.beats_dir, song);
        let timeline = TimelineFile::load(&path)?;
        let beats = timeline
            .beats()
            .with_context(|| format!("Invalid beats in {:?}", path))?;
        Ok((timeline, beats))
    }

    /// Assemble beats plus whatever cached analysis is usable
    pub fn song_context(
        &self,
        song: &str,
        beats: Vec<Beat>,
        options: &PredictOptions,
    ) -> SongContext {
        let cache = AnalysisCache::new(&self.config.paths.cache_dir);
        let count = beats.len();
        let mut context = SongContext::new(beats);

        match cache.load_features(song, count) {
            Ok(Some(features)) => context = context.with_features(features),
            Ok(None) => {}
            Err(e) => warn!("{:#}; continuing without audio features", e),
        }

        if options.use_lyrics {
            match cache.load_lyrics(song) {
                Ok(Some(segments)) => {
                    let lyrics = lyrics_for_beats(&context.beats, &segments);
                    let vocal = lyrics.iter().filter(|l| !l.trim().is_empty()).count();
                    info!("{}/{} beats have lyrics", vocal, count);
                    context = context.with_lyrics(lyrics);
                }
                Ok(None) => {}
                Err(e) => warn!("{:#}; continuing without lyrics", e),
            }
        }
        context
    }

    /// Predict, save and audit one song
    pub async fn process_song(&self, song: &str, options: &PredictOptions) -> Result<SongOutcome> {
        info!("Processing: {}", song);
        let (timeline, beats) = self.load_timeline(song)?;
        info!("Loaded {} beats", beats.len());

        let context = Arc::new(self.song_context(song, beats, options));
        let generator = EffectGenerator::new(
            Arc::clone(&self.service),
            context,
            self.config.generation_settings(),
        );
        let results = generate_all(&generator, self.config.generation.max_concurrent).await;

        let (clean, reasoning) = merge(&timeline, &results)?;
        let effects_dir = &self.config.paths.effects_dir;
        let output_path = effects_dir.join(timeline_file_name(song));
        clean.save(&output_path)?;
        info!("Saved: {:?}", output_path);
        let reasoning_path = effects_dir.join(reasoning_file_name(song));
        reasoning.save(&reasoning_path)?;
        info!("Saved reasoning: {:?}", reasoning_path);

        let report = validate_timeline(&format!("Results: {}", song), &clean);
        if !report.is_valid() {
            warn!("{} has {} constraint violations", song, report.violations.len());
        }

        let comparison = if options.compare {
            self.compare_with_groundtruth(song, &report)?
        } else {
            None
        };

        Ok(SongOutcome {
            song: song.to_string(),
            results,
            output_path,
            reasoning_path,
            report,
            comparison,
        })
    }

    /// Compare a song's report with its groundtruth, when one exists
    pub fn compare_with_groundtruth(
        &self,
        song: &str,
        report: &ValidationReport,
    ) -> Result<Option<ComparisonReport>> {
        let path = self.config.paths.groundtruth_dir.join(groundtruth_file_name(song));
        if !path.exists() {
            warn!("Groundtruth file not found: {:?}", path);
            return Ok(None);
        }
        let reference = validate_file(&path)?;
        Ok(Some(ComparisonReport::new(report.clone(), reference)))
    }

    /// Process every song in the beats directory.
    ///
    /// A song that cannot be processed is logged and skipped.
    pub async fn process_all(&self, options: &PredictOptions) -> Result<Vec<SongOutcome>> {
        let songs = list_songs(&self.config.paths.beats_dir)?;
        info!("Processing {} songs: {:?}", songs.len(), songs);

        let mut outcomes = Vec::with_capacity(songs.len());
        for song in &songs {
            match self.process_song(song, options).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("{}: {:#}", song, e),
            }
        }
        Ok(outcomes)
    }
}
