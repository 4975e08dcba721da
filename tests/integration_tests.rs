// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for beatlight
//!
//! These tests drive the public API end to end with scripted generation
//! services standing in for the LLM.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use beatlight::config::PipelineConfig;
use beatlight::effects::GroupLightEffect;
use beatlight::generation::{
    generate_all, BeatStatus, EffectGenerator, GenerationRequest, GenerationService,
    GenerationSettings, SongContext,
};
use beatlight::pipeline::{Pipeline, PredictOptions};
use beatlight::report::{merge, validate_timeline};
use beatlight::timeline::{timeline_path, Beat, TimelineFile};
use tempfile::tempdir;

/// A VFX group with motion set is always rejected
const INVALID: &str = r#"{"effects": [{"groupLightKey": 0, "MotionEffect": 3, "ColorEffect": 0, "IntensityEffect": 0, "VfxEffect": 1}]}"#;

fn beats(n: usize) -> Vec<Beat> {
    (0..n).map(|i| Beat::new(i as f64 * 0.4, 0.4)).collect()
}

fn valid_for(beat_index: usize) -> String {
    let key = 2 + beat_index % 5;
    let motion = if key < 4 { 3 } else { 1 };
    format!(
        "```json\n{{\"effects\": [{{\"groupLightKey\": {}, \"MotionEffect\": {}, \"ColorEffect\": 1, \"IntensityEffect\": 2, \"VfxEffect\": 0}}], \"reasoning\": \"beat {}\"}}\n```",
        key, motion, beat_index
    )
}

/// Valid reply per beat, after a delay that reverses completion order
struct ReversingService {
    total: usize,
}

impl GenerationService for ReversingService {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let delay = (self.total - request.beat_index) as u64 * 2;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(valid_for(request.beat_index))
    }
}

/// Fails validation on the first attempt of every beat, then complies
struct LearningService {
    seen: Mutex<HashMap<usize, Vec<GenerationRequest>>>,
}

impl GenerationService for LearningService {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let attempt = {
            let mut seen = self.seen.lock().unwrap();
            let history = seen.entry(request.beat_index).or_default();
            history.push(request.clone());
            history.len()
        };
        if attempt == 1 {
            Ok(INVALID.to_string())
        } else {
            Ok(valid_for(request.beat_index))
        }
    }
}

/// Never produces a valid set
struct StubbornService {
    calls: AtomicUsize,
}

impl GenerationService for StubbornService {
    async fn complete(&self, _request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(INVALID.to_string())
    }
}

/// Transport errors on even beats, valid replies on odd beats
struct FlakyService;

impl GenerationService for FlakyService {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        if request.beat_index % 2 == 0 {
            bail!("connection reset by peer");
        }
        Ok(valid_for(request.beat_index))
    }
}

fn write_song(root: &Path, song: &str, n: usize) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.beats_dir = root.join("beats");
    config.paths.effects_dir = root.join("effects");
    config.paths.cache_dir = root.join("cache");
    config.paths.groundtruth_dir = root.to_path_buf();

    let mut timeline = TimelineFile::from_beats(&beats(n));
    timeline.extra.insert("bpm".to_string(), serde_json::json!(150));
    timeline.save(timeline_path(&config.paths.beats_dir, song)).unwrap();
    config
}

/// Results come back in beat order regardless of completion order
#[tokio::test]
async fn test_results_in_beat_order() {
    let total = 12;
    let song = Arc::new(SongContext::new(beats(total)));
    let gen = EffectGenerator::new(
        Arc::new(ReversingService { total }),
        song,
        GenerationSettings::default(),
    );

    let results = generate_all(&gen, 4).await;
    assert_eq!(results.len(), total);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.beat_index, i);
        assert_eq!(result.status, BeatStatus::Accepted);
        assert_eq!(result.rationale, format!("beat {}", i));
    }
}

/// Violations from the first attempt are fed back into the second
#[tokio::test]
async fn test_feedback_drives_second_attempt() {
    let service = Arc::new(LearningService {
        seen: Mutex::new(HashMap::new()),
    });
    let song = Arc::new(SongContext::new(beats(3)));
    let gen = EffectGenerator::new(Arc::clone(&service), song, GenerationSettings::default());

    let results = generate_all(&gen, 3).await;
    assert!(results.iter().all(|r| r.status == BeatStatus::Accepted && r.attempts == 2));

    let seen = service.seen.lock().unwrap();
    for beat in 0..3 {
        let history = &seen[&beat];
        assert_eq!(history.len(), 2);
        assert!(!history[0].user.contains("MotionEffect should be 0"));
        let expected = format!("Beat {}, VFX key 0: MotionEffect should be 0, got 3", beat);
        assert!(history[1].user.contains(&expected));
    }
}

/// Twenty always-invalid beats: exactly max_retries calls each, 0% coverage
#[tokio::test]
async fn test_exhausted_song_degrades_to_empty_timeline() {
    let service = Arc::new(StubbornService {
        calls: AtomicUsize::new(0),
    });
    let song = Arc::new(SongContext::new(beats(20)));
    let gen = EffectGenerator::new(Arc::clone(&service), song, GenerationSettings::default());

    let results = generate_all(&gen, 5).await;
    assert_eq!(results.len(), 20);
    assert!(results
        .iter()
        .all(|r| r.status == BeatStatus::Exhausted && r.effects.is_empty() && r.attempts == 3));
    assert_eq!(service.calls.load(Ordering::SeqCst), 60);

    let (clean, _) = merge(&TimelineFile::from_beats(&beats(20)), &results).unwrap();
    let report = validate_timeline("Results: stubborn", &clean);
    assert!(report.is_valid());
    assert_eq!(report.stats.beats_with_effects, 0);
    assert_eq!(report.stats.coverage(), 0.0);
}

/// Transport failures on some beats leave the others untouched
#[tokio::test]
async fn test_failures_isolated_per_beat() {
    let song = Arc::new(SongContext::new(beats(6)));
    let gen = EffectGenerator::new(Arc::new(FlakyService), song, GenerationSettings::default());

    let results = generate_all(&gen, 2).await;
    for result in &results {
        if result.beat_index % 2 == 0 {
            assert_eq!(result.status, BeatStatus::Exhausted);
            assert!(result.effects.is_empty());
        } else {
            assert_eq!(result.status, BeatStatus::Accepted);
            assert_eq!(result.effects.len(), 1);
        }
    }
}

/// Full pipeline: load beats, generate, save both artifacts, audit
#[tokio::test]
async fn test_full_pipeline() {
    let dir = tempdir().unwrap();
    let config = write_song(dir.path(), "24KMagic", 8);
    let effects_dir = config.paths.effects_dir.clone();

    let pipeline = Pipeline::new(config, Arc::new(ReversingService { total: 8 }));
    let outcome = pipeline
        .process_song("24KMagic", &PredictOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.output_path, effects_dir.join("TimeLine_24KMagic.json"));
    assert!(outcome.report.is_valid());
    assert_eq!(outcome.report.stats.beats_with_effects, 8);

    let clean = TimelineFile::load(&outcome.output_path).unwrap();
    assert_eq!(clean.extra["bpm"], 150);
    let first: GroupLightEffect =
        serde_json::from_value(clean.beats[0].group_lights.as_ref().unwrap()[0].clone()).unwrap();
    assert_eq!(first, GroupLightEffect::new(2, 3, 1, 2, 0));

    let reasoning = TimelineFile::load(&outcome.reasoning_path).unwrap();
    assert_eq!(reasoning.beats[7].reasoning.as_deref(), Some("beat 7"));
    assert_eq!(reasoning.beats[7].group_lights, clean.beats[7].group_lights);
}

/// Disallowing empty beats turns an empty reply into a retry
#[tokio::test]
async fn test_empty_policy_requires_effects() {
    struct EmptyThenActive {
        calls: AtomicUsize,
    }

    impl GenerationService for EmptyThenActive {
        async fn complete(&self, request: &GenerationRequest) -> Result<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(r#"{"effects": [], "reasoning": "rest"}"#.to_string())
            } else {
                Ok(valid_for(request.beat_index))
            }
        }
    }

    let settings = GenerationSettings {
        allow_empty_beats: false,
        ..Default::default()
    };
    let song = Arc::new(SongContext::new(beats(1)));
    let gen = EffectGenerator::new(
        Arc::new(EmptyThenActive {
            calls: AtomicUsize::new(0),
        }),
        song,
        settings,
    );

    let result = gen.generate(0).await;
    assert_eq!(result.status, BeatStatus::Accepted);
    assert_eq!(result.attempts, 2);
    assert!(result.has_effects());
}

/// Twenty beats answered with a valid empty list: breathing room everywhere
#[tokio::test]
async fn test_empty_replies_give_zero_coverage() {
    struct RestService;

    impl GenerationService for RestService {
        async fn complete(&self, _request: &GenerationRequest) -> Result<String> {
            Ok(r#"{"effects": [], "reasoning": "hold"}"#.to_string())
        }
    }

    let song = Arc::new(SongContext::new(beats(20)));
    let gen = EffectGenerator::new(Arc::new(RestService), song, GenerationSettings::default());

    let results = generate_all(&gen, 5).await;
    assert_eq!(results.len(), 20);
    assert!(results
        .iter()
        .all(|r| r.status == BeatStatus::Accepted && r.effects.is_empty() && r.attempts == 1));

    let (clean, _) = merge(&TimelineFile::from_beats(&beats(20)), &results).unwrap();
    let report = validate_timeline("Results: rest", &clean);
    assert_eq!(report.violations.len(), 0);
    assert_eq!(report.stats.beats_empty, 20);
    assert_eq!(report.stats.coverage(), 0.0);
}
