// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Single-beat effect generator.
//!
//! Builds the request for one beat, calls the service, validates every
//! candidate, and retries with the violations as feedback until a valid set
//! is produced or the attempt budget runs out. Failures never leave the beat.

use std::sync::Arc;

use tracing::{debug, warn};

use super::decode::decode_response;
use super::prompt::{feedback_appendix, system_prompt, user_prompt};
use super::retry::{AttemptOutcome, RetryMachine, RetryState};
use super::{
    BeatStatus, GeneratedBeat, GenerationRequest, GenerationService, GenerationSettings,
    SongContext,
};
use crate::effects::{policy_violations, validate_all, BeatEffectSet, GroupLightEffect};

/// Generates validated effect sets for the beats of one song
pub struct EffectGenerator<S> {
    service: Arc<S>,
    song: Arc<SongContext>,
    settings: GenerationSettings,
    system: Arc<str>,
}

impl<S> Clone for EffectGenerator<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            song: Arc::clone(&self.song),
            settings: self.settings.clone(),
            system: Arc::clone(&self.system),
        }
    }
}

impl<S: GenerationService> EffectGenerator<S> {
    /// Create a generator over a song
    pub fn new(service: Arc<S>, song: Arc<SongContext>, settings: GenerationSettings) -> Self {
        let system = system_prompt(settings.allow_empty_beats).into();
        Self {
            service,
            song,
            settings,
            system,
        }
    }

    pub fn song(&self) -> &SongContext {
        &self.song
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Judge one response
    pub fn evaluate(&self, beat_index: usize, text: &str) -> AttemptOutcome {
        let decoded = match decode_response(text) {
            Ok(decoded) => decoded,
            Err(e) => return AttemptOutcome::Malformed(e.to_string()),
        };

        let mut violations = validate_all(&decoded.candidates, beat_index);
        violations.extend(policy_violations(
            &decoded.candidates,
            beat_index,
            self.settings.allow_empty_beats,
        ));
        if !violations.is_empty() {
            return AttemptOutcome::Invalid(violations);
        }

        let effects = decoded
            .candidates
            .iter()
            .map(GroupLightEffect::try_from)
            .collect::<Result<Vec<_>, _>>();
        match effects {
            Ok(effects) => AttemptOutcome::Valid {
                effects: BeatEffectSet::new(effects),
                rationale: decoded.rationale,
            },
            Err(e) => AttemptOutcome::Malformed(e.to_string()),
        }
    }

    /// Generate the effect set of one beat.
    ///
    /// Always returns a result: after `max_retries` failed attempts the
    /// result is an empty set with an empty rationale.
    pub async fn generate(&self, beat_index: usize) -> GeneratedBeat {
        if beat_index >= self.song.len() {
            warn!(
                "Beat {} out of range ({} beats), using empty []",
                beat_index,
                self.song.len()
            );
            return GeneratedBeat::fallback(beat_index, 0, BeatStatus::Exhausted);
        }

        let base_prompt = user_prompt(&self.song, beat_index, &self.settings);
        let mut machine = RetryMachine::new(self.settings.max_retries);

        while let Some(attempt) = machine.begin() {
            let mut user = base_prompt.clone();
            if let Some(feedback) = &attempt.feedback {
                user.push_str(&feedback_appendix(feedback));
            }
            let request = GenerationRequest {
                beat_index,
                attempt: attempt.number,
                system: self.system.to_string(),
                user,
            };

            let outcome = match self.service.complete(&request).await {
                Ok(text) => self.evaluate(beat_index, &text),
                Err(e) => AttemptOutcome::Failed(format!("{:#}", e)),
            };

            match &outcome {
                AttemptOutcome::Valid { effects, .. } => debug!(
                    "Beat {}: attempt {} accepted ({} groups)",
                    beat_index,
                    attempt.number,
                    effects.len()
                ),
                AttemptOutcome::Invalid(violations) => debug!(
                    "Beat {}: attempt {} has {} violations ({} policy)",
                    beat_index,
                    attempt.number,
                    violations.len(),
                    violations.iter().filter(|v| v.is_policy()).count()
                ),
                AttemptOutcome::Malformed(reason) => debug!(
                    "Beat {}: attempt {} malformed response: {}",
                    beat_index, attempt.number, reason
                ),
                AttemptOutcome::Failed(reason) => warn!(
                    "Beat {}: attempt {} failed: {}",
                    beat_index, attempt.number, reason
                ),
            }

            machine.record(outcome);
        }

        match machine.state() {
            RetryState::Accepted {
                attempt,
                effects,
                rationale,
            } => GeneratedBeat {
                beat_index,
                effects: effects.clone(),
                rationale: rationale.clone(),
                attempts: *attempt,
                status: BeatStatus::Accepted,
            },
            _ => {
                warn!(
                    "Beat {}: failed after {}/{} attempts, using empty []",
                    beat_index,
                    machine.attempts(),
                    machine.max_retries()
                );
                GeneratedBeat::fallback(beat_index, machine.attempts(), BeatStatus::Exhausted)
            }
        }
    }
}
