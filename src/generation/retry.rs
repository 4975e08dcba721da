// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-beat retry state machine.
//!
//! Each beat moves through `Attempting` -> (`ValidationFailed` ->
//! `Attempting`)* -> `Accepted` | `Exhausted`. Violations found on one
//! attempt become the feedback for the next. Malformed responses and service
//! failures consume an attempt but keep whatever feedback was pending.

use crate::effects::{BeatEffectSet, Violation};

/// Violation messages relayed per retry
pub const MAX_FEEDBACK_VIOLATIONS: usize = 5;

/// What one attempt produced
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Every candidate passed validation
    Valid {
        effects: BeatEffectSet,
        rationale: String,
    },
    /// At least one candidate broke a rule
    Invalid(Vec<Violation>),
    /// No effect list could be extracted from the response
    Malformed(String),
    /// The service call itself failed
    Failed(String),
}

/// State of one beat's generation
#[derive(Debug, Clone, PartialEq)]
pub enum RetryState {
    /// Ready to issue `attempt` (1-indexed), with optional corrective feedback
    Attempting {
        attempt: u32,
        feedback: Option<String>,
    },
    /// `attempt` produced violations; the next attempt carries `feedback`
    ValidationFailed { attempt: u32, feedback: String },
    /// `attempt` produced a valid set
    Accepted {
        attempt: u32,
        effects: BeatEffectSet,
        rationale: String,
    },
    /// All attempts were spent without a valid set
    Exhausted {
        attempts: u32,
        last_feedback: Option<String>,
    },
}

/// An attempt to issue
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub number: u32,
    pub feedback: Option<String>,
}

/// Compose corrective feedback from the first few violations
pub fn compose_feedback(violations: &[Violation]) -> String {
    violations
        .iter()
        .take(MAX_FEEDBACK_VIOLATIONS)
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Retry bookkeeping for one beat
#[derive(Debug, Clone)]
pub struct RetryMachine {
    max_retries: u32,
    state: RetryState,
}

impl RetryMachine {
    /// Create a machine allowing `max_retries` attempts
    pub fn new(max_retries: u32) -> Self {
        let state = if max_retries == 0 {
            RetryState::Exhausted {
                attempts: 0,
                last_feedback: None,
            }
        } else {
            RetryState::Attempting {
                attempt: 1,
                feedback: None,
            }
        };
        Self { max_retries, state }
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// True once accepted or exhausted
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            RetryState::Accepted { .. } | RetryState::Exhausted { .. }
        )
    }

    /// The attempt to issue next, or None when finished
    pub fn begin(&mut self) -> Option<Attempt> {
        if let RetryState::ValidationFailed { attempt, feedback } = &self.state {
            self.state = RetryState::Attempting {
                attempt: attempt + 1,
                feedback: Some(feedback.clone()),
            };
        }
        match &self.state {
            RetryState::Attempting { attempt, feedback } => Some(Attempt {
                number: *attempt,
                feedback: feedback.clone(),
            }),
            _ => None,
        }
    }

    /// Record the outcome of the current attempt
    pub fn record(&mut self, outcome: AttemptOutcome) {
        let (attempt, feedback) = match &self.state {
            RetryState::Attempting { attempt, feedback } => (*attempt, feedback.clone()),
            _ => return,
        };
        let last = attempt >= self.max_retries;

        self.state = match outcome {
            AttemptOutcome::Valid { effects, rationale } => RetryState::Accepted {
                attempt,
                effects,
                rationale,
            },
            AttemptOutcome::Invalid(violations) => {
                let feedback = compose_feedback(&violations);
                if last {
                    RetryState::Exhausted {
                        attempts: attempt,
                        last_feedback: Some(feedback),
                    }
                } else {
                    RetryState::ValidationFailed { attempt, feedback }
                }
            }
            AttemptOutcome::Malformed(_) | AttemptOutcome::Failed(_) => {
                if last {
                    RetryState::Exhausted {
                        attempts: attempt,
                        last_feedback: feedback,
                    }
                } else {
                    RetryState::Attempting {
                        attempt: attempt + 1,
                        feedback,
                    }
                }
            }
        };
    }

    /// Attempts issued so far
    pub fn attempts(&self) -> u32 {
        match &self.state {
            RetryState::Attempting { attempt, .. } => attempt - 1,
            RetryState::ValidationFailed { attempt, .. } => *attempt,
            RetryState::Accepted { attempt, .. } => *attempt,
            RetryState::Exhausted { attempts, .. } => *attempts,
        }
    }
}
