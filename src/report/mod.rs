// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Aggregation and reporting.
//!
//! Merges per-beat results back into a timeline, audits timelines against
//! the constraint grammar, and renders statistics and comparisons as text.

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::path::Path;

use anyhow::{bail, Result};

use crate::effects::{advisories, validate, GroupLightEffect, Violation};
use crate::generation::GeneratedBeat;
use crate::timeline::TimelineFile;

const RULE: &str = "==================================================";

/// Merge generation results into a timeline.
///
/// Returns the clean timeline and a rationale copy carrying a `reasoning`
/// field on every beat. `results` must hold one entry per beat.
pub fn merge(
    timeline: &TimelineFile,
    results: &[GeneratedBeat],
) -> Result<(TimelineFile, TimelineFile)> {
    if results.len() != timeline.len() {
        bail!(
            "Result count {} does not match beat count {}",
            results.len(),
            timeline.len()
        );
    }

    let mut clean = timeline.clone();
    for beat in clean.beats.iter_mut() {
        beat.reasoning = None;
    }
    for result in results {
        clean.set_effects(result.beat_index, &result.effects)?;
    }

    let mut reasoning = clean.clone();
    for result in results {
        reasoning.beats[result.beat_index].reasoning = Some(result.rationale.clone());
    }
    Ok((clean, reasoning))
}

/// Aggregate statistics of a timeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineStats {
    pub total_beats: usize,
    pub beats_with_effects: usize,
    pub beats_empty: usize,
    /// Usage histograms over validated effects only
    pub group_key_usage: BTreeMap<u8, usize>,
    pub motion_usage: BTreeMap<u8, usize>,
    pub color_usage: BTreeMap<u8, usize>,
    pub intensity_usage: BTreeMap<u8, usize>,
    pub vfx_usage: BTreeMap<u8, usize>,
    /// Non-blocking recommendations raised by validated effects
    pub advisory_count: usize,
}

impl TimelineStats {
    /// Percentage of beats with at least one effect
    pub fn coverage(&self) -> f64 {
        if self.total_beats == 0 {
            0.0
        } else {
            self.beats_with_effects as f64 / self.total_beats as f64 * 100.0
        }
    }

    fn record(&mut self, effect: &GroupLightEffect) {
        *self.group_key_usage.entry(effect.group_light_key).or_default() += 1;
        *self.motion_usage.entry(effect.motion).or_default() += 1;
        *self.color_usage.entry(effect.color).or_default() += 1;
        *self.intensity_usage.entry(effect.intensity).or_default() += 1;
        *self.vfx_usage.entry(effect.vfx).or_default() += 1;
    }

    /// Render as a labeled text block
    pub fn render(&self, label: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n{}", RULE);
        let _ = writeln!(out, "  {}", label);
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(out, "  Total beats:        {}", self.total_beats);
        let _ = writeln!(
            out,
            "  With effects:       {} ({:.1}%)",
            self.beats_with_effects,
            self.coverage()
        );
        let _ = writeln!(out, "  Empty:              {}", self.beats_empty);
        let _ = writeln!(out, "  GroupKey usage:     {}", histogram(&self.group_key_usage));
        let _ = writeln!(out, "  Motion usage:       {}", histogram(&self.motion_usage));
        let _ = writeln!(out, "  Color usage:        {}", histogram(&self.color_usage));
        let _ = writeln!(out, "  Intensity usage:    {}", histogram(&self.intensity_usage));
        let _ = writeln!(out, "  VFX usage:          {}", histogram(&self.vfx_usage));
        let _ = write!(out, "  Advisories:         {}", self.advisory_count);
        out
    }
}

fn histogram(usage: &BTreeMap<u8, usize>) -> String {
    let entries: Vec<String> = usage.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
    format!("{{{}}}", entries.join(", "))
}

/// Result of auditing one timeline
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub label: String,
    pub violations: Vec<Violation>,
    pub advisories: Vec<String>,
    pub stats: TimelineStats,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Render stats plus at most `limit` violations
    pub fn render(&self, limit: usize) -> String {
        let mut out = self.stats.render(&self.label);
        out.push('\n');
        if self.is_valid() {
            out.push_str("\n✅ All constraints satisfied!");
        } else {
            let _ = writeln!(out, "\n⚠ {} constraint violations:", self.violations.len());
            out.push_str(&render_violations(&self.violations, limit));
        }
        if !self.advisories.is_empty() {
            let _ = writeln!(out, "\n\nℹ {} advisories:", self.advisories.len());
            out.push_str(&render_list(&self.advisories, limit));
        }
        out
    }
}

fn render_list<T: fmt::Display>(items: &[T], limit: usize) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .take(limit)
        .map(|item| format!("  - {}", item))
        .collect();
    if items.len() > limit {
        lines.push(format!("  ... and {} more", items.len() - limit));
    }
    lines.join("\n")
}

/// List violations, truncating after `limit` with "... and N more"
pub fn render_violations(violations: &[Violation], limit: usize) -> String {
    render_list(violations, limit)
}

/// Audit a timeline against the constraint grammar
pub fn validate_timeline(label: &str, timeline: &TimelineFile) -> ValidationReport {
    let mut stats = TimelineStats {
        total_beats: timeline.len(),
        ..Default::default()
    };
    let mut violations = Vec::new();
    let mut notes = Vec::new();

    for (i, beat) in timeline.beats.iter().enumerate() {
        if beat.effect_count() > 0 {
            stats.beats_with_effects += 1;
        } else {
            stats.beats_empty += 1;
        }

        for candidate in beat.candidates() {
            let found = validate(&candidate, i);
            if !found.is_empty() {
                violations.extend(found);
                continue;
            }
            if let Ok(effect) = GroupLightEffect::try_from(&candidate) {
                stats.record(&effect);
                notes.extend(advisories(&effect, i));
            }
        }
    }

    stats.advisory_count = notes.len();
    ValidationReport {
        label: label.to_string(),
        violations,
        advisories: notes,
        stats,
    }
}

/// Load and audit a timeline file
pub fn validate_file<P: AsRef<Path>>(path: P) -> Result<ValidationReport> {
    let path = path.as_ref();
    let timeline = TimelineFile::load(path)?;
    Ok(validate_timeline(&path.display().to_string(), &timeline))
}

/// Predicted timeline audited side by side with a reference
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub predicted: ValidationReport,
    pub reference: ValidationReport,
}

impl ComparisonReport {
    pub fn new(mut predicted: ValidationReport, mut reference: ValidationReport) -> Self {
        predicted.label = "PREDICTED".to_string();
        reference.label = "GROUNDTRUTH".to_string();
        Self {
            predicted,
            reference,
        }
    }

    /// Audit two timeline files
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(predicted: P, reference: Q) -> Result<Self> {
        Ok(Self::new(validate_file(predicted)?, validate_file(reference)?))
    }

    /// Coverage difference, predicted minus reference
    pub fn coverage_delta(&self) -> f64 {
        self.predicted.stats.coverage() - self.reference.stats.coverage()
    }

    pub fn render(&self, limit: usize) -> String {
        let mut out = self.predicted.stats.render(&self.predicted.label);
        out.push('\n');
        out.push_str(&self.reference.stats.render(&self.reference.label));
        out.push('\n');

        let violations = &self.predicted.violations;
        if violations.is_empty() {
            out.push_str("\n✅ Predicted passes all constraint checks!\n");
        } else {
            let _ = writeln!(
                out,
                "\n⚠ Predicted has {} constraint violations:",
                violations.len()
            );
            out.push_str(&render_violations(violations, limit));
            out.push('\n');
        }
        if !self.reference.violations.is_empty() {
            let _ = writeln!(
                out,
                "\n  Groundtruth has {} constraint violations",
                self.reference.violations.len()
            );
        }

        let _ = write!(
            out,
            "\n  Effect coverage: predicted={:.1}% vs groundtruth={:.1}% ({:+.1} pts)",
            self.predicted.stats.coverage(),
            self.reference.stats.coverage(),
            self.coverage_delta()
        );
        out
    }
}
