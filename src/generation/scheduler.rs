// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Bounded-concurrency fan-out over all beats of a song.
//!
//! One task per beat; a semaphore caps how many run at once. Results are
//! written into a pre-sized slot array by beat index, so output order always
//! matches input order whatever the completion order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{BeatStatus, EffectGenerator, GeneratedBeat, GenerationService};

/// Generate every beat of the generator's song.
///
/// At most `concurrency_limit` beats are in flight at any time (a limit of 0
/// is treated as 1). Returns exactly one result per beat, in beat order.
pub async fn generate_all<S: GenerationService>(
    generator: &EffectGenerator<S>,
    concurrency_limit: usize,
) -> Vec<GeneratedBeat> {
    let total = generator.song().len();
    let limit = concurrency_limit.max(1);
    info!(
        "Predicting effects for {} beats (window={}, concurrent={})",
        total,
        generator.settings().context_window,
        limit
    );

    let semaphore = Arc::new(Semaphore::new(limit));
    let completed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<(usize, JoinHandle<GeneratedBeat>)> = (0..total)
        .map(|beat_index| {
            let generator = generator.clone();
            let semaphore = Arc::clone(&semaphore);
            let completed = Arc::clone(&completed);
            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return GeneratedBeat::fallback(beat_index, 0, BeatStatus::Crashed),
                };
                let result = generator.generate(beat_index).await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                let marker = if result.has_effects() { "✓" } else { "·" };
                info!("[{}/{}] Beat {} {}", done, total, beat_index, marker);
                result
            });
            (beat_index, handle)
        })
        .collect();

    let mut slots: Vec<Option<GeneratedBeat>> = (0..total).map(|_| None).collect();
    for (beat_index, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Beat {}: task failed ({}), using empty []", beat_index, e);
                GeneratedBeat::fallback(beat_index, 0, BeatStatus::Crashed)
            }
        };
        slots[beat_index] = Some(result);
    }

    let results: Vec<GeneratedBeat> = slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.unwrap_or_else(|| GeneratedBeat::fallback(i, 0, BeatStatus::Crashed)))
        .collect();

    let with_fx = results.iter().filter(|r| r.has_effects()).count();
    info!(
        "Done! {}/{} beats have effects ({:.1}%)",
        with_fx,
        total,
        percentage(with_fx, total)
    );
    results
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
