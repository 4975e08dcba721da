// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! beatlight - stage light effect timelines from beat grids.
//!
//! Every beat of a song is sent to a generation service with its local
//! context. The proposed effects are checked against the lighting grammar and
//! retried with the violations as feedback until they pass or the attempts
//! run out. Beats run concurrently under a fixed limit.

pub mod analysis;
pub mod config;
pub mod effects;
pub mod generation;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod timeline;
