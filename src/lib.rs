//! # jobsight
//!
//! Adaptive extraction of job-posting fields (title, company, location,
//! description, salary) with a calibrated confidence per field and a
//! store that learns correction rules.
//!
//! The extraction logic lives in [`jobsight_core`]. This crate wires it to
//! the outside world: configuration, HTTP retrieval, PDF text, an optional
//! AI cross-validator, snapshot persistence and the `jobsight` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │ HTTP / PDF  │──▶│  ExtractorRegistry    │──▶│ Cross-       │
//! │ markup      │   │  + PatternStore       │   │ validator    │
//! └─────────────┘   └──────────┬───────────┘   └──────┬───────┘
//!                              │                      │
//!                              ▼                      ▼
//!                        ┌──────────┐          ExtractionResult
//!                        │ state.json│               (JSON)
//!                        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! jobsight parse https://boards.greenhouse.io/acme/jobs/42
//! jobsight parse https://apply.deloitte.com/jobs/1 --file posting.html
//! jobsight correct https://apply.deloitte.com/jobs/1 --field company --from "- 309308" --to Deloitte
//! jobsight stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`fetch`] | HTTP markup retrieval |
//! | [`document`] | PDF to page-segmented text |
//! | [`crossval`] | AI cross-validation collaborator |
//! | [`state`] | Store snapshot persistence |
//! | [`harness`] | Dependency-injected context |
//! | [`stats`] | Learning statistics output |

pub mod config;
pub mod crossval;
pub mod document;
pub mod fetch;
pub mod harness;
pub mod state;
pub mod stats;

pub use harness::{AnalyzeOptions, Harness};
