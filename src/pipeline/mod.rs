//! Pipeline stages for SAPS document extraction.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the extraction service can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ batch ──▶ request ──▶ llm ──▶ parse ──▶ merge ──▶ finalize
//! (check)   (chunk)   (payload)   (VLM)   (JSON)    (fill)    (fallback)
//! ```
//!
//! 1. [`input`]: reject unsupported uploads before any work is done
//! 2. [`batch`]: filter page-image URLs and cut them into batches
//! 3. [`request`]: build a deterministic request for one batch
//! 4. [`llm`]: call the [`llm::ExtractionService`] with overload retry;
//!    the only stage with network I/O ([`anthropic`], [`provider`])
//! 5. [`parse`]: find the JSON record in the reply (two schemas)
//! 6. [`merge`]: fill-forward merge; [`completeness`] decides early exit
//! 7. [`finalize`]: usable-data check, [`fallback`] placeholders, revenue

pub mod anthropic;
pub mod batch;
pub mod completeness;
pub mod fallback;
pub mod finalize;
pub mod input;
pub mod llm;
pub mod merge;
pub mod parse;
pub mod provider;
pub mod request;
