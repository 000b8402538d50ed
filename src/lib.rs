//! # Lawdex
//!
//! A retrieval-augmented legal-assistance backend for jeonse-fraud
//! counseling.
//!
//! Lawdex turns a corpus of statute documents into content-addressed
//! vector-store entries, keeps them incrementally updatable through a
//! per-source manifest, and answers user questions from the retrieved
//! passages with reference numbers that match the returned source list
//! one to one.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌──────────────┐
//! │ Statute docs │──▶│ Indexing pipeline   │──▶│ Vector index  │
//! │ (.docx)      │   │ extract→chunk→embed │   │ (namespace)   │
//! └──────────────┘   └─────────┬──────────┘   └──────┬───────┘
//!                              │ manifest             │
//!                    ┌─────────▼──────────┐   ┌──────▼───────┐
//!                    │ Metadata backfill   │   │ Ask path     │
//!                    │ 조/항/호 citations  │   │ retrieve→cite│
//!                    └────────────────────┘   │ →compose     │
//!                                             └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | docx block extraction and whitespace normalization |
//! | [`chunk`] | Deterministic recursive-separator chunking |
//! | [`embedding`] | Embedding model client |
//! | [`completion`] | Chat completion model client |
//! | [`store`] | Vector index adapter |
//! | [`metadata`] | Typed vector metadata and the sanitize boundary |
//! | [`manifest`] | Per-source indexing manifest |
//! | [`pipeline`] | Idempotent corpus indexing |
//! | [`backfill`] | Derived citation metadata backfill |
//! | [`retrieve`] | Question-time retrieval |
//! | [`cite`] | Dedupe, reference numbering, source list |
//! | [`answer`] | Prompt composition and the ask path |
//! | [`history`] | Conversation history provider interface |

pub mod answer;
pub mod backfill;
pub mod chunk;
pub mod cite;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod history;
pub mod manifest;
pub mod metadata;
pub mod pipeline;
pub mod retrieve;
pub mod store;
