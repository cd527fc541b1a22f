//! # Document QA
//!
//! Question answering over uploaded PDFs, with transparent Nepali ↔ English
//! translation.
//!
//! A batch of PDFs is extracted, normalized, chunked, and embedded into an
//! in-memory semantic index. Queries are answered in **document mode**
//! (top-k retrieved chunks are handed to the generator as context) when an
//! index is loaded, and in **general mode** (the question alone) otherwise.
//! Nepali queries are translated to English before retrieval and generation
//! and the answer is translated back.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────────────┐   ┌──────────────┐
//! │  Upload  │──▶│ Extract → Normalize →     │──▶│ IndexHolder  │
//! │  (PDFs)  │   │ Chunk → Embed             │   │ (Arc swap)   │
//! └──────────┘   └───────────────────────────┘   └──────┬───────┘
//!                                                       │ snapshot
//! ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────▼───────┐
//! │  Query   │──▶│ Translate │──▶│ Generate  │◀──│ Query Router │
//! │ (en/ne)  │   │  ne ↔ en  │   │           │   │ general/doc  │
//! └──────────┘   └───────────┘   └───────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Page text cleanup |
//! | [`chunk`] | Overlapping character chunks |
//! | [`extract`] | Per-page PDF text extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Semantic index and its holder |
//! | [`generation`] | Text generation providers |
//! | [`translate`] | Translation providers and segmentation |
//! | [`storage`] | Upload directory |
//! | [`retry`] | Bounded retry helper |
//! | [`ingest`] | Ingestion pipeline |
//! | [`query`] | Query routing and prompts |
//! | [`service`] | Provider wiring |
//! | [`server`] | HTTP server |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod query;
pub mod retry;
pub mod server;
pub mod service;
pub mod storage;
pub mod translate;
