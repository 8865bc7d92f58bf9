//! Core library for listings
//!
//! This crate implements the **Functional Core** of the listings tool,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! - **`listings_core`** (this crate): code-block detection as pure functions
//!   over page text and bitmaps
//! - **`pdf`**: document access (text layer and embedded page scans)
//! - **`listings`**: the CLI, collaborator adapters and artifact persistence
//!
//! Rendering, text extraction and OCR reach the core only through the traits
//! in [`pipeline`], so every stage can be tested with in-memory fixtures.
//!
//! # Module Organization
//!
//! Detection stages, in the order a page flows through them:
//!
//! - [`classifier`]: decides from text whether a page is worth analysing
//! - [`regions`]: finds shaded code-block backgrounds in a page bitmap
//! - [`segmenter`]: splits numbered code lines from the description
//! - [`dedup`]: reconciles overlapping regions and the two detectors
//! - [`merger`]: joins blocks continued across a page break
//! - [`validator`]: drops blocks that contain no code
//! - [`tasks`]: numbers and names the OCR work list
//!
//! Supporting modules: [`types`], [`config`], [`normalize`], [`report`] and
//! [`pipeline`], which drives the stages over a page range.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use listings_core::config::DetectionConfig;
//! use listings_core::pipeline::Pipeline;
//!
//! let config = DetectionConfig::default();
//! let output = Pipeline::new(&config, &text_extractor)
//!     .with_renderer(&renderer)
//!     .run(1..=page_count);
//!
//! for task in &output.tasks {
//!     println!("{} {:?}", task.output_file, task.pages);
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod dedup;
pub mod merger;
pub mod normalize;
pub mod pipeline;
pub mod regions;
pub mod report;
pub mod segmenter;
pub mod tasks;
pub mod types;
pub mod validator;
