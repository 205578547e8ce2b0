//! # Asset Pipeline
//!
//! Single-pass build tool for static sites.
//!
//! One invocation turns a source tree of page templates, styles, scripts, images
//! and fonts into a deployable output tree.
//!
//! ## Features
//!
//! - Development and production modes (content-hashed names and minification in production)
//! - Page templates with `{{> partial.html}}` includes and automatic asset injection
//! - Built-in SCSS subset, lint/auto-fix, media-query consolidation and vendor prefixing
//! - Lossless SVG and PNG compression
//! - External commands as drop-in transformers
//! - Parallel asset phase using Rayon, all-or-nothing output
//!
//! ## Usage
//!
//! ```ignore
//! use asset_pipeline::assembler::{run_build, BuildStats};
//! use asset_pipeline::config::{Config, SiteLayout};
//! use asset_pipeline::mode::BuildMode;
//! use std::sync::atomic::AtomicBool;
//!
//! let config = Config::new(SiteLayout::new("src", "app"), BuildMode::Production);
//! let report = run_build(&config, &AtomicBool::new(false), &BuildStats::new(), None)?;
//! ```

/// Two-phase build and output commit
pub mod assembler;

/// CLI configuration and argument parsing
pub mod config;

/// Artifact writing with disk-full detection
pub mod copier;

/// Error types for build operations
pub mod error;

/// Placeholder cleanup before a build
pub mod housekeeping;

/// Build mode and mode-derived policy
pub mod mode;

/// Page discovery
pub mod pages;

/// Logical path resolution
pub mod paths;

/// Source tree scanning into a build plan
pub mod plan;

/// Extension-based asset routing
pub mod router;

/// Transformer trait and built-in transformers
pub mod transform;
