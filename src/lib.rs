//! MatteFE — interactive raster editor for a difference-matting pipeline.
//!
//! The library exposes the editing core (viewport transform, layer model,
//! compositing renderer, buffer-state tracker, lasso capture, bounded undo
//! and the mode controller) plus the compute-engine contract and a small
//! built-in engine.  The binary in `src/main.rs` wires it into an eframe
//! shell.

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod app;
pub mod controller;
pub mod engine;
pub mod history;
pub mod lasso;
pub mod layers;
pub mod matting;
pub mod render;
pub mod settings;
pub mod tracker;
pub mod viewport;
