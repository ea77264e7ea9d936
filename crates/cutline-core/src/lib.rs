//! Cutline Core - Foundation types for the timeline engine
//!
//! This crate provides the fundamental types used throughout Cutline:
//! - Time representation (RationalTime, FrameRate, TimeRange, Speed)
//! - Geometric primitives for render transforms
//! - The shared error type

pub mod error;
pub mod geometry;
pub mod time;

pub use error::{CutlineError, Result};
pub use geometry::{Orientation, Rect, Size, Transform2D, Vec2};
pub use time::{FrameRate, RationalTime, Speed, TimeRange, TICKS_PER_SECOND};
