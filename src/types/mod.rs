//! Core types for the sagaflow runtime.
//!
//! This module contains the fundamental types used throughout the runtime:
//!
//! - [`id`]: Identifier types (`TaskId`, `EffectId`, `IdGen`, `Time`)
//! - [`outcome`]: Three-valued outcome type
//! - [`action`]: The event type dispatched through the hub
//! - [`value`]: Dynamic resumption values and the `Resume` input

pub mod action;
pub mod id;
pub mod outcome;
pub mod value;

pub use action::Action;
pub use id::{EffectId, IdGen, TaskId, Time};
pub use outcome::Outcome;
pub use value::{Resume, Value};
