//! In-memory page document
//!
//! A minimal element tree with the pieces the gain pipeline relies on:
//! media elements with native volume, insertion notifications delivered as
//! batches, and weak element handles.

mod document;
mod element;

pub use document::{Document, MutationBatch, MutationRecord};
pub use element::{Element, ElementId, ListenerId, MediaKind, VolumeListener, WeakElement};
