//! Cross-context messaging: wire DTOs and the in-process bus

mod bus;
pub mod dto;

pub use bus::{CoordinatorEnvelope, MessageBus, PageEnvelope};
pub use dto::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a browsing context (a tab)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(u32);

impl PageId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}
