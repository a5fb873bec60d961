//! Prelude module for pagewise-list.

pub use pagewise_engine::prelude::*;

pub use crate::{EntityList, ListFilter, ListResource};
