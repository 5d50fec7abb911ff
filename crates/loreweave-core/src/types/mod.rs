//! Core types for loreweave.

mod command;
mod entity;
mod message;
mod relationship;

pub use command::*;
pub use entity::*;
pub use message::*;
pub use relationship::*;
