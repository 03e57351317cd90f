//! Domain model module declarations.

pub mod label;
pub mod state;
pub mod warn_words;
