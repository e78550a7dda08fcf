//! SeaORM entity models
//!
//! Database entities for PaperShelf

mod paper;

use serde::{Deserialize, Serialize};

pub use paper::{
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
    Entity as PaperEntity,
    Model as Paper,
};

/// The mutable fields of a paper, already validated.
///
/// Used for both create and update; the store assigns `id` and the
/// timestamps itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPaper {
    pub title: String,
    pub authors: String,
    pub published_in: String,
    pub year: i32,
}
