//! Core types for batch import

mod entity;
mod field;
mod value;

pub use entity::*;
pub use field::*;
pub use value::*;
