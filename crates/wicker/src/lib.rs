#![doc = include_str!("../README.md")]

mod combinator;
mod error;
mod state;

pub use crate::combinator::{
    defer, empty, group, lit, one_of, pattern, pattern_ci, Bounds, IntoRule, IntoSet, Leaf, Rule,
};
pub use crate::error::{ErrorKind, ParseError};
pub use crate::state::{ParseState, Whitespace};
