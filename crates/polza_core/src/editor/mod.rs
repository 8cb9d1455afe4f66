//! Document tree, markup codec and the editing-surface seam.
//!
//! The real widget in a host UI sits behind [`surface::EditingSurface`];
//! [`surface::MemorySurface`] is the built-in implementation.

pub mod markup;
pub mod surface;
pub mod tree;
