//! UI rendering module

mod cores;
mod layout;

pub use layout::render;
