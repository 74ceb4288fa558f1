//! UI components and primitives for the CLI

pub mod progress;

pub use progress::*;
