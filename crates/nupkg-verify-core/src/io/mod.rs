//! I/O utilities for package inspection.

pub mod temp;

pub use temp::TemporaryFile;
