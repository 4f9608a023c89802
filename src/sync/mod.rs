//! The repository-driven generation pipeline.
//!
//! One run: acquire a working directory, clone the project's repository
//! into it, discover source files, process each file independently through
//! prompt → generate → parse → persist, then release the working directory
//! whatever happened along the way.

pub mod discover;
pub mod imports;
pub mod pipeline;
pub mod repo;
pub mod scaffold;
pub mod workdir;
