//! Catalog domain model.
//!
//! # Responsibility
//! - Define the book record stored in the `books` collection.
//! - Own the fixed sample catalog used to seed each run.
//!
//! # Invariants
//! - Titles are unique within the sample catalog.

pub mod book;
