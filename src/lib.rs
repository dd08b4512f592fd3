//! Core entry point for the formpress crate.
//!
//! formpress batch-fills rich-text templates and composes positioned PDF
//! overlay sheets from tabular data.  The document engines substitute
//! `{{ key }}` placeholders without corrupting run formatting and duplicate
//! table templates across pages; the overlay compositor renders grid-mapped
//! label text onto copies of a base PDF page.

pub mod batch;
pub mod data;
pub mod document;
pub mod error;
pub mod export;
pub mod layout;
pub mod overlay;
pub mod placeholder;
pub mod substitute;
pub mod wrap;

pub use error::{Error, Result};
