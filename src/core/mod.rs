//! Core data model for size attribution.
//!
//! Intervals and their provenance (`address`), per-source interval maps
//! (`address_space`), the reconciliation engine (`coverage`), and the
//! package/file/function/section types the results are expressed in.

pub mod address;
pub mod address_space;
pub mod coverage;
pub mod function;
pub mod id;
pub mod known_addr;
pub mod package;
pub mod section;
pub mod section_store;
pub mod symbol;
