//! aeroquery - sorted-stream merge execution for a document store
//!
//! A query plan merges several index scans, each ordered by the same sort
//! pattern, into one ordered result stream. Plans yield between units of
//! work and survive concurrent deletes and moves through invalidation.

pub mod cli;
pub mod config;
pub mod executor;
pub mod index;
pub mod observability;
pub mod storage;
