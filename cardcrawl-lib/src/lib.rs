#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for cardcrawl
//!
//! This library consolidates all functionality for the cardcrawl tool, which crawls a
//! paginated card catalog, extracts one record per card page, and relocates the media
//! those records reference.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`fetch`]: Cached page fetching
//! - [`extract`]: Listing and item page extraction rules
//! - [`model`]: Records and the sorted dataset
//! - [`pipeline`]: Discovery, worker pools, collection, relocation, and downloads
//! - [`output`]: Dataset serialization

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

pub mod extract;
pub mod fetch;
pub mod model;
pub mod output;
pub mod pipeline;

pub use crate::commands::{Host, run};
