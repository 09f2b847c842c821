//! Core infrastructure for modernize.
//!
//! This crate provides the language-agnostic half of the toolchain:
//! - Facts model exchanged between every component
//! - Lexical utilities and SQL literal analysis shared by the extractors
//! - Structural extractor trait for pluggable language support
//! - MigrationMapper (source facts to a phased migration plan)
//! - ProjectComparator (source and target facts to a coverage report)
//! - Error types, error codes and JSON output types for CLI responses
//! - Layered configuration, directory loading and the facts cache

pub mod adapter;
pub mod cache;
pub mod compare;
pub mod config;
pub mod error;
pub mod facts;
pub mod mapper;
pub mod output;
pub mod sql;
pub mod text;
pub mod workspace;
