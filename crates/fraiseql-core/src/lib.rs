//! # fraiseql-core
//!
//! The query-and-relationship compiler at the heart of a schema-managed,
//! multi-tenant document database layered over a relational SQL store.
//!
//! This crate compiles a declarative, schema-aware query specification
//! into a single SQL statement, and weaves a permission filter into every
//! such statement based on the caller's active role set. It never opens a
//! connection, runs a transaction, or performs I/O of any kind: the
//! [`db::SqlDriver`], [`db::RoleProvider`], and [`db::Cache`] traits mark
//! the boundary where a host application supplies those concerns.
//!
//! ## Key components
//!
//! - [`schema`]: documents, collections, attributes, indexes, and the
//!   schema store operations that mutate them.
//! - [`name_mangler`]: identifier sanitization, quoting, and physical
//!   naming.
//! - [`type_mapper`]: logical → physical column type mapping.
//! - [`permissions`]: the role set and permission grammar.
//! - [`relationship`]: JOIN emission for populate trees.
//! - [`filters`]: the filter AST and its SQL compilation.
//! - [`query`]: the `SELECT DISTINCT` query planner, including cursor
//!   pagination.
//! - [`mutation`]: insert/upsert/update/delete/increment planning.
//! - [`db`]: the dialect trait (one implementation per backend) and the
//!   external boundary traits.
//! - [`tenancy`]: the `_tenant` predicate for shared-table mode.
//! - [`hooks`]: the before-hook event registry.
//! - [`config`]: compilation-time engine configuration.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_self)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::format_push_string)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::similar_names)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::if_not_else)]
#![allow(clippy::or_fun_call)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::struct_excessive_bools)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod db;
pub mod filters;
pub mod hooks;
pub mod mutation;
pub mod name_mangler;
pub mod permissions;
pub mod query;
pub mod relationship;
pub mod schema;
pub mod tenancy;
pub mod type_mapper;

pub use config::EngineConfig;
pub use fraiseql_error::{EngineError, ErrorKind, Result};
pub use schema::{Collection, Document};
pub use tenancy::TenantContext;

/// Crate version, as reported by Cargo.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
