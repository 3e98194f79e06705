//! # Lumen Core
//!
//! Core library for the Lumen media server: discovers files on disk,
//! resolves them into typed library items, persists them through a
//! repository boundary, and keeps derived aggregates (artists, studios,
//! genres, collections) consistent as the filesystem and metadata change.
//!
//! ## Overview
//!
//! - **Item Resolution**: a pluggable chain of type-specific resolvers with
//!   ignore rules and shortcut flattening
//! - **Identity**: deterministic, content-addressed item ids
//! - **Item Service**: cache + persistence boundary with change events
//! - **Query Engine**: semantic queries translated into repository filters,
//!   with view scoping that can never silently widen to the whole library
//! - **Refresh Scheduler**: a priority queue of metadata refreshes with a
//!   single-flight drain loop
//! - **Library Manager**: full validation passes, post-scan consistency
//!   tasks, and the real-time monitor interlock
//!
//! ## Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`resolve`]: ignore rules, the resolver chain, and the path resolver
//! - [`identity`]: content-derived item identity
//! - [`service`]: the item service (cache + events)
//! - [`query`]: query building and execution
//! - [`refresh`]: the refresh scheduler
//! - [`postscan`]: post-scan validators
//! - [`manager`]: the library manager and monitor
//! - [`store`]: the repository boundary and the in-memory repository

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod fs;
pub mod identity;
pub mod images;
pub mod manager;
pub mod naming;
pub mod postscan;
pub mod providers;
pub mod query;
pub mod refresh;
pub mod resolve;
pub mod service;
pub mod store;

pub use config::{IdentityConfig, ScanSettings, ServerPaths};
pub use error::{LibraryError, Result};
pub use fs::{FileSystem, StdFileSystem};
pub use identity::IdGenerator;
pub use images::ImageRefresher;
pub use manager::{LibraryManager, LibraryMonitor};
pub use postscan::{PostScanTask, Progress};
pub use providers::ImageFetcher;
pub use query::{ItemQuery, ItemQueryBuilder, ItemQueryService, UserViewPolicy};
pub use refresh::{ItemRefresher, RefreshListener, RefreshScheduler};
pub use resolve::{
    IgnoreRuleSet, ItemResolver, MultiItemResolver, PathResolver, ResolverChain,
};
pub use service::{ItemChangeListener, ItemService};
pub use store::{
    InMemoryItemRepository, ItemFilter, ItemRepository, NameCountField,
};
