//! `beans-lib` — file-backed issue tracking.
//!
//! Each bean is a markdown file with YAML front matter inside a `.beans/`
//! directory. The store keeps an in-memory index of those files, guards
//! writes with ETags, checks the link graph, watches the directory for
//! outside edits and can drive a git branch per bean.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use beans_lib::{Bean, BeanStore, Config, LinkType, Status};
//!
//! let store = Arc::new(BeanStore::init(".beans", Config::default()).unwrap());
//!
//! // Create
//! let epic = store.create(Bean::new("Ship the watcher")).unwrap();
//! let mut task = Bean::new("Debounce events");
//! task.add_link(LinkType::Parent, epic.id.clone());
//! let task = store.create(task).unwrap();
//!
//! // Optimistic update
//! let etag = task.etag().unwrap();
//! let mut edit = task.clone();
//! edit.status = Status::InProgress;
//! store.update(edit, Some(&etag)).unwrap();
//!
//! // Follow outside edits
//! store.watch().unwrap();
//! let sub = store.subscribe().unwrap();
//! if let Some(batch) = sub.recv() {
//!     for event in batch.iter() {
//!         println!("{:?} {}", event.kind, event.id);
//!     }
//! }
//! store.close();
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod etag;
pub mod gitflow;
pub mod ids;
pub mod index;
pub mod links;
pub mod model;
pub mod store;
pub mod watcher;

pub use config::{CONFIG_FILE_NAME, Config, GitFlowConfig, StoreConfig, WatchConfig};
pub use error::{BeansError, Result};
pub use gitflow::{BranchState, GitFlow};
pub use links::{BrokenLink, LinkCycle, LinkReport, SelfLink};
pub use model::{Bean, BeanType, Link, LinkType, Priority, Status};
pub use store::{BeanStore, IncomingLink, LoadReport, LoadWarning};
pub use watcher::{ChangeBatch, ChangeEvent, ChangeKind, Subscription};
