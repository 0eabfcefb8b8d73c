// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Property references, templates and the per-execution reference store.
//!
//! A [`Reference`] is an absolute `<resource>:<path>` address. Templates wrap
//! references, literals and function calls inside `{{ ... }}`. The
//! [`ReferenceStore`] holds every value produced during one execution; each
//! resource slot is owned by exactly one node and written at most once.

mod reference;
mod resolve;
mod store;
mod template;

pub(crate) use reference::{header_resource, input_header};
pub use reference::{Reference, HEADER_SUFFIX, INPUT_RESOURCE, OUTPUT_RESOURCE, ROOT_PATH, STACK_RESOURCE};
pub use resolve::{
    resolve_header, resolve_template, resolve_tree, MissingValue, PropertyError, PropertyTree, Strictness,
};
pub use store::{Lookup, ReferenceStore, StoreError};
pub use template::{Template, TemplateError};
