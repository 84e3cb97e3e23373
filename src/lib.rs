// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Command Tree
//!
//! A generic, tree-structured command dispatcher.
//!
//! This crate parses whitespace-delimited textual input from a generic
//! "sender" into a structured invocation, offers interactive completion
//! suggestions, and resolves permissions along the matched path.
//!
//! * Commands are assembled from [`Component`]s (literals, required
//!   variables, optional variables, flags) via [`CommandBuilder`] and
//!   registered into a [`CommandTree`].
//! * A [`CommandManager`] owns the tree, a registration handler, and a
//!   preprocessor pipeline, and exposes the `parse`/`suggest` entry points
//!   senders actually call.
//!
//! Individual value parsers (integer, string, enum, ...), caption
//! formatting, annotation-driven discovery, and per-platform registration
//! adapters are external collaborators, not part of this crate: this crate
//! only consumes the interfaces they expose ([`ArgumentParser`],
//! [`SuggestionSource`]).
//!
//! [`Component`]: component::Component
//! [`CommandBuilder`]: command::CommandBuilder
//! [`CommandTree`]: tree::CommandTree
//! [`CommandManager`]: manager::CommandManager
//! [`ArgumentParser`]: component::ArgumentParser
//! [`SuggestionSource`]: component::SuggestionSource

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod command;
pub mod component;
pub mod context;
pub mod error;
pub mod input;
pub mod manager;
pub mod node;
pub mod parse_result;
pub mod permission;
pub mod tree;

pub use command::{Command, CommandBuilder};
pub use component::{Component, ComponentKind, Suggestion};
pub use context::CommandContext;
pub use error::{CommandError, CommandParseError, RegistrationError};
pub use input::CommandInput;
pub use manager::{CommandManager, ManagerSettings};
pub use parse_result::ParseResult;
pub use permission::{PermissionExpr, PermissionResult};
pub use tree::CommandTree;
