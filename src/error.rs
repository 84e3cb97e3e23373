// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The error taxonomy surfaced by parsing, suggestion, and registration.

use crate::parse_result::ArgumentParseError;
use crate::permission::PermissionExpr;

/// Errors produced while parsing a sender's input against a registered
/// [`CommandTree`](crate::tree::CommandTree).
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommandError {
    /// The first token didn't match any root literal.
    #[error("no such command")]
    NoSuchCommand,

    /// The token stream diverged after a valid prefix.
    #[error("invalid syntax")]
    InvalidSyntax,

    /// The sender lacks the permission required for the matched path.
    #[error("no permission: missing {missing}")]
    NoPermission {
        /// The permission expression that was not satisfied.
        missing: PermissionExpr,
    },

    /// The matched command requires a sender sub-type the caller is not.
    #[error("this command requires a {required_sender_type} sender")]
    InvalidSender {
        /// Name of the sender type the command requires, for display.
        required_sender_type: &'static str,
    },

    /// A parser returned a failure for its sole viable branch.
    #[error("failed to parse argument: {0}")]
    ArgumentParse(#[from] ArgumentParseError),
}

/// Fatal errors raised while building or mutating a command tree. These are
/// programmer mistakes in command registration, not user input errors, and
/// are always raised eagerly at registration time.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistrationError {
    /// A node acquired a second non-literal child.
    #[error("ambiguous node: {path} already has a non-literal child '{existing}', cannot add '{new}'")]
    AmbiguousNode {
        /// Dotted path of component names leading to the ambiguous node.
        path: String,
        /// Name of the non-literal child already present.
        existing: String,
        /// Name of the non-literal child that would have been added.
        new: String,
    },

    /// Two literal siblings share an alias.
    #[error("ambiguous node: '{alias}' is claimed by both '{existing}' and '{new}' under {path}")]
    DuplicateAlias {
        /// Dotted path of component names leading to the node.
        path: String,
        /// The alias claimed by both literals.
        alias: String,
        /// Name of the literal that already claimed the alias.
        existing: String,
        /// Name of the literal that tried to claim it too.
        new: String,
    },

    /// A leaf node has no owning command.
    #[error("no command in leaf at {path}")]
    NoCommandInLeaf {
        /// Dotted path of component names leading to the leaf.
        path: String,
    },

    /// A node already has an owning command and another command tried to
    /// terminate at the same chain.
    #[error("duplicate command chain at {path}")]
    DuplicateCommandChain {
        /// Dotted path of component names leading to the node.
        path: String,
    },

    /// A [`Command`](crate::command::Command) was built with a `Required`
    /// component following an `Optional` or `Flag` component.
    #[error("required component '{name}' follows an optional or flag component")]
    RequiredAfterOptional {
        /// Name of the offending required component.
        name: String,
    },

    /// A [`Command`](crate::command::Command) was built with more than one
    /// flag component, or a flag component that was not last.
    #[error("command has more than one flag component, or a flag component that isn't last")]
    MisplacedFlag,

    /// A [`Command`](crate::command::Command) was built with zero
    /// components.
    #[error("a command must have at least one component")]
    EmptyCommand,
}

/// A [`CommandError`] augmented with the matched prefix and the sender that
/// triggered it, so a downstream formatter can render a "did you mean X"
/// style message without re-walking the tree.
#[derive(Debug)]
pub struct CommandParseError<S> {
    /// The underlying error kind.
    pub kind: CommandError,
    /// Names of the components successfully matched before the error.
    pub matched_prefix: Vec<String>,
    /// The sender whose input failed to parse.
    pub sender: S,
}

impl<S> CommandParseError<S> {
    /// Construct a `CommandParseError`.
    pub fn new(kind: CommandError, matched_prefix: Vec<String>, sender: S) -> Self {
        CommandParseError {
            kind,
            matched_prefix,
            sender,
        }
    }
}

impl<S> std::fmt::Display for CommandParseError<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.matched_prefix.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} (after {})", self.kind, self.matched_prefix.join(" "))
        }
    }
}

impl<S: std::fmt::Debug> std::error::Error for CommandParseError<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
