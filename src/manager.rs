// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The manager facade: the entry point senders actually call.
//!
//! [`CommandManager`] owns a [`CommandTree`], a permission predicate, a
//! manager-level preprocessor pipeline, and a [`ParserRegistry`] so value
//! parsers can be looked up by the type they produce rather than threaded
//! through every call site by hand.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::command::Command;
use crate::component::{ArgumentParser, Preprocessor, Suggestion};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandParseError, RegistrationError};
use crate::input::CommandInput;
use crate::parse_result::ParseResult;
use crate::permission::{PermissionExpr, PermissionPredicate};
use crate::tree::{CommandTree, RegistrationHandler};

/// Tuning knobs for a [`CommandTree`]'s ambiguity and permission resolution.
///
/// Both default to `false`: an intermediary node's cached permission is the
/// `Or` of its descendants' (rather than overriding them), and flags attach
/// to the deepest literal/variable chain (rather than the nearest preceding
/// literal).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManagerSettings {
    /// When `true`, a node with its own owning command uses that command's
    /// permission as its cached permission instead of `Or`-ing it together
    /// with its descendants'.
    pub enforce_intermediary_permissions: bool,
    /// When `true`, a command's flag component attaches to the nearest
    /// literal ancestor rather than the chain's terminal node, so flags can
    /// appear before trailing positional arguments.
    pub liberal_flag_parsing: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        ManagerSettings {
            enforce_intermediary_permissions: false,
            liberal_flag_parsing: false,
        }
    }
}

/// A registry of value parsers, keyed by the reified type they produce.
///
/// Lets an embedder register, say, one `ArgumentParser<S, i64>` and have it
/// looked up generically wherever a command pattern needs an integer slot,
/// instead of passing concrete parser instances around by hand everywhere.
pub struct ParserRegistry<S> {
    parsers: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: 'static> ParserRegistry<S> {
    /// An empty registry.
    pub fn new() -> Self {
        ParserRegistry {
            parsers: Mutex::new(HashMap::new()),
            _marker: PhantomData,
        }
    }

    /// Register the parser used for type `T`, replacing any previous one.
    pub fn register<T: 'static>(&self, parser: Arc<dyn ArgumentParser<S, T>>) {
        self.parsers.lock().unwrap().insert(TypeId::of::<T>(), Box::new(parser));
    }

    /// Look up the parser registered for type `T`, if any.
    pub fn get<T: 'static>(&self) -> Option<Arc<dyn ArgumentParser<S, T>>> {
        self.parsers
            .lock()
            .unwrap()
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<dyn ArgumentParser<S, T>>>())
            .cloned()
    }
}

impl<S: 'static> Default for ParserRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// The facade senders actually call: wraps a sender's raw text, runs the
/// manager-level preprocessor pipeline, then delegates to the tree.
pub struct CommandManager<S> {
    tree: Arc<CommandTree<S>>,
    predicate: Arc<dyn PermissionPredicate<S>>,
    preprocessors: Vec<Arc<dyn Preprocessor<S>>>,
    registry: ParserRegistry<S>,
}

impl<S> CommandManager<S>
where
    S: Send + Sync + 'static,
{
    /// Build a manager over a fresh, empty tree.
    pub fn new(
        registration_handler: Arc<dyn RegistrationHandler<S>>,
        predicate: Arc<dyn PermissionPredicate<S>>,
        preprocessors: Vec<Arc<dyn Preprocessor<S>>>,
        settings: ManagerSettings,
    ) -> Self {
        CommandManager {
            tree: Arc::new(CommandTree::new(registration_handler, settings)),
            predicate,
            preprocessors,
            registry: ParserRegistry::new(),
        }
    }

    /// The parser registry value parsers can be registered into and looked
    /// up from.
    pub fn parser_registry(&self) -> &ParserRegistry<S> {
        &self.registry
    }

    /// The underlying tree, for callers that need direct access (e.g. to
    /// call [`CommandTree::delete_recursively`]).
    pub fn tree(&self) -> &Arc<CommandTree<S>> {
        &self.tree
    }

    /// Run the preprocessor pipeline in LIFO order: the most recently
    /// supplied preprocessor runs first, short-circuiting the rest on
    /// rejection or failure.
    fn run_preprocessors(&self, ctx: &CommandContext<S>, input: &CommandInput) -> ParseResult<bool> {
        for preprocessor in self.preprocessors.iter().rev() {
            if !preprocessor.check(ctx, input)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Register a command, delegating to the tree's insertion and
    /// verification.
    pub async fn register(&self, command: Command<S>) -> Result<(), RegistrationError> {
        match self.tree.insert_command(command).await {
            Ok(()) => {
                tracing::info!("command registered");
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, "command registration failed");
                Err(error)
            }
        }
    }

    /// Parse `input` on behalf of `sender`.
    ///
    /// The preprocessor pipeline runs before the tree ever sees the input;
    /// a rejection there surfaces as [`CommandError::InvalidSyntax`], and a
    /// preprocessor failure surfaces as [`CommandError::ArgumentParse`].
    pub async fn parse(&self, sender: S, input: impl Into<String>) -> Result<Arc<Command<S>>, CommandParseError<S>>
    where
        S: Sync,
    {
        let ctx = CommandContext::new(sender);
        let cursor = CommandInput::new(input.into());

        match self.run_preprocessors(&ctx, &cursor) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("preprocessor pipeline rejected input");
                return Err(CommandParseError::new(CommandError::InvalidSyntax, Vec::new(), ctx.into_sender()));
            }
            Err(error) => {
                tracing::debug!(%error, "preprocessor pipeline failed");
                return Err(CommandParseError::new(
                    CommandError::ArgumentParse(error),
                    Vec::new(),
                    ctx.into_sender(),
                ));
            }
        }

        let sender = ctx.into_sender();
        let remaining = cursor.remaining().to_string();
        self.tree.parse(sender, remaining, self.predicate.as_ref()).await
    }

    /// Suggest completions for `input` on behalf of `sender`. A
    /// preprocessor rejection or failure yields an empty list rather than
    /// an error, per §4.D.
    pub async fn suggest(&self, sender: S, input: impl Into<String>) -> Vec<Suggestion>
    where
        S: Sync,
    {
        let ctx = CommandContext::new(sender);
        let cursor = CommandInput::new(input.into());

        match self.run_preprocessors(&ctx, &cursor) {
            Ok(true) => {}
            _ => {
                tracing::debug!("preprocessor pipeline rejected input; no suggestions");
                return Vec::new();
            }
        }

        let sender = ctx.into_sender();
        let remaining = cursor.remaining().to_string();
        self.tree.suggest(sender, remaining, self.predicate.as_ref()).await
    }

    /// Evaluate `permission` against `sender` using the manager's
    /// configured predicate. `PermissionExpr::Empty` is always allowed.
    pub async fn has_permission(&self, sender: &S, permission: &PermissionExpr) -> bool
    where
        S: Sync,
    {
        permission.clone().evaluate(sender, self.predicate.as_ref()).await.is_allowed()
    }
}
