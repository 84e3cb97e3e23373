// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A registered command: an ordered chain of components plus the handler
//! invoked once the chain fully matches.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::component::{AnyComponent, ComponentKind};
use crate::context::CommandContext;
use crate::error::RegistrationError;
use crate::permission::PermissionExpr;

/// Invoked once a sender's input fully matches this command's chain.
///
/// Execution-handler invocation and threading strategy are external
/// collaborators (see the crate's scope notes): this crate only needs
/// somewhere to stash the handler so it can be retrieved by whatever
/// dispatches it, not a threading policy for running it.
#[async_trait]
pub trait CommandHandler<S>: Send + Sync {
    /// Run this command's behavior against the populated context.
    async fn execute(&self, ctx: &mut CommandContext<S>);
}

/// A [`CommandHandler`] that does nothing. Useful for tests and for
/// intermediary commands (e.g. `a` in `a x`/`a y`) that exist only to
/// anchor permissions or defaults and have no behavior of their own.
pub struct NoopHandler;

#[async_trait]
impl<S: Send + Sync> CommandHandler<S> for NoopHandler {
    async fn execute(&self, _ctx: &mut CommandContext<S>) {}
}

/// A sender-type requirement attached to a command.
///
/// Rust has no sender subtyping the tree could check generically, so this
/// is expressed as a named predicate rather than a type test: `name` is
/// for display (`InvalidSender`'s message), `predicate` is what's
/// actually evaluated against the matched sender.
pub struct RequiredSender<S> {
    /// Display name of the required sender kind, e.g. `"player"`.
    pub name: &'static str,
    /// Returns `true` if `sender` satisfies this requirement.
    pub predicate: Arc<dyn Fn(&S) -> bool + Send + Sync>,
}

/// An ordered, structured invocation pattern plus the handler it triggers.
///
/// Built via [`CommandBuilder`], which enforces the structural invariants
/// below at `finalize()` time rather than letting a malformed `Command`
/// exist at all.
pub struct Command<S> {
    components: Vec<Arc<dyn AnyComponent<S>>>,
    handler: Arc<dyn CommandHandler<S>>,
    permission: PermissionExpr,
    required_sender: Option<RequiredSender<S>>,
    metadata: HashMap<String, String>,
}

impl<S> Command<S> {
    /// The command's components, in registration order.
    pub fn components(&self) -> &[Arc<dyn AnyComponent<S>>] {
        &self.components
    }

    /// The permission required to invoke this command.
    pub fn permission(&self) -> &PermissionExpr {
        &self.permission
    }

    /// The sender-type requirement, if any.
    pub fn required_sender(&self) -> Option<&RequiredSender<S>> {
        self.required_sender.as_ref()
    }

    /// Arbitrary metadata attached at registration time.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Run this command's handler.
    pub async fn execute(&self, ctx: &mut CommandContext<S>) {
        self.handler.execute(ctx).await;
    }
}

/// Fluent builder for [`Command`], enforcing its construction invariants.
pub struct CommandBuilder<S> {
    components: Vec<Arc<dyn AnyComponent<S>>>,
    handler: Option<Arc<dyn CommandHandler<S>>>,
    permission: PermissionExpr,
    required_sender: Option<RequiredSender<S>>,
    metadata: HashMap<String, String>,
}

impl<S> Default for CommandBuilder<S> {
    fn default() -> Self {
        CommandBuilder {
            components: Vec::new(),
            handler: None,
            permission: PermissionExpr::Empty,
            required_sender: None,
            metadata: HashMap::new(),
        }
    }
}

impl<S> CommandBuilder<S> {
    /// Start building a command with no components, no permission
    /// requirement, and a no-op handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component to the chain.
    pub fn component(mut self, component: Arc<dyn AnyComponent<S>>) -> Self {
        self.components.push(component);
        self
    }

    /// Set the handler run when this command matches.
    pub fn handler(mut self, handler: Arc<dyn CommandHandler<S>>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Require `permission` to invoke this command.
    pub fn permission(mut self, permission: PermissionExpr) -> Self {
        self.permission = permission;
        self
    }

    /// Require the matched sender to satisfy `predicate`, displayed as
    /// `name` in an `InvalidSender` error.
    pub fn required_sender(
        mut self,
        name: &'static str,
        predicate: Arc<dyn Fn(&S) -> bool + Send + Sync>,
    ) -> Self {
        self.required_sender = Some(RequiredSender { name, predicate });
        self
    }

    /// Attach a metadata key/value pair.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Validate and produce the finished [`Command`].
    ///
    /// Checks, in order: at least one component; no `RequiredVariable`
    /// follows an `OptionalVariable` or `Flag`; at most one `Flag`
    /// component, and only as the last one.
    pub fn finalize(self) -> Result<Command<S>, RegistrationError> {
        if self.components.is_empty() {
            return Err(RegistrationError::EmptyCommand);
        }

        let mut seen_optional_or_flag = false;
        let mut flag_count = 0usize;
        let last = self.components.len() - 1;
        for (index, component) in self.components.iter().enumerate() {
            match component.kind() {
                ComponentKind::RequiredVariable if seen_optional_or_flag => {
                    return Err(RegistrationError::RequiredAfterOptional {
                        name: component.name().to_string(),
                    });
                }
                ComponentKind::OptionalVariable => seen_optional_or_flag = true,
                ComponentKind::Flag => {
                    flag_count += 1;
                    seen_optional_or_flag = true;
                    if index != last {
                        return Err(RegistrationError::MisplacedFlag);
                    }
                }
                _ => {}
            }
            if flag_count > 1 {
                return Err(RegistrationError::MisplacedFlag);
            }
        }

        Ok(Command {
            components: self.components,
            handler: self.handler.unwrap_or_else(|| Arc::new(NoopHandler)),
            permission: self.permission,
            required_sender: self.required_sender,
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    fn literal(name: &str) -> Arc<dyn AnyComponent<()>> {
        Arc::new(Component::<(), ()>::literal(name))
    }

    #[test]
    fn empty_command_is_rejected() {
        let result = CommandBuilder::<()>::new().finalize();
        assert!(matches!(result, Err(RegistrationError::EmptyCommand)));
    }

    #[test]
    fn single_literal_finalizes() {
        let command = CommandBuilder::<()>::new().component(literal("foo")).finalize();
        assert!(command.is_ok());
    }

    #[test]
    fn required_after_optional_is_rejected() {
        use crate::component::{ArgumentParser, DefaultValue};
        use crate::context::CommandContext;
        use crate::input::CommandInput;
        use crate::parse_result::{ArgumentParseError, ParseResult};

        struct IntParser;
        #[async_trait::async_trait]
        impl ArgumentParser<(), i64> for IntParser {
            async fn parse(&self, _ctx: &mut CommandContext<()>, input: &mut CommandInput) -> ParseResult<i64> {
                input.read_integer().map_err(ArgumentParseError::new)
            }
        }

        let optional: Arc<dyn AnyComponent<()>> = Arc::new(Component::optional(
            "opt",
            Arc::new(IntParser),
            DefaultValue::Parsed("0".to_string()),
        ));
        let required: Arc<dyn AnyComponent<()>> = Arc::new(Component::required("req", Arc::new(IntParser)));

        let result = CommandBuilder::<()>::new()
            .component(optional)
            .component(required)
            .finalize();
        assert!(matches!(
            result,
            Err(RegistrationError::RequiredAfterOptional { .. })
        ));
    }

    #[test]
    fn flag_must_be_last() {
        let flag: Arc<dyn AnyComponent<()>> = Arc::new(Component::<(), ()>::flag("flags", vec![]));
        let trailing = literal("bar");
        let result = CommandBuilder::<()>::new().component(flag).component(trailing).finalize();
        assert!(matches!(result, Err(RegistrationError::MisplacedFlag)));
    }

    #[test]
    fn at_most_one_flag_component() {
        let first: Arc<dyn AnyComponent<()>> = Arc::new(Component::<(), ()>::flag("f1", vec![]));
        let second: Arc<dyn AnyComponent<()>> = Arc::new(Component::<(), ()>::flag("f2", vec![]));
        let result = CommandBuilder::<()>::new().component(first).component(second).finalize();
        assert!(matches!(result, Err(RegistrationError::MisplacedFlag)));
    }
}
