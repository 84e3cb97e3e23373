// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The component model: literals, required/optional variables, and flags.
//!
//! A [`Component<S, T>`] is a single, strongly-typed slot in a command
//! pattern. The tree itself never works with `Component<S, T>` directly
//! (it would have to be generic over every `T` a command ever uses);
//! instead it stores children as `Arc<dyn `[`AnyComponent<S>`]`>`, the
//! type-erased view every `Component<S, T>` implements via a blanket impl.

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;

use crate::command::Command;
use crate::context::CommandContext;
use crate::error::RegistrationError;
use crate::input::CommandInput;
use crate::parse_result::{ArgumentParseError, ParseResult};

/// Which of the four component shapes a [`Component`] is.
///
/// Kind-specific data (a literal's aliases, an optional variable's default,
/// a flag's named switches) lives alongside this tag on [`Component`]
/// itself rather than inside the tag, so that the tag stays a plain,
/// `Copy` enum usable for dispatch without downcasting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// A fixed keyword, matched by exact alias equality.
    Literal,
    /// A typed slot that must be supplied.
    RequiredVariable,
    /// A typed slot that may be omitted, falling back to a default.
    OptionalVariable,
    /// An out-of-order grouping of named switches.
    Flag,
}

impl ComponentKind {
    /// True for [`ComponentKind::Literal`].
    pub fn is_literal(self) -> bool {
        matches!(self, ComponentKind::Literal)
    }

    /// True for [`ComponentKind::Flag`].
    pub fn is_flag(self) -> bool {
        matches!(self, ComponentKind::Flag)
    }

    /// True for [`ComponentKind::OptionalVariable`].
    pub fn is_optional(self) -> bool {
        matches!(self, ComponentKind::OptionalVariable)
    }

    /// True for [`ComponentKind::RequiredVariable`].
    pub fn is_required(self) -> bool {
        matches!(self, ComponentKind::RequiredVariable)
    }
}

/// A candidate completion string, optionally annotated with a description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Suggestion {
    /// The text the sender would type to select this suggestion.
    pub suggestion: String,
    /// A human-readable description shown alongside the suggestion, if any.
    pub description: Option<String>,
}

impl Suggestion {
    /// A suggestion with no description.
    pub fn new(suggestion: impl Into<String>) -> Self {
        Suggestion {
            suggestion: suggestion.into(),
            description: None,
        }
    }

    /// A suggestion annotated with a description.
    pub fn with_description(suggestion: impl Into<String>, description: impl Into<String>) -> Self {
        Suggestion {
            suggestion: suggestion.into(),
            description: Some(description.into()),
        }
    }

    /// Re-express this suggestion for a platform-specific representation.
    pub fn map<U>(self, f: impl FnOnce(Suggestion) -> U) -> U {
        f(self)
    }
}

/// Consumed by the tree: turns input text into a typed value.
///
/// Implemented by the embedding application (integer, string, enum, and
/// other concrete value parsers are external collaborators; this crate
/// only consumes this interface). An `ArgumentParser` that needs more than
/// one whitespace-delimited token (an "aggregate" parser) advertises that
/// via [`ArgumentParser::requested_argument_count`].
#[async_trait]
pub trait ArgumentParser<S, T>: Send + Sync {
    /// Parse a value from `input`, advancing the cursor past what was
    /// consumed. Must leave the cursor unchanged on failure.
    async fn parse(&self, ctx: &mut CommandContext<S>, input: &mut CommandInput) -> ParseResult<T>;

    /// How many whitespace-delimited tokens this parser needs. `1` for
    /// ordinary scalar parsers; more for aggregate parsers (e.g. a
    /// `Vec3` parser consuming three tokens).
    fn requested_argument_count(&self) -> usize {
        1
    }
}

/// Consumed by the tree: proposes candidate completions for a prefix.
#[async_trait]
pub trait SuggestionSource<S>: Send + Sync {
    /// Candidate completions for `prefix`. The tree filters the result to
    /// those that `starts_with(prefix)` and are not equal to `prefix`.
    async fn suggestions(&self, ctx: &CommandContext<S>, prefix: &str) -> Vec<Suggestion>;
}

/// A [`SuggestionSource`] that never suggests anything. The default for
/// components that don't otherwise configure one.
pub struct NoSuggestions;

#[async_trait]
impl<S: Send + Sync> SuggestionSource<S> for NoSuggestions {
    async fn suggestions(&self, _ctx: &CommandContext<S>, _prefix: &str) -> Vec<Suggestion> {
        Vec::new()
    }
}

/// A synchronous gate run before a component's parser is invoked.
///
/// Preprocessors run in insertion order; the first one to return
/// `Ok(false)` or `Err` short-circuits the rest. They must not advance the
/// input cursor (peek only) — by contract, not by enforcement, since the
/// cursor is passed by shared reference here specifically to make that
/// contract hard to violate by accident.
pub trait Preprocessor<S>: Send + Sync {
    /// Check whether parsing should proceed.
    fn check(&self, ctx: &CommandContext<S>, input: &CommandInput) -> ParseResult<bool>;
}

/// How a component's default value is produced when its slot is omitted.
pub enum DefaultValue<S, T> {
    /// Evaluate a callable against the traversal's context.
    Computed(Arc<dyn Fn(&CommandContext<S>) -> T + Send + Sync>),
    /// Re-feed a literal string to the parser, as if the sender had typed
    /// it. Lets a default value go through the same validation path as a
    /// user-supplied one.
    Parsed(String),
}

impl<S, T> Clone for DefaultValue<S, T> {
    fn clone(&self) -> Self {
        match self {
            DefaultValue::Computed(f) => DefaultValue::Computed(f.clone()),
            DefaultValue::Parsed(s) => DefaultValue::Parsed(s.clone()),
        }
    }
}

/// The outcome of applying a component's default, for the tree to act on.
pub enum DefaultOutcome {
    /// The default was computed and already stored into the context.
    Stored,
    /// The default is a string that must be re-parsed; the tree appends it
    /// to the input and recurses.
    Reparse(String),
}

/// One named switch belonging to a [`ComponentKind::Flag`] component.
///
/// A present-or-absent flag (`--force`) has `value: None` and is recorded
/// as `true` under its own name when seen. A valued flag (`--level 3`) has
/// `value: Some(...)`, itself just another [`AnyComponent`] whose own
/// parser and name govern how the value after the switch is consumed and
/// stored.
pub struct FlagDescriptor<S> {
    /// The switch's primary name, e.g. `"force"` for `--force`.
    pub name: String,
    /// Additional names this switch may also be spelled with.
    pub aliases: Vec<String>,
    /// The component that parses and stores this switch's value, if it
    /// takes one.
    pub value: Option<Arc<dyn AnyComponent<S>>>,
}

impl<S> FlagDescriptor<S> {
    /// A present-or-absent switch with no value.
    pub fn presence(name: impl Into<String>) -> Self {
        FlagDescriptor {
            name: name.into(),
            aliases: Vec::new(),
            value: None,
        }
    }

    /// A switch that takes a value, parsed by `value`.
    pub fn valued(name: impl Into<String>, value: Arc<dyn AnyComponent<S>>) -> Self {
        FlagDescriptor {
            name: name.into(),
            aliases: Vec::new(),
            value: Some(value),
        }
    }

    /// Add an alternate spelling for this switch.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    fn matches(&self, token: &str) -> bool {
        self.name == token || self.aliases.iter().any(|a| a == token)
    }
}

/// One slot in a command pattern: a literal keyword, a required or
/// optional typed variable, or a flag grouping.
///
/// `Component` is generic over the value type `T` its parser produces;
/// the tree only ever sees it through the type-erased [`AnyComponent`]
/// trait, implemented below via a blanket impl.
pub struct Component<S, T> {
    name: String,
    kind: ComponentKind,
    aliases: Option<Mutex<Vec<String>>>,
    default: Option<DefaultValue<S, T>>,
    flags: Vec<FlagDescriptor<S>>,
    parser: Arc<dyn ArgumentParser<S, T>>,
    suggestion_source: Arc<dyn SuggestionSource<S>>,
    preprocessors: Vec<Arc<dyn Preprocessor<S>>>,
    owning: OnceLock<Arc<Command<S>>>,
}

impl<S, T> Component<S, T>
where
    S: Send + Sync + 'static,
    T: Send + Sync + Clone + 'static,
{
    /// A literal keyword. `name` is also its first alias.
    pub fn literal(name: impl Into<String>) -> Self
    where
        T: Default,
    {
        let name = name.into();
        Component {
            aliases: Some(Mutex::new(vec![name.clone()])),
            name,
            kind: ComponentKind::Literal,
            default: None,
            flags: Vec::new(),
            parser: Arc::new(LiteralParser),
            suggestion_source: Arc::new(NoSuggestions),
            preprocessors: Vec::new(),
            owning: OnceLock::new(),
        }
    }

    /// A required typed variable parsed by `parser`.
    pub fn required(name: impl Into<String>, parser: Arc<dyn ArgumentParser<S, T>>) -> Self {
        Component {
            name: name.into(),
            kind: ComponentKind::RequiredVariable,
            aliases: None,
            default: None,
            flags: Vec::new(),
            parser,
            suggestion_source: Arc::new(NoSuggestions),
            preprocessors: Vec::new(),
            owning: OnceLock::new(),
        }
    }

    /// An optional typed variable, falling back to `default` when omitted.
    pub fn optional(
        name: impl Into<String>,
        parser: Arc<dyn ArgumentParser<S, T>>,
        default: DefaultValue<S, T>,
    ) -> Self {
        Component {
            name: name.into(),
            kind: ComponentKind::OptionalVariable,
            aliases: None,
            default: Some(default),
            flags: Vec::new(),
            parser,
            suggestion_source: Arc::new(NoSuggestions),
            preprocessors: Vec::new(),
            owning: OnceLock::new(),
        }
    }

    /// A flag grouping of named switches.
    pub fn flag(name: impl Into<String>, flags: Vec<FlagDescriptor<S>>) -> Self
    where
        T: Default,
    {
        Component {
            name: name.into(),
            kind: ComponentKind::Flag,
            aliases: None,
            default: None,
            flags,
            parser: Arc::new(LiteralParser),
            suggestion_source: Arc::new(NoSuggestions),
            preprocessors: Vec::new(),
            owning: OnceLock::new(),
        }
    }

    /// Attach a suggestion source.
    pub fn with_suggestions(mut self, source: Arc<dyn SuggestionSource<S>>) -> Self {
        self.suggestion_source = source;
        self
    }

    /// Append a preprocessor, run in the order added.
    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn Preprocessor<S>>) -> Self {
        self.preprocessors.push(preprocessor);
        self
    }

    /// Add an additional alias to a literal. Panics if this component is
    /// not a literal.
    pub fn with_alias(self, alias: impl Into<String>) -> Self {
        assert!(self.kind.is_literal(), "aliases only apply to literals");
        if let Some(aliases) = &self.aliases {
            aliases.lock().unwrap().push(alias.into());
        }
        self
    }

    /// This component's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This component's kind.
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }
}

/// An inert placeholder parser.
///
/// `Literal` and `Flag` components don't delegate to an external
/// `ArgumentParser` at all: `Literal` matching is alias equality, handled
/// directly in [`AnyComponent::parse`]'s `Literal` arm, and `Flag` parsing
/// is the switch-scanning loop in [`Component::parse_flags`]. Both kinds
/// still need *something* in the `parser` field to satisfy
/// `Component<S, T>`'s shape; this type is never actually invoked for
/// either kind.
struct LiteralParser;

#[async_trait]
impl<S: Send + Sync, T: Send + Sync + Default> ArgumentParser<S, T> for LiteralParser {
    async fn parse(&self, _ctx: &mut CommandContext<S>, input: &mut CommandInput) -> ParseResult<T> {
        let _ = input.read_string_skip_whitespace(false);
        Ok(T::default())
    }
}

/// The type-erased view of a [`Component<S, T>`] the tree operates on.
///
/// Every tree operation is expressed against this trait so the tree never
/// needs to be generic over each command's argument types.
#[async_trait]
pub trait AnyComponent<S>: Send + Sync {
    /// This component's name.
    fn name(&self) -> &str;

    /// This component's kind.
    fn kind(&self) -> ComponentKind;

    /// The literal's alias set. Empty for non-literal kinds.
    fn aliases(&self) -> Vec<String>;

    /// True if `token` exactly matches one of this literal's aliases.
    /// Always `false` for non-literal kinds.
    fn matches_literal(&self, token: &str) -> bool {
        self.kind() == ComponentKind::Literal && self.aliases().iter().any(|a| a == token)
    }

    /// Merge an additional alias into this literal's alias set (a no-op,
    /// silently, for non-literals). Used when insertion finds an existing
    /// sibling with the same name.
    fn merge_alias(&self, alias: String);

    /// The `TypeId` of the value this component's parser produces. Used,
    /// together with `name`, for insertion-time component equivalence.
    fn value_type_id(&self) -> TypeId;

    /// How many tokens this component's parser consumes.
    fn requested_argument_count(&self) -> usize;

    /// True if this component's parser needs more than one token.
    fn is_aggregate(&self) -> bool {
        self.requested_argument_count() > 1
    }

    /// The named switches of a `Flag` component. Empty for other kinds.
    fn flags(&self) -> &[FlagDescriptor<S>];

    /// True if this component has a configured default value.
    fn has_default(&self) -> bool;

    /// Apply this component's default, if any: either store a computed
    /// value directly into `ctx`, or hand back a string to re-parse.
    async fn apply_default(&self, ctx: &mut CommandContext<S>) -> Option<DefaultOutcome>;

    /// Run this component's preprocessors in order.
    fn preprocess(&self, ctx: &CommandContext<S>, input: &CommandInput) -> ParseResult<bool>;

    /// Parse this component's value out of `input`, storing it into `ctx`
    /// under this component's name. For a `Flag` component, parses the
    /// whole run of switches and stores each under its own name.
    async fn parse(&self, ctx: &mut CommandContext<S>, input: &mut CommandInput) -> ParseResult<()>;

    /// If the upcoming token is being completed as (or as the value of) a
    /// named flag, the name of that flag. `None` means "not currently
    /// completing a flag name or value" (e.g. positional continuation).
    /// Only meaningful for `Flag` components.
    fn parse_current_flag(&self, input: &CommandInput) -> Option<String>;

    /// Candidate completions for `prefix`.
    async fn suggestions(&self, ctx: &CommandContext<S>, prefix: &str) -> Vec<Suggestion>;

    /// Set this component's owning command. Fails if one is already set.
    fn set_owning_command(&self, command: Arc<Command<S>>) -> Result<(), RegistrationError>;

    /// This component's owning command, if any has been registered.
    fn owning_command(&self) -> Option<Arc<Command<S>>>;
}

#[async_trait]
impl<S, T> AnyComponent<S> for Component<S, T>
where
    S: Send + Sync + 'static,
    T: Send + Sync + Clone + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        self.kind
    }

    fn aliases(&self) -> Vec<String> {
        match &self.aliases {
            Some(aliases) => aliases.lock().unwrap().clone(),
            None => Vec::new(),
        }
    }

    fn merge_alias(&self, alias: String) {
        if let Some(aliases) = &self.aliases {
            let mut guard = aliases.lock().unwrap();
            if !guard.contains(&alias) {
                guard.push(alias);
            }
        }
    }

    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn requested_argument_count(&self) -> usize {
        self.parser.requested_argument_count()
    }

    fn flags(&self) -> &[FlagDescriptor<S>] {
        &self.flags
    }

    fn has_default(&self) -> bool {
        self.default.is_some()
    }

    async fn apply_default(&self, ctx: &mut CommandContext<S>) -> Option<DefaultOutcome> {
        match self.default.as_ref()? {
            DefaultValue::Parsed(text) => Some(DefaultOutcome::Reparse(text.clone())),
            DefaultValue::Computed(f) => {
                let value = f(ctx);
                ctx.set(self.name.clone(), value);
                Some(DefaultOutcome::Stored)
            }
        }
    }

    fn preprocess(&self, ctx: &CommandContext<S>, input: &CommandInput) -> ParseResult<bool> {
        for preprocessor in &self.preprocessors {
            if !preprocessor.check(ctx, input)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn parse(&self, ctx: &mut CommandContext<S>, input: &mut CommandInput) -> ParseResult<()> {
        match self.kind {
            ComponentKind::Flag => self.parse_flags(ctx, input).await,
            ComponentKind::Literal => {
                let token = input.peek_string().to_string();
                if self.matches_literal_token(&token) {
                    let _ = input.read_string_skip_whitespace(false);
                    Ok(())
                } else {
                    Err(ArgumentParseError::message(format!(
                        "expected one of the aliases for '{}', found '{token}'",
                        self.name
                    )))
                }
            }
            ComponentKind::RequiredVariable | ComponentKind::OptionalVariable => {
                let value = self.parser.parse(ctx, input).await?;
                ctx.set(self.name.clone(), value);
                Ok(())
            }
        }
    }

    fn parse_current_flag(&self, input: &CommandInput) -> Option<String> {
        if self.kind != ComponentKind::Flag {
            return None;
        }
        let token = input.peek_string();
        let switch = token.trim_start_matches('-');
        if !token.starts_with('-') || switch.is_empty() {
            return None;
        }
        self.flags
            .iter()
            .find(|flag| flag.matches(switch) && flag.value.is_some())
            .map(|flag| flag.name.clone())
    }

    async fn suggestions(&self, ctx: &CommandContext<S>, prefix: &str) -> Vec<Suggestion> {
        self.suggestion_source.suggestions(ctx, prefix).await
    }

    fn set_owning_command(&self, command: Arc<Command<S>>) -> Result<(), RegistrationError> {
        self.owning
            .set(command)
            .map_err(|_| RegistrationError::DuplicateCommandChain {
                path: self.name.clone(),
            })
    }

    fn owning_command(&self) -> Option<Arc<Command<S>>> {
        self.owning.get().cloned()
    }
}

impl<S, T> Component<S, T>
where
    S: Send + Sync + 'static,
    T: Send + Sync + Clone + 'static,
{
    fn matches_literal_token(&self, token: &str) -> bool {
        self.aliases
            .as_ref()
            .map(|aliases| aliases.lock().unwrap().iter().any(|alias| alias == token))
            .unwrap_or(false)
    }

    async fn parse_flags(&self, ctx: &mut CommandContext<S>, input: &mut CommandInput) -> ParseResult<()> {
        loop {
            if input.is_empty() {
                break;
            }
            let token = input.peek_string();
            if !token.starts_with('-') || token.trim_start_matches('-').is_empty() {
                break;
            }
            let mark = input.cursor();
            let raw = input.read_string_skip_whitespace(false);
            let switch = raw.trim_start_matches('-');
            let Some(flag) = self.flags.iter().find(|f| f.matches(switch)) else {
                input.set_cursor(mark);
                return Err(ArgumentParseError::message(format!("unknown flag '{raw}'")));
            };
            match &flag.value {
                None => ctx.set(flag.name.clone(), true),
                Some(value_component) => value_component.parse(ctx, input).await?,
            }
        }
        Ok(())
    }
}

impl<S> fmt::Debug for FlagDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("takes_value", &self.value.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct IntParser;

    #[async_trait]
    impl ArgumentParser<(), i64> for IntParser {
        async fn parse(&self, _ctx: &mut CommandContext<()>, input: &mut CommandInput) -> ParseResult<i64> {
            input.read_integer().map_err(ArgumentParseError::new)
        }
    }

    #[tokio::test]
    async fn literal_matches_its_own_name_and_aliases() {
        let literal: Component<(), ()> = Component::literal("foo").with_alias("f");
        assert!(AnyComponent::<()>::matches_literal(&literal, "foo"));
        assert!(AnyComponent::<()>::matches_literal(&literal, "f"));
        assert!(!AnyComponent::<()>::matches_literal(&literal, "bar"));
    }

    #[tokio::test]
    async fn merge_alias_is_idempotent() {
        let literal: Component<(), ()> = Component::literal("foo");
        AnyComponent::<()>::merge_alias(&literal, "foo".to_string());
        AnyComponent::<()>::merge_alias(&literal, "bar".to_string());
        let mut aliases = AnyComponent::<()>::aliases(&literal);
        aliases.sort();
        assert_eq!(aliases, vec!["bar".to_string(), "foo".to_string()]);
    }

    #[tokio::test]
    async fn required_variable_parses_and_stores_under_its_name() {
        let component: Component<(), i64> = Component::required("n", Arc::new(IntParser));
        let mut ctx = CommandContext::new(());
        let mut input = CommandInput::new("7");
        AnyComponent::<()>::parse(&component, &mut ctx, &mut input)
            .await
            .unwrap();
        assert_eq!(ctx.get::<i64>("n"), Some(&7));
    }

    #[tokio::test]
    async fn computed_default_is_stored_immediately() {
        let default = DefaultValue::Computed(Arc::new(|_ctx: &CommandContext<()>| 42i64));
        let component: Component<(), i64> = Component::optional("n", Arc::new(IntParser), default);
        let mut ctx = CommandContext::new(());
        match AnyComponent::<()>::apply_default(&component, &mut ctx).await {
            Some(DefaultOutcome::Stored) => {}
            _ => panic!("expected Stored"),
        }
        assert_eq!(ctx.get::<i64>("n"), Some(&42));
    }

    #[tokio::test]
    async fn parsed_default_is_handed_back_for_reparse() {
        let default = DefaultValue::Parsed("world".to_string());
        let component: Component<(), i64> = Component::optional("n", Arc::new(IntParser), default);
        let mut ctx = CommandContext::new(());
        match AnyComponent::<()>::apply_default(&component, &mut ctx).await {
            Some(DefaultOutcome::Reparse(text)) => assert_eq!(text, "world"),
            _ => panic!("expected Reparse"),
        }
    }

    #[tokio::test]
    async fn flag_presence_is_recorded_as_true() {
        let flags = vec![FlagDescriptor::presence("force")];
        let component: Component<(), ()> = Component::flag("flags", flags);
        let mut ctx = CommandContext::new(());
        let mut input = CommandInput::new("--force");
        AnyComponent::<()>::parse(&component, &mut ctx, &mut input)
            .await
            .unwrap();
        assert_eq!(ctx.get::<bool>("force"), Some(&true));
    }

    #[tokio::test]
    async fn valued_flag_parses_its_value_component() {
        let level: Arc<dyn AnyComponent<()>> =
            Arc::new(Component::required("level", Arc::new(IntParser)));
        let flags = vec![
            FlagDescriptor::presence("force"),
            FlagDescriptor::valued("level", level),
        ];
        let component: Component<(), ()> = Component::flag("flags", flags);
        let mut ctx = CommandContext::new(());
        let mut input = CommandInput::new("--force --level 3");
        AnyComponent::<()>::parse(&component, &mut ctx, &mut input)
            .await
            .unwrap();
        assert_eq!(ctx.get::<bool>("force"), Some(&true));
        assert_eq!(ctx.get::<i64>("level"), Some(&3));
    }

    #[tokio::test]
    async fn unknown_flag_rolls_back_the_cursor() {
        let component: Component<(), ()> = Component::flag("flags", vec![FlagDescriptor::presence("force")]);
        let mut ctx = CommandContext::new(());
        let mut input = CommandInput::new("--bogus");
        let mark = input.cursor();
        let err = AnyComponent::<()>::parse(&component, &mut ctx, &mut input).await;
        assert!(err.is_err());
        assert_eq!(input.cursor(), mark);
    }

    #[tokio::test]
    async fn set_owning_command_twice_is_fatal() {
        use crate::command::CommandBuilder;
        use crate::permission::AllowAll;

        let literal: Component<(), ()> = Component::literal("foo");
        let literal: Arc<dyn AnyComponent<()>> = Arc::new(literal);
        let make_command = || {
            CommandBuilder::<()>::new()
                .component(literal.clone())
                .handler(Arc::new(crate::command::NoopHandler))
                .finalize()
                .unwrap()
        };
        let first = Arc::new(make_command());
        let second = Arc::new(make_command());
        literal.set_owning_command(first).unwrap();
        assert!(literal.set_owning_command(second).is_err());
        let _ = AllowAll; // silence unused-import if feature-gated differently
    }
}
