// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The command tree: insertion, ambiguity/registration checks, and the
//! asynchronous parse and suggestion traversals.

use std::collections::HashSet;
use std::sync::Arc;

use async_recursion::async_recursion;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::command::Command;
use crate::component::{AnyComponent, ComponentKind, Suggestion};
use crate::context::{CommandContext, FLAG_META_KEY};
use crate::error::{CommandError, CommandParseError, RegistrationError};
use crate::input::CommandInput;
use crate::manager::ManagerSettings;
use crate::node::{Arena, NodeId};
use crate::permission::{PermissionExpr, PermissionPredicate, PermissionResult};

/// Consumed by the tree: notified once per leaf every time
/// `verify_and_register` runs.
///
/// Implemented by the embedding application (a native shell integration's
/// registration adapter, a help-index builder, ...); the tree only ever
/// calls this, never inspects what it does with the command.
#[async_trait]
pub trait RegistrationHandler<S>: Send + Sync {
    /// Called once per leaf command every time the tree is (re)verified.
    async fn register_command(&self, command: Arc<Command<S>>);
}

/// A [`RegistrationHandler`] that does nothing. The default for manager
/// configurations that don't need a registration side-channel.
pub struct NoopRegistrationHandler;

#[async_trait]
impl<S: Send + Sync> RegistrationHandler<S> for NoopRegistrationHandler {
    async fn register_command(&self, _command: Arc<Command<S>>) {}
}

/// A tree-structured command dispatcher.
///
/// `CommandTree` owns every node and component it contains; commands
/// passed to [`Self::insert_command`] are consumed. Structural mutation
/// (`insert_command`, `delete_recursively`) takes the tree's exclusive
/// write lock for its entire duration; [`Self::parse`] and
/// [`Self::suggest`] take only a shared read lock, so many traversals can
/// run concurrently as long as none race a mutation.
pub struct CommandTree<S> {
    inner: RwLock<Arena<S>>,
    registration_handler: Arc<dyn RegistrationHandler<S>>,
    settings: ManagerSettings,
}

impl<S> CommandTree<S>
where
    S: Send + Sync + 'static,
{
    /// A fresh tree containing only the synthetic root.
    pub fn new(registration_handler: Arc<dyn RegistrationHandler<S>>, settings: ManagerSettings) -> Self {
        CommandTree {
            inner: RwLock::new(Arena::new()),
            registration_handler,
            settings,
        }
    }

    /// Insert `command` into the tree, merging it into any existing
    /// shared prefix, then re-verify and re-register the whole tree.
    ///
    /// Holds the tree's exclusive write lock for the entire operation, per
    /// §5 of the specification: readers never observe a partially
    /// inserted command.
    pub async fn insert_command(&self, command: Command<S>) -> Result<(), RegistrationError> {
        let mut arena = self.inner.write().await;

        let components = command.components().to_vec();
        let command = Arc::new(command);

        let mut non_flag: Vec<Arc<dyn AnyComponent<S>>> = Vec::new();
        let mut flag: Option<Arc<dyn AnyComponent<S>>> = None;
        for component in components {
            if component.kind().is_flag() {
                flag = Some(component);
            } else {
                non_flag.push(component);
            }
        }

        let mut current = arena.root();
        let mut last_literal = arena.root();

        for component in &non_flag {
            if current == arena.root() && !component.kind().is_literal() {
                return Err(RegistrationError::AmbiguousNode {
                    path: "<root>".to_string(),
                    existing: "<literal>".to_string(),
                    new: component.name().to_string(),
                });
            }

            match arena.find_child_by_name(current, component.name()) {
                Some(existing_id) => {
                    let existing = arena
                        .get(existing_id)
                        .and_then(|node| node.component())
                        .expect("existing child always has a component")
                        .clone();
                    if existing.value_type_id() != component.value_type_id() {
                        return Err(RegistrationError::AmbiguousNode {
                            path: path_string(&arena, current),
                            existing: existing.name().to_string(),
                            new: component.name().to_string(),
                        });
                    }
                    if component.kind().is_literal() {
                        for alias in component.aliases() {
                            existing.merge_alias(alias);
                        }
                    }
                    current = existing_id;
                }
                None => {
                    if !component.kind().is_literal() {
                        if let Some(other) = find_non_literal_child(&arena, current) {
                            return Err(RegistrationError::AmbiguousNode {
                                path: path_string(&arena, current),
                                existing: other,
                                new: component.name().to_string(),
                            });
                        }
                    } else {
                        check_alias_collision(&arena, current, component.as_ref())?;
                    }
                    let new_id = arena.add_child(current, component.clone());
                    arena.sort_children(current);
                    current = new_id;
                }
            }

            if component.kind().is_literal() {
                last_literal = current;
            }
        }

        if let Some(flag_component) = flag {
            let parent = if self.settings.liberal_flag_parsing {
                last_literal
            } else {
                current
            };
            current = match find_flag_child(&arena, parent) {
                Some(existing) => existing,
                None => {
                    let new_id = arena.add_child(parent, flag_component);
                    arena.sort_children(parent);
                    new_id
                }
            };
        }

        let terminal = arena
            .get(current)
            .and_then(|node| node.component())
            .expect("terminal node always has a component")
            .clone();
        terminal
            .set_owning_command(command.clone())
            .map_err(|_| RegistrationError::DuplicateCommandChain {
                path: path_string(&arena, current),
            })?;

        tracing::debug!(path = %path_string(&arena, current), "registered command chain");

        self.verify_and_register(&mut arena).await
    }

    /// Remove `node` and everything below it from the tree.
    pub async fn delete_recursively(&self, node: NodeId) {
        let mut arena = self.inner.write().await;
        arena.delete_recursively(node);
    }

    async fn verify_and_register(&self, arena: &mut Arena<S>) -> Result<(), RegistrationError> {
        if let Err(error) = validate_invariants(arena) {
            tracing::error!(%error, "command tree ambiguity detected during verification");
            return Err(error);
        }

        let mut leaves = Vec::new();
        for id in arena.all_ids() {
            let Some(data) = arena.get(id) else { continue };
            if !data.is_leaf() {
                continue;
            }
            let Some(component) = data.component() else {
                // the synthetic root, with no commands registered yet.
                continue;
            };
            match component.owning_command() {
                Some(command) => leaves.push((id, command)),
                None => {
                    let error = RegistrationError::NoCommandInLeaf {
                        path: path_string(arena, id),
                    };
                    tracing::error!(%error, "leaf with no owning command");
                    return Err(error);
                }
            }
        }

        for (_, command) in &leaves {
            self.registration_handler.register_command(command.clone()).await;
        }

        compute_permissions(arena, arena.root(), self.settings.enforce_intermediary_permissions);

        tracing::debug!(leaves = leaves.len(), "command tree verified and registered");
        Ok(())
    }

    /// Resolve the permission required at `node` against `sender`, per
    /// §4.C.5: the cached permission if one has been computed, else the
    /// owning command's permission at a leaf, else the `Or` of every
    /// child's resolution.
    #[async_recursion]
    pub async fn determine_permission<'life>(
        &'life self,
        arena: &'life Arena<S>,
        sender: &'life S,
        node: NodeId,
        predicate: &'life (dyn PermissionPredicate<S> + 'life),
    ) -> PermissionResult
    where
        S: Sync,
    {
        let Some(data) = arena.get(node) else {
            return PermissionResult::Allowed;
        };
        if let Some(cached) = data.permission() {
            return cached.clone().evaluate(sender, predicate).await;
        }
        if data.is_leaf() {
            if let Some(command) = data.component().and_then(|c| c.owning_command()) {
                return command.permission().clone().evaluate(sender, predicate).await;
            }
            return PermissionResult::Allowed;
        }
        let mut missing: Option<PermissionExpr> = None;
        for &child in data.children() {
            match self.determine_permission(arena, sender, child, predicate).await {
                PermissionResult::Allowed => return PermissionResult::Allowed,
                PermissionResult::Denied(expr) => {
                    missing = Some(match missing {
                        None => expr,
                        Some(existing) => existing.or(expr),
                    });
                }
            }
        }
        match missing {
            Some(expr) => PermissionResult::Denied(expr),
            None => PermissionResult::Allowed,
        }
    }

    /// Parse `text` on behalf of `sender`, resolving permission leaves
    /// against `predicate`.
    pub async fn parse(
        &self,
        sender: S,
        text: impl Into<String>,
        predicate: &dyn PermissionPredicate<S>,
    ) -> Result<Arc<Command<S>>, CommandParseError<S>>
    where
        S: Sync,
    {
        let arena = self.inner.read().await;
        let mut ctx = CommandContext::new(sender);
        let mut input = CommandInput::new(text.into());
        let mut matched = Vec::new();

        let result = self
            .parse_node(&arena, arena.root(), &mut matched, &mut ctx, &mut input, predicate)
            .await;

        match result {
            Ok(command) => {
                if let Some(required) = command.required_sender() {
                    if !(required.predicate)(ctx.sender()) {
                        return Err(CommandParseError::new(
                            CommandError::InvalidSender {
                                required_sender_type: required.name,
                            },
                            matched,
                            ctx.into_sender(),
                        ));
                    }
                }
                Ok(command)
            }
            Err(kind) => Err(CommandParseError::new(kind, matched, ctx.into_sender())),
        }
    }

    #[async_recursion]
    async fn parse_node<'life>(
        &'life self,
        arena: &'life Arena<S>,
        node: NodeId,
        matched: &'life mut Vec<String>,
        ctx: &'life mut CommandContext<S>,
        input: &'life mut CommandInput,
        predicate: &'life (dyn PermissionPredicate<S> + 'life),
    ) -> Result<Arc<Command<S>>, CommandError>
    where
        S: Sync,
    {
        match self.determine_permission(arena, ctx.sender(), node, predicate).await {
            PermissionResult::Allowed => {}
            PermissionResult::Denied(missing) => return Err(CommandError::NoPermission { missing }),
        }

        if let Some(decision) = self
            .attempt_unambiguous_child(arena, node, matched, ctx, input, predicate)
            .await
        {
            return decision;
        }

        let data = arena.get(node).expect("node alive for the duration of a traversal");

        if data.children().is_empty() {
            if let Some(command) = data.component().and_then(|c| c.owning_command()) {
                if input.is_empty() {
                    return Ok(command);
                }
            }
            return Err(CommandError::InvalidSyntax);
        }

        for &child_id in data.children() {
            let Some(component) = arena.get(child_id).and_then(|n| n.component()) else {
                continue;
            };
            let component = component.clone();
            let mark = input.cursor();

            match component.preprocess(ctx, input) {
                Ok(true) => {}
                Ok(false) => {
                    input.set_cursor(mark);
                    continue;
                }
                Err(_) => {
                    input.set_cursor(mark);
                    continue;
                }
            }

            match component.parse(ctx, input).await {
                Ok(()) => {
                    matched.push(component.name().to_string());
                    return self.parse_node(arena, child_id, matched, ctx, input, predicate).await;
                }
                Err(_) => {
                    input.set_cursor(mark);
                    continue;
                }
            }
        }

        if node == arena.root() {
            return Err(CommandError::NoSuchCommand);
        }
        if let Some(command) = data.component().and_then(|c| c.owning_command()) {
            if input.is_empty() {
                let permission = command.permission().clone();
                return match permission.evaluate(ctx.sender(), predicate).await {
                    PermissionResult::Allowed => Ok(command),
                    PermissionResult::Denied(missing) => Err(CommandError::NoPermission { missing }),
                };
            }
        }
        Err(CommandError::InvalidSyntax)
    }

    /// Encodes the disambiguation rules of §4.C.3: `None` means "I could
    /// not decide, fall through to the ordered-attempt loop"; `Some(_)` is
    /// a final result for this node.
    #[async_recursion]
    async fn attempt_unambiguous_child<'life>(
        &'life self,
        arena: &'life Arena<S>,
        node: NodeId,
        matched: &'life mut Vec<String>,
        ctx: &'life mut CommandContext<S>,
        input: &'life mut CommandInput,
        predicate: &'life (dyn PermissionPredicate<S> + 'life),
    ) -> Option<Result<Arc<Command<S>>, CommandError>>
    where
        S: Sync,
    {
        let data = arena.get(node)?;
        let first_token = input.peek_string().to_string();

        if data.children().iter().any(|&id| {
            arena
                .get(id)
                .and_then(|n| n.component())
                .map(|c| c.matches_literal(&first_token))
                .unwrap_or(false)
        }) {
            return None;
        }

        let non_literal: Vec<NodeId> = data
            .children()
            .iter()
            .copied()
            .filter(|&id| {
                arena
                    .get(id)
                    .and_then(|n| n.component())
                    .map(|c| !c.kind().is_literal())
                    .unwrap_or(false)
            })
            .collect();

        if non_literal.len() != 1 {
            return None;
        }
        let child_id = non_literal[0];
        let child = arena.get(child_id)?.component()?.clone();

        if child.kind() != ComponentKind::Flag && input.is_empty() {
            if child.has_default() {
                return match child.apply_default(ctx).await {
                    Some(crate::component::DefaultOutcome::Stored) => {
                        matched.push(child.name().to_string());
                        Some(self.parse_node(arena, child_id, matched, ctx, input, predicate).await)
                    }
                    Some(crate::component::DefaultOutcome::Reparse(text)) => {
                        let appended = input.append_string(&text);
                        *input = appended;
                        Some(self.parse_node(arena, node, matched, ctx, input, predicate).await)
                    }
                    None => None,
                };
            }
            if child.kind() == ComponentKind::OptionalVariable {
                let mut probe = child_id;
                loop {
                    let probe_data = arena.get(probe)?;
                    if let Some(command) = probe_data.component().and_then(|c| c.owning_command()) {
                        return Some(Ok(command));
                    }
                    match probe_data.children().first() {
                        Some(&next) => probe = next,
                        None => return Some(Err(CommandError::InvalidSyntax)),
                    }
                }
            }
            // A required variable was never supplied: fall back to this
            // node's own owning command, if any, as the intermediary match.
            return Some(match data.component().and_then(|c| c.owning_command()) {
                Some(command) => match command.permission().clone().evaluate(ctx.sender(), predicate).await {
                    PermissionResult::Allowed => Ok(command),
                    PermissionResult::Denied(missing) => Err(CommandError::NoPermission { missing }),
                },
                None => Err(CommandError::InvalidSyntax),
            });
        }

        let mark = input.cursor();
        match child.preprocess(ctx, input) {
            Ok(true) => {}
            Ok(false) => {
                input.set_cursor(mark);
                return None;
            }
            Err(error) => {
                input.set_cursor(mark);
                return Some(Err(CommandError::ArgumentParse(error)));
            }
        }

        match child.parse(ctx, input).await {
            Ok(()) => {
                matched.push(child.name().to_string());
                let child_data = arena.get(child_id)?;
                if child_data.is_leaf() {
                    if input.is_empty() {
                        Some(Ok(child_data
                            .component()
                            .and_then(|c| c.owning_command())
                            .expect("leaf invariant guarantees an owning command")))
                    } else {
                        Some(Err(CommandError::InvalidSyntax))
                    }
                } else {
                    Some(self.parse_node(arena, child_id, matched, ctx, input, predicate).await)
                }
            }
            Err(error) => {
                input.set_cursor(mark);
                Some(Err(CommandError::ArgumentParse(error)))
            }
        }
    }

    /// Suggest completions for `text` on behalf of `sender`.
    ///
    /// Suggestion errors are never surfaced: a preprocess or parse failure
    /// while walking a branch simply yields no suggestions from that
    /// branch, per §7.
    pub async fn suggest(
        &self,
        sender: S,
        text: impl Into<String>,
        predicate: &dyn PermissionPredicate<S>,
    ) -> Vec<Suggestion>
    where
        S: Sync,
    {
        let arena = self.inner.read().await;
        let mut ctx = CommandContext::new(sender);
        let mut input = CommandInput::new(text.into());
        self.suggest_node(&arena, arena.root(), &mut ctx, &mut input, predicate).await
    }

    #[async_recursion]
    async fn suggest_node<'life>(
        &'life self,
        arena: &'life Arena<S>,
        node: NodeId,
        ctx: &'life mut CommandContext<S>,
        input: &'life mut CommandInput,
        predicate: &'life (dyn PermissionPredicate<S> + 'life),
    ) -> Vec<Suggestion>
    where
        S: Sync,
    {
        if let PermissionResult::Denied(_) = self.determine_permission(arena, ctx.sender(), node, predicate).await {
            return Vec::new();
        }

        let Some(data) = arena.get(node) else {
            return Vec::new();
        };
        let children: Vec<NodeId> = data.children().to_vec();

        let first_token = input.peek_string().to_string();
        let remaining_tokens = input.remaining_token_count();

        if remaining_tokens > 1 {
            for &child_id in &children {
                let Some(component) = arena.get(child_id).and_then(|n| n.component()) else {
                    continue;
                };
                if component.matches_literal(&first_token) {
                    let _ = input.read_string_skip_whitespace(true);
                    return self.suggest_node(arena, child_id, ctx, input, predicate).await;
                }
            }
        }

        let mut suggestions = Vec::new();

        if remaining_tokens <= 1 {
            let prefix = first_token.as_str();
            for &child_id in &children {
                let Some(component) = arena.get(child_id).and_then(|n| n.component()) else {
                    continue;
                };
                if !component.kind().is_literal() {
                    continue;
                }
                for alias in component.aliases() {
                    if alias.starts_with(prefix) && alias != prefix {
                        suggestions.push(Suggestion::new(alias));
                    }
                }
                for candidate in component.suggestions(ctx, prefix).await {
                    if candidate.suggestion.starts_with(prefix) && candidate.suggestion != prefix {
                        suggestions.push(candidate);
                    }
                }
            }
        }

        for &child_id in &children {
            let Some(component) = arena.get(child_id).and_then(|n| n.component()) else {
                continue;
            };
            if component.kind().is_literal() {
                continue;
            }
            let component = component.clone();
            let mut dynamic = self
                .suggest_dynamic(arena, child_id, component, ctx, input, predicate)
                .await;
            suggestions.append(&mut dynamic);
        }

        suggestions
    }

    #[async_recursion]
    async fn suggest_dynamic<'life>(
        &'life self,
        arena: &'life Arena<S>,
        child_id: NodeId,
        component: Arc<dyn AnyComponent<S>>,
        ctx: &'life mut CommandContext<S>,
        input: &'life mut CommandInput,
        predicate: &'life (dyn PermissionPredicate<S> + 'life),
    ) -> Vec<Suggestion>
    where
        S: Sync,
    {
        if input.is_empty() {
            return Vec::new();
        }

        if component.kind().is_flag() {
            return self
                .suggest_flag(arena, child_id, component, ctx, input, predicate)
                .await;
        }

        if component.is_aggregate() {
            let k = component.requested_argument_count();
            for i in 0..k.saturating_sub(1) {
                if input.remaining_token_count() <= 1 {
                    break;
                }
                let token = input.read_string_skip_whitespace(false);
                ctx.set(format!("{}_{i}", component.name()), token);
            }
        }

        if input.remaining_token_count() == 1 {
            let prefix = input.peek_string().to_string();
            return component
                .suggestions(ctx, &prefix)
                .await
                .into_iter()
                .filter(|s| s.suggestion.starts_with(&prefix) && s.suggestion != prefix)
                .collect();
        }

        let mark = input.cursor();
        match component.preprocess(ctx, input) {
            Ok(true) => {}
            _ => {
                input.set_cursor(mark);
                return Vec::new();
            }
        }

        match component.parse(ctx, input).await {
            Ok(()) if !input.is_empty() => self.suggest_node(arena, child_id, ctx, input, predicate).await,
            Ok(()) => Vec::new(),
            Err(_) => {
                input.set_cursor(mark);
                Vec::new()
            }
        }
    }

    #[async_recursion]
    async fn suggest_flag<'life>(
        &'life self,
        arena: &'life Arena<S>,
        child_id: NodeId,
        component: Arc<dyn AnyComponent<S>>,
        ctx: &'life mut CommandContext<S>,
        input: &'life mut CommandInput,
        predicate: &'life (dyn PermissionPredicate<S> + 'life),
    ) -> Vec<Suggestion>
    where
        S: Sync,
    {
        while input.remaining_token_count() > 2 {
            let token = input.peek_string();
            if !token.starts_with('-') {
                break;
            }
            let mark = input.cursor();
            let raw = input.read_string_skip_whitespace(false);
            let switch = raw.trim_start_matches('-').to_string();
            match component
                .flags()
                .iter()
                .find(|flag| flag.name == switch || flag.aliases.contains(&switch))
            {
                Some(flag) => match &flag.value {
                    Some(value) => {
                        if value.parse(ctx, input).await.is_err() {
                            input.set_cursor(mark);
                            return Vec::new();
                        }
                    }
                    None => ctx.set(flag.name.clone(), true),
                },
                None => {
                    input.set_cursor(mark);
                    return Vec::new();
                }
            }
        }

        let current_flag = component.parse_current_flag(input);
        match &current_flag {
            Some(name) => ctx.set_suggestion_meta(FLAG_META_KEY, name.clone()),
            None => ctx.clear_suggestion_meta(FLAG_META_KEY),
        }

        let token = input.peek_string().to_string();
        let mut suggestions = Vec::new();

        if token.starts_with('-') || token.is_empty() {
            suggestions.extend(
                component
                    .flags()
                    .iter()
                    .map(|flag| Suggestion::new(format!("--{}", flag.name)))
                    .filter(|s| s.suggestion.starts_with(&token) && s.suggestion != token),
            );
        } else if let Some(flag_name) = &current_flag {
            if let Some(flag) = component.flags().iter().find(|f| &f.name == flag_name) {
                if let Some(value) = &flag.value {
                    suggestions.extend(value.suggestions(ctx, &token).await);
                }
            }
        }

        if !token.starts_with('-') {
            let has_children = arena.get(child_id).map(|d| !d.children().is_empty()).unwrap_or(false);
            if has_children {
                let mut positional = self.suggest_node(arena, child_id, ctx, input, predicate).await;
                suggestions.append(&mut positional);
            }
        }

        suggestions
    }
}

fn find_non_literal_child<S>(arena: &Arena<S>, node: NodeId) -> Option<String> {
    let data = arena.get(node)?;
    data.children().iter().find_map(|&id| {
        let component = arena.get(id)?.component()?;
        (!component.kind().is_literal()).then(|| component.name().to_string())
    })
}

fn find_flag_child<S>(arena: &Arena<S>, node: NodeId) -> Option<NodeId> {
    let data = arena.get(node)?;
    data.children().iter().copied().find(|&id| {
        arena
            .get(id)
            .and_then(|n| n.component())
            .map(|c| c.kind().is_flag())
            .unwrap_or(false)
    })
}

fn check_alias_collision<S>(
    arena: &Arena<S>,
    node: NodeId,
    incoming: &dyn AnyComponent<S>,
) -> Result<(), RegistrationError> {
    let Some(data) = arena.get(node) else {
        return Ok(());
    };
    let incoming_aliases: HashSet<String> = incoming.aliases().into_iter().collect();
    for &sibling_id in data.children() {
        let Some(sibling) = arena.get(sibling_id).and_then(|n| n.component()) else {
            continue;
        };
        if !sibling.kind().is_literal() {
            continue;
        }
        for alias in sibling.aliases() {
            if incoming_aliases.contains(&alias) {
                return Err(RegistrationError::DuplicateAlias {
                    path: path_string(arena, node),
                    alias,
                    existing: sibling.name().to_string(),
                    new: incoming.name().to_string(),
                });
            }
        }
    }
    Ok(())
}

fn validate_invariants<S>(arena: &Arena<S>) -> Result<(), RegistrationError> {
    for id in arena.all_ids() {
        let Some(data) = arena.get(id) else { continue };

        let mut non_literal_count = 0usize;
        let mut seen_aliases: HashSet<String> = HashSet::new();
        for &child_id in data.children() {
            let Some(component) = arena.get(child_id).and_then(|n| n.component()) else {
                continue;
            };
            if component.kind().is_literal() {
                for alias in component.aliases() {
                    if !seen_aliases.insert(alias.clone()) {
                        return Err(RegistrationError::DuplicateAlias {
                            path: path_string(arena, id),
                            alias,
                            existing: "<sibling literal>".to_string(),
                            new: component.name().to_string(),
                        });
                    }
                }
            } else {
                non_literal_count += 1;
            }

            if id == arena.root() && !component.kind().is_literal() {
                return Err(RegistrationError::AmbiguousNode {
                    path: "<root>".to_string(),
                    existing: "<literal>".to_string(),
                    new: component.name().to_string(),
                });
            }
        }

        if non_literal_count > 1 {
            return Err(RegistrationError::AmbiguousNode {
                path: path_string(arena, id),
                existing: "<multiple non-literal siblings>".to_string(),
                new: "<multiple non-literal siblings>".to_string(),
            });
        }
    }
    Ok(())
}

/// Compute each node's cached permission bottom-up: post-order so a
/// node's contribution to its parent already reflects any override from
/// its own `enforce_intermediary_permissions` handling.
fn compute_permissions<S>(arena: &mut Arena<S>, node: NodeId, enforce_intermediary: bool) -> PermissionExpr {
    let children = arena.get(node).map(|d| d.children().to_vec()).unwrap_or_default();

    let mut accumulated: Option<PermissionExpr> = None;
    for child in children {
        let child_permission = compute_permissions(arena, child, enforce_intermediary);
        accumulated = Some(match accumulated {
            None => child_permission,
            Some(existing) => existing.or(child_permission),
        });
    }

    let own_command = arena
        .get(node)
        .and_then(|d| d.component())
        .and_then(|c| c.owning_command());

    let permission = match (accumulated, own_command) {
        (None, None) => PermissionExpr::Empty,
        (Some(children_permission), None) => children_permission,
        (None, Some(command)) => command.permission().clone(),
        (Some(children_permission), Some(command)) => {
            if enforce_intermediary {
                command.permission().clone()
            } else {
                children_permission.or(command.permission().clone())
            }
        }
    };

    if let Some(data) = arena.get_mut(node) {
        data.set_permission(permission.clone());
    }
    permission
}

fn path_string<S>(arena: &Arena<S>, node: NodeId) -> String {
    let mut names = Vec::new();
    let mut current = Some(node);
    while let Some(id) = current {
        let Some(data) = arena.get(id) else { break };
        if let Some(component) = data.component() {
            names.push(component.name().to_string());
        }
        current = data.parent();
    }
    names.reverse();
    names.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::command::{CommandBuilder, NoopHandler};
    use crate::component::{ArgumentParser, Component, DefaultValue};
    use crate::context::CommandContext as Ctx;
    use crate::parse_result::{ArgumentParseError, ParseResult};
    use crate::permission::AllowAll;

    struct IntParser;

    #[async_trait::async_trait]
    impl ArgumentParser<(), i64> for IntParser {
        async fn parse(&self, _ctx: &mut Ctx<()>, input: &mut CommandInput) -> ParseResult<i64> {
            input.read_integer().map_err(ArgumentParseError::new)
        }
    }

    struct StringParser;

    #[async_trait::async_trait]
    impl ArgumentParser<(), String> for StringParser {
        async fn parse(&self, _ctx: &mut Ctx<()>, input: &mut CommandInput) -> ParseResult<String> {
            let token = input.read_string_skip_whitespace(false);
            if token.is_empty() {
                Err(ArgumentParseError::message("expected a string"))
            } else {
                Ok(token)
            }
        }
    }

    fn literal(name: &str) -> Arc<dyn AnyComponent<()>> {
        Arc::new(Component::<(), ()>::literal(name))
    }

    fn int_required(name: &str) -> Arc<dyn AnyComponent<()>> {
        Arc::new(Component::required(name, Arc::new(IntParser)))
    }

    fn string_required(name: &str) -> Arc<dyn AnyComponent<()>> {
        Arc::new(Component::required(name, Arc::new(StringParser)))
    }

    fn tree() -> CommandTree<()> {
        CommandTree::new(Arc::new(NoopRegistrationHandler), ManagerSettings::default())
    }

    #[tokio::test]
    async fn foo_bar_n_int_end_to_end() {
        let tree = tree();
        tree.insert_command(
            CommandBuilder::<()>::new()
                .component(literal("foo"))
                .component(literal("bar"))
                .component(int_required("n"))
                .handler(Arc::new(NoopHandler))
                .finalize()
                .unwrap(),
        )
        .await
        .unwrap();

        let command = tree.parse((), "foo bar 7", &AllowAll).await.unwrap();
        assert!(Arc::ptr_eq(
            &command,
            &tree.parse((), "foo bar 7", &AllowAll).await.unwrap()
        ));

        let err = tree.parse((), "foo bar", &AllowAll).await.unwrap_err();
        assert!(matches!(err.kind, CommandError::InvalidSyntax));

        let err = tree.parse((), "foo bar abc", &AllowAll).await.unwrap_err();
        assert!(matches!(err.kind, CommandError::ArgumentParse(_)));
    }

    #[tokio::test]
    async fn context_carries_parsed_value() {
        let tree = tree();
        tree.insert_command(
            CommandBuilder::<()>::new()
                .component(literal("foo"))
                .component(literal("bar"))
                .component(int_required("n"))
                .handler(Arc::new(NoopHandler))
                .finalize()
                .unwrap(),
        )
        .await
        .unwrap();

        let arena = tree.inner.read().await;
        let mut ctx = CommandContext::new(());
        let mut input = CommandInput::new("foo bar 7");
        let mut matched = Vec::new();
        tree.parse_node(&arena, arena.root(), &mut matched, &mut ctx, &mut input, &AllowAll)
            .await
            .unwrap();
        assert_eq!(ctx.get::<i64>("n"), Some(&7));
    }

    #[tokio::test]
    async fn greet_optional_with_default() {
        let tree = tree();
        tree.insert_command(
            CommandBuilder::<()>::new()
                .component(literal("greet"))
                .component(Arc::new(Component::optional(
                    "name",
                    Arc::new(StringParser) as Arc<dyn ArgumentParser<(), String>>,
                    DefaultValue::Parsed("world".to_string()),
                )))
                .handler(Arc::new(NoopHandler))
                .finalize()
                .unwrap(),
        )
        .await
        .unwrap();

        let arena = tree.inner.read().await;

        let mut ctx = CommandContext::new(());
        let mut input = CommandInput::new("greet");
        let mut matched = Vec::new();
        tree.parse_node(&arena, arena.root(), &mut matched, &mut ctx, &mut input, &AllowAll)
            .await
            .unwrap();
        assert_eq!(ctx.get::<String>("name"), Some(&"world".to_string()));

        let mut ctx = CommandContext::new(());
        let mut input = CommandInput::new("greet alice");
        let mut matched = Vec::new();
        tree.parse_node(&arena, arena.root(), &mut matched, &mut ctx, &mut input, &AllowAll)
            .await
            .unwrap();
        assert_eq!(ctx.get::<String>("name"), Some(&"alice".to_string()));
    }

    #[tokio::test]
    async fn suggest_greet_offers_string_parser_suggestions() {
        struct Suggest;
        #[async_trait::async_trait]
        impl crate::component::SuggestionSource<()> for Suggest {
            async fn suggestions(&self, _ctx: &Ctx<()>, prefix: &str) -> Vec<Suggestion> {
                vec![Suggestion::new(format!("{prefix}world"))]
            }
        }

        let tree = tree();
        let name_component = Component::optional(
            "name",
            Arc::new(StringParser) as Arc<dyn ArgumentParser<(), String>>,
            DefaultValue::Parsed("world".to_string()),
        )
        .with_suggestions(Arc::new(Suggest));

        tree.insert_command(
            CommandBuilder::<()>::new()
                .component(literal("greet"))
                .component(Arc::new(name_component))
                .handler(Arc::new(NoopHandler))
                .finalize()
                .unwrap(),
        )
        .await
        .unwrap();

        let suggestions = tree.suggest((), "greet ", &AllowAll).await;
        assert_eq!(suggestions, vec![Suggestion::new("world")]);
    }

    #[tokio::test]
    async fn a_x_int_and_a_y_string_disambiguate_by_literal() {
        let tree = tree();
        tree.insert_command(
            CommandBuilder::<()>::new()
                .component(literal("a"))
                .component(literal("x"))
                .component(int_required("n"))
                .handler(Arc::new(NoopHandler))
                .finalize()
                .unwrap(),
        )
        .await
        .unwrap();
        tree.insert_command(
            CommandBuilder::<()>::new()
                .component(literal("a"))
                .component(literal("y"))
                .component(string_required("s"))
                .handler(Arc::new(NoopHandler))
                .finalize()
                .unwrap(),
        )
        .await
        .unwrap();

        assert!(tree.parse((), "a x 1", &AllowAll).await.is_ok());
        assert!(tree.parse((), "a y hi", &AllowAll).await.is_ok());
        let err = tree.parse((), "a z", &AllowAll).await.unwrap_err();
        assert!(matches!(err.kind, CommandError::InvalidSyntax));

        let suggestions = tree.suggest((), "a ", &AllowAll).await;
        let mut names: Vec<&str> = suggestions.iter().map(|s| s.suggestion.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["x", "y"]);
    }

    struct OnlyPermission(&'static str);

    #[async_trait::async_trait]
    impl PermissionPredicate<()> for OnlyPermission {
        async fn has_permission(&self, _sender: &(), permission: &str) -> bool {
            permission == self.0
        }
    }

    #[tokio::test]
    async fn admin_kick_denies_without_permission() {
        let tree = tree();
        tree.insert_command(
            CommandBuilder::<()>::new()
                .component(literal("admin"))
                .component(literal("kick"))
                .component(string_required("user"))
                .handler(Arc::new(NoopHandler))
                .permission(PermissionExpr::leaf("admin.kick"))
                .finalize()
                .unwrap(),
        )
        .await
        .unwrap();

        let predicate = OnlyPermission("nothing");
        let err = tree.parse((), "admin kick bob", &predicate).await.unwrap_err();
        assert!(matches!(
            err.kind,
            CommandError::NoPermission { missing } if missing == PermissionExpr::leaf("admin.kick")
        ));

        let suggestions = tree.suggest((), "admin", &predicate).await;
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn build_flags_parse_presence_and_value() {
        let level: Arc<dyn AnyComponent<()>> = int_required("level");
        let flags = vec![
            crate::component::FlagDescriptor::presence("force"),
            crate::component::FlagDescriptor::valued("level", level),
        ];

        let tree = tree();
        tree.insert_command(
            CommandBuilder::<()>::new()
                .component(literal("build"))
                .component(Arc::new(Component::<(), ()>::flag("flags", flags)))
                .handler(Arc::new(NoopHandler))
                .finalize()
                .unwrap(),
        )
        .await
        .unwrap();

        assert!(tree.parse((), "build", &AllowAll).await.is_ok());

        let arena = tree.inner.read().await;
        let mut ctx = CommandContext::new(());
        let mut input = CommandInput::new("build --force --level 3");
        let mut matched = Vec::new();
        tree.parse_node(&arena, arena.root(), &mut matched, &mut ctx, &mut input, &AllowAll)
            .await
            .unwrap();
        assert_eq!(ctx.get::<bool>("force"), Some(&true));
        assert_eq!(ctx.get::<i64>("level"), Some(&3));
    }

    #[tokio::test]
    async fn registering_duplicate_chain_is_an_error() {
        let tree = tree();
        let build = || {
            CommandBuilder::<()>::new()
                .component(literal("foo"))
                .handler(Arc::new(NoopHandler))
                .finalize()
                .unwrap()
        };
        tree.insert_command(build()).await.unwrap();
        let err = tree.insert_command(build()).await.unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateCommandChain { .. }));
    }

    #[tokio::test]
    async fn ambiguous_sibling_types_are_rejected() {
        let tree = tree();
        tree.insert_command(
            CommandBuilder::<()>::new()
                .component(literal("a"))
                .component(int_required("n"))
                .handler(Arc::new(NoopHandler))
                .finalize()
                .unwrap(),
        )
        .await
        .unwrap();

        let err = tree
            .insert_command(
                CommandBuilder::<()>::new()
                    .component(literal("a"))
                    .component(string_required("s"))
                    .handler(Arc::new(NoopHandler))
                    .finalize()
                    .unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AmbiguousNode { .. }));
    }
}
