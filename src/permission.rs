// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Permission expressions and their evaluation against a sender.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use async_trait::async_trait;

/// A boolean combination of named permission strings.
///
/// `Empty` always evaluates to allowed, regardless of predicate; it is the
/// identity element used when a command declares no permission at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionExpr {
    /// No permission required.
    Empty,
    /// A single named permission.
    Leaf(String),
    /// Both sub-expressions must be satisfied.
    And(Box<PermissionExpr>, Box<PermissionExpr>),
    /// Either sub-expression must be satisfied.
    Or(Box<PermissionExpr>, Box<PermissionExpr>),
    /// The sub-expression must not be satisfied.
    Not(Box<PermissionExpr>),
}

impl PermissionExpr {
    /// A leaf permission named `permission`.
    pub fn leaf(permission: impl Into<String>) -> Self {
        PermissionExpr::Leaf(permission.into())
    }

    /// Combine two expressions with `Or`. If either side is `Empty` (always
    /// allowed), the union is unconditionally allowed too, so the result
    /// collapses to `Empty` rather than requiring the other branch.
    pub fn or(self, other: PermissionExpr) -> PermissionExpr {
        match (self, other) {
            (PermissionExpr::Empty, _) => PermissionExpr::Empty,
            (_, PermissionExpr::Empty) => PermissionExpr::Empty,
            (this, other) => PermissionExpr::Or(Box::new(this), Box::new(other)),
        }
    }

    /// Combine two expressions with `And`.
    pub fn and(self, other: PermissionExpr) -> PermissionExpr {
        match (self, other) {
            (PermissionExpr::Empty, other) => other,
            (this, PermissionExpr::Empty) => this,
            (this, other) => PermissionExpr::And(Box::new(this), Box::new(other)),
        }
    }

    /// Negate this expression.
    pub fn negate(self) -> PermissionExpr {
        PermissionExpr::Not(Box::new(self))
    }

    /// Evaluate this expression against `sender` using `predicate` to
    /// resolve leaves, returning a [`PermissionResult`].
    pub async fn evaluate<S>(
        &self,
        sender: &S,
        predicate: &dyn PermissionPredicate<S>,
    ) -> PermissionResult
    where
        S: Sync,
    {
        if self.check(sender, predicate).await {
            PermissionResult::Allowed
        } else {
            PermissionResult::Denied(self.clone())
        }
    }

    fn check<'a, S>(
        &'a self,
        sender: &'a S,
        predicate: &'a dyn PermissionPredicate<S>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + 'a>>
    where
        S: Sync,
    {
        Box::pin(async move {
            match self {
                PermissionExpr::Empty => true,
                PermissionExpr::Leaf(name) => predicate.has_permission(sender, name).await,
                PermissionExpr::And(a, b) => {
                    a.check(sender, predicate).await && b.check(sender, predicate).await
                }
                PermissionExpr::Or(a, b) => {
                    a.check(sender, predicate).await || b.check(sender, predicate).await
                }
                PermissionExpr::Not(a) => !a.check(sender, predicate).await,
            }
        })
    }
}

impl fmt::Display for PermissionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionExpr::Empty => write!(f, "<none>"),
            PermissionExpr::Leaf(name) => write!(f, "{name}"),
            PermissionExpr::And(a, b) => write!(f, "({a} & {b})"),
            PermissionExpr::Or(a, b) => write!(f, "({a} | {b})"),
            PermissionExpr::Not(a) => write!(f, "!{a}"),
        }
    }
}

impl BitAnd for PermissionExpr {
    type Output = PermissionExpr;
    fn bitand(self, rhs: PermissionExpr) -> PermissionExpr {
        self.and(rhs)
    }
}

impl BitOr for PermissionExpr {
    type Output = PermissionExpr;
    fn bitor(self, rhs: PermissionExpr) -> PermissionExpr {
        self.or(rhs)
    }
}

impl Not for PermissionExpr {
    type Output = PermissionExpr;
    fn not(self) -> PermissionExpr {
        self.negate()
    }
}

impl Default for PermissionExpr {
    fn default() -> Self {
        PermissionExpr::Empty
    }
}

/// The outcome of testing a [`PermissionExpr`] against a sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionResult {
    /// The sender may proceed.
    Allowed,
    /// The sender may not proceed; carries the expression that was not
    /// satisfied, for "you need X" style error messages.
    Denied(PermissionExpr),
}

impl PermissionResult {
    /// True for [`PermissionResult::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionResult::Allowed)
    }
}

/// External predicate used to resolve a permission leaf against a sender.
///
/// Implemented by the embedding application; the core only ever combines
/// leaves with `And`/`Or`/`Not`/`Empty`.
#[async_trait]
pub trait PermissionPredicate<S>: Send + Sync {
    /// Does `sender` hold `permission`?
    async fn has_permission(&self, sender: &S, permission: &str) -> bool;
}

/// A predicate that allows everything. Useful for tests and for embedders
/// with no permission system.
pub struct AllowAll;

#[async_trait]
impl<S: Sync> PermissionPredicate<S> for AllowAll {
    async fn has_permission(&self, _sender: &S, _permission: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Allowed(&'static [&'static str]);

    #[async_trait]
    impl PermissionPredicate<()> for Allowed {
        async fn has_permission(&self, _sender: &(), permission: &str) -> bool {
            self.0.contains(&permission)
        }
    }

    #[tokio::test]
    async fn empty_is_always_allowed() {
        let predicate = Allowed(&[]);
        let result = PermissionExpr::Empty.evaluate(&(), &predicate).await;
        assert_eq!(result, PermissionResult::Allowed);
    }

    #[tokio::test]
    async fn leaf_denies_when_predicate_says_no() {
        let predicate = Allowed(&["admin.kick"]);
        let expr = PermissionExpr::leaf("admin.ban");
        let result = expr.clone().evaluate(&(), &predicate).await;
        assert_eq!(result, PermissionResult::Denied(expr));
    }

    #[tokio::test]
    async fn or_allows_if_either_branch_allows() {
        let predicate = Allowed(&["admin.kick"]);
        let expr = PermissionExpr::leaf("admin.ban").or(PermissionExpr::leaf("admin.kick"));
        let result = expr.evaluate(&(), &predicate).await;
        assert_eq!(result, PermissionResult::Allowed);
    }

    #[tokio::test]
    async fn and_denies_if_either_branch_denies() {
        let predicate = Allowed(&["admin.kick"]);
        let expr = PermissionExpr::leaf("admin.ban").and(PermissionExpr::leaf("admin.kick"));
        let result = expr.clone().evaluate(&(), &predicate).await;
        assert_eq!(result, PermissionResult::Denied(expr));
    }

    #[tokio::test]
    async fn or_with_empty_is_unconditionally_allowed() {
        let expr = PermissionExpr::Empty.or(PermissionExpr::leaf("admin.kick"));
        assert_eq!(expr, PermissionExpr::Empty);
    }
}
