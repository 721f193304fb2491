//! Actions: matchable, invokable units of behavior owned by a service.
//!
//! - `ServiceAction`: id + pure matcher; invocation is action specific.
//! - `ActionRegistry`: ordered action set; iteration order is match order.
//! - `LateBound`: resources injected after construction (two-phase lifecycle).

use std::fmt;

pub type Result<T> = std::result::Result<T, ActionError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// A late-bound resource was used before `bind` supplied it.
    NotBound(&'static str),
    Failed { action: String, reason: String },
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::NotBound(resource) => {
                write!(f, "{} used before bind", resource)
            }
            ActionError::Failed { action, reason } => {
                write!(f, "action {} failed: {}", action, reason)
            }
        }
    }
}

impl std::error::Error for ActionError {}

pub trait ServiceAction {
    /// What `matches` is tested against (a key event, a message type, ...).
    type Criterion: ?Sized;

    fn id(&self) -> &str;

    /// Must be free of side effects.
    fn matches(&self, criterion: &Self::Criterion) -> bool;
}

pub struct ActionRegistry<A> {
    actions: Vec<A>,
}

impl<A: ServiceAction> ActionRegistry<A> {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Adds an action, replacing one with the same id in place.
    pub fn register(&mut self, action: A) -> Option<A> {
        match self.position(action.id()) {
            Some(index) => Some(std::mem::replace(&mut self.actions[index], action)),
            None => {
                self.actions.push(action);
                None
            }
        }
    }

    /// Rebuilds the action with `id`, keeping its position.
    pub fn replace_with(&mut self, id: &str, f: impl FnOnce(A) -> A) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let action = self.actions.remove(index);
        self.actions.insert(index, f(action));
        true
    }

    pub fn find(&self, id: &str) -> Option<&A> {
        self.actions.iter().find(|action| action.id() == id)
    }

    pub fn matching<'a>(&'a self, criterion: &'a A::Criterion) -> impl Iterator<Item = &'a A> + 'a {
        self.actions
            .iter()
            .filter(move |action| action.matches(criterion))
    }

    pub fn ids(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(|action| action.id().to_string())
            .collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, A> {
        self.actions.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, A> {
        self.actions.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.actions.iter().position(|action| action.id() == id)
    }
}

impl<A: ServiceAction> Default for ActionRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ServiceAction> FromIterator<A> for ActionRegistry<A> {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        let mut registry = Self::new();
        for action in iter {
            registry.register(action);
        }
        registry
    }
}

/// A resource that only exists once the host environment is ready.
pub struct LateBound<T> {
    name: &'static str,
    value: Option<T>,
}

impl<T> LateBound<T> {
    pub fn unbound(name: &'static str) -> Self {
        Self { name, value: None }
    }

    pub fn bind(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn is_bound(&self) -> bool {
        self.value.is_some()
    }

    /// Fails loudly in debug builds: an unbound resource means wiring happened out of order.
    pub fn get(&self) -> Result<&T> {
        match &self.value {
            Some(value) => Ok(value),
            None => {
                tracing::error!(resource = self.name, "late-bound resource used before bind");
                debug_assert!(false, "{} used before bind", self.name);
                Err(ActionError::NotBound(self.name))
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/core/action.rs"]
mod tests;
