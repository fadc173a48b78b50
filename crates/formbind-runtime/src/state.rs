//! State snapshots handed to subscribers.

use formbind_core::{HostErrors, Value, Values};

/// Snapshot of one source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceState {
    pub value: Value,
    pub busy: bool,
    pub errors: Option<Vec<String>>,
    /// Whether the value was last written by the user rather than by
    /// `init`/`clear`.
    pub touched: bool,
}

impl SourceState {
    /// Whether the source currently carries at least one error message.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}

/// Aggregate snapshot of every live source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostState {
    pub values: Values,
    /// Only sources that currently carry errors appear here.
    pub errors: HostErrors,
    /// Host-wide busy flag or any source busy.
    pub busy: bool,
    /// Any source touched.
    pub touched: bool,
}

impl HostState {
    /// Whether no source carries errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.values().all(Vec::is_empty)
    }
}

/// What a subscription callback receives.
///
/// Scoped subscriptions get the state of their source; unscoped ones get the
/// aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum StateSnapshot {
    Source { name: String, state: SourceState },
    Host(HostState),
}

impl StateSnapshot {
    #[must_use]
    pub fn busy(&self) -> bool {
        match self {
            Self::Source { state, .. } => state.busy,
            Self::Host(host) => host.busy,
        }
    }

    #[must_use]
    pub fn touched(&self) -> bool {
        match self {
            Self::Source { state, .. } => state.touched,
            Self::Host(host) => host.touched,
        }
    }

    /// The source state, for scoped snapshots.
    #[must_use]
    pub fn source(&self) -> Option<&SourceState> {
        match self {
            Self::Source { state, .. } => Some(state),
            Self::Host(_) => None,
        }
    }

    /// The aggregate state, for unscoped snapshots.
    #[must_use]
    pub fn host(&self) -> Option<&HostState> {
        match self {
            Self::Source { .. } => None,
            Self::Host(host) => Some(host),
        }
    }

    /// Value of `name`: the scoped value when the snapshot is for `name`, the
    /// aggregate entry otherwise.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Source { name: own, state } => (own == name).then_some(&state.value),
            Self::Host(host) => host.values.get(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_error_lists_do_not_count() {
        let state = SourceState {
            errors: Some(Vec::new()),
            ..SourceState::default()
        };
        assert!(!state.has_errors());

        let mut host = HostState::default();
        host.errors.insert("a".into(), Vec::new());
        assert!(host.is_valid());
        host.errors.insert("b".into(), vec!["required".into()]);
        assert!(!host.is_valid());
    }

    #[test]
    fn value_of_respects_scope() {
        let scoped = StateSnapshot::Source {
            name: "email".into(),
            state: SourceState {
                value: Value::text("a@x.com"),
                ..SourceState::default()
            },
        };
        assert_eq!(scoped.value_of("email"), Some(&Value::text("a@x.com")));
        assert_eq!(scoped.value_of("other"), None);

        let mut host = HostState::default();
        host.values.insert("other".into(), Value::text("x"));
        let aggregate = StateSnapshot::Host(host);
        assert_eq!(aggregate.value_of("other"), Some(&Value::text("x")));
        assert!(aggregate.source().is_none());
    }
}
