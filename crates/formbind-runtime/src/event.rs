//! Event kinds a subscription can ask for, and the change sets the host emits.

use bitflags::bitflags;

bitflags! {
    /// What changed in one dispatch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Changes: u8 {
        const VALUE = 1 << 0;
        const BUSY = 1 << 1;
        const ERRORS = 1 << 2;
    }
}

/// Event kind a subscription listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventKind {
    /// Any change, any scope.
    #[default]
    Any,
    Value,
    Busy,
    Errors,
}

impl EventKind {
    /// Whether a dispatch carrying `changes` is of interest.
    #[must_use]
    pub fn matches(self, changes: Changes) -> bool {
        match self {
            Self::Any => !changes.is_empty(),
            Self::Value => changes.contains(Changes::VALUE),
            Self::Busy => changes.contains(Changes::BUSY),
            Self::Errors => changes.contains(Changes::ERRORS),
        }
    }
}

/// Event-kind sentinels.
pub mod events {
    use super::EventKind;

    /// Any change, any scope.
    pub const ANY: EventKind = EventKind::Any;
    pub const VALUE: EventKind = EventKind::Value;
    pub const BUSY: EventKind = EventKind::Busy;
    pub const ERRORS: EventKind = EventKind::Errors;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_every_non_empty_change() {
        assert!(events::ANY.matches(Changes::VALUE));
        assert!(events::ANY.matches(Changes::BUSY | Changes::ERRORS));
        assert!(!events::ANY.matches(Changes::empty()));
    }

    #[test]
    fn specific_kinds_match_their_bit() {
        let reset = Changes::VALUE | Changes::BUSY | Changes::ERRORS;
        assert!(EventKind::Errors.matches(reset));
        assert!(EventKind::Value.matches(Changes::VALUE));
        assert!(!EventKind::Value.matches(Changes::ERRORS));
        assert!(!EventKind::Busy.matches(Changes::VALUE));
    }
}
