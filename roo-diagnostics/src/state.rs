use crate::{Diagnostic, ErrorKind, Location, PoisonStrategy};

/// Per-entity error accumulator (§7).
///
/// Every entity that runs a phase over itself — a `CodeThing` running the AIR generator, a
/// `TypeDef` resolving its members, the lexer/parser working through a file — owns one of these.
/// Raising an error sets `has_errored` and returns the poisoning strategy the caller should act
/// on; the driver checks `has_errored` across every entity at the three synchronization points
/// named in §5/§7 and aborts if any of them tripped.
#[derive(Debug, Clone, Default)]
pub struct ErrorState {
    diagnostics: Vec<Diagnostic>,
    has_errored: bool,
}

impl ErrorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and return the strategy the caller should resynchronize with.
    pub fn raise(&mut self, location: Location, kind: ErrorKind) -> PoisonStrategy {
        let severity = kind.severity();
        let strategy = kind.poison_strategy();
        log::debug!("{severity:?} raised at {location}: {kind}");
        self.has_errored = true;
        self.diagnostics.push(Diagnostic {
            severity,
            location,
            kind,
        });
        strategy
    }

    pub fn has_errored(&self) -> bool {
        self.has_errored
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Merge another entity's diagnostics into this one, e.g. when a `ParseResult`-level
    /// accumulator absorbs every `CodeThing`'s `ErrorState` at a synchronization point.
    pub fn absorb(&mut self, other: &ErrorState) {
        self.has_errored |= other.has_errored;
        self.diagnostics.extend(other.diagnostics.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raising_sets_has_errored_and_returns_strategy() {
        let mut state = ErrorState::new();
        assert!(!state.has_errored());
        let strategy = state.raise(
            Location::unknown(),
            ErrorKind::UndefinedVariable("x".into()),
        );
        assert!(state.has_errored());
        assert_eq!(strategy, PoisonStrategy::SkipToEndOfStatement);
        assert_eq!(state.diagnostics().len(), 1);
    }

    #[test]
    fn absorb_propagates_error_flag() {
        let mut parent = ErrorState::new();
        let mut child = ErrorState::new();
        child.raise(Location::unknown(), ErrorKind::InvalidArraySize);

        parent.absorb(&child);
        assert!(parent.has_errored());
        assert_eq!(parent.diagnostics().len(), 1);
    }
}
