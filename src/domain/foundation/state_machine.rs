//! State machine trait for status enums.
//!
//! Agreement and charge statuses move through fixed lifecycles. Implementors
//! list their states and allowed edges; repositories use
//! [`StateMachine::predecessors_of`] to turn a transition into a conditional
//! update ("set to X where status is one of ...").

use super::ValidationError;

/// Trait for status enums that represent state machines.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug + 'static {
    /// Every state of the machine.
    fn all() -> &'static [Self];

    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self> {
        Self::all()
            .iter()
            .copied()
            .filter(|s| self.can_transition_to(s))
            .collect()
    }

    /// States from which `target` may be entered.
    fn predecessors_of(target: Self) -> Vec<Self> {
        Self::all()
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(&target))
            .collect()
    }

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "status",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Off,
        On,
        Broken,
    }

    impl StateMachine for Light {
        fn all() -> &'static [Self] {
            &[Light::Off, Light::On, Light::Broken]
        }

        fn can_transition_to(&self, target: &Self) -> bool {
            matches!(
                (self, target),
                (Light::Off, Light::On) | (Light::On, Light::Off) | (_, Light::Broken)
            ) && self != target
        }
    }

    #[test]
    fn valid_transitions_derived_from_edges() {
        assert_eq!(Light::Off.valid_transitions(), vec![Light::On, Light::Broken]);
    }

    #[test]
    fn predecessors_are_sources_of_incoming_edges() {
        assert_eq!(Light::predecessors_of(Light::Broken), vec![Light::Off, Light::On]);
        assert_eq!(Light::predecessors_of(Light::On), vec![Light::Off]);
    }

    #[test]
    fn transition_to_rejects_invalid_edge() {
        assert!(Light::Broken.transition_to(Light::On).is_err());
        assert_eq!(Light::Off.transition_to(Light::On).unwrap(), Light::On);
    }

    #[test]
    fn terminal_state_has_no_outgoing_edges() {
        assert!(Light::Broken.is_terminal());
        assert!(!Light::On.is_terminal());
    }
}
