/// A state type that consumes itself on every transition.
///
/// Transitions are total: an input that is not valid for the current state
/// must return the state unchanged rather than panic.
pub trait FiniteStateMachine {
    type Input;
    type Context;

    #[must_use]
    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self;
}
