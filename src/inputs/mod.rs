//! Nondeterministic input sequences.
//!
//! An input is a set-valued function of time: constant (one set forever)
//! or time-varying (a finite list of sets, one per step). Both variants
//! expose the same `start`/`next_state`/`done`/`length` iteration
//! contract, dispatched by variant.

use std::sync::Arc;

use enum_dispatch::enum_dispatch;

use crate::linalg::MatOp;
use crate::sets::{ConvexSet, SetExpr, linear_map};

/// Position inside an input sequence: the current set and a 1-based
/// iteration index.
#[derive(Debug, Clone)]
pub struct InputState {
    set: Arc<SetExpr>,
    index: usize,
}

impl InputState {
    pub fn set(&self) -> &SetExpr {
        &self.set
    }

    pub fn shared_set(&self) -> Arc<SetExpr> {
        Arc::clone(&self.set)
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Uniform iteration over an input sequence.
#[enum_dispatch]
pub trait InputSequence {
    /// State at the first step.
    fn start(&self) -> InputState;

    /// State after one more step. For a varying input the set component
    /// saturates at the last element once the state is terminal.
    fn next_state(&self, state: &InputState) -> InputState;

    /// Whether `state` is past the end of the sequence.
    fn done(&self, state: &InputState) -> bool;

    /// Number of stored sets (1 for a constant input).
    fn length(&self) -> usize;

    /// Ambient dimension of every member set.
    fn dim(&self) -> usize;
}

/// A set-valued input signal.
#[enum_dispatch(InputSequence)]
#[derive(Debug, Clone)]
pub enum NondeterministicInput {
    Constant(ConstantInput),
    Varying(VaryingInput),
}

impl NondeterministicInput {
    pub fn constant(set: SetExpr) -> Self {
        NondeterministicInput::Constant(ConstantInput {
            set: Arc::new(set),
        })
    }

    pub fn varying(sets: Vec<SetExpr>) -> Self {
        assert!(!sets.is_empty(), "varying input needs at least one set");
        let dim = sets[0].dim();
        assert!(
            sets.iter().all(|s| s.dim() == dim),
            "varying input: member sets must share one dimension"
        );
        NondeterministicInput::Varying(VaryingInput {
            sets: sets.into_iter().map(Arc::new).collect(),
        })
    }

    /// Whether this is the single-`VoidSet` placeholder of an absent input.
    pub fn is_absent(&self) -> bool {
        match self {
            NondeterministicInput::Constant(c) => c.set.is_void(),
            NondeterministicInput::Varying(_) => false,
        }
    }

    /// `M·U`: maps every member set, preserving the variant.
    pub fn map(&self, matrix: &MatOp) -> NondeterministicInput {
        match self {
            NondeterministicInput::Constant(c) => {
                NondeterministicInput::constant(linear_map(matrix.clone(), (*c.set).clone()))
            }
            NondeterministicInput::Varying(v) => NondeterministicInput::varying(
                v.sets
                    .iter()
                    .map(|s| linear_map(matrix.clone(), (**s).clone()))
                    .collect(),
            ),
        }
    }

    /// The member sets in order.
    pub fn sets(&self) -> Vec<Arc<SetExpr>> {
        match self {
            NondeterministicInput::Constant(c) => vec![Arc::clone(&c.set)],
            NondeterministicInput::Varying(v) => v.sets.clone(),
        }
    }
}

/// The same set at every step; iteration never terminates.
#[derive(Debug, Clone)]
pub struct ConstantInput {
    set: Arc<SetExpr>,
}

impl InputSequence for ConstantInput {
    fn start(&self) -> InputState {
        InputState {
            set: Arc::clone(&self.set),
            index: 1,
        }
    }

    fn next_state(&self, _state: &InputState) -> InputState {
        self.start()
    }

    fn done(&self, _state: &InputState) -> bool {
        false
    }

    fn length(&self) -> usize {
        1
    }

    fn dim(&self) -> usize {
        self.set.dim()
    }
}

/// One set per step; iteration terminates after the last one.
#[derive(Debug, Clone)]
pub struct VaryingInput {
    sets: Vec<Arc<SetExpr>>,
}

impl InputSequence for VaryingInput {
    fn start(&self) -> InputState {
        InputState {
            set: Arc::clone(&self.sets[0]),
            index: 1,
        }
    }

    fn next_state(&self, state: &InputState) -> InputState {
        let next = state.index + 1;
        let slot = next.min(self.sets.len());
        InputState {
            set: Arc::clone(&self.sets[slot - 1]),
            index: next,
        }
    }

    fn done(&self, state: &InputState) -> bool {
        state.index > self.sets.len()
    }

    fn length(&self) -> usize {
        self.sets.len()
    }

    fn dim(&self) -> usize {
        self.sets[0].dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::E;
    use faer::{Col, Mat};

    fn ball(center: E, radius: E) -> SetExpr {
        SetExpr::ball2(Col::from_fn(2, |_| center), radius)
    }

    #[test]
    fn constant_input_never_advances() {
        let u = NondeterministicInput::constant(ball(0.0, 1.0));
        let mut state = u.start();
        for _ in 0..5 {
            assert_eq!(state.index(), 1);
            assert!(!u.done(&state));
            assert!(matches!(state.set(), SetExpr::Ball2(_)));
            state = u.next_state(&state);
        }
        assert_eq!(u.length(), 1);
    }

    #[test]
    fn varying_input_steps_through_and_terminates() {
        let u = NondeterministicInput::varying(vec![ball(0.0, 1.0), ball(1.0, 2.0), ball(2.0, 3.0)]);
        assert_eq!(u.length(), 3);

        let mut state = u.start();
        for k in 1..=3 {
            assert_eq!(state.index(), k);
            assert!(!u.done(&state));
            match state.set() {
                SetExpr::Ball2(b) => assert_eq!(b.radius, k as E),
                other => panic!("unexpected set {other:?}"),
            }
            state = u.next_state(&state);
        }
        assert!(u.done(&state));
    }

    #[test]
    fn mapping_a_constant_input_maps_its_set() {
        let u = NondeterministicInput::constant(ball(1.0, 0.5));
        let m = MatOp::Dense(Mat::from_fn(2, 2, |i, j| if i == j { 2.0 } else { 0.0 }));
        let mapped = u.map(&m);

        let d = Col::from_fn(2, |i| if i == 0 { 1.0 } else { 0.0 });
        let direct = linear_map(m, ball(1.0, 0.5));
        assert!(
            (mapped.start().set().support(d.as_ref()) - direct.support(d.as_ref())).abs() < 1e-14
        );
        assert!(matches!(mapped, NondeterministicInput::Constant(_)));
    }

    #[test]
    fn absent_input_is_a_single_void() {
        let u = NondeterministicInput::constant(SetExpr::void(3));
        assert!(u.is_absent());
        assert!(!NondeterministicInput::constant(ball(0.0, 1.0)).is_absent());
    }
}
