//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                      │
//! │  ┌────────────────┬────────────┬────────────┬──────────────────┐ │
//! │  │ StateId        │ on_enter   │ on_exit    │ on_update        │ │
//! │  ├────────────────┼────────────┼────────────┼──────────────────┤ │
//! │  │ Initialization │ fn(ctx,io) │            │ fn(ctx,io)->Opt  │ │
//! │  │ Error          │ fn(ctx,io) │            │ fn(ctx,io)->Opt  │ │
//! │  │ Idle           │            │            │ fn(ctx,io)->Opt  │ │
//! │  │ Sleeping       │            │            │ fn(ctx,io)->Opt  │ │
//! │  │ Napping        │            │            │ fn(ctx,io)->Opt  │ │
//! │  │ LowBattery     │            │            │ fn(ctx,io)->Opt  │ │
//! │  │ Reporting      │            │            │ fn(ctx,io)->Opt  │ │
//! │  │ ResponseWait   │            │            │ fn(ctx,io)->Opt  │ │
//! │  └────────────────┴────────────┴────────────┴──────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  Every function receives the owned device context
//! ([`FsmContext`]) and the driven ports for this tick.

pub mod boot;
pub mod context;
pub mod states;

use context::FsmContext;
use log::info;

use crate::app::ports::Ports;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all possible device states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Initialization = 0,
    Error = 1,
    Idle = 2,
    Sleeping = 3,
    Napping = 4,
    LowBattery = 5,
    Reporting = 6,
    ResponseWait = 7,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 8;

    /// Convert a `u8` index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Error` in release (safe fallback).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Initialization,
            1 => Self::Error,
            2 => Self::Idle,
            3 => Self::Sleeping,
            4 => Self::Napping,
            5 => Self::LowBattery,
            6 => Self::Reporting,
            7 => Self::ResponseWait,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Error
            }
        }
    }

    /// Display name, as published in state-transition notices.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Initialization => "Initialize",
            Self::Error => "Error",
            Self::Idle => "Idle",
            Self::Sleeping => "Sleeping",
            Self::Napping => "Napping",
            Self::LowBattery => "Low Battery",
            Self::Reporting => "Reporting",
            Self::ResponseWait => "Response Wait",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext, &mut Ports<'_>);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext, &mut Ports<'_>) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]).  The context and
/// ports are borrowed per call, so the engine itself holds no device state.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter (wraps at u64::MAX).
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext, ports: &mut Ports<'_>) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx, ports);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    /// 3. Increment tick counter.
    pub fn tick(&mut self, ctx: &mut FsmContext, ports: &mut Ports<'_>) {
        self.tick_count += 1;

        let next = (self.table[self.current].on_update)(ctx, ports);

        if let Some(next_id) = next {
            self.transition(next_id, ctx, ports);
        }
    }

    /// Force an immediate transition regardless of what `on_update`
    /// would return.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext, ports: &mut Ports<'_>) {
        if next as usize != self.current {
            self.transition(next, ctx, ports);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// How many ticks the FSM has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext, ports: &mut Ports<'_>) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx, ports);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx, ports);
        }
    }
}
