//! Replays predetermined instruction traces.
//!
//! Every trace is one execution state. A step carries the address of the
//! retired instruction and the values its successor program counter can
//! take, which stands in for the symbolic value a real engine would solve.
//! A trace may fork into further traces once its own steps are exhausted.

use super::{Engine, ExecState, Hooks, InsnKind, Instruction, Plugin, StateId};
use crate::error::Result;
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct TraceStep {
    pub insn: Instruction,
    pub next: Vec<u64>,
}

impl TraceStep {
    pub fn new(addr: u64, next: Vec<u64>) -> Self {
        TraceStep {
            insn: Instruction::new(addr, 1, "trace", InsnKind::Other),
            next,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Trace {
    steps: Vec<TraceStep>,
    forks: Vec<Trace>,
}

impl Trace {
    pub fn new(steps: Vec<TraceStep>) -> Self {
        Trace {
            steps,
            forks: Vec::new(),
        }
    }

    /// Straight-line trace: each step falls through to the next address,
    /// the final step may go to any of `last_next`.
    pub fn linear(pcs: &[u64], last_next: Vec<u64>) -> Self {
        let mut steps: Vec<TraceStep> = pcs
            .windows(2)
            .map(|w| TraceStep::new(w[0], vec![w[1]]))
            .collect();
        if let Some(&last) = pcs.last() {
            steps.push(TraceStep::new(last, last_next));
        }
        Self::new(steps)
    }

    /// Continue as a separate state once this trace has run out of steps.
    pub fn fork(mut self, child: Trace) -> Self {
        self.forks.push(child);
        self
    }
}

#[derive(Debug)]
pub struct TraceState {
    id: StateId,
    pc: u64,
    abandoned: bool,
}

impl ExecState for TraceState {
    type Value = Vec<u64>;

    fn id(&self) -> StateId {
        self.id
    }

    fn pc(&self) -> u64 {
        self.pc
    }

    fn solve_n(&self, value: &Vec<u64>, n: usize) -> Result<Vec<u64>> {
        let mut values: Vec<u64> = Vec::with_capacity(n);
        for &v in value {
            if values.len() == n {
                break;
            }
            if !values.contains(&v) {
                values.push(v);
            }
        }
        values.sort_unstable();
        Ok(values)
    }

    fn abandon(&mut self) {
        self.abandoned = true;
    }

    fn is_abandoned(&self) -> bool {
        self.abandoned
    }
}

#[derive(Default)]
pub struct TraceEngine {
    pending: VecDeque<(StateId, Trace)>,
    hooks: Hooks<TraceState>,
    next_id: StateId,
}

impl TraceEngine {
    pub fn new(traces: Vec<Trace>) -> Self {
        let mut engine = TraceEngine::default();
        for trace in traces {
            let id = engine.new_id();
            engine.pending.push_back((id, trace));
        }
        engine
    }

    fn new_id(&mut self) -> StateId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn run_state(&mut self, id: StateId, trace: Trace) -> Result<()> {
        let mut state = TraceState {
            id,
            pc: 0,
            abandoned: false,
        };
        for step in &trace.steps {
            state.pc = step.insn.addr;
            self.hooks.will_execute(&mut state, &step.insn)?;
            if state.is_abandoned() {
                debug!("state {} abandoned at {:#x}", id, state.pc);
                break;
            }
            self.hooks
                .did_execute(&mut state, step.insn.addr, &step.next, &step.insn)?;
        }
        if !state.is_abandoned() {
            for child in trace.forks {
                let child_id = self.new_id();
                trace!("state {} forked into {}", id, child_id);
                self.hooks.did_fork(id, child_id);
                self.pending.push_back((child_id, child));
            }
        }
        self.hooks.did_terminate(id);
        Ok(())
    }
}

impl Engine for TraceEngine {
    type State = TraceState;

    fn add_hook(&mut self, addr: Option<u64>, plugin: Arc<dyn Plugin<TraceState>>) {
        self.hooks.add(addr, plugin)
    }

    fn run(&mut self) -> Result<()> {
        while let Some((id, trace)) = self.pending.pop_front() {
            self.run_state(id, trace)?;
        }
        Ok(())
    }
}
