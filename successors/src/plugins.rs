//! Plugins installed by the `ExecutionController`.

use crate::address::{self, Address};
use crate::aggregator::TargetKey;
use crate::engine::{ExecState, Instruction, Plugin, StateId};
use crate::error::Result;
use crate::session::RunSession;
use crate::tracker::Step;
use log::{debug, info, trace};
use std::sync::Arc;

/// Collects the successors of one instruction, whatever path reached it.
pub struct UndirectedExtractor {
    address: Address,
    max_solves: usize,
    session: Arc<RunSession>,
}

impl UndirectedExtractor {
    pub fn new(address: Address, max_solves: usize, session: Arc<RunSession>) -> Self {
        UndirectedExtractor {
            address,
            max_solves,
            session,
        }
    }
}

impl<S: ExecState> Plugin<S> for UndirectedExtractor {
    fn did_execute_instruction(
        &self,
        state: &mut S,
        old_pc: u64,
        new_pc: &S::Value,
        _insn: &Instruction,
    ) -> Result<()> {
        if old_pc != self.address.value() {
            return Ok(());
        }
        info!("calculating possible targets of {} in state {}", self.address, state.id());
        let values = state.solve_n(new_pc, self.max_solves)?;
        if values.is_empty() {
            debug!("no feasible successor of {} in state {}", self.address, state.id());
            return Ok(());
        }
        let targets = self.session.targets().record(TargetKey::Global, values);
        println!("{}->{}", self.address, address::join(&targets));
        Ok(())
    }
}

/// Prunes states that leave every candidate path and collects the
/// successors of each completed path.
pub struct DirectedExtractor {
    max_solves: usize,
    session: Arc<RunSession>,
}

impl DirectedExtractor {
    pub fn new(max_solves: usize, session: Arc<RunSession>) -> Self {
        DirectedExtractor {
            max_solves,
            session,
        }
    }
}

impl<S: ExecState> Plugin<S> for DirectedExtractor {
    fn will_execute_instruction(&self, state: &mut S, pc: u64, _insn: &Instruction) -> Result<()> {
        if let Step::Abandon = self.session.advance(state.id(), Address(pc)) {
            state.abandon();
        }
        Ok(())
    }

    fn did_execute_instruction(
        &self,
        state: &mut S,
        old_pc: u64,
        new_pc: &S::Value,
        _insn: &Instruction,
    ) -> Result<()> {
        let completed = self.session.take_completed(state.id());
        if completed.is_empty() {
            return Ok(());
        }
        let values = state.solve_n(new_pc, self.max_solves)?;
        if values.is_empty() {
            debug!(
                "state {} completed paths {:?} without a feasible successor",
                state.id(),
                completed
            );
            return Ok(());
        }
        for id in completed {
            let targets = self
                .session
                .targets()
                .record(TargetKey::Path(id), values.iter().copied());
            println!(
                "Possible targets [{}]: {}->{}",
                id,
                Address(old_pc),
                address::join(&targets)
            );
        }
        Ok(())
    }

    fn did_fork_state(&self, parent: StateId, child: StateId) {
        self.session.fork(parent, child);
    }

    fn did_terminate_state(&self, state: StateId) {
        self.session.release(state);
    }
}

/// Logs the instruction pointer of every state before each instruction.
pub struct RipTracer;

impl<S: ExecState> Plugin<S> for RipTracer {
    fn will_execute_instruction(&self, state: &mut S, pc: u64, insn: &Instruction) -> Result<()> {
        trace!("[{}] {} {}", state.id(), Address(pc), insn.mnemonic);
        Ok(())
    }
}
