//! Symbolic execution over rizin's instruction analysis.
//!
//! Instructions are decoded through rz-pipe; control flow is modeled on
//! the analysed op type while branch decisions and indirect targets are z3
//! terms, so concrete successors come out of the solver. Register and
//! memory contents are not modeled: an unresolved transfer may only land
//! on a code reference rizin recorded for it, and has no successor when
//! there is none.

use super::{Engine, ExecState, Hooks, InsnKind, Instruction, Plugin, StateId};
use crate::config::Limits;
use crate::error::{Result, SuccError};
use log::{debug, info, trace, warn};
use quick_cache::sync::Cache;
use rzapi::api::RzApi;
use std::collections::BinaryHeap;
use std::sync::Arc;
use z3::ast::{Ast, Bool, BV};
use z3::{SatResult, Solver};

const PC_BITS: u32 = 64;
const INST_CACHE_SIZE: usize = 4096;

#[derive(Clone)]
pub struct RzState<'ctx> {
    id: StateId,
    pc: u64,
    z3: &'ctx z3::Context,
    constraints: Vec<Bool<'ctx>>,
    call_stack: Vec<u64>,
    depth: usize,
    abandoned: bool,
}

impl<'ctx> RzState<'ctx> {
    pub fn new(id: StateId, pc: u64, z3: &'ctx z3::Context) -> Self {
        RzState {
            id,
            pc,
            z3,
            constraints: Vec::new(),
            call_stack: Vec::new(),
            depth: 0,
            abandoned: false,
        }
    }

    pub fn assert(&mut self, constraint: Bool<'ctx>) {
        self.constraints.push(constraint)
    }

    fn new_const(&self, val: u64) -> BV<'ctx> {
        BV::from_u64(self.z3, val, PC_BITS)
    }
}

impl<'ctx> ExecState for RzState<'ctx> {
    type Value = BV<'ctx>;

    fn id(&self) -> StateId {
        self.id
    }

    fn pc(&self) -> u64 {
        self.pc
    }

    // extract up to 'n' models of 'value' from current state.
    // returned vector has distinct and sorted values.
    fn solve_n(&self, value: &BV<'ctx>, n: usize) -> Result<Vec<u64>> {
        let solver = Solver::new(self.z3);
        for c in &self.constraints {
            solver.assert(c);
        }
        let mut results = BinaryHeap::new();
        solver.push();
        for _ in 0..n {
            match solver.check() {
                SatResult::Sat => {}
                SatResult::Unsat => break,
                SatResult::Unknown => {
                    solver.pop(1);
                    return Err(SuccError::Z3("returned unknown.".to_owned()));
                }
            }
            let model = solver
                .get_model()
                .ok_or_else(|| SuccError::Z3("returned no model.".to_owned()))?;
            let val = model
                .eval(value, true)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| SuccError::Z3("returned invalid model (not concretized).".to_owned()))?;
            results.push(val);
            solver.assert(&value._eq(&self.new_const(val)).not());
        }
        solver.pop(1);
        Ok(results.into_sorted_vec())
    }

    fn abandon(&mut self) {
        self.abandoned = true;
    }

    fn is_abandoned(&self) -> bool {
        self.abandoned
    }
}

/// Static knowledge about where unresolved control transfers may go.
pub trait Resolver {
    /// Code addresses the instruction `insn` is known to transfer to.
    fn jump_targets(&self, insn: &Instruction) -> Result<Vec<u64>>;

    /// Return addresses of the known calls to the function containing `insn`.
    fn return_sites(&self, insn: &Instruction) -> Result<Vec<u64>>;
}

enum Transfer<'ctx> {
    To(u64),
    Branch {
        cond: Bool<'ctx>,
        taken: u64,
        fallthrough: u64,
    },
    Indirect(BV<'ctx>),
}

/// Worklist of states and the control-transfer model applied to them.
pub struct Explorer<'ctx> {
    z3: &'ctx z3::Context,
    hooks: Hooks<RzState<'ctx>>,
    worklist: Vec<RzState<'ctx>>,
    limits: Limits,
    next_id: StateId,
}

impl<'ctx> Explorer<'ctx> {
    pub fn new(z3: &'ctx z3::Context, limits: Limits) -> Self {
        Explorer {
            z3,
            hooks: Hooks::new(),
            worklist: Vec::new(),
            limits,
            next_id: 0,
        }
    }

    pub fn add_hook(&mut self, addr: Option<u64>, plugin: Arc<dyn Plugin<RzState<'ctx>>>) {
        self.hooks.add(addr, plugin)
    }

    /// Queue a fresh state starting at `pc`.
    pub fn spawn(&mut self, pc: u64) {
        let id = self.new_id();
        self.worklist.push(RzState::new(id, pc, self.z3));
    }

    /// Next state to step, depth first. States at the depth limit are
    /// terminated on the way.
    pub fn next_state(&mut self) -> Option<RzState<'ctx>> {
        while let Some(state) = self.worklist.pop() {
            if state.depth < self.limits.max_depth {
                return Some(state);
            }
            warn!(
                "state {} reached the depth limit of {} at {:#x}",
                state.id, self.limits.max_depth, state.pc
            );
            self.terminate(state);
        }
        None
    }

    fn new_id(&mut self) -> StateId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn fork(&mut self, parent: &RzState<'ctx>) -> Option<RzState<'ctx>> {
        if self.next_id >= self.limits.max_states {
            warn!(
                "state limit of {} reached, dropping fork of state {} at {:#x}",
                self.limits.max_states, parent.id, parent.pc
            );
            return None;
        }
        let mut child = parent.clone();
        child.id = self.new_id();
        trace!("state {} forked into {}", parent.id, child.id);
        self.hooks.did_fork(parent.id, child.id);
        Some(child)
    }

    fn terminate(&self, state: RzState<'ctx>) {
        trace!("state {} terminated at {:#x}", state.id, state.pc);
        self.hooks.did_terminate(state.id);
    }

    fn transfer(
        &self,
        state: &mut RzState<'ctx>,
        insn: &Instruction,
        resolver: &dyn Resolver,
    ) -> Result<Transfer<'ctx>> {
        let next = insn.next_addr();
        let transfer = match insn.kind {
            // system calls return to the next instruction
            InsnKind::Other | InsnKind::Syscall => Transfer::To(next),
            InsnKind::Jump => match insn.jump {
                Some(dst) => Transfer::To(dst),
                None => self.indirect(state, &resolver.jump_targets(insn)?),
            },
            InsnKind::CondJump => match insn.jump {
                Some(taken) => Transfer::Branch {
                    cond: Bool::fresh_const(self.z3, "branch"),
                    taken,
                    fallthrough: insn.fail.unwrap_or(next),
                },
                None => self.indirect(state, &resolver.jump_targets(insn)?),
            },
            InsnKind::Call => {
                state.call_stack.push(next);
                match insn.jump {
                    Some(dst) => Transfer::To(dst),
                    None => self.indirect(state, &resolver.jump_targets(insn)?),
                }
            }
            InsnKind::IndirectCall => {
                state.call_stack.push(next);
                self.indirect(state, &resolver.jump_targets(insn)?)
            }
            InsnKind::IndirectJump => self.indirect(state, &resolver.jump_targets(insn)?),
            InsnKind::Return => match state.call_stack.pop() {
                Some(ret) => Transfer::To(ret),
                // returned from the frame the state started in
                None => self.indirect(state, &resolver.return_sites(insn)?),
            },
            InsnKind::Trap => self.indirect(state, &[]),
            InsnKind::Invalid => {
                return Err(SuccError::Unsupported {
                    addr: insn.addr,
                    kind: insn.mnemonic.clone(),
                })
            }
        };
        Ok(transfer)
    }

    // fresh target ranging over `sites`; unsatisfiable when `sites` is empty
    fn indirect(&self, state: &mut RzState<'ctx>, sites: &[u64]) -> Transfer<'ctx> {
        let target = BV::fresh_const(self.z3, "target", PC_BITS);
        if sites.is_empty() {
            debug!("no known targets for the transfer at {:#x}", state.pc);
            state.assert(Bool::from_bool(self.z3, false));
            return Transfer::Indirect(target);
        }
        let eqs: Vec<Bool> = sites
            .iter()
            .map(|&addr| target._eq(&state.new_const(addr)))
            .collect();
        let eqs: Vec<&Bool> = eqs.iter().collect();
        state.assert(Bool::or(self.z3, &eqs));
        Transfer::Indirect(target)
    }

    /// Execute `insn` at the program counter of `state`, queueing every
    /// resulting state.
    pub fn step(
        &mut self,
        mut state: RzState<'ctx>,
        insn: &Instruction,
        resolver: &dyn Resolver,
    ) -> Result<()> {
        self.hooks.will_execute(&mut state, insn)?;
        if state.is_abandoned() {
            debug!("state {} abandoned at {:#x}", state.id, state.pc);
            self.terminate(state);
            return Ok(());
        }
        state.depth += 1;
        let old_pc = state.pc;

        match self.transfer(&mut state, insn, resolver)? {
            Transfer::To(dst) => {
                let new_pc = state.new_const(dst);
                self.hooks.did_execute(&mut state, old_pc, &new_pc, insn)?;
                state.pc = dst;
                self.worklist.push(state);
            }
            Transfer::Branch {
                cond,
                taken,
                fallthrough,
            } => {
                let new_pc = cond.ite(&state.new_const(taken), &state.new_const(fallthrough));
                self.hooks.did_execute(&mut state, old_pc, &new_pc, insn)?;
                if let Some(mut child) = self.fork(&state) {
                    child.assert(cond.not());
                    child.pc = fallthrough;
                    self.worklist.push(child);
                }
                state.assert(cond);
                state.pc = taken;
                self.worklist.push(state);
            }
            Transfer::Indirect(target) => {
                self.hooks.did_execute(&mut state, old_pc, &target, insn)?;
                let values = state.solve_n(&target, self.limits.max_concretizations)?;
                let Some((&first, rest)) = values.split_first() else {
                    debug!("state {} has no feasible target at {:#x}", state.id, old_pc);
                    self.terminate(state);
                    return Ok(());
                };
                for &val in rest {
                    if let Some(mut child) = self.fork(&state) {
                        child.assert(target._eq(&child.new_const(val)));
                        child.pc = val;
                        self.worklist.push(child);
                    }
                }
                state.assert(target._eq(&state.new_const(first)));
                state.pc = first;
                self.worklist.push(state);
            }
        }
        Ok(())
    }
}

/// Instruction decoding and cross references of the loaded binary.
struct Analysis {
    api: RzApi,
    insts: Cache<u64, Instruction>,
}

impl Analysis {
    fn fetch(&self, pc: u64) -> Result<Instruction> {
        if let Some(inst) = self.insts.get(&pc) {
            return Ok(inst);
        }
        let inst = Instruction::from(&self.api.get_inst(pc)?);
        self.insts.insert(pc, inst.clone());
        Ok(inst)
    }
}

impl Resolver for Analysis {
    fn jump_targets(&self, insn: &Instruction) -> Result<Vec<u64>> {
        let mut targets: Vec<u64> = self
            .api
            .get_xrefs_from(insn.addr)?
            .iter()
            .filter(|x| x.is_code())
            .map(|x| x.to)
            .collect();
        targets.sort_unstable();
        targets.dedup();
        Ok(targets)
    }

    fn return_sites(&self, insn: &Instruction) -> Result<Vec<u64>> {
        let Some(func) = self.api.get_function_at(insn.addr)? else {
            return Ok(Vec::new());
        };
        let mut sites = Vec::new();
        for xref in self.api.get_xrefs_to(func.offset)? {
            if !xref.is_code() {
                continue;
            }
            let call = self.fetch(xref.from)?;
            if matches!(call.kind, InsnKind::Call | InsnKind::IndirectCall) {
                sites.push(call.next_addr());
            }
        }
        sites.sort_unstable();
        sites.dedup();
        Ok(sites)
    }
}

pub struct RzEngine<'ctx> {
    analysis: Analysis,
    explorer: Explorer<'ctx>,
}

impl<'ctx> RzEngine<'ctx> {
    /// Load `path` into rizin and create one state at its entry point.
    pub fn new(path: &str, z3: &'ctx z3::Context, limits: Limits) -> Result<Self> {
        let mut api = RzApi::new(path)?;
        api.analyze_all()?;
        api.set_cache(true);
        let entry = api
            .get_entrypoint()?
            .first()
            .map(|e| e.vaddr)
            .ok_or_else(|| SuccError::NoEntryPoint(path.to_owned()))?;
        info!(
            "loaded {} ({} {}-bit), entry {:#x}",
            path, api.info.bin.arch, api.info.bin.bits, entry
        );
        let mut explorer = Explorer::new(z3, limits);
        explorer.spawn(entry);
        Ok(RzEngine {
            analysis: Analysis {
                api,
                insts: Cache::new(INST_CACHE_SIZE),
            },
            explorer,
        })
    }
}

impl<'ctx> Engine for RzEngine<'ctx> {
    type State = RzState<'ctx>;

    fn add_hook(&mut self, addr: Option<u64>, plugin: Arc<dyn Plugin<RzState<'ctx>>>) {
        self.explorer.add_hook(addr, plugin)
    }

    fn run(&mut self) -> Result<()> {
        while let Some(state) = self.explorer.next_state() {
            let insn = self.analysis.fetch(state.pc)?;
            self.explorer.step(state, &insn, &self.analysis)?;
        }
        self.analysis.api.close();
        Ok(())
    }
}
