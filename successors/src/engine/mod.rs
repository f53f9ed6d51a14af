//! Boundary to the symbolic execution backend.
//!
//! Engines drive execution states and call back into registered plugins
//! once per retired instruction. Plugins never see engine internals, only
//! the `ExecState` handle of the state that triggered the callback.

pub mod rizin;
pub mod trace;

use crate::error::Result;
use std::sync::Arc;

pub type StateId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsnKind {
    Other,
    Jump,
    CondJump,
    Call,
    Return,
    IndirectJump,
    IndirectCall,
    Syscall,
    Trap,
    Invalid,
}

impl InsnKind {
    /// Classify rizin's analysis op type (`type` field of `aoj`).
    /// `jump` is the statically resolved target, if any.
    pub fn from_rizin(op_type: &str, jump: Option<u64>) -> Self {
        match op_type {
            "jmp" => InsnKind::Jump,
            "cjmp" | "rcjmp" | "ucjmp" | "mcjmp" => InsnKind::CondJump,
            "call" | "ccall" => InsnKind::Call,
            "ret" | "cret" => InsnKind::Return,
            "ujmp" | "rjmp" | "irjmp" | "mjmp" => match jump {
                Some(_) => InsnKind::Jump,
                None => InsnKind::IndirectJump,
            },
            "ucall" | "rcall" | "ircall" | "mcall" | "uccall" => match jump {
                Some(_) => InsnKind::Call,
                None => InsnKind::IndirectCall,
            },
            "swi" | "cswi" => InsnKind::Syscall,
            "trap" => InsnKind::Trap,
            "ill" | "invalid" | "unk" => InsnKind::Invalid,
            _ => InsnKind::Other,
        }
    }
}

/// A decoded instruction as seen by plugins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub addr: u64,
    pub size: u64,
    pub mnemonic: String,
    pub kind: InsnKind,
    pub jump: Option<u64>,
    pub fail: Option<u64>,
}

impl Instruction {
    pub fn new(addr: u64, size: u64, mnemonic: &str, kind: InsnKind) -> Self {
        Instruction {
            addr,
            size,
            mnemonic: mnemonic.to_owned(),
            kind,
            jump: None,
            fail: None,
        }
    }

    pub fn next_addr(&self) -> u64 {
        self.addr.wrapping_add(self.size)
    }
}

impl From<&rzapi::structs::Instruction> for Instruction {
    fn from(inst: &rzapi::structs::Instruction) -> Self {
        Instruction {
            addr: inst.addr,
            size: inst.size,
            mnemonic: inst.mnemonic.clone(),
            kind: InsnKind::from_rizin(&inst.inst_type, inst.jump),
            jump: inst.jump,
            fail: inst.fail,
        }
    }
}

/// A single execution state, as exposed to plugins.
pub trait ExecState {
    /// Representation of a possibly symbolic program counter.
    type Value;

    fn id(&self) -> StateId;

    fn pc(&self) -> u64;

    /// Up to `n` distinct concrete values `value` can take in this state.
    /// Blocks until the solver answers.
    fn solve_n(&self, value: &Self::Value, n: usize) -> Result<Vec<u64>>;

    /// Stop exploring this state. Irreversible.
    fn abandon(&mut self);

    fn is_abandoned(&self) -> bool;
}

pub trait Plugin<S: ExecState>: Send + Sync {
    /// Called before the instruction at `pc` is executed.
    fn will_execute_instruction(&self, _state: &mut S, _pc: u64, _insn: &Instruction) -> Result<()> {
        Ok(())
    }

    /// Called after `insn` retired; `new_pc` is the next program counter.
    fn did_execute_instruction(
        &self,
        _state: &mut S,
        _old_pc: u64,
        _new_pc: &S::Value,
        _insn: &Instruction,
    ) -> Result<()> {
        Ok(())
    }

    fn did_fork_state(&self, _parent: StateId, _child: StateId) {}

    fn did_terminate_state(&self, _state: StateId) {}
}

struct Hook<S: ExecState> {
    addr: Option<u64>,
    plugin: Arc<dyn Plugin<S>>,
}

/// Registered plugins, invoked in registration order.
pub struct Hooks<S: ExecState> {
    hooks: Vec<Hook<S>>,
}

impl<S: ExecState> Default for Hooks<S> {
    fn default() -> Self {
        Hooks { hooks: Vec::new() }
    }
}

impl<S: ExecState> Hooks<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `addr` restricts instruction callbacks to that pre-execution address.
    pub fn add(&mut self, addr: Option<u64>, plugin: Arc<dyn Plugin<S>>) {
        self.hooks.push(Hook { addr, plugin })
    }

    fn matching(&self, pc: u64) -> impl Iterator<Item = &Hook<S>> {
        self.hooks
            .iter()
            .filter(move |h| h.addr.map_or(true, |addr| addr == pc))
    }

    pub fn will_execute(&self, state: &mut S, insn: &Instruction) -> Result<()> {
        let pc = state.pc();
        for hook in self.matching(pc) {
            if state.is_abandoned() {
                break;
            }
            hook.plugin.will_execute_instruction(state, pc, insn)?;
        }
        Ok(())
    }

    pub fn did_execute(
        &self,
        state: &mut S,
        old_pc: u64,
        new_pc: &S::Value,
        insn: &Instruction,
    ) -> Result<()> {
        for hook in self.matching(old_pc) {
            hook.plugin
                .did_execute_instruction(state, old_pc, new_pc, insn)?;
        }
        Ok(())
    }

    pub fn did_fork(&self, parent: StateId, child: StateId) {
        for hook in &self.hooks {
            hook.plugin.did_fork_state(parent, child);
        }
    }

    pub fn did_terminate(&self, state: StateId) {
        for hook in &self.hooks {
            hook.plugin.did_terminate_state(state);
        }
    }
}

/// A symbolic execution backend.
pub trait Engine {
    type State: ExecState;

    fn add_hook(&mut self, addr: Option<u64>, plugin: Arc<dyn Plugin<Self::State>>);

    /// Run every state to completion or abandonment.
    fn run(&mut self) -> Result<()>;
}
