// SPDX-License-Identifier: 0BSD
#![warn(missing_docs)]

//! Library providing an interpreter for the Duet register machine
//!
//! The machine executes a small assembly-like instruction set against named
//! integer registers, one instruction per line of source text. It appears in
//! two Advent of Code 2017 puzzles: [Day 18], where two copies of the same
//! program exchange values through queues until they deadlock, and [Day 23],
//! which reuses the arithmetic and jump instructions standalone.
//!
//! # Example
//!
//! ```rust
//! use duet::prelude::*;
//!
//! let program = Program::load("set a 5\nset b a\nadd b 3");
//! let mut machine = Machine::new(program, 0);
//!
//! assert_eq!(machine.run(&mut Mailbox::new()), Ok(State::Halted));
//! assert_eq!(machine.register("b"), Some(8));
//! ```
//!
//! Paired execution lives in the [pair] module:
//!
//! ```rust
//! use duet::pair::Pair;
//! use duet::prelude::*;
//!
//! let program = Program::load("snd 1\nsnd 2\nsnd p\nrcv a\nrcv b\nrcv c");
//! let mut pair = Pair::new(program);
//!
//! let report = pair.run(1_000).unwrap();
//! assert_eq!(report.sends, [3, 3]);
//! ```
//!
//! [Day 18]: https://adventofcode.com/2017/day/18
//! [Day 23]: https://adventofcode.com/2017/day/23

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::Arc;

mod fmt_impls;
pub mod pair;
pub mod parser;
pub mod trace;

use trace::Trace;

/// A small module that re-exports items needed when working with the machine
pub mod prelude {
    pub use crate::{Exchange, Machine, Mailbox, Program, Recv, Soundboard, State, StepOutcome};
}

/// A validated register name: one or more ASCII lowercase letters.
///
/// Cheap to clone; the interpreter clones it whenever a register is first
/// touched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(Box<str>);

impl Reg {
    /// The register's name as it appears in source text
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Reg {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The error returned when parsing a [Reg] from a string that is not a run of
/// ASCII lowercase letters
#[derive(Debug, PartialEq)]
pub struct InvalidRegister(Box<str>);

impl FromStr for Reg {
    type Err = InvalidRegister;
    fn from_str(s: &str) -> Result<Self, InvalidRegister> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase()) {
            Ok(Self(Box::from(s)))
        } else {
            Err(InvalidRegister(Box::from(s)))
        }
    }
}

/// One operand of an instruction, resolved at execution time
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A register name, resolved against the executing machine's registers
    Reg(Reg),
    /// A signed decimal literal
    Imm(i64),
}

/// A single instruction, tagged by its original wire mnemonic
///
/// The set is closed: unknown mnemonics are rejected at the parse boundary
/// and never reach the interpreter.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// `snd x` — send the value of `x` through the machine's port
    Snd(Operand),
    /// `rcv d` — receive the next pending value into `d`, stalling if none is
    /// available yet
    Rcv(Reg),
    /// `set d x` — store the value of `x` into `d`
    Set(Reg, Operand),
    /// `add d x` — add the value of `x` to `d`
    Add(Reg, Operand),
    /// `mul d x` — multiply `d` by the value of `x`
    Mul(Reg, Operand),
    /// `mod d x` — reduce `d` modulo the value of `x`
    Mod(Reg, Operand),
    /// `sub d x` — subtract the value of `x` from `d`
    Sub(Reg, Operand),
    /// `jgz c o` — jump `o` instructions relative to here if `c` is positive
    Jgz(Operand, Operand),
    /// `jnz c o` — jump `o` instructions relative to here if `c` is nonzero
    Jnz(Operand, Operand),
}

/// An immutable, cheaply clonable instruction list
///
/// Both machines of a [pair::Pair] hold handles to the same allocation. The
/// [Display](std::fmt::Display) impl re-serializes the program to its wire
/// form, one instruction per line.
#[derive(Debug, Clone, PartialEq)]
pub struct Program(Arc<[Instr]>);

impl Program {
    /// Parse source text, silently skipping lines that are not valid
    /// instructions.
    ///
    /// This is the loading behavior the puzzles rely on; use [Program::parse]
    /// to surface the errors instead.
    pub fn load(src: &str) -> Self {
        parser::load_program(src)
    }

    /// Parse source text strictly, collecting an error for every malformed
    /// line.
    pub fn parse(src: &str) -> Result<Self, Vec<chumsky::error::Rich<'_, char>>> {
        parser::parse_program(src)
    }

    /// The number of instructions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the program contains no instructions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The instruction a program counter points at, if it is in range
    pub fn get(&self, pc: i64) -> Option<&Instr> {
        usize::try_from(pc).ok().and_then(|i| self.0.get(i))
    }

    /// Iterate over the instructions in order
    pub fn iter(&self) -> impl Iterator<Item = &Instr> {
        self.0.iter()
    }
}

impl FromIterator<Instr> for Program {
    fn from_iter<I: IntoIterator<Item = Instr>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A register bank owned by exactly one machine
///
/// Registers spring into existence holding 0 the first time they are read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registers(HashMap<Reg, i64>);

impl Registers {
    fn seeded(program_id: i64) -> Self {
        let mut regs = Self::default();
        regs.0.insert(Reg(Box::from("p")), program_id);
        regs
    }

    /// Read a register, creating it with value 0 if it has never been touched
    pub fn get(&mut self, reg: &Reg) -> i64 {
        if let Some(&value) = self.0.get(reg) {
            value
        } else {
            self.0.insert(reg.clone(), 0);
            0
        }
    }

    /// Write a register
    pub fn set(&mut self, reg: &Reg, value: i64) {
        self.0.insert(reg.clone(), value);
    }

    /// Non-creating read by name, for inspection after a run
    pub fn peek(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }

    /// Iterate over every register the program has touched
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(reg, &value)| (reg.name(), value))
    }
}

/// The state of a machine whenever it has stopped making progress.
///
/// [Awaiting](State::Awaiting) means the current instruction is a `rcv` with
/// no value available; the program counter has not moved and the same
/// instruction is retried on the next step.
///
/// [Halted](State::Halted) means the program counter has left the valid
/// instruction range, either by running off the end or because a kill signal
/// forced it there (distinguishable via [Machine::was_killed]).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    /// Execution is stalled on an unsatisfied receive
    Awaiting,
    /// Execution has ended
    Halted,
}

/// The result of a single [Machine::step]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StepOutcome {
    /// The instruction took effect and there is more to execute
    Running,
    /// The machine stopped; see the contained [State] for why
    Stopped(State),
}

/// The result of one receive attempt against an [Exchange]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Recv {
    /// The oldest pending value
    Value(i64),
    /// Nothing is pending
    Empty {
        /// True when the producing side can never send again. A machine that
        /// sees this kills itself rather than stalling forever.
        peer_dead: bool,
    },
}

/// A machine's view of the outside world: somewhere to send values and
/// somewhere to receive them from.
///
/// Values must come back out of an implementation in the order they went in.
pub trait Exchange {
    /// Accept a value emitted by a `snd` instruction
    fn send(&mut self, value: i64);
    /// Attempt to satisfy a `rcv` instruction
    fn recv(&mut self) -> Recv;
}

/// An [Exchange] backed by a scripted input queue, collecting everything the
/// machine sends.
///
/// A machine run against an empty mailbox stalls (rather than dying) at its
/// first `rcv`, and can be resumed after pushing more input.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Mailbox {
    /// Values waiting to be received, oldest first
    pub inbox: VecDeque<i64>,
    /// Every value the machine has sent, in send order
    pub outbox: Vec<i64>,
}

impl Mailbox {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mailbox pre-loaded with input values
    pub fn with_inputs(inputs: impl IntoIterator<Item = i64>) -> Self {
        Self {
            inbox: inputs.into_iter().collect(),
            outbox: Vec::new(),
        }
    }
}

impl Exchange for Mailbox {
    fn send(&mut self, value: i64) {
        self.outbox.push(value);
    }

    fn recv(&mut self) -> Recv {
        match self.inbox.pop_front() {
            Some(value) => Recv::Value(value),
            None => Recv::Empty { peer_dead: false },
        }
    }
}

/// An [Exchange] with Day 18 part 1 semantics: `snd` plays a sound and the
/// first `rcv` recovers the last sound played, ending the run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Soundboard {
    last_played: Option<i64>,
    recovered: Option<i64>,
}

impl Soundboard {
    /// Create a soundboard that has played nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently played value
    pub fn last_played(&self) -> Option<i64> {
        self.last_played
    }

    /// The value recovered by the first `rcv`, if one has run
    pub fn recovered(&self) -> Option<i64> {
        self.recovered
    }
}

impl Exchange for Soundboard {
    fn send(&mut self, value: i64) {
        self.last_played = Some(value);
    }

    fn recv(&mut self) -> Recv {
        if self.recovered.is_none() {
            self.recovered = self.last_played;
        }
        Recv::Empty { peer_dead: true }
    }
}

/// An error that stops execution
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MachineError {
    /// A `mod` instruction resolved a zero divisor
    ModuloByZero {
        /// The program counter at the offending instruction
        pc: i64,
    },
    /// [Machine::run_bounded] exhausted its step budget without stopping
    StepLimit {
        /// The budget that was exhausted
        limit: u64,
    },
}

/// One instance of the register machine, with optional tracing of executed
/// instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    pc: i64,
    regs: Registers,
    program: Program,
    killed: bool,
    trace: Option<Trace>,
}

impl Machine {
    /// Create a machine at program counter 0 with register `p` seeded to
    /// `program_id` and every other register untouched.
    pub fn new(program: Program, program_id: i64) -> Self {
        Self {
            pc: 0,
            regs: Registers::seeded(program_id),
            program,
            killed: false,
            trace: None,
        }
    }

    /// Whether the program counter points at an instruction left to execute
    pub fn has_next(&self) -> bool {
        self.program.get(self.pc).is_some()
    }

    /// The current program counter
    pub fn pc(&self) -> i64 {
        self.pc
    }

    /// Whether this machine was terminated by a kill signal rather than by
    /// running off the end of its program
    pub fn was_killed(&self) -> bool {
        self.killed
    }

    /// The machine's register bank
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Read a single register by name without creating it
    pub fn register(&self, name: &str) -> Option<i64> {
        self.regs.peek(name)
    }

    /// The program this machine executes
    pub fn program(&self) -> &Program {
        &self.program
    }

    fn value_of(&mut self, op: &Operand) -> i64 {
        match op {
            Operand::Imm(value) => *value,
            Operand::Reg(reg) => self.regs.get(reg),
        }
    }

    /// common logic of the read-modify-write arithmetic instructions
    fn arith(&mut self, dest: &Reg, src: &Operand, op: impl Fn(i64, i64) -> i64) -> i64 {
        let result = op(self.regs.get(dest), self.value_of(src));
        self.regs.set(dest, result);
        self.pc += 1;
        result
    }

    fn jump(&mut self, cond: &Operand, offset: &Operand, taken: impl Fn(i64) -> bool) {
        let cond = self.value_of(cond);
        let offset = self.value_of(offset);
        if taken(cond) {
            self.pc += offset;
        } else {
            self.pc += 1;
        }
    }

    /// Force the program counter to the end-of-program sentinel, recording
    /// that the stop was a kill rather than normal termination.
    fn kill(&mut self) {
        self.killed = true;
        self.pc = i64::try_from(self.program.len()).unwrap_or(i64::MAX);
    }

    /// Execute a single instruction against `port`.
    ///
    /// A `rcv` that cannot be satisfied leaves the program counter in place
    /// and reports `Stopped(State::Awaiting)`; re-invoking
    /// [step](Machine::step) retries it. A `rcv` whose producer is
    /// permanently dead kills the machine instead.
    pub fn step(&mut self, port: &mut impl Exchange) -> Result<StepOutcome, MachineError> {
        let program = self.program.clone();
        let Some(instr) = program.get(self.pc) else {
            return Ok(StepOutcome::Stopped(State::Halted));
        };
        let pc = self.pc;
        let stored;
        match instr {
            Instr::Snd(src) => {
                let value = self.value_of(src);
                port.send(value);
                stored = Some(value);
                self.pc += 1;
            }
            Instr::Rcv(dest) => match port.recv() {
                Recv::Value(value) => {
                    self.regs.set(dest, value);
                    stored = Some(value);
                    self.pc += 1;
                }
                Recv::Empty { peer_dead: false } => {
                    return Ok(StepOutcome::Stopped(State::Awaiting));
                }
                Recv::Empty { peer_dead: true } => {
                    self.kill();
                    return Ok(StepOutcome::Stopped(State::Halted));
                }
            },
            Instr::Set(dest, src) => {
                let value = self.value_of(src);
                self.regs.set(dest, value);
                stored = Some(value);
                self.pc += 1;
            }
            Instr::Add(dest, src) => stored = Some(self.arith(dest, src, |a, b| a + b)),
            Instr::Mul(dest, src) => stored = Some(self.arith(dest, src, |a, b| a * b)),
            Instr::Sub(dest, src) => stored = Some(self.arith(dest, src, |a, b| a - b)),
            Instr::Mod(dest, src) => {
                if self.value_of(src) == 0 {
                    return Err(MachineError::ModuloByZero { pc });
                }
                stored = Some(self.arith(dest, src, |a, b| a % b));
            }
            Instr::Jgz(cond, offset) => {
                self.jump(cond, offset, |v| v > 0);
                stored = None;
            }
            Instr::Jnz(cond, offset) => {
                self.jump(cond, offset, |v| v != 0);
                stored = None;
            }
        }
        if let Some(trace) = &mut self.trace {
            trace.push(pc, instr.clone(), stored);
        }
        if self.has_next() {
            Ok(StepOutcome::Running)
        } else {
            Ok(StepOutcome::Stopped(State::Halted))
        }
    }

    /// Execute until the machine halts or stalls on a receive.
    ///
    /// There is no step ceiling; a looping program loops here too. Use
    /// [Machine::run_bounded] when termination is not known in advance.
    pub fn run(&mut self, port: &mut impl Exchange) -> Result<State, MachineError> {
        loop {
            if let StepOutcome::Stopped(state) = self.step(port)? {
                return Ok(state);
            }
        }
    }

    /// Execute at most `limit` steps, failing with
    /// [MachineError::StepLimit] if the machine is still running afterwards.
    pub fn run_bounded(
        &mut self,
        port: &mut impl Exchange,
        limit: u64,
    ) -> Result<State, MachineError> {
        for _ in 0..limit {
            if let StepOutcome::Stopped(state) = self.step(port)? {
                return Ok(state);
            }
        }
        Err(MachineError::StepLimit { limit })
    }
}
