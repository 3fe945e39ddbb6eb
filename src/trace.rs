// SPDX-License-Identifier: 0BSD

//! An in-memory log of executed instructions
//!
//! Tracing is how per-instruction observations are made without hooks in the
//! interpreter core; counting how many times a program multiplied, for
//! instance, is a query over its trace.

use std::fmt::{self, Display};

use crate::{Instr, Machine};

/// One executed instruction, recorded as it took effect
///
/// Stalled receives are not recorded; a step only enters the trace when its
/// effect was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedStep {
    pc: i64,
    instr: Instr,
    stored: Option<i64>,
}

impl TracedStep {
    /// The program counter the instruction was executed at
    pub fn pc(&self) -> i64 {
        self.pc
    }

    /// The instruction that was executed
    pub fn instr(&self) -> &Instr {
        &self.instr
    }

    /// The value the instruction stored or emitted, if any (jumps store
    /// nothing)
    pub fn stored_val(&self) -> Option<i64> {
        self.stored
    }
}

/// A log of instructions a [Machine] has executed since a call to
/// [Machine::start_trace]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Trace(pub Vec<TracedStep>);

impl Trace {
    pub(crate) fn new() -> Self {
        Self(Vec::new())
    }

    pub(crate) fn push(&mut self, pc: i64, instr: Instr, stored: Option<i64>) {
        self.0.push(TracedStep { pc, instr, stored });
    }
}

impl Machine {
    /// Begin tracing executed instructions. If a trace was already running,
    /// it is replaced and returned.
    pub fn start_trace(&mut self) -> Option<Trace> {
        self.trace.replace(Trace::new())
    }

    /// Stop tracing and take the trace. Returns [`None`] if no trace was
    /// active.
    pub fn end_trace(&mut self) -> Option<Trace> {
        self.trace.take()
    }

    /// Get a view of the current trace
    pub fn show_trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }
}

impl Display for TracedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ran instruction at {:0>4}: [{}]", self.pc, self.instr)?;
        if let Some(value) = self.stored {
            write!(f, " (stored {value})")?;
        }
        Ok(())
    }
}

impl Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.0 {
            writeln!(f, "{step}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn trace_records_effects() {
        let mut m = Machine::new(Program::load("set a 2\nmul a a\njnz a 1"), 0);
        m.start_trace();
        m.run(&mut Mailbox::new()).unwrap();
        let Trace(steps) = m.end_trace().unwrap();

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].pc(), 0);
        assert_eq!(steps[0].stored_val(), Some(2));
        assert_eq!(steps[1].stored_val(), Some(4));
        // jumps store nothing
        assert_eq!(steps[2].stored_val(), None);
        assert_eq!(steps[0].to_string(), "ran instruction at 0000: [set a 2] (stored 2)");
    }

    #[test]
    fn stalled_receive_not_traced() {
        let mut m = Machine::new(Program::load("rcv a"), 0);
        m.start_trace();
        assert_eq!(m.run(&mut Mailbox::new()), Ok(State::Awaiting));
        assert!(m.show_trace().unwrap().0.is_empty());
    }
}
