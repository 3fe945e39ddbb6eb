// SPDX-License-Identifier: 0BSD

use super::{InvalidRegister, Instr, MachineError, Operand, Program, Reg, State};

use std::error::Error;
use std::fmt::{self, Display};

impl Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Imm(value) => write!(f, "{value}"),
        }
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Snd(src) => write!(f, "snd {src}"),
            Instr::Rcv(dest) => write!(f, "rcv {dest}"),
            Instr::Set(dest, src) => write!(f, "set {dest} {src}"),
            Instr::Add(dest, src) => write!(f, "add {dest} {src}"),
            Instr::Mul(dest, src) => write!(f, "mul {dest} {src}"),
            Instr::Mod(dest, src) => write!(f, "mod {dest} {src}"),
            Instr::Sub(dest, src) => write!(f, "sub {dest} {src}"),
            Instr::Jgz(cond, offset) => write!(f, "jgz {cond} {offset}"),
            Instr::Jnz(cond, offset) => write!(f, "jnz {cond} {offset}"),
        }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instr in self.iter() {
            writeln!(f, "{instr}")?;
        }
        Ok(())
    }
}

impl Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Awaiting => write!(f, "awaiting a message"),
            State::Halted => write!(f, "halted"),
        }
    }
}

impl Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineError::ModuloByZero { pc } => {
                write!(f, "modulo by zero at instruction {pc}")
            }
            MachineError::StepLimit { limit } => {
                write!(f, "still running after {limit} steps")
            }
        }
    }
}

impl Error for MachineError {}

impl Display for InvalidRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} is not a valid register name", self.0)
    }
}

impl Error for InvalidRegister {}
