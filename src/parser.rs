// SPDX-License-Identifier: 0BSD

//! Parsers for the wire format: one instruction per line, mnemonic followed
//! by whitespace-separated operands.
//!
//! [load_program] implements the loading behavior the puzzles rely on, where
//! a malformed line is silently skipped. [parse_program] parses the same
//! grammar strictly, producing [Rich] errors suitable for rendering as
//! diagnostics.

use chumsky::prelude::*;

use crate::{Instr, Operand, Program, Reg};

type RichErr<'a> = chumsky::extra::Err<Rich<'a, char>>;

macro_rules! padded {
    ($inner: expr) => {{ $inner.padded_by(text::inline_whitespace()) }};
}

macro_rules! with_sep {
    ($inner: expr) => {{ $inner.then_ignore(text::inline_whitespace().at_least(1)) }};
}

fn register<'a>() -> impl Parser<'a, &'a str, Reg, RichErr<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_lowercase())
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| Reg(Box::from(s)))
        .labelled("register name")
}

fn integer<'a>() -> impl Parser<'a, &'a str, i64, RichErr<'a>> + Clone {
    just('-')
        .or_not()
        .then(text::int(10))
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<i64>()
                .map_err(|e| Rich::custom(span, format!("error parsing {s} as i64: {e}")))
        })
        .labelled("integer literal")
}

fn operand<'a>() -> impl Parser<'a, &'a str, Operand, RichErr<'a>> + Clone {
    choice((
        integer().map(Operand::Imm),
        register().map(Operand::Reg),
    ))
    .labelled("operand")
}

fn instr<'a>() -> impl Parser<'a, &'a str, Instr, RichErr<'a>> {
    /// An instruction writing into a register: `<name> <reg> <operand>`
    macro_rules! write_op {
        ($name: literal, $variant: ident) => {
            with_sep!(just($name))
                .ignore_then(with_sep!(register()))
                .then(operand())
                .map(|(dest, src)| Instr::$variant(dest, src))
                .labelled($name)
        };
    }
    /// A conditional jump: `<name> <operand> <operand>`
    macro_rules! jump_op {
        ($name: literal, $variant: ident) => {
            with_sep!(just($name))
                .ignore_then(with_sep!(operand()))
                .then(operand())
                .map(|(cond, offset)| Instr::$variant(cond, offset))
                .labelled($name)
        };
    }

    padded!(choice((
        with_sep!(just("snd"))
            .ignore_then(operand())
            .map(Instr::Snd)
            .labelled("snd"),
        with_sep!(just("rcv"))
            .ignore_then(register())
            .map(Instr::Rcv)
            .labelled("rcv"),
        write_op!("set", Set),
        write_op!("add", Add),
        write_op!("mul", Mul),
        write_op!("mod", Mod),
        write_op!("sub", Sub),
        jump_op!("jgz", Jgz),
        jump_op!("jnz", Jnz),
    )))
    .labelled("instruction")
    .as_context()
}

fn line<'a>() -> impl Parser<'a, &'a str, Option<Instr>, RichErr<'a>> {
    padded!(instr().or_not()).labelled("line")
}

fn grammar<'a>() -> impl Parser<'a, &'a str, Vec<Option<Instr>>, RichErr<'a>> {
    line()
        .separated_by(just('\n').labelled("newline"))
        .collect()
}

/// Parse source text, dropping every line that is not a valid instruction
/// (including blank lines).
pub fn load_program(src: &str) -> Program {
    let line = line();
    src.lines()
        .filter_map(|l| line.parse(l).into_result().ok().flatten())
        .collect()
}

/// Parse source text strictly, collecting an error for every malformed line.
/// Blank lines are still permitted.
pub fn parse_program(src: &str) -> Result<Program, Vec<Rich<'_, char>>> {
    grammar()
        .parse(src)
        .into_result()
        .map(|lines| lines.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(name: &str) -> Reg {
        name.parse().unwrap()
    }

    fn imm(value: i64) -> Operand {
        Operand::Imm(value)
    }

    fn reg_op(name: &str) -> Operand {
        Operand::Reg(reg(name))
    }

    #[test]
    fn parse_each_mnemonic() {
        macro_rules! parse {
            ($text: literal) => {
                instr().parse($text).unwrap()
            };
        }
        assert_eq!(parse!("snd a"), Instr::Snd(reg_op("a")));
        assert_eq!(parse!("snd 1"), Instr::Snd(imm(1)));
        assert_eq!(parse!("rcv ab"), Instr::Rcv(reg("ab")));
        assert_eq!(parse!("set a 5"), Instr::Set(reg("a"), imm(5)));
        assert_eq!(parse!("add b a"), Instr::Add(reg("b"), reg_op("a")));
        assert_eq!(parse!("mul q q"), Instr::Mul(reg("q"), reg_op("q")));
        assert_eq!(parse!("mod a 5"), Instr::Mod(reg("a"), imm(5)));
        assert_eq!(parse!("sub x -17"), Instr::Sub(reg("x"), imm(-17)));
        assert_eq!(parse!("jgz p -2"), Instr::Jgz(reg_op("p"), imm(-2)));
        assert_eq!(parse!("jnz 1 3"), Instr::Jnz(imm(1), imm(3)));
    }

    #[test]
    fn extra_whitespace_tolerated() {
        assert_eq!(
            instr().parse("  set   a   5 ").unwrap(),
            Instr::Set(reg("a"), imm(5))
        );
    }

    #[test]
    fn malformed_lines_skipped_on_load() {
        let program = Program::load("set a 5\n\nbogus x y\nset a\nrcv 5\nadd a 1\n");
        let parsed: Vec<_> = program.iter().cloned().collect();
        assert_eq!(
            parsed,
            vec![
                Instr::Set(reg("a"), imm(5)),
                Instr::Add(reg("a"), imm(1)),
            ]
        );
    }

    #[test]
    fn strict_parse_reports_malformed_lines() {
        assert!(Program::parse("set a 5\nbogus x y").is_err());
        // arity mismatch is a parse error too
        assert!(Program::parse("snd a b").is_err());
        assert!(Program::parse("set a").is_err());
    }

    #[test]
    fn strict_parse_permits_blank_lines() {
        let program = Program::parse("snd 1\n\nsnd 2\n").unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn uppercase_is_not_a_register() {
        assert!(Program::parse("set A 5").is_err());
        assert!("A".parse::<Reg>().is_err());
        assert!("".parse::<Reg>().is_err());
        assert_eq!(reg("abc").name(), "abc");
    }

    /// parsing then re-serializing reproduces the original token sequence
    #[test]
    fn round_trip() {
        const SRC: &str = "snd 1\nsnd 2\nsnd p\nrcv a\nrcv b\nrcv c\nset i 31\nadd i -1\nmul p 17\nmod i 8\nsub x 2\njgz p -2\njnz i 3\n";
        assert_eq!(Program::load(SRC).to_string(), SRC);
    }
}
