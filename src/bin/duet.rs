// SPDX-License-Identifier: 0BSD

//! Command-line driver for the Duet register machine: run a program
//! standalone against a soundboard, run it as a message-passing pair, or
//! just parse it and echo it back in canonical form.

use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use chumsky::error::{Rich, RichPattern};
use clap::{Parser, Subcommand};
use duet::pair::{Pair, PairOutcome};
use duet::prelude::*;
use itertools::Itertools;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const VERSION: &str = concat!(env!("CARGO_CRATE_NAME"), '-', env!("CARGO_PKG_VERSION"));

const DEFAULT_LIMIT: u64 = 10_000_000;

#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = VERSION)]
#[command(about = "Duet register machine", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one program against a soundboard and report what it recovered
    Solo {
        #[arg(help = "The program to run")]
        source: PathBuf,
        #[arg(short, long, default_value_t = 0)]
        #[arg(help = "Value seeded into register p")]
        program_id: i64,
        #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
        #[arg(help = "Maximum number of steps before giving up")]
        limit: u64,
        #[arg(long)]
        #[arg(help = "Silently skip lines that fail to parse")]
        skip_bad_lines: bool,
    },
    /// Run two instances exchanging messages until both stop
    Paired {
        #[arg(help = "The program to run")]
        source: PathBuf,
        #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
        #[arg(help = "Maximum number of scheduling rounds before giving up")]
        limit: u64,
        #[arg(long)]
        #[arg(help = "Silently skip lines that fail to parse")]
        skip_bad_lines: bool,
    },
    /// Parse a program strictly and echo it back in canonical form
    Check {
        #[arg(help = "The program to check")]
        source: PathBuf,
    },
}

fn report_parse_err(err: Rich<'_, char>, file: &str, source: &str) {
    use std::fmt::Write;

    let mut builder = Report::build(ReportKind::Error, (file, err.span().into_range()))
        .with_message(format!("Failed to parse {}", file.fg(Color::Red)));

    if let Some(found) = err.found() {
        builder = builder.with_label(
            Label::new((file, err.span().into_range()))
                .with_message(format!(
                    "Found token '{}'",
                    found.escape_default().fg(Color::Cyan)
                ))
                .with_color(Color::Yellow),
        );
    }

    let mut expected: Vec<_> = err.expected().collect();
    // no need to explicitly mention whitespace
    expected.retain(|pat| !matches!(pat, RichPattern::Label(s) if *s == "inline whitespace"));

    match &expected[..] {
        [] => (),
        [pat] => {
            builder = builder.with_note(format!("Expected \"{}\"", pat.fg(Color::Blue)));
        }
        pats => {
            let mut note = String::from("Expected one of the following:\n");
            for pat in pats {
                writeln!(&mut note, "- {}", pat.fg(Color::Blue)).expect("can write to &mut String");
            }
            builder = builder.with_note(note);
        }
    }

    builder
        .finish()
        .eprint((file, Source::from(source)))
        .expect("failed to print to stderr");
}

fn load(path: &Path, skip_bad_lines: bool) -> Result<Program, ExitCode> {
    let file = path.to_string_lossy();
    let src = match read_to_string(path) {
        Ok(src) => src,
        Err(e) => {
            eprintln!("Failed to read {file}: {e}");
            return Err(ExitCode::FAILURE);
        }
    };
    if skip_bad_lines {
        return Ok(Program::load(&src));
    }
    match Program::parse(&src) {
        Ok(program) => Ok(program),
        Err(errs) => {
            for err in errs {
                report_parse_err(err, &file, &src);
            }
            Err(ExitCode::FAILURE)
        }
    }
}

fn solo(path: &Path, program_id: i64, limit: u64, skip_bad_lines: bool) -> ExitCode {
    let program = match load(path, skip_bad_lines) {
        Ok(program) => program,
        Err(code) => return code,
    };
    let mut machine = Machine::new(program, program_id);
    let mut soundboard = Soundboard::new();
    match machine.run_bounded(&mut soundboard, limit) {
        Ok(state) => {
            if let Some(freq) = soundboard.recovered() {
                println!("recovered: {freq}");
            }
            println!("stopped {state} after reaching instruction {}", machine.pc());
            println!("final registers:");
            for (name, value) in machine.registers().iter().sorted() {
                println!("  {name} = {value}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn paired(path: &Path, limit: u64, skip_bad_lines: bool) -> ExitCode {
    let program = match load(path, skip_bad_lines) {
        Ok(program) => program,
        Err(code) => return code,
    };
    let mut pair = Pair::new(program);
    match pair.run(limit) {
        Ok(report) => {
            for (id, sends) in report.sends.iter().enumerate() {
                println!("program {id} sent {sends} messages");
            }
            println!("{} scheduling rounds", report.rounds);
            if report.outcome == PairOutcome::RoundLimit {
                eprintln!("gave up after {limit} rounds without both programs stopping");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn check(path: &Path) -> ExitCode {
    match load(path, false) {
        Ok(program) => {
            print!("{program}");
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match args.command {
        Command::Solo {
            source,
            program_id,
            limit,
            skip_bad_lines,
        } => solo(&source, program_id, limit, skip_bad_lines),
        Command::Paired {
            source,
            limit,
            skip_bad_lines,
        } => paired(&source, limit, skip_bad_lines),
        Command::Check { source } => check(&source),
    }
}
