// SPDX-License-Identifier: 0BSD

//! Paired execution: two machines running the same program, exchanging
//! values through one-directional FIFO queues.
//!
//! The two instances are cooperatively scheduled from a single thread, one
//! step each per round. A machine whose `rcv` finds its queue empty simply
//! fails to make progress that turn and is retried on its next one; the kill
//! signal is raised only once its peer provably can never send again. The
//! queues are owned here and each one is written by exactly one machine and
//! read by exactly one machine, so no locking is involved — porting this to
//! real threads would mean replacing them with proper channels.

use std::collections::VecDeque;

use crate::{Exchange, Machine, MachineError, Program, Recv, State, StepOutcome};

/// One machine's port onto the shared queues for the duration of a step
struct Port<'a> {
    inbound: &'a mut VecDeque<i64>,
    outbound: &'a mut VecDeque<i64>,
    sent: &'a mut u64,
    peer_dead: bool,
}

impl Exchange for Port<'_> {
    fn send(&mut self, value: i64) {
        self.outbound.push_back(value);
        *self.sent += 1;
    }

    fn recv(&mut self) -> Recv {
        match self.inbound.pop_front() {
            Some(value) => Recv::Value(value),
            None => Recv::Empty {
                peer_dead: self.peer_dead,
            },
        }
    }
}

/// Why a [Pair::run] returned
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PairOutcome {
    /// Both machines stopped, normally or by kill signal
    AllStopped,
    /// The round ceiling was reached with a machine still runnable
    RoundLimit,
}

/// Observables from a paired run
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PairReport {
    /// Successful sends per instance, indexed by program id
    pub sends: [u64; 2],
    /// Scheduling rounds taken
    pub rounds: u64,
    /// Why the run returned
    pub outcome: PairOutcome,
}

/// Two machines (program ids 0 and 1) executing the same program in
/// lockstep, each sending into the other's inbound queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    machines: [Machine; 2],
    /// `queues[i]` holds values sent to instance `i`, oldest first
    queues: [VecDeque<i64>; 2],
    sends: [u64; 2],
    /// Whether an instance's most recent step stalled on a receive
    blocked: [bool; 2],
    rounds: u64,
}

impl Pair {
    /// Set up both instances at program counter 0, with register `p` seeded
    /// to 0 and 1 respectively.
    pub fn new(program: Program) -> Self {
        Self {
            machines: [
                Machine::new(program.clone(), 0),
                Machine::new(program, 1),
            ],
            queues: [VecDeque::new(), VecDeque::new()],
            sends: [0; 2],
            blocked: [false; 2],
            rounds: 0,
        }
    }

    /// Inspect one instance
    pub fn machine(&self, id: usize) -> &Machine {
        &self.machines[id]
    }

    /// Mutable access to one instance, e.g. to start a trace before running
    pub fn machine_mut(&mut self, id: usize) -> &mut Machine {
        &mut self.machines[id]
    }

    /// How many values instance `id` has successfully sent
    pub fn sends(&self, id: usize) -> u64 {
        self.sends[id]
    }

    /// An instance that is stalled on a receive, has nothing pending, and
    /// still has instructions left
    fn stuck(&self, id: usize) -> bool {
        self.blocked[id] && self.queues[id].is_empty() && self.machines[id].has_next()
    }

    /// True when no instance can ever make progress again: at least one is
    /// stuck on an empty queue, and its peer is either stuck too or already
    /// stopped.
    ///
    /// This is the explicit deadlock predicate; once it holds, the stuck
    /// instances are killed on their next turn.
    pub fn deadlocked(&self) -> bool {
        (self.stuck(0) || self.stuck(1))
            && (0..2).all(|id| self.stuck(id) || !self.machines[id].has_next())
    }

    /// The kill flag handed to instance `id`'s failed receive: its peer has
    /// stopped, or is itself stuck waiting with nothing in flight.
    fn peer_dead(&self, id: usize) -> bool {
        let peer = 1 - id;
        !self.machines[peer].has_next() || self.stuck(peer)
    }

    /// Advance one instance by a single step.
    pub fn step_instance(&mut self, id: usize) -> Result<StepOutcome, MachineError> {
        let peer_dead = self.peer_dead(id);
        let [q0, q1] = &mut self.queues;
        let (inbound, outbound) = if id == 0 { (q0, q1) } else { (q1, q0) };
        let mut port = Port {
            inbound,
            outbound,
            sent: &mut self.sends[id],
            peer_dead,
        };
        let outcome = self.machines[id].step(&mut port)?;
        self.blocked[id] = outcome == StepOutcome::Stopped(State::Awaiting);
        Ok(outcome)
    }

    /// Run round-robin (one step per instance per round) until both
    /// instances have stopped, or `round_limit` rounds have elapsed.
    ///
    /// The limit exists because a blocked pair whose kill conditions are
    /// never satisfied would otherwise spin forever re-attempting receives.
    pub fn run(&mut self, round_limit: u64) -> Result<PairReport, MachineError> {
        while self.machines.iter().any(Machine::has_next) {
            if self.rounds == round_limit {
                return Ok(self.report(PairOutcome::RoundLimit));
            }
            self.rounds += 1;
            self.step_instance(0)?;
            self.step_instance(1)?;
        }
        Ok(self.report(PairOutcome::AllStopped))
    }

    fn report(&self, outcome: PairOutcome) -> PairReport {
        PairReport {
            sends: self.sends,
            rounds: self.rounds,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Program;

    /// The Day 18 part 2 example: each instance sends 1, 2, and its own id,
    /// then receives what the other sent, in send order.
    #[test]
    fn example_exchange() {
        let program = Program::load("snd 1\nsnd 2\nsnd p\nrcv a\nrcv b\nrcv c");
        let mut pair = Pair::new(program);
        let report = pair.run(1_000).unwrap();

        assert_eq!(report.outcome, PairOutcome::AllStopped);
        assert_eq!(report.sends, [3, 3]);
        // instance 0 got instance 1's sends, ending with its peer's id
        assert_eq!(pair.machine(0).register("a"), Some(1));
        assert_eq!(pair.machine(0).register("b"), Some(2));
        assert_eq!(pair.machine(0).register("c"), Some(1));
        // and vice versa
        assert_eq!(pair.machine(1).register("a"), Some(1));
        assert_eq!(pair.machine(1).register("b"), Some(2));
        assert_eq!(pair.machine(1).register("c"), Some(0));
        // both ran off the end; nobody was killed
        assert!(!pair.machine(0).was_killed());
        assert!(!pair.machine(1).was_killed());
    }

    /// With a trailing unsatisfiable receive, the exchange completes and
    /// then both instances are killed instead of stalling forever.
    #[test]
    fn trailing_receive_deadlocks_and_kills() {
        let program = Program::load("snd 1\nsnd 2\nsnd p\nrcv a\nrcv b\nrcv c\nrcv d");
        let mut pair = Pair::new(program);
        let report = pair.run(1_000).unwrap();

        assert_eq!(report.outcome, PairOutcome::AllStopped);
        assert_eq!(report.sends, [3, 3]);
        assert!(pair.machine(0).was_killed());
        assert!(pair.machine(1).was_killed());
        assert_eq!(pair.machine(0).register("d"), None);
    }

    /// A peer that halts normally propagates the kill flag to a blocked
    /// receiver.
    #[test]
    fn kill_flag_propagation() {
        // instance 0 sends one value then blocks; instance 1 jumps straight
        // to the receive, consumes it, and halts
        let program = Program::load("jgz p 2\nsnd 9\nrcv a");
        let mut pair = Pair::new(program);
        let report = pair.run(100).unwrap();

        assert_eq!(report.outcome, PairOutcome::AllStopped);
        assert_eq!(report.sends, [1, 0]);
        assert_eq!(pair.machine(1).register("a"), Some(9));
        assert!(pair.machine(0).was_killed());
        assert!(!pair.machine(1).was_killed());
    }

    /// The deadlock predicate becomes observable between the stall and the
    /// kill.
    #[test]
    fn deadlock_predicate() {
        let mut pair = Pair::new(Program::load("rcv a"));
        assert!(!pair.deadlocked());

        // instance 0 stalls; instance 1 has not yet demonstrated blockage
        pair.step_instance(0).unwrap();
        assert!(!pair.deadlocked());

        // instance 1's receive sees a stuck peer and is killed immediately
        pair.step_instance(1).unwrap();
        assert!(pair.deadlocked());
        assert!(pair.machine(1).was_killed());

        // instance 0's next turn sees a dead peer and is killed too
        pair.step_instance(0).unwrap();
        assert!(pair.machine(0).was_killed());
        assert!(!pair.machine(0).has_next());
        assert!(!pair.machine(1).has_next());
    }

    /// A pair that can never satisfy the kill conditions is caught by the
    /// round ceiling rather than looping forever.
    #[test]
    fn round_limit_stops_livelock() {
        // both instances send forever and never receive, so neither ever
        // stalls and neither ever stops
        let program = Program::load("snd 1\njnz 1 -1");
        let mut pair = Pair::new(program);
        let report = pair.run(50).unwrap();
        assert_eq!(report.outcome, PairOutcome::RoundLimit);
        assert_eq!(report.rounds, 50);
    }
}
