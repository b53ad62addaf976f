//! The host boundary (spec §6): the scheduler calls into an [`IoHost`]
//! exactly once per quantum when every thread is blocked, handing it
//! the current port table to read from and write into.

use fble_value::ValueId;
use std::collections::VecDeque;

/// One external port's current value, read or written by the host
/// between scheduler turns. Mirrors a link's single-slot external
/// ownership (spec §4.F: "a port is treated as a link with single-slot
/// external ownership").
#[derive(Clone, Copy, Debug, Default)]
pub struct PortSlot {
    pub value: Option<ValueId>,
}

/// The driver a running program talks to the outside world through.
/// `io` is given the full port table and whether the scheduler is
/// willing to block waiting for input (`block == true` only when every
/// thread is already blocked and there is nothing else left to run);
/// it returns whether it changed anything, so the scheduler knows
/// whether to re-scan for newly-runnable threads or declare a
/// deadlock.
pub trait IoHost {
    fn io(&mut self, ports: &mut [PortSlot], block: bool) -> bool;
}

/// A host with no external ports (spec §6's `mem-test`/`check`
/// drivers): never produces input, so a program that blocks on a port
/// under this host deadlocks immediately rather than waiting forever.
pub struct NullIoHost;

impl IoHost for NullIoHost {
    fn io(&mut self, _ports: &mut [PortSlot], _block: bool) -> bool {
        false
    }
}

/// A deterministic host for tests and `fble-cli`'s `run` driver: each
/// port has its own input queue and output log, fed/drained by the
/// embedder rather than by any real OS channel.
#[derive(Default)]
pub struct ChannelIoHost {
    inputs: Vec<VecDeque<ValueId>>,
    outputs: Vec<Vec<ValueId>>,
}

impl ChannelIoHost {
    pub fn new(portc: usize) -> Self {
        ChannelIoHost { inputs: vec![VecDeque::new(); portc], outputs: vec![Vec::new(); portc] }
    }

    pub fn push_input(&mut self, port: usize, value: ValueId) {
        self.inputs[port].push_back(value);
    }

    pub fn outputs(&self, port: usize) -> &[ValueId] {
        &self.outputs[port]
    }
}

impl IoHost for ChannelIoHost {
    fn io(&mut self, ports: &mut [PortSlot], _block: bool) -> bool {
        let mut changed = false;
        for (i, slot) in ports.iter_mut().enumerate() {
            if let Some(v) = slot.value.take() {
                self.outputs[i].push(v);
                changed = true;
            }
            if slot.value.is_none() {
                if let Some(v) = self.inputs[i].pop_front() {
                    slot.value = Some(v);
                    changed = true;
                }
            }
        }
        changed
    }
}
