//! Idle-wait gate: block on daemon events instead of polling.

use log::trace;

use crate::backends::DaemonConnector;
use crate::session::Client;

/// Whether an idle wait is outstanding, and whether a cancelled one saw events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdleGate {
    waiting: bool,
    missed_events: bool,
}

impl IdleGate {
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn start_waiting(&mut self) {
        self.waiting = true;
    }

    pub fn stop_waiting(&mut self) {
        self.waiting = false;
    }

    /// A wait cancelled to make room for another request had seen events.
    pub fn remember_events(&mut self) {
        self.missed_events = true;
    }

    pub fn take_missed_events(&mut self) -> bool {
        std::mem::take(&mut self.missed_events)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl<C: DaemonConnector> Client<C> {
    fn idle_enabled(&self) -> bool {
        self.connected() && !self.settings.polling
    }

    /// Leaves an idle wait outstanding, unless polling is configured, one is
    /// already out or a command list is open.
    pub fn idle_mode(&mut self) {
        if !self.idle_enabled() || self.idle.is_waiting() || self.list_mode {
            return;
        }
        self.clear_command();
        if self
            .call(|connection| connection.send_idle())
            .is_some()
        {
            trace!("Session: waiting for daemon events");
            self.idle.start_waiting();
        }
    }

    /// Cancels the outstanding wait. `true` when the daemon reported changes
    /// since it was issued; the caller then has to poll status itself.
    pub fn had_events(&mut self) -> bool {
        if !self.idle_enabled() {
            return false;
        }
        let mut had_events = self.idle.take_missed_events();
        if self.idle.is_waiting() {
            self.idle.stop_waiting();
            had_events |= self
                .call(|connection| connection.cancel_idle())
                .unwrap_or(false);
        }
        had_events
    }
}
