//! Scoped command batches sent as a single command list.

use std::ops::{Deref, DerefMut};

use log::debug;

use crate::backends::DaemonConnector;
use crate::session::Client;

/// Guard returned by [`Client::batch`].
///
/// Operations issued through the guard are buffered in one command list. When
/// the guard drops, the list is sent, its single response is read, and the
/// status is polled once. The change counts as expected unless the list held
/// an edit whose result only the daemon knows.
pub struct CommandBatch<'a, C: DaemonConnector> {
    client: &'a mut Client<C>,
    active: bool,
}

impl<C: DaemonConnector> Client<C> {
    /// Opens a batch when `condition` holds; otherwise the guard passes calls straight through.
    pub fn batch(&mut self, condition: bool) -> CommandBatch<'_, C> {
        let active = condition && !self.list_mode;
        if active {
            self.clear_command();
            self.start_command_list();
        }
        CommandBatch {
            client: self,
            active,
        }
    }

    pub(super) fn start_command_list(&mut self) {
        if !self.connected() {
            return;
        }
        if self
            .call(|connection| connection.begin_command_list())
            .is_some()
        {
            self.list_mode = true;
        }
    }

    pub(super) fn send_command_list(&mut self) {
        if !self.connected() || !self.list_mode {
            return;
        }
        let ended = self
            .call(|connection| connection.end_command_list())
            .is_some();
        let finished = ended
            && self
                .call(|connection| connection.finish_response())
                .is_some();
        self.list_mode = false;
        if !finished {
            debug!("Session: command list failed, queue will be reloaded");
            self.queue_version = None;
        }
        let expect_update = !std::mem::take(&mut self.batch_unexpected);
        self.update_status(expect_update);
    }

    /// Marks the open command list as holding an edit the mirror cannot predict.
    pub(super) fn note_unpredicted_edit(&mut self) {
        if self.list_mode {
            self.batch_unexpected = true;
        }
    }
}

impl<C: DaemonConnector> Deref for CommandBatch<'_, C> {
    type Target = Client<C>;

    fn deref(&self) -> &Self::Target {
        self.client
    }
}

impl<C: DaemonConnector> DerefMut for CommandBatch<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client
    }
}

impl<C: DaemonConnector> Drop for CommandBatch<'_, C> {
    fn drop(&mut self) {
        if self.active {
            self.client.send_command_list();
        }
    }
}
