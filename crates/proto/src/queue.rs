use std::collections::VecDeque;
use std::fmt;

use crate::cmd::Command;

/// FIFO buffer between the command producer and its consumer.
///
/// The authority enqueues during a tick; the viewer drains afterwards.
/// An optional filter drops commands at enqueue time, which is how a
/// headless run suppresses cosmetic traffic without touching the
/// producer.
#[derive(Default)]
pub struct CommandQueue {
    cmds: VecDeque<Command>,
    filter: Option<Box<dyn Fn(&Command) -> bool + Send>>,
}

impl CommandQueue {
    pub fn new() -> CommandQueue {
        CommandQueue::default()
    }

    /// Install an enqueue filter; commands it rejects are dropped.
    pub fn set_filter(&mut self, f: impl Fn(&Command) -> bool + Send + 'static) {
        self.filter = Some(Box::new(f));
    }

    pub fn enq(&mut self, cmd: Command) {
        if let Some(filter) = &self.filter
            && !filter(&cmd)
        {
            return;
        }
        self.cmds.push_back(cmd);
    }

    pub fn deq(&mut self) -> Option<Command> {
        self.cmds.pop_front()
    }

    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("len", &self.cmds.len())
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}
