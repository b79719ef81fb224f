//! Idle supervision.
//!
//! The countdown lives inside the connected state, so any transition away
//! from `Connected` drops and thereby cancels it.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::connection::Message;
use crate::connection::state::Connected;
use crate::connection::timer::{TimerEvent, TimerHandle};

/// An armed idle countdown.
#[derive(Debug)]
pub(crate) struct IdleTimer {
    generation: u64,
    _timer: TimerHandle,
}

/// Re-arms the idle countdown on activity.
#[derive(Debug)]
pub(crate) struct IdleSupervisor {
    window: Duration,
    generation: u64,
}

impl IdleSupervisor {
    pub(crate) const fn new(window: Duration) -> Self {
        Self {
            window,
            generation: 0,
        }
    }

    /// Starts a fresh countdown for `connected`, cancelling the previous one.
    pub(crate) fn reset<L>(
        &mut self,
        connected: &mut Connected<L>,
        tx: &mpsc::UnboundedSender<Message>,
    ) {
        self.generation += 1;
        let event = TimerEvent::IdleElapsed {
            link: connected.link_id,
            generation: self.generation,
        };
        connected.idle = Some(IdleTimer {
            generation: self.generation,
            _timer: TimerHandle::arm(self.window, tx, event),
        });
        tracing::trace!(
            "idle countdown {} armed for {:?} on {}",
            self.generation,
            self.window,
            connected.link_id
        );
    }

    /// Returns true if `generation` is still the live countdown of `connected`.
    pub(crate) fn is_current<L>(connected: &Connected<L>, generation: u64) -> bool {
        connected
            .idle
            .as_ref()
            .is_some_and(|idle| idle.generation == generation)
    }
}
