//! Render synchronizer: tells views when to bring the newest entry into view.
//!
//! Signals are queued on unbounded channels after the mutation has completed,
//! so a slow or absent view never blocks the store.

use tokio::sync::mpsc;

use crate::state::DispatchState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSignal {
    /// A message was appended at this transcript index.
    Appended(usize),
    /// The dispatcher entered or left Pending.
    DispatchChanged(DispatchState),
}

#[derive(Debug, Default)]
pub struct RenderSync {
    subscribers: Vec<mpsc::UnboundedSender<RenderSignal>>,
}

impl RenderSync {
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RenderSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Queue a signal for every live subscriber, dropping closed ones.
    pub fn notify(&mut self, signal: RenderSignal) {
        self.subscribers.retain(|tx| tx.send(signal).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_reaches_all_subscribers() {
        let mut sync = RenderSync::default();
        let mut a = sync.subscribe();
        let mut b = sync.subscribe();

        sync.notify(RenderSignal::Appended(3));

        assert_eq!(a.try_recv().unwrap(), RenderSignal::Appended(3));
        assert_eq!(b.try_recv().unwrap(), RenderSignal::Appended(3));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut sync = RenderSync::default();
        let kept = sync.subscribe();
        drop(sync.subscribe());

        sync.notify(RenderSignal::DispatchChanged(DispatchState::Pending));

        assert_eq!(sync.subscriber_count(), 1);
        drop(kept);
    }
}
