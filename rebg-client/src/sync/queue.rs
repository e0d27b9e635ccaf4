//! Outbound command queue

use std::collections::VecDeque;

use rebg_protocol::CommandPayload;

/// FIFO of payloads waiting for a connection
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: VecDeque<CommandPayload>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, payload: CommandPayload) {
        self.pending.push_back(payload);
    }

    /// Put payloads back ahead of everything queued, keeping their order
    pub fn requeue_front(&mut self, payloads: Vec<CommandPayload>) {
        for payload in payloads.into_iter().rev() {
            self.pending.push_front(payload);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Hand payloads to `send` in enqueue order
    ///
    /// Stops at the first payload `send` gives back; that payload and
    /// everything after it stay queued. Returns the number delivered.
    pub fn drain_into<F>(&mut self, mut send: F) -> usize
    where
        F: FnMut(CommandPayload) -> Result<(), CommandPayload>,
    {
        let mut delivered = 0;
        while let Some(payload) = self.pending.pop_front() {
            if let Err(payload) = send(payload) {
                self.pending.push_front(payload);
                break;
            }
            delivered += 1;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payloads(items: &[&str]) -> OutboundQueue {
        let mut queue = OutboundQueue::new();
        for item in items {
            queue.push(CommandPayload::from(*item));
        }
        queue
    }

    #[test]
    fn test_new_queue_is_empty() {
        let queue = OutboundQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_drain_preserves_order() {
        let mut queue = payloads(&["a", "b", "c"]);
        let mut sent = Vec::new();

        let delivered = queue.drain_into(|p| {
            sent.push(p.into_text());
            Ok(())
        });

        assert_eq!(delivered, 3);
        assert_eq!(sent, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_stops_on_refusal_and_keeps_rest() {
        let mut queue = payloads(&["a", "b", "c"]);
        let mut sent = Vec::new();

        let delivered = queue.drain_into(|p| {
            if p.as_str() == "b" {
                return Err(p);
            }
            sent.push(p.into_text());
            Ok(())
        });

        assert_eq!(delivered, 1);
        assert_eq!(sent, vec!["a"]);
        assert_eq!(queue.len(), 2);

        // A later drain resumes from the refused payload
        let mut rest = Vec::new();
        queue.drain_into(|p| {
            rest.push(p.into_text());
            Ok(())
        });
        assert_eq!(rest, vec!["b", "c"]);
    }

    #[test]
    fn test_requeue_front_goes_ahead_of_pending() {
        let mut queue = payloads(&["c"]);
        queue.requeue_front(vec![CommandPayload::from("a"), CommandPayload::from("b")]);

        let mut sent = Vec::new();
        queue.drain_into(|p| {
            sent.push(p.into_text());
            Ok(())
        });
        assert_eq!(sent, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_drain_empty_queue() {
        let mut queue = OutboundQueue::new();
        assert_eq!(queue.drain_into(|_| Ok(())), 0);
    }
}
