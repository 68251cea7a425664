//! Ordered queue between the capture context (producer) and the
//! composition context (consumer).

use std::sync::mpsc;

use q9_core::key::{KeyEvent, KeyKind};

/// Producer half. Each running capture adapter owns one.
pub struct EventSender {
    tx: mpsc::Sender<KeyEvent>,
}

/// Consumer half, drained from the composition poll.
pub struct EventReceiver {
    rx: mpsc::Receiver<KeyEvent>,
    disconnected: bool,
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        EventSender { tx },
        EventReceiver {
            rx,
            disconnected: false,
        },
    )
}

impl EventSender {
    /// Canonicalize and enqueue. Never blocks. Returns `false` once the
    /// consumer is gone.
    pub fn send(&self, kind: KeyKind) -> bool {
        self.tx.send(KeyEvent::new(kind)).is_ok()
    }

    /// Another producer on the same queue, for handing to a fresh adapter
    /// start.
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl EventReceiver {
    /// Take up to `max` queued events in arrival order; the rest wait for
    /// the next call.
    pub fn drain(&mut self, max: usize) -> Vec<KeyEvent> {
        let mut out = Vec::new();
        while out.len() < max {
            match self.rx.try_recv() {
                Ok(event) => out.push(event),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        out
    }

    /// True once the producer was dropped and the queue ran dry.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn drain_respects_batch_size_and_order() {
        let (tx, mut rx) = event_channel();
        for d in 0..10u8 {
            assert!(tx.send(KeyKind::Digit(d)));
        }
        assert!(tx.send(KeyKind::Dot));

        let first: Vec<KeyKind> = rx.drain(4).into_iter().map(|e| e.kind).collect();
        assert_eq!(first, (0..4).map(KeyKind::Digit).collect::<Vec<_>>());

        let rest: Vec<KeyKind> = rx.drain(100).into_iter().map(|e| e.kind).collect();
        assert_eq!(rest.len(), 7);
        assert_eq!(rest.last(), Some(&KeyKind::Dot));
        assert!(rx.drain(10).is_empty());
        assert!(!rx.is_disconnected());
    }

    #[test]
    fn order_preserved_across_threads() {
        let (tx, mut rx) = event_channel();
        let producer = thread::spawn(move || {
            for i in 0..500u32 {
                tx.send(KeyKind::Digit((i % 10) as u8));
            }
        });
        producer.join().unwrap();

        let mut seen = Vec::new();
        loop {
            let batch = rx.drain(10);
            if batch.is_empty() {
                break;
            }
            assert!(batch.len() <= 10);
            seen.extend(batch);
        }
        assert_eq!(seen.len(), 500);
        for (i, e) in seen.iter().enumerate() {
            assert_eq!(e.kind, KeyKind::Digit((i % 10) as u8));
        }
        for pair in seen.windows(2) {
            assert!(pair[0].captured_at <= pair[1].captured_at);
        }
        assert!(rx.is_disconnected());
    }

    #[test]
    fn send_after_consumer_dropped() {
        let (tx, rx) = event_channel();
        drop(rx);
        assert!(!tx.send(KeyKind::Dot));
    }
}
