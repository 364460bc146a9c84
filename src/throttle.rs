//! Leading-edge throttle with one trailing call.
//!
//! The first relevant item runs the handler at once. Items arriving during the
//! following quantum collapse into a single extra run at its end.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{Instant, sleep_until};

pub struct ThrottleDebounce<T> {
    rx: UnboundedReceiver<T>,
    quantum: Duration,
    relevant: fn(&T) -> bool,
    cooldown_until: Option<Instant>,
}

impl<T> ThrottleDebounce<T> {
    pub fn new(rx: UnboundedReceiver<T>, quantum: Duration) -> Self {
        Self {
            rx,
            quantum,
            relevant: |_| true,
            cooldown_until: None,
        }
    }

    /// Ignore items for which `relevant` is false
    pub fn with_filter(mut self, relevant: fn(&T) -> bool) -> Self {
        self.relevant = relevant;
        self
    }

    /// Wait until the handler should run.
    ///
    /// Returns the number of relevant items covered by this run, or `None`
    /// once the source is closed and nothing is pending.
    pub async fn ready(&mut self) -> Option<usize> {
        if let Some(deadline) = self.cooldown_until.take() {
            sleep_until(deadline).await;
            let (pending, closed) = self.drain();
            if pending > 0 {
                self.cooldown_until = Some(Instant::now() + self.quantum);
                return Some(pending);
            }
            if closed {
                return None;
            }
        }

        loop {
            let item = self.rx.recv().await?;
            if !(self.relevant)(&item) {
                continue;
            }
            let (more, _) = self.drain();
            self.cooldown_until = Some(Instant::now() + self.quantum);
            return Some(1 + more);
        }
    }

    /// Take everything already queued. Returns the relevant count and
    /// whether the source is closed.
    fn drain(&mut self) -> (usize, bool) {
        let mut count = 0;
        loop {
            match self.rx.try_recv() {
                Ok(item) => {
                    if (self.relevant)(&item) {
                        count += 1;
                    }
                }
                Err(TryRecvError::Empty) => return (count, false),
                Err(TryRecvError::Disconnected) => return (count, true),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const QUANTUM: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_leading_call_is_immediate() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut throttle = ThrottleDebounce::new(rx, QUANTUM);
        let start = Instant::now();

        tx.send(1).unwrap();
        assert_eq!(throttle.ready().await, Some(1));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_trailing_call() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut throttle = ThrottleDebounce::new(rx, QUANTUM);
        let start = Instant::now();

        tx.send(1).unwrap();
        assert_eq!(throttle.ready().await, Some(1));

        for i in 2..=5 {
            tx.send(i).unwrap();
        }
        assert_eq!(throttle.ready().await, Some(4));
        assert_eq!(start.elapsed(), QUANTUM);

        // quiet period: no further call
        assert!(timeout(Duration::from_secs(1), throttle.ready()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_after_quiet_period_is_leading_again() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut throttle = ThrottleDebounce::new(rx, QUANTUM);

        tx.send(1).unwrap();
        throttle.ready().await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        let before = Instant::now();
        tx.send(2).unwrap();
        assert_eq!(throttle.ready().await, Some(1));
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_irrelevant_items_are_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut throttle = ThrottleDebounce::new(rx, QUANTUM).with_filter(|n: &i32| *n > 0);

        tx.send(0).unwrap();
        tx.send(-1).unwrap();
        assert!(timeout(Duration::from_secs(1), throttle.ready()).await.is_err());

        tx.send(7).unwrap();
        assert_eq!(throttle.ready().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_source_ends() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut throttle = ThrottleDebounce::new(rx, QUANTUM);

        tx.send(1).unwrap();
        assert_eq!(throttle.ready().await, Some(1));
        drop(tx);
        assert_eq!(throttle.ready().await, None);
    }
}
