//! Bounded push queue drained by a fixed worker set.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{PushNotification, PushOutcome, PushSender};
use crate::metrics::{PUSH_FAILED_TOTAL, PUSH_QUEUE_DROPS_TOTAL, PUSH_SENT_TOTAL, PUSH_SKIPPED_TOTAL};

/// Submission side of the push worker pool. Cheap to clone.
///
/// Workers exit once every dispatcher handle is dropped and the queue drains.
#[derive(Clone)]
pub struct PushDispatcher {
    jobs: mpsc::Sender<PushNotification>,
    domain: &'static str,
}

impl std::fmt::Debug for PushDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushDispatcher")
            .field("domain", &self.domain)
            .field("capacity", &self.jobs.max_capacity())
            .finish()
    }
}

impl PushDispatcher {
    /// Start `workers` tasks delivering through `sender`.
    pub fn spawn(
        sender: Arc<dyn PushSender>,
        workers: usize,
        capacity: usize,
        domain: &'static str,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let sender = Arc::clone(&sender);
                tokio::spawn(async move { run_worker(worker, rx, sender, domain).await })
            })
            .collect();
        (Self { jobs: tx, domain }, handles)
    }

    /// Queue a notification. Never waits; a full queue drops the job.
    pub fn submit(&self, notification: PushNotification) -> bool {
        match self.jobs.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(n)) => {
                counter!(PUSH_QUEUE_DROPS_TOTAL, "domain" => self.domain).increment(1);
                warn!(
                    domain = self.domain,
                    recipient = %n.recipient,
                    "push queue full, notification dropped"
                );
                false
            }
            Err(TrySendError::Closed(n)) => {
                warn!(
                    domain = self.domain,
                    recipient = %n.recipient,
                    "push workers stopped, notification dropped"
                );
                false
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    jobs: Arc<Mutex<mpsc::Receiver<PushNotification>>>,
    sender: Arc<dyn PushSender>,
    domain: &'static str,
) {
    loop {
        let job = { jobs.lock().await.recv().await };
        let Some(notification) = job else { break };
        let recipient = notification.recipient;

        match sender.deliver(notification).await {
            Ok(PushOutcome::Sent(receipt)) => {
                counter!(PUSH_SENT_TOTAL, "domain" => domain).increment(1);
                info!(
                    domain,
                    %recipient,
                    message_id = receipt.message_id.as_deref().unwrap_or("-"),
                    "push sent"
                );
            }
            Ok(PushOutcome::NoToken) => {
                counter!(PUSH_SKIPPED_TOTAL, "domain" => domain).increment(1);
            }
            Err(e) => {
                counter!(PUSH_FAILED_TOTAL, "domain" => domain).increment(1);
                warn!(domain, %recipient, error = %e, "push failed");
            }
        }
    }
    debug!(domain, worker, "push worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::{PushError, PushReceipt};
    use async_trait::async_trait;
    use relay_core::PrincipalId;
    use std::collections::HashMap;
    use std::time::Duration;

    struct Recording {
        seen: mpsc::UnboundedSender<PrincipalId>,
        gate: Option<Arc<tokio::sync::Notify>>,
    }

    #[async_trait]
    impl PushSender for Recording {
        async fn deliver(&self, n: PushNotification) -> Result<PushOutcome, PushError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let _ = self.seen.send(n.recipient);
            if n.recipient.get() % 2 == 0 {
                Ok(PushOutcome::Sent(PushReceipt::default()))
            } else {
                Err(PushError::TokenExchange("nope".into()))
            }
        }
    }

    fn job(recipient: i64) -> PushNotification {
        PushNotification {
            recipient: PrincipalId::new(recipient),
            title: "t".into(),
            body: "b".into(),
            data: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn delivers_every_submitted_job() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let sender = Arc::new(Recording {
            seen: seen_tx,
            gate: None,
        });
        let (dispatcher, handles) = PushDispatcher::spawn(sender, 3, 16, "test");

        for i in 1..=6 {
            assert!(dispatcher.submit(job(i)));
        }
        let mut got = Vec::new();
        for _ in 0..6 {
            let p = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
                .await
                .unwrap()
                .unwrap();
            got.push(p.get());
        }
        got.sort_unstable();
        assert_eq!(got, vec![1, 2, 3, 4, 5, 6]);

        drop(dispatcher);
        for h in handles {
            tokio::time::timeout(Duration::from_secs(2), h)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn full_queue_rejects_without_waiting() {
        let (seen_tx, _seen_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(tokio::sync::Notify::new());
        let sender = Arc::new(Recording {
            seen: seen_tx,
            gate: Some(Arc::clone(&gate)),
        });
        let (dispatcher, _handles) = PushDispatcher::spawn(sender, 1, 1, "test");

        // The single worker takes the first job and blocks on the gate; the
        // second fills the queue.
        assert!(dispatcher.submit(job(2)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(dispatcher.submit(job(4)));
        assert!(!dispatcher.submit(job(6)));
        gate.notify_waiters();
    }

    #[tokio::test]
    async fn workers_drain_queue_before_exit() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let sender = Arc::new(Recording {
            seen: seen_tx,
            gate: None,
        });
        let (dispatcher, handles) = PushDispatcher::spawn(sender, 1, 8, "test");
        for i in 0..5 {
            assert!(dispatcher.submit(job(i * 2)));
        }
        drop(dispatcher);
        for h in handles {
            h.await.unwrap();
        }
        let mut count = 0;
        while seen_rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 5);
    }
}
