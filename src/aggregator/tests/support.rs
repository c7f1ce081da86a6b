//! Shared fixtures for the engine test suites

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::channel::{ChannelError, ChannelResult, MessageChannel, QueueChannel};
    use crate::message::Message;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    pub(crate) fn output() -> Arc<QueueChannel> {
        Arc::new(QueueChannel::unbounded("output"))
    }

    pub(crate) fn discard() -> Arc<QueueChannel> {
        Arc::new(QueueChannel::unbounded("discard"))
    }

    pub(crate) fn sequenced(key: &str, payload: i64, number: u32, size: u32) -> Message {
        Message::new(payload)
            .with_correlation_id(key)
            .with_sequence(number, size)
    }

    pub(crate) fn keyed(key: &str, payload: i64) -> Message {
        Message::new(payload).with_correlation_id(key)
    }

    pub(crate) fn payloads(messages: &[Arc<Message>]) -> Vec<Value> {
        messages.iter().map(|m| m.payload.clone()).collect()
    }

    /// Poll `channel` without blocking the runtime until `count` messages
    /// arrived or `within` elapsed
    pub(crate) async fn wait_for(
        channel: &QueueChannel,
        count: usize,
        within: Duration,
    ) -> Vec<Arc<Message>> {
        let deadline = Instant::now() + within;
        let mut received = Vec::new();
        while received.len() < count && Instant::now() < deadline {
            match channel.try_receive() {
                Some(message) => received.push(message),
                None => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
        received
    }

    /// Channel failing its first `failures` sends, then recording the rest
    pub(crate) struct FlakyChannel {
        remaining_failures: AtomicUsize,
        pub(crate) attempts: AtomicUsize,
        pub(crate) received: Mutex<Vec<Arc<Message>>>,
    }

    impl FlakyChannel {
        pub(crate) fn failing(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                remaining_failures: AtomicUsize::new(failures),
                attempts: AtomicUsize::new(0),
                received: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn always_failing() -> Arc<Self> {
            Self::failing(usize::MAX)
        }

        pub(crate) fn received(&self) -> Vec<Arc<Message>> {
            self.received.lock().clone()
        }
    }

    impl MessageChannel for FlakyChannel {
        fn name(&self) -> &str {
            "flaky"
        }

        fn send(&self, message: Arc<Message>, _timeout: Duration) -> ChannelResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let failed = self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(ChannelError::Rejected {
                    channel: "flaky".to_string(),
                    reason: "downstream unavailable".to_string(),
                });
            }
            self.received.lock().push(message);
            Ok(())
        }
    }
}
