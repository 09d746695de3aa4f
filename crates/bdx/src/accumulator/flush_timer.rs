//! ⏱️ The FlushTimer: the one who checks the clock so nobody else has to.
//!
//! It sleeps until the oldest buffered operation turns `flush_interval` old, then flushes.
//! An empty buffer means there's no deadline, so it naps until `add` pokes it.

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{Shared, Worker};

#[derive(Debug)]
pub(super) struct FlushTimer {
    shared: Arc<Shared>,
}

impl FlushTimer {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl Worker for FlushTimer {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            loop {
                let due = {
                    let buffer = self.shared.buffer.lock();
                    if buffer.closed {
                        debug!("🏁 FlushTimer: buffer closed, the clock stops here");
                        return Ok(());
                    }
                    buffer.oldest.map(|oldest| oldest + self.shared.flush_interval)
                };

                match due {
                    Some(due) => {
                        tokio::select! {
                            _ = tokio::time::sleep_until(due) => self.shared.flush_if_due(),
                            // 🔔 woken early: shutdown, or the buffer changed. re-read and carry on.
                            _ = self.shared.timer_wake.notified() => {}
                        }
                    }
                    None => self.shared.timer_wake.notified().await,
                }
            }
        })
    }
}
