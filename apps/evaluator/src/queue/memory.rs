//! In-process queue used by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::{JobDescriptor, JobQueue, QueueError};

pub struct MemoryQueue {
    sender: mpsc::UnboundedSender<JobDescriptor>,
    receiver: Mutex<mpsc::UnboundedReceiver<JobDescriptor>>,
    unreachable: AtomicBool,
    published: std::sync::Mutex<Vec<JobDescriptor>>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            unreachable: AtomicBool::new(false),
            published: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Makes every subsequent publish fail as if the broker were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<JobDescriptor> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn publish(&self, job: &JobDescriptor) -> Result<(), QueueError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(QueueError::Timeout(Duration::from_secs(5)));
        }
        self.published.lock().unwrap().push(*job);
        self.sender.send(*job).map_err(|_| QueueError::Closed)
    }

    async fn receive(&self) -> Result<Option<JobDescriptor>, QueueError> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(Duration::from_millis(50), receiver.recv()).await {
            Ok(Some(job)) => Ok(Some(job)),
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }
}
