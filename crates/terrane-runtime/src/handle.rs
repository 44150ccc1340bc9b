use std::fmt;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};
use terrane_chunk::{GenerationId, GenerationResult};
use terrane_world::ChunkCoord;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskError {
    /// Removed from the queue by `cancel_out_of_range`.
    Cancelled,
    /// The worker running this task panicked.
    WorkerCrashed(String),
    /// Queued when another worker crashed.
    QueueFlushed,
    Disposed,
    /// The reply channel closed without a result.
    Abandoned,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Cancelled => write!(f, "task cancelled (out of range)"),
            TaskError::WorkerCrashed(msg) => write!(f, "worker crashed: {}", msg),
            TaskError::QueueFlushed => write!(f, "queue flushed after worker crash"),
            TaskError::Disposed => write!(f, "generation backend disposed"),
            TaskError::Abandoned => write!(f, "task abandoned without a result"),
        }
    }
}

impl std::error::Error for TaskError {}

pub type Reply = Result<GenerationResult, TaskError>;

/// Sending half kept by whoever may settle the task. The first settlement wins.
#[derive(Clone)]
pub(crate) struct Resolver {
    tx: Sender<Reply>,
}

impl Resolver {
    pub(crate) fn settle(&self, reply: Reply) -> bool {
        match self.tx.try_send(reply) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub(crate) fn reject(&self, err: TaskError) -> bool {
        self.settle(Err(err))
    }
}

/// One-shot promise for a submitted request.
pub struct TaskHandle {
    id: GenerationId,
    coord: ChunkCoord,
    rx: Receiver<Reply>,
    settled: bool,
}

impl TaskHandle {
    pub(crate) fn pending(id: GenerationId, coord: ChunkCoord) -> (Resolver, Self) {
        let (tx, rx) = bounded(1);
        (
            Resolver { tx },
            Self {
                id,
                coord,
                rx,
                settled: false,
            },
        )
    }

    /// A handle that is already settled, for backends that finish inline.
    pub fn from_reply(id: GenerationId, coord: ChunkCoord, reply: Reply) -> Self {
        let (resolver, handle) = Self::pending(id, coord);
        resolver.settle(reply);
        handle
    }

    #[inline]
    pub fn id(&self) -> GenerationId {
        self.id
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Non-blocking poll. Yields the outcome exactly once, then `None`.
    pub fn try_resolve(&mut self) -> Option<Reply> {
        if self.settled {
            return None;
        }
        let out = match self.rx.try_recv() {
            Ok(reply) => reply,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(TaskError::Abandoned),
        };
        self.settled = true;
        Some(out)
    }

    /// Blocks until the task settles.
    pub fn wait(self) -> Reply {
        self.rx.recv().unwrap_or(Err(TaskError::Abandoned))
    }

    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Reply> {
        if self.settled {
            return None;
        }
        let out = match self.rx.recv_timeout(timeout) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Abandoned),
        };
        self.settled = true;
        Some(out)
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("coord", &self.coord)
            .field("settled", &self.settled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_settlement_wins() {
        let (r, mut h) = TaskHandle::pending(GenerationId(1), ChunkCoord::new(0, 0));
        assert!(h.try_resolve().is_none());
        assert!(r.reject(TaskError::Cancelled));
        assert!(!r.reject(TaskError::Disposed));
        assert_eq!(h.try_resolve(), Some(Err(TaskError::Cancelled)));
        assert!(h.try_resolve().is_none());
        assert!(h.is_settled());
    }

    #[test]
    fn dropped_resolver_abandons() {
        let (r, mut h) = TaskHandle::pending(GenerationId(2), ChunkCoord::new(1, 1));
        drop(r);
        assert_eq!(h.try_resolve(), Some(Err(TaskError::Abandoned)));
    }
}
