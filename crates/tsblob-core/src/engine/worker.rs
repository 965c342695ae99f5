//! Fixed-size worker pool fed through a bounded queue.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::context::{BlockOutcome, BlockTransferContext};
use crate::error::{ErrorKind, TransferError};
use crate::meta::BlockMeta;

type Work = Box<dyn FnOnce(&mut BlockMeta) -> Result<(), TransferError> + Send>;

/// One queued block transfer.
pub(super) struct Task {
    ctx: Arc<BlockTransferContext>,
    work: Work,
}

impl Task {
    pub(super) fn new<F>(ctx: Arc<BlockTransferContext>, work: F) -> Self
    where
        F: FnOnce(&mut BlockMeta) -> Result<(), TransferError> + Send + 'static,
    {
        Task {
            ctx,
            work: Box::new(work),
        }
    }

    fn run(self) {
        let Task { ctx, work } = self;
        let mut block = ctx.start();
        let index = block.index;
        let result = match panic::catch_unwind(AssertUnwindSafe(|| work(&mut block))) {
            Ok(result) => result,
            Err(payload) => {
                let detail = format!("backend panicked: {}", panic_message(&*payload));
                tracing::warn!(path = %block.path(), index, %detail, "block task panicked");
                ctx.finish(None, BlockOutcome::failed(ErrorKind::Backend, detail));
                return;
            }
        };
        match &result {
            Ok(()) => tracing::debug!(path = %block.path(), index, size = block.exp_size(), "block done"),
            Err(e) => tracing::warn!(path = %block.path(), index, error = %e, "block failed"),
        }
        let outcome = BlockOutcome::from(&result);
        ctx.finish(Some(block), outcome);
    }

    /// The pool is gone; the block can never run.
    fn abandon(self) {
        self.ctx.finish(
            None,
            BlockOutcome::failed(ErrorKind::Backend, "worker pool shut down"),
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Long-lived worker threads sharing one bounded queue. The queue holds at
/// most as many tasks as there are workers; submitters block when it is full.
pub(super) struct Pool {
    name: &'static str,
    tx: Option<SyncSender<Task>>,
    handles: Vec<JoinHandle<()>>,
}

impl Pool {
    pub(super) fn spawn(name: &'static str, workers: usize) -> io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<Task>(workers);
        let rx = Arc::new(Mutex::new(rx));
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let rx = Arc::clone(&rx);
            let handle = thread::Builder::new()
                .name(format!("{name}-{i}"))
                .spawn(move || worker_loop(&rx))?;
            handles.push(handle);
        }
        tracing::debug!(pool = name, workers, "worker pool started");
        Ok(Pool {
            name,
            tx: Some(tx),
            handles,
        })
    }

    pub(super) fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Enqueue `tasks` in order from a dedicated feeder thread and return at once.
    pub(super) fn submit(&self, tasks: Vec<Task>) -> io::Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        let Some(tx) = self.tx.clone() else {
            for task in tasks {
                task.abandon();
            }
            return Ok(());
        };
        thread::Builder::new()
            .name(format!("{}-feed", self.name))
            .spawn(move || {
                for task in tasks {
                    if let Err(mpsc::SendError(task)) = tx.send(task) {
                        task.abandon();
                    }
                }
            })?;
        Ok(())
    }
}

impl Drop for Pool {
    /// Close the queue; workers exit once every feeder is done and the queue drained.
    fn drop(&mut self) {
        self.tx.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::warn!(pool = self.name, "worker thread panicked");
            }
        }
        tracing::debug!(pool = self.name, "worker pool stopped");
    }
}

fn worker_loop(rx: &Mutex<Receiver<Task>>) {
    loop {
        // Lock only for the receive so other workers can pick up the next task.
        let next = rx.lock().unwrap_or_else(|e| e.into_inner()).recv();
        match next {
            Ok(task) => task.run(),
            Err(_) => break,
        }
    }
}
