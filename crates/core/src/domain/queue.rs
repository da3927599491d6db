// Signal Queue Domain Model
//
// A bounded blocking FIFO whose consumers are stopped by in-band shutdown
// markers rather than a shared stop flag.

use crate::error::{PipelineError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fmt;
use std::iter::FusedIterator;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// Entry carried through a [`SignalQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueMessage<T> {
    /// Real work item
    Item(T),
    /// Tells exactly one consumer to stop
    Shutdown,
}

/// Bounded, thread-safe queue with a marker-based shutdown protocol
///
/// Every entry (items and shutdown markers alike) counts as unfinished from
/// the moment it is enqueued until a consumer marks it done. [`join`]
/// returns once that count reaches zero.
///
/// A queue that has delivered a marker to each of its consumers is drained
/// and terminal; it is not meant to be fed by a new producer set afterwards.
///
/// [`join`]: SignalQueue::join
pub struct SignalQueue<T> {
    tx: Sender<QueueMessage<T>>,
    rx: Receiver<QueueMessage<T>>,
    capacity: usize,
    unfinished: Mutex<usize>,
    all_done: Condvar,
}

impl<T> SignalQueue<T> {
    /// Create a queue holding at most `capacity` buffered entries
    ///
    /// # Errors
    /// - `PipelineError::InvalidCapacity` if `capacity` is zero. A rendezvous
    ///   queue cannot buffer the shutdown markers that `close()` issues.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::InvalidCapacity(capacity));
        }

        let (tx, rx) = bounded(capacity);
        Ok(Self {
            tx,
            rx,
            capacity,
            unfinished: Mutex::new(0),
            all_done: Condvar::new(),
        })
    }

    /// Append an item to the tail, blocking while the buffer is full
    pub fn enqueue(&self, item: T) -> Result<()> {
        self.put(QueueMessage::Item(item))
    }

    /// Remove and return the head entry, blocking while the buffer is empty
    ///
    /// Callers using this directly own the matching [`task_done`] call.
    ///
    /// [`task_done`]: SignalQueue::task_done
    pub fn dequeue(&self) -> Result<QueueMessage<T>> {
        self.rx
            .recv()
            .map_err(|e| PipelineError::QueueDisconnected(e.to_string()))
    }

    /// Enqueue one shutdown marker
    ///
    /// Stops exactly one consumer. A queue with N consumers needs N calls.
    pub fn close(&self) -> Result<()> {
        self.put(QueueMessage::Shutdown)
    }

    /// Mark one previously dequeued entry as processed
    ///
    /// # Errors
    /// - `PipelineError::TaskDoneOverflow` if there is no unfinished entry left
    pub fn task_done(&self) -> Result<()> {
        let mut unfinished = self.lock_unfinished();
        if *unfinished == 0 {
            return Err(PipelineError::TaskDoneOverflow);
        }

        *unfinished -= 1;
        if *unfinished == 0 {
            self.all_done.notify_all();
        }
        Ok(())
    }

    /// Block until every enqueued entry, markers included, has been marked done
    pub fn join(&self) {
        let mut unfinished = self.lock_unfinished();
        while *unfinished > 0 {
            unfinished = self
                .all_done
                .wait(unfinished)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Lazy item sequence for one consumer
    ///
    /// Yields items in FIFO order and ends after consuming a shutdown marker,
    /// which is never yielded. Each yielded item is marked done when the
    /// caller asks for the next one or drops the iterator, so a consumer
    /// that unwinds mid-item still leaves `join()` accurate.
    pub fn consume(&self) -> Consume<'_, T> {
        Consume {
            queue: self,
            pending: false,
            finished: false,
        }
    }

    /// Number of buffered entries, shutdown markers included
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries enqueued (or being enqueued) but not yet marked done
    pub fn unfinished(&self) -> usize {
        *self.lock_unfinished()
    }

    fn put(&self, message: QueueMessage<T>) -> Result<()> {
        // Counted before the send so join() never sees a blocked producer's
        // entry as already finished.
        *self.lock_unfinished() += 1;

        if let Err(e) = self.tx.send(message) {
            self.release();
            return Err(PipelineError::QueueDisconnected(e.to_string()));
        }
        Ok(())
    }

    fn release(&self) {
        if let Err(e) = self.task_done() {
            warn!(error = %e, "Queue completion count out of sync");
        }
    }

    fn lock_unfinished(&self) -> MutexGuard<'_, usize> {
        // Only integer updates happen under this lock; a poisoned guard still
        // holds a consistent count.
        self.unfinished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for SignalQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("unfinished", &self.unfinished())
            .finish()
    }
}

/// Iterator returned by [`SignalQueue::consume`]
pub struct Consume<'a, T> {
    queue: &'a SignalQueue<T>,
    pending: bool,
    finished: bool,
}

impl<T> Consume<'_, T> {
    fn settle(&mut self) {
        if std::mem::take(&mut self.pending) {
            self.queue.release();
        }
    }
}

impl<T> Iterator for Consume<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.settle();
        if self.finished {
            return None;
        }

        match self.queue.dequeue() {
            Ok(QueueMessage::Item(item)) => {
                self.pending = true;
                Some(item)
            }
            Ok(QueueMessage::Shutdown) => {
                self.finished = true;
                self.queue.release();
                None
            }
            Err(e) => {
                warn!(error = %e, "Queue consumption ended without a shutdown marker");
                self.finished = true;
                None
            }
        }
    }
}

impl<T> FusedIterator for Consume<'_, T> {}

impl<T> Drop for Consume<'_, T> {
    fn drop(&mut self) {
        self.settle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_rejected() {
        let result = SignalQueue::<u32>::new(0);
        assert!(matches!(result, Err(PipelineError::InvalidCapacity(0))));
    }

    #[test]
    fn test_dequeue_is_fifo() {
        let queue = SignalQueue::new(4).unwrap();
        queue.enqueue("a").unwrap();
        queue.enqueue("b").unwrap();
        queue.close().unwrap();

        assert_eq!(queue.dequeue().unwrap(), QueueMessage::Item("a"));
        assert_eq!(queue.dequeue().unwrap(), QueueMessage::Item("b"));
        assert_eq!(queue.dequeue().unwrap(), QueueMessage::Shutdown);
    }

    #[test]
    fn test_consume_stops_at_marker_without_yielding_it() {
        let queue = SignalQueue::new(8).unwrap();
        for i in 0..3 {
            queue.enqueue(i).unwrap();
        }
        queue.close().unwrap();
        queue.enqueue(99).unwrap();

        let items: Vec<i32> = queue.consume().collect();
        assert_eq!(items, vec![0, 1, 2]);

        // Entry behind the marker stays for the next consumer
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.unfinished(), 1);
    }

    #[test]
    fn test_consume_marks_items_done() {
        let queue = SignalQueue::new(8).unwrap();
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        queue.close().unwrap();
        assert_eq!(queue.unfinished(), 3);

        let mut consumer = queue.consume();
        assert_eq!(consumer.next(), Some(1));
        // Item 1 is still in flight
        assert_eq!(queue.unfinished(), 3);
        assert_eq!(consumer.next(), Some(2));
        assert_eq!(queue.unfinished(), 2);
        assert_eq!(consumer.next(), None);
        assert_eq!(queue.unfinished(), 0);
        assert_eq!(consumer.next(), None);

        queue.join();
    }

    #[test]
    fn test_dropping_consumer_mid_item_marks_done() {
        let queue = SignalQueue::new(2).unwrap();
        queue.enqueue("x").unwrap();
        {
            let mut consumer = queue.consume();
            assert_eq!(consumer.next(), Some("x"));
        }
        assert_eq!(queue.unfinished(), 0);
    }

    #[test]
    fn test_task_done_overflow() {
        let queue = SignalQueue::<u8>::new(1).unwrap();
        assert!(matches!(
            queue.task_done(),
            Err(PipelineError::TaskDoneOverflow)
        ));
    }

    #[test]
    fn test_join_blocks_until_done() {
        let queue = Arc::new(SignalQueue::new(4).unwrap());
        queue.enqueue(7).unwrap();

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let joiner = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.join();
                done_tx.send(()).unwrap();
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

        assert_eq!(queue.dequeue().unwrap(), QueueMessage::Item(7));
        queue.task_done().unwrap();

        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        joiner.join().unwrap();
    }

    #[test]
    fn test_enqueue_blocks_when_full() {
        let queue = Arc::new(SignalQueue::new(1).unwrap());
        queue.enqueue(1).unwrap();

        let (sent_tx, sent_rx) = crossbeam_channel::bounded(1);
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.enqueue(2).unwrap();
                sent_tx.send(()).unwrap();
            })
        };

        assert!(sent_rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(queue.dequeue().unwrap(), QueueMessage::Item(1));
        sent_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();

        assert_eq!(queue.dequeue().unwrap(), QueueMessage::Item(2));
        assert_eq!(queue.capacity(), 1);
    }
}
