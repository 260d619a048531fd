//! Fixed-size stream buffers recycled across frames.
//!
//! A [`StreamBuffer`] is a bump allocator over one GPU buffer: geometry is
//! appended into a CPU staging copy and written to the device when the
//! buffer is flushed. The [`BufferPool`] hands buffers out, remembers which
//! ones the current frame used, and parks them per submission until the
//! device reports that the GPU is done with them.
//!
//! Completion signals may fire on any thread. They only send the submission
//! id over a channel; the thread owning the pool drains the channel and
//! moves the parked buffers back to the free lists.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::device::{BufferKind, Device, SubmissionId};
use crate::error::{Error, Result};

/// Whether `additional` bytes fit after `utilization` in a buffer of
/// `capacity` bytes.
#[must_use]
pub fn can_append(capacity: usize, utilization: usize, additional: usize) -> bool {
    utilization
        .checked_add(additional)
        .is_some_and(|end| end <= capacity)
}

/// Fires once when the GPU has finished a submission.
///
/// Cheap to move to another thread; firing it never touches the pool.
#[derive(Debug)]
pub struct CompletionSignal {
    id: SubmissionId,
    sender: Sender<SubmissionId>,
}

impl CompletionSignal {
    /// A signal that reports `id` through `sender`.
    #[must_use]
    pub fn new(id: SubmissionId, sender: Sender<SubmissionId>) -> Self {
        Self { id, sender }
    }

    /// The submission this signal belongs to.
    #[must_use]
    pub fn id(&self) -> SubmissionId {
        self.id
    }

    /// Report completion. A pool that no longer exists is ignored.
    pub fn complete(self) {
        let _ = self.sender.send(self.id);
    }
}

/// A fixed-capacity, append-only buffer.
#[derive(Debug)]
pub struct StreamBuffer<B> {
    handle: B,
    kind: BufferKind,
    capacity: usize,
    staging: Vec<u8>,
}

impl<B> StreamBuffer<B> {
    /// Wrap a device buffer of `capacity` bytes.
    pub fn new(handle: B, kind: BufferKind, capacity: usize) -> Self {
        Self {
            handle,
            kind,
            capacity,
            staging: Vec::with_capacity(capacity),
        }
    }

    /// The device buffer.
    pub fn handle(&self) -> &B {
        &self.handle
    }

    /// Which stream the buffer serves.
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes appended so far.
    pub fn utilization(&self) -> usize {
        self.staging.len()
    }

    /// Bytes still free.
    pub fn remaining(&self) -> usize {
        self.capacity - self.staging.len()
    }

    /// The bytes appended so far.
    pub fn contents(&self) -> &[u8] {
        &self.staging
    }

    /// Whether `additional` more bytes fit.
    pub fn can_append(&self, additional: usize) -> bool {
        can_append(self.capacity, self.utilization(), additional)
    }

    /// Append `data` at the current utilization.
    ///
    /// # Panics
    ///
    /// Panics if `data` does not fit. Callers check
    /// [`can_append`](Self::can_append) and flush first.
    pub fn append(&mut self, data: &[u8]) {
        assert!(
            self.can_append(data.len()),
            "stream buffer overflow: {} + {} bytes exceeds capacity {}",
            self.utilization(),
            data.len(),
            self.capacity,
        );
        self.staging.extend_from_slice(data);
    }

    fn reset(&mut self) {
        self.staging.clear();
    }
}

/// Free lists, the current frame's used list, and buffers parked until
/// their submission completes.
#[derive(Debug)]
pub struct BufferPool<B> {
    capacity: usize,
    free_vertex: Vec<StreamBuffer<B>>,
    free_attribute: Vec<StreamBuffer<B>>,
    used: Vec<StreamBuffer<B>>,
    in_flight: BTreeMap<SubmissionId, Vec<StreamBuffer<B>>>,
    next_submission: u64,
    allocated: usize,
    sender: Sender<SubmissionId>,
    receiver: Receiver<SubmissionId>,
}

impl<B> BufferPool<B> {
    /// An empty pool handing out buffers of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            capacity,
            free_vertex: Vec::new(),
            free_attribute: Vec::new(),
            used: Vec::new(),
            in_flight: BTreeMap::new(),
            next_submission: 0,
            allocated: 0,
            sender,
            receiver,
        }
    }

    /// Capacity of every buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers allocated over the pool's lifetime.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    fn free_list(&mut self, kind: BufferKind) -> &mut Vec<StreamBuffer<B>> {
        match kind {
            BufferKind::Vertex => &mut self.free_vertex,
            BufferKind::Attribute => &mut self.free_attribute,
        }
    }

    /// Take a free buffer of `kind`, allocating one if none is free.
    ///
    /// # Errors
    ///
    /// Propagates allocation failures from the device.
    pub fn acquire<D>(&mut self, device: &mut D, kind: BufferKind) -> Result<StreamBuffer<B>>
    where
        D: Device<Buffer = B>,
    {
        if let Some(buffer) = self.free_list(kind).pop() {
            return Ok(buffer);
        }
        let handle = device.create_buffer(kind, self.capacity)?;
        self.allocated += 1;
        log::info!(
            "allocated {kind:?} stream buffer #{} ({} bytes)",
            self.allocated,
            self.capacity
        );
        Ok(StreamBuffer::new(handle, kind, self.capacity))
    }

    /// Record a flushed buffer as used by the frame being built.
    pub fn retire(&mut self, buffer: StreamBuffer<B>) {
        self.used.push(buffer);
    }

    /// Return a buffer the GPU never saw straight to its free list.
    pub fn release(&mut self, mut buffer: StreamBuffer<B>) {
        buffer.reset();
        self.free_list(buffer.kind).push(buffer);
    }

    /// Release every buffer the current frame used without submitting it.
    pub fn abandon_frame(&mut self) {
        for buffer in std::mem::take(&mut self.used) {
            self.release(buffer);
        }
    }

    /// Park the current frame's used buffers under a new submission id and
    /// return the signal that recycles them.
    pub fn begin_submission(&mut self) -> CompletionSignal {
        let id = SubmissionId(self.next_submission);
        self.next_submission += 1;
        let used = std::mem::take(&mut self.used);
        log::trace!("{id:?} holds {} buffers", used.len());
        self.in_flight.insert(id, used);
        CompletionSignal::new(id, self.sender.clone())
    }

    /// Move a completed submission's buffers to the free lists. Returns how
    /// many buffers were recycled.
    pub fn recycle(&mut self, id: SubmissionId) -> usize {
        let Some(buffers) = self.in_flight.remove(&id) else {
            log::warn!("completion for unknown {id:?}");
            return 0;
        };
        let count = buffers.len();
        for buffer in buffers {
            self.release(buffer);
        }
        count
    }

    /// Recycle every submission whose signal has fired. Returns how many
    /// submissions completed.
    pub fn drain_completions(&mut self) -> usize {
        let mut completed = 0;
        while let Ok(id) = self.receiver.try_recv() {
            self.recycle(id);
            completed += 1;
        }
        completed
    }

    /// Block until one more submission completes, then recycle it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CompletionTimeout`] naming the oldest outstanding
    /// submission if nothing completes within `timeout`.
    pub fn wait_for_completion(&mut self, timeout: Duration) -> Result<()> {
        match self.receiver.recv_timeout(timeout) {
            Ok(id) => {
                self.recycle(id);
                Ok(())
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                Err(Error::CompletionTimeout {
                    submission: self.oldest_in_flight().unwrap_or(SubmissionId(0)),
                })
            }
        }
    }

    /// Number of submissions whose buffers are still parked.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// The oldest submission still in flight.
    #[must_use]
    pub fn oldest_in_flight(&self) -> Option<SubmissionId> {
        self.in_flight.keys().next().copied()
    }

    /// Number of free buffers of `kind`.
    #[must_use]
    pub fn free_count(&self, kind: BufferKind) -> usize {
        match kind {
            BufferKind::Vertex => self.free_vertex.len(),
            BufferKind::Attribute => self.free_attribute.len(),
        }
    }

    /// Handles of the free buffers of `kind`.
    pub fn free_handles(&self, kind: BufferKind) -> impl Iterator<Item = &B> {
        let list = match kind {
            BufferKind::Vertex => &self.free_vertex,
            BufferKind::Attribute => &self.free_attribute,
        };
        list.iter().map(StreamBuffer::handle)
    }

    /// Handles of the buffers parked under `id`.
    pub fn in_flight_handles(&self, id: SubmissionId) -> impl Iterator<Item = &B> {
        self.in_flight
            .get(&id)
            .into_iter()
            .flatten()
            .map(StreamBuffer::handle)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::device::{CommandList, RecordingDevice};

    #[test]
    fn capacity_check_is_inclusive() {
        assert!(can_append(16, 8, 8));
        assert!(!can_append(16, 8, 9));
        assert!(!can_append(16, usize::MAX, 1));
    }

    #[test]
    fn append_advances_utilization() {
        let mut buffer = StreamBuffer::new((), BufferKind::Vertex, 8);
        buffer.append(&[1, 2, 3]);
        assert_eq!(buffer.utilization(), 3);
        assert_eq!(buffer.remaining(), 5);
        assert_eq!(buffer.contents(), &[1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "stream buffer overflow")]
    fn overflowing_append_panics() {
        let mut buffer = StreamBuffer::new((), BufferKind::Vertex, 4);
        buffer.append(&[0; 3]);
        buffer.append(&[0; 2]);
    }

    #[test]
    fn acquire_prefers_free_buffers() {
        let mut device = RecordingDevice::new();
        let mut pool = BufferPool::new(64);
        let first = pool.acquire(&mut device, BufferKind::Vertex).unwrap();
        let handle = *first.handle();
        pool.release(first);
        let again = pool.acquire(&mut device, BufferKind::Vertex).unwrap();
        assert_eq!(*again.handle(), handle);
        assert_eq!(pool.allocated(), 1);
        // Kinds never share a free list.
        pool.release(again);
        pool.acquire(&mut device, BufferKind::Attribute).unwrap();
        assert_eq!(pool.allocated(), 2);
    }

    #[test]
    fn released_buffers_come_back_empty() {
        let mut device = RecordingDevice::new();
        let mut pool = BufferPool::new(64);
        let mut buffer = pool.acquire(&mut device, BufferKind::Vertex).unwrap();
        buffer.append(&[9; 10]);
        pool.release(buffer);
        let buffer = pool.acquire(&mut device, BufferKind::Vertex).unwrap();
        assert_eq!(buffer.utilization(), 0);
    }

    #[test]
    fn in_flight_buffers_stay_out_of_the_free_list_until_completion() {
        let mut device = RecordingDevice::new();
        let mut pool = BufferPool::new(64);

        let buffer = pool.acquire(&mut device, BufferKind::Vertex).unwrap();
        let handle = *buffer.handle();
        pool.retire(buffer);
        let signal = pool.begin_submission();
        let id = signal.id();
        device.submit(CommandList::default(), signal).unwrap();

        for _ in 0..3 {
            device.poll(true).unwrap();
            assert_eq!(pool.drain_completions(), 0);
            assert!(pool.free_handles(BufferKind::Vertex).all(|h| *h != handle));
            assert!(pool.in_flight_handles(id).any(|h| *h == handle));
            // A frame built meanwhile must get a different buffer.
            let other = pool.acquire(&mut device, BufferKind::Vertex).unwrap();
            assert_ne!(*other.handle(), handle);
            pool.release(other);
        }

        assert!(device.complete(id));
        assert_eq!(pool.drain_completions(), 1);
        assert!(pool.free_handles(BufferKind::Vertex).any(|h| *h == handle));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn completions_may_arrive_out_of_order() {
        let mut device = RecordingDevice::new();
        let mut pool = BufferPool::new(64);
        let mut ids = Vec::new();
        for _ in 0..3 {
            let buffer = pool.acquire(&mut device, BufferKind::Vertex).unwrap();
            pool.retire(buffer);
            let signal = pool.begin_submission();
            ids.push(signal.id());
            device.submit(CommandList::default(), signal).unwrap();
        }
        assert!(device.complete(ids[2]));
        assert_eq!(pool.drain_completions(), 1);
        assert_eq!(pool.oldest_in_flight(), Some(ids[0]));
        assert_eq!(pool.free_count(BufferKind::Vertex), 1);
    }

    #[test]
    fn signals_fired_from_other_threads_are_drained() {
        let mut device = RecordingDevice::new();
        let mut pool = BufferPool::new(64);
        let buffer = pool.acquire(&mut device, BufferKind::Attribute).unwrap();
        pool.retire(buffer);
        let signal = pool.begin_submission();
        std::thread::spawn(move || signal.complete()).join().unwrap();
        pool.wait_for_completion(Duration::from_secs(5)).unwrap();
        assert_eq!(pool.free_count(BufferKind::Attribute), 1);
    }

    #[test]
    fn waiting_without_completions_times_out() {
        let mut pool: BufferPool<()> = BufferPool::new(64);
        let _signal = pool.begin_submission();
        let err = pool.wait_for_completion(Duration::from_millis(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::CompletionTimeout {
                submission: SubmissionId(0)
            }
        ));
    }

    #[test]
    fn abandoned_frames_return_buffers_immediately() {
        let mut device = RecordingDevice::new();
        let mut pool = BufferPool::new(64);
        let buffer = pool.acquire(&mut device, BufferKind::Vertex).unwrap();
        pool.retire(buffer);
        pool.abandon_frame();
        assert_eq!(pool.free_count(BufferKind::Vertex), 1);
        assert_eq!(pool.in_flight(), 0);
    }
}
