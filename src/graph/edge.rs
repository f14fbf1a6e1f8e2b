//! Edges: bounded record channels between components.
//!
//! An edge carries serialized records as immutable frames over a crossbeam
//! channel. The producer holds an [`OutputPort`], the consumer an
//! [`InputPort`].
//!
//! ## Contracts
//!
//! - FIFO per edge; a full bounded channel blocks the writer (backpressure).
//! - EOF is an explicit frame. Once read, EOF is sticky. A producer that
//!   disappears without sending EOF is observed as EOF too, so a crashed
//!   component never leaves its consumers hanging.
//! - Writing to an edge whose consumer is gone fails with `PortClosed`.
//! - Every blocking operation also watches the graph stop signal and returns
//!   `Aborted` as soon as a stop is requested.

use crate::error::{FlowError, Result};
use crate::graph::id::EdgeId;
use crate::graph::stop::StopSignal;
use crate::record::{Record, Schema};
use bytes::{Bytes, BytesMut};
use crossbeam_channel::{select, Receiver, Select, Sender, TryRecvError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One message on an edge.
#[derive(Debug, Clone)]
pub(crate) enum Frame {
    Record(Bytes),
    Eof,
}

/// Counters shared by both ends of an edge.
#[derive(Debug, Default)]
pub struct EdgeStats {
    records_written: AtomicU64,
    bytes_written: AtomicU64,
    records_read: AtomicU64,
    bytes_read: AtomicU64,
}

impl EdgeStats {
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn records_read(&self) -> u64 {
        self.records_read.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Records written but not yet read.
    pub fn buffered(&self) -> u64 {
        self.records_written().saturating_sub(self.records_read())
    }
}

/// Per-edge channel settings.
#[derive(Debug, Clone, Copy)]
pub struct EdgeOptions {
    /// Bounded capacity in records; `None` for an unbounded edge
    pub capacity: Option<usize>,
    /// Largest serialized record the edge accepts
    pub record_limit: usize,
}

/// Create the two ends of an edge.
pub fn channel(
    id: EdgeId,
    schema: Arc<Schema>,
    options: EdgeOptions,
    stop: StopSignal,
) -> (OutputPort, InputPort) {
    let (tx, rx) = match options.capacity {
        Some(cap) => crossbeam_channel::bounded(cap.max(1)),
        None => crossbeam_channel::unbounded(),
    };
    let stats = Arc::new(EdgeStats::default());

    let output = OutputPort {
        edge: id,
        schema: Arc::clone(&schema),
        tx,
        stop: stop.clone(),
        stats: Arc::clone(&stats),
        scratch: BytesMut::new(),
        record_limit: options.record_limit,
        eof_sent: false,
    };
    let input = InputPort {
        edge: id,
        schema,
        rx,
        stop,
        stats,
        peeked: None,
        eof: false,
    };
    (output, input)
}

/// Consumer end of an edge.
pub struct InputPort {
    edge: EdgeId,
    schema: Arc<Schema>,
    rx: Receiver<Frame>,
    stop: StopSignal,
    stats: Arc<EdgeStats>,
    peeked: Option<Frame>,
    eof: bool,
}

impl InputPort {
    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn stats(&self) -> &EdgeStats {
        &self.stats
    }

    /// Records consumed from this port so far.
    pub fn records_read(&self) -> u64 {
        self.stats.records_read()
    }

    /// Blocking receive of the next frame, honouring the stop signal.
    fn next_frame(&mut self) -> Result<Frame> {
        if let Some(frame) = self.peeked.take() {
            return Ok(frame);
        }
        if !self.stop.is_running() {
            return Err(FlowError::Aborted);
        }
        select! {
            recv(self.rx) -> msg => Ok(msg.unwrap_or(Frame::Eof)),
            recv(self.stop.cancelled()) -> _ => Err(FlowError::Aborted),
        }
    }

    /// Read the next serialized record. `None` once EOF has been reached;
    /// every later call returns `None` as well.
    pub fn read_raw(&mut self) -> Result<Option<Bytes>> {
        if self.eof {
            return Ok(None);
        }
        match self.next_frame()? {
            Frame::Record(bytes) => {
                self.stats.records_read.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_read
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                Ok(Some(bytes))
            }
            Frame::Eof => {
                self.eof = true;
                Ok(None)
            }
        }
    }

    /// Read the next record into `record`. Returns `false` at EOF (sticky).
    ///
    /// Blocks while the edge is empty and the producer has not finished.
    pub fn read_record(&mut self, record: &mut Record) -> Result<bool> {
        match self.read_raw()? {
            Some(bytes) => {
                let mut buf = &bytes[..];
                record.deserialize(&mut buf)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn peek_frame(&mut self) -> Option<&Frame> {
        if self.peeked.is_none() && !self.eof {
            self.peeked = match self.rx.try_recv() {
                Ok(frame) => Some(frame),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Frame::Eof),
            };
        }
        self.peeked.as_ref()
    }

    /// Whether a record can be read without blocking.
    pub fn has_data(&mut self) -> bool {
        matches!(self.peek_frame(), Some(Frame::Record(_)))
    }

    /// Whether the next read would report EOF. Never blocks.
    pub fn is_eof(&mut self) -> bool {
        self.eof || matches!(self.peek_frame(), Some(Frame::Eof))
    }

    /// Inverse of [`is_eof`](Self::is_eof).
    pub fn is_open(&mut self) -> bool {
        !self.is_eof()
    }

    /// Whether the port has been read up to EOF.
    pub fn reached_eof(&self) -> bool {
        self.eof
    }

    /// Block until the producer finishes and report whether records were left
    /// unread. Used by the runtime after a component returns.
    pub(crate) fn drain_check(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        match self.next_frame()? {
            Frame::Eof => {
                self.eof = true;
                Ok(false)
            }
            frame @ Frame::Record(_) => {
                self.peeked = Some(frame);
                Ok(true)
            }
        }
    }
}

/// Producer end of an edge.
pub struct OutputPort {
    edge: EdgeId,
    schema: Arc<Schema>,
    tx: Sender<Frame>,
    stop: StopSignal,
    stats: Arc<EdgeStats>,
    scratch: BytesMut,
    record_limit: usize,
    eof_sent: bool,
}

impl OutputPort {
    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn stats(&self) -> &EdgeStats {
        &self.stats
    }

    pub fn records_written(&self) -> u64 {
        self.stats.records_written()
    }

    pub fn record_limit(&self) -> usize {
        self.record_limit
    }

    /// Serialize a record into a shareable frame, enforcing the size limit.
    pub(crate) fn encode(&mut self, record: &Record) -> Result<Bytes> {
        encode_frame(&mut self.scratch, record, self.record_limit)
    }

    fn send(&mut self, frame: Frame) -> Result<()> {
        if !self.stop.is_running() {
            return Err(FlowError::Aborted);
        }
        select! {
            send(self.tx, frame) -> res => res.map_err(|_| {
                FlowError::PortClosed(format!(
                    "consumer of edge {:?} has gone away",
                    self.edge
                ))
            }),
            recv(self.stop.cancelled()) -> _ => Err(FlowError::Aborted),
        }
    }

    /// Write an already serialized record.
    pub fn write_raw(&mut self, bytes: Bytes) -> Result<()> {
        if self.eof_sent {
            return Err(FlowError::PortClosed(format!(
                "write to edge {:?} after EOF",
                self.edge
            )));
        }
        let len = bytes.len() as u64;
        self.send(Frame::Record(bytes))?;
        self.stats.records_written.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_written.fetch_add(len, Ordering::Relaxed);
        Ok(())
    }

    /// Write a record. Blocks while the edge is full.
    ///
    /// The record is serialized before sending, so the caller may reuse it
    /// immediately.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let bytes = self.encode(record)?;
        self.write_raw(bytes)
    }

    /// Signal that no more records follow. Idempotent.
    ///
    /// If the graph is stopping or the consumer is gone the frame is dropped;
    /// the consumer then sees EOF when this port is dropped.
    pub fn set_eof(&mut self) {
        if self.eof_sent {
            return;
        }
        self.eof_sent = true;
        if let Err(e) = self.send(Frame::Eof) {
            tracing::debug!(edge = ?self.edge, "EOF not delivered: {}", e);
        }
    }

    pub fn is_eof(&self) -> bool {
        self.eof_sent
    }
}

pub(crate) fn encode_frame(scratch: &mut BytesMut, record: &Record, limit: usize) -> Result<Bytes> {
    let size = record.serialized_size();
    if size > limit {
        return Err(FlowError::BufferOverflow {
            needed: size,
            available: limit,
        });
    }
    scratch.clear();
    scratch.reserve(size);
    record.serialize(scratch)?;
    Ok(scratch.split().freeze())
}

/// Write one record to every port, serializing it only once.
///
/// Each consumer receives its own reference to the same immutable frame.
pub fn broadcast(outputs: &mut [OutputPort], record: &Record) -> Result<()> {
    let Some(first) = outputs.first_mut() else {
        return Ok(());
    };
    let bytes = first.encode(record)?;
    for port in outputs.iter_mut() {
        port.write_raw(bytes.clone())?;
    }
    Ok(())
}

/// Signal EOF on every port.
pub fn broadcast_eof(outputs: &mut [OutputPort]) {
    for port in outputs {
        port.set_eof();
    }
}

/// Block until one of the selected input ports has a frame ready (a record,
/// EOF or a vanished producer) or the graph is stopped.
pub fn wait_any(ports: &mut [InputPort], candidates: &[usize], stop: &StopSignal) -> Result<()> {
    if candidates
        .iter()
        .any(|&i| ports[i].peeked.is_some() || ports[i].eof)
    {
        return Ok(());
    }
    if !stop.is_running() {
        return Err(FlowError::Aborted);
    }

    let mut sel = Select::new();
    for &i in candidates {
        sel.recv(&ports[i].rx);
    }
    let stop_index = sel.recv(stop.cancelled());
    let ready = sel.ready();
    if ready == stop_index {
        return Err(FlowError::Aborted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::stop::stop_pair;
    use crate::record::{FieldDef, FieldType};
    use serial_test::serial;
    use std::time::{Duration, Instant};

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new("v", vec![FieldDef::new("v", FieldType::Integer)]).unwrap())
    }

    fn record(v: i32) -> Record {
        let mut r = Record::new(schema());
        r.set(0, v).unwrap();
        r
    }

    fn edge(capacity: Option<usize>, stop: StopSignal) -> (OutputPort, InputPort) {
        channel(
            EdgeId(0),
            schema(),
            EdgeOptions {
                capacity,
                record_limit: 1024,
            },
            stop,
        )
    }

    fn value(r: &Record) -> i32 {
        r.get(0).and_then(|v| v.as_i64()).unwrap() as i32
    }

    #[test]
    fn test_fifo_then_sticky_eof() {
        let (_h, stop) = stop_pair();
        let (mut out, mut inp) = edge(Some(8), stop);
        for v in [1, 2, 3] {
            out.write_record(&record(v)).unwrap();
        }
        out.set_eof();
        out.set_eof();

        let mut r = Record::new(schema());
        let mut seen = Vec::new();
        while inp.read_record(&mut r).unwrap() {
            seen.push(value(&r));
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(!inp.read_record(&mut r).unwrap());
        assert!(!inp.read_record(&mut r).unwrap());
        assert!(inp.is_eof());
        assert_eq!(inp.stats().records_read(), 3);
        assert_eq!(inp.stats().buffered(), 0);
    }

    #[test]
    fn test_dropped_producer_is_eof() {
        let (_h, stop) = stop_pair();
        let (mut out, mut inp) = edge(Some(4), stop);
        out.write_record(&record(9)).unwrap();
        drop(out);

        let mut r = Record::new(schema());
        assert!(inp.read_record(&mut r).unwrap());
        assert!(!inp.read_record(&mut r).unwrap());
    }

    #[test]
    fn test_write_to_dropped_consumer_fails_loudly() {
        let (_h, stop) = stop_pair();
        let (mut out, inp) = edge(Some(4), stop);
        drop(inp);
        let err = out.write_record(&record(1)).unwrap_err();
        assert!(matches!(err, FlowError::PortClosed(_)));
    }

    #[test]
    fn test_write_after_eof_fails() {
        let (_h, stop) = stop_pair();
        let (mut out, _inp) = edge(Some(4), stop);
        out.set_eof();
        assert!(matches!(
            out.write_record(&record(1)),
            Err(FlowError::PortClosed(_))
        ));
    }

    #[test]
    fn test_oversized_record_overflows() {
        let (_h, stop) = stop_pair();
        let big = Arc::new(Schema::new("s", vec![FieldDef::new("s", FieldType::String)]).unwrap());
        let (mut out, _inp) = channel(
            EdgeId(1),
            Arc::clone(&big),
            EdgeOptions {
                capacity: Some(1),
                record_limit: 16,
            },
            stop,
        );
        let mut r = Record::new(big);
        r.set(0, "x".repeat(64)).unwrap();
        assert!(matches!(
            out.write_record(&r),
            Err(FlowError::BufferOverflow { .. })
        ));
    }

    #[test]
    fn test_has_data_does_not_consume() {
        let (_h, stop) = stop_pair();
        let (mut out, mut inp) = edge(Some(4), stop);
        assert!(!inp.has_data());
        assert!(inp.is_open());
        out.write_record(&record(5)).unwrap();
        assert!(inp.has_data());
        assert!(inp.has_data());

        let mut r = Record::new(schema());
        assert!(inp.read_record(&mut r).unwrap());
        assert_eq!(value(&r), 5);
        out.set_eof();
        assert!(!inp.has_data());
        assert!(inp.is_eof());
    }

    #[test]
    #[serial]
    fn test_backpressure_releases_after_one_read() {
        let (_h, stop) = stop_pair();
        let (mut out, mut inp) = edge(Some(2), stop);
        out.write_record(&record(1)).unwrap();
        out.write_record(&record(2)).unwrap();

        std::thread::scope(|s| {
            let writer = s.spawn(move || {
                let started = Instant::now();
                out.write_record(&record(3)).unwrap();
                started.elapsed()
            });

            std::thread::sleep(Duration::from_millis(100));
            assert!(!writer.is_finished());

            let mut r = Record::new(schema());
            assert!(inp.read_record(&mut r).unwrap());
            let blocked_for = writer.join().unwrap();
            assert!(blocked_for >= Duration::from_millis(90));
        });
    }

    #[test]
    #[serial]
    fn test_stop_wakes_blocked_reader_and_writer() {
        let (handle, stop) = stop_pair();
        let (mut out_a, mut inp_a) = edge(Some(1), stop.clone());
        let (mut out_b, _inp_b) = edge(Some(1), stop);
        out_b.write_record(&record(1)).unwrap();

        std::thread::scope(|s| {
            let reader = s.spawn(move || {
                let mut r = Record::new(schema());
                inp_a.read_record(&mut r)
            });
            let writer = s.spawn(move || out_b.write_record(&record(2)));
            std::thread::sleep(Duration::from_millis(50));
            handle.stop();

            assert!(matches!(reader.join().unwrap(), Err(FlowError::Aborted)));
            assert!(matches!(writer.join().unwrap(), Err(FlowError::Aborted)));
        });
        out_a.set_eof();
    }

    #[test]
    fn test_broadcast_shares_one_frame() {
        let (_h, stop) = stop_pair();
        let (o1, mut i1) = edge(Some(4), stop.clone());
        let (o2, mut i2) = edge(Some(4), stop);
        let mut outs = vec![o1, o2];
        broadcast(&mut outs, &record(42)).unwrap();
        broadcast_eof(&mut outs);

        let a = i1.read_raw().unwrap().unwrap();
        let b = i2.read_raw().unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert!(i1.read_raw().unwrap().is_none());
        assert!(i2.read_raw().unwrap().is_none());
    }

    #[test]
    #[serial]
    fn test_wait_any_wakes_on_second_port() {
        let (_h, stop) = stop_pair();
        let (_o1, i1) = edge(Some(4), stop.clone());
        let (mut o2, i2) = edge(Some(4), stop.clone());
        let mut ports = vec![i1, i2];

        std::thread::scope(|s| {
            s.spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                o2.write_record(&record(1)).unwrap();
            });
            wait_any(&mut ports, &[0, 1], &stop).unwrap();
        });
        assert!(!ports[0].has_data());
        assert!(ports[1].has_data());
    }
}
