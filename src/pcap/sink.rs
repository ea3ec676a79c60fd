//! Synchronised capture file sink.
//!
//! One dedicated worker thread owns the file descriptor; every handle
//! funnels finished chunks to it over a channel, so records from many
//! connections never interleave mid-chunk. A fatal write error is
//! reported once through the error handler, after which further chunks
//! are dropped. [`FileSink::sync_close`] flushes, stops the worker and
//! must be called exactly once; consuming `self` enforces the at-most
//! side.

use std::fs::File;
use std::io::{self, ErrorKind, Write};
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use bytes::Bytes;
use tracing::warn;

use super::CaptureSink;

/// Called once with the first fatal write error.
pub type ErrorHandler = Box<dyn FnMut(io::Error) + Send>;

enum Command {
    Write(Bytes),
    Close(mpsc::SyncSender<()>),
}

/// Owner side of the sink. Cloneable [`FileSinkHandle`]s do the writing.
pub struct FileSink {
    tx: mpsc::Sender<Command>,
    worker: Option<thread::JoinHandle<()>>,
    closed: bool,
}

/// Write handle shared with capture producers.
#[derive(Clone)]
pub struct FileSinkHandle {
    tx: mpsc::Sender<Command>,
}

impl CaptureSink for FileSinkHandle {
    fn record(&mut self, chunk: Bytes) {
        // A closed or failed sink drops chunks; nothing to report here.
        let _ = self.tx.send(Command::Write(chunk));
    }
}

fn write_all_retrying(file: &mut File, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match file.write(buf) {
            Ok(0) => return Err(ErrorKind::WriteZero.into()),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn worker_loop(mut file: File, rx: mpsc::Receiver<Command>, mut on_error: ErrorHandler) {
    let mut failed = false;
    while let Ok(command) = rx.recv() {
        match command {
            Command::Write(chunk) => {
                if failed {
                    continue;
                }
                if let Err(error) = write_all_retrying(&mut file, &chunk) {
                    failed = true;
                    on_error(error);
                }
            }
            Command::Close(ack) => {
                if !failed {
                    if let Err(error) = file.sync_all() {
                        on_error(error);
                    }
                }
                let _ = ack.send(());
                return;
            }
        }
    }
}

impl FileSink {
    /// Creates the capture file and starts the worker. The file starts
    /// empty; writing the libpcap global header is the producer's first
    /// chunk.
    pub fn open(path: impl AsRef<Path>, on_error: ErrorHandler) -> io::Result<Self> {
        let file = File::create(path)?;
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("pcap-sink".to_string())
            .spawn(move || worker_loop(file, rx, on_error))?;
        Ok(Self { tx, worker: Some(worker), closed: false })
    }

    pub fn handle(&self) -> FileSinkHandle {
        FileSinkHandle { tx: self.tx.clone() }
    }

    /// Flushes buffered chunks to disk and stops the worker. Blocks the
    /// calling thread until the file is synced.
    pub fn sync_close(mut self) {
        self.closed = true;
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        if self.tx.send(Command::Close(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if !self.closed {
            warn!("pcap file sink dropped without sync_close; capture tail may be lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcap::file_header;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn chunks_arrive_in_order_and_survive_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.pcap");
        let sink = FileSink::open(&path, Box::new(|error| panic!("unexpected: {error}")))
            .unwrap();

        let mut handle = sink.handle();
        handle.record(file_header());
        handle.record(Bytes::from_static(b"first"));
        handle.record(Bytes::from_static(b"second"));
        sink.sync_close();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(&written[..24], &file_header()[..]);
        assert_eq!(&written[24..], b"firstsecond");
    }

    #[test]
    fn writes_after_close_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.pcap");
        let sink = FileSink::open(&path, Box::new(|_| {})).unwrap();
        let mut handle = sink.handle();
        handle.record(Bytes::from_static(b"kept"));
        sink.sync_close();

        handle.record(Bytes::from_static(b"lost"));
        assert_eq!(std::fs::read(&path).unwrap(), b"kept");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn error_handler_fires_once_then_writes_are_dropped() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let sink = FileSink::open(
            "/dev/full",
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        let mut handle = sink.handle();
        handle.record(Bytes::from_static(b"data"));
        handle.record(Bytes::from_static(b"more"));
        sink.sync_close();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
