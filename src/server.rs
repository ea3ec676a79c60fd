//! TCP server: accept loop plus per-connection reader and writer tasks.
//!
//! Each connection splits into a reader (record reassembly, call decode,
//! dispatch spawn) and a writer (reply framing). Replies go out in the
//! order their back-end futures complete, not call order; pipelining
//! correctness belongs to the client's xid correlator. A malformed
//! message is fatal to its connection only; unknown procedures are
//! answered and the connection stays up.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::{self, ReplyFrame};
use crate::framing::record::{RecordCodec, RecordError};
use crate::pcap::ring::RingSink;
use crate::pcap::sink::FileSinkHandle;
use crate::pcap::writer::{CaptureAddresses, PcapWriter};
use crate::pcap::{CaptureSink, EmissionMode};
use crate::quiesce::{ChildRegistration, QuiesceController};
use crate::rpc::{FragmentHeader, MAX_FRAGMENT_LEN};
use crate::serializer::PAD;
use crate::vfs::Vfs;

/// Where every connection's capture records go.
#[derive(Clone)]
pub enum CaptureSinkHandle {
    /// Stream records straight into the capture file.
    File(FileSinkHandle),
    /// Hold the most recent records in a shared ring; whoever owns the
    /// ring decides when to dump them.
    Ring(RingSink),
}

impl CaptureSink for CaptureSinkHandle {
    fn record(&mut self, chunk: Bytes) {
        match self {
            CaptureSinkHandle::File(handle) => handle.record(chunk),
            CaptureSinkHandle::Ring(ring) => ring.record(chunk),
        }
    }
}

/// Optional per-server packet capture tap.
#[derive(Clone)]
pub struct CaptureOptions {
    pub sink: CaptureSinkHandle,
    pub mode: EmissionMode,
}

type SharedCapture = Arc<Mutex<PcapWriter<CaptureSinkHandle>>>;

/// NFSv3 + MOUNT server over one listening socket.
pub struct Server {
    vfs: Arc<dyn Vfs>,
    quiesce: Arc<QuiesceController>,
    capture: Option<CaptureOptions>,
}

impl Server {
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self { vfs, quiesce: Arc::new(QuiesceController::new()), capture: None }
    }

    /// Mirrors every connection's traffic into the capture sink.
    pub fn with_capture(mut self, capture: CaptureOptions) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Shutdown coordinator for this server; initiate shutdown through it.
    pub fn controller(&self) -> Arc<QuiesceController> {
        Arc::clone(&self.quiesce)
    }

    /// Accepts connections until shutdown is initiated. Returns once the
    /// acceptor closes; connection drain is observed via the controller.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        let accept_token = self.quiesce.acceptor_token();
        loop {
            tokio::select! {
                _ = accept_token.cancelled() => {
                    info!("acceptor closing");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (socket, peer) = accepted?;
                    socket.set_nodelay(true)?;
                    let Ok(registration) = self.quiesce.register_child() else {
                        return Ok(());
                    };
                    info!(%peer, "connection accepted");
                    tokio::spawn(handle_connection(
                        Arc::clone(&self.vfs),
                        socket,
                        peer,
                        registration,
                        self.capture.clone(),
                    ));
                }
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CloseReason {
    PeerClosed,
    Quiesced,
    ParseError,
}

async fn handle_connection(
    vfs: Arc<dyn Vfs>,
    socket: TcpStream,
    peer: SocketAddr,
    registration: ChildRegistration,
    capture: Option<CaptureOptions>,
) {
    let local = socket.local_addr().ok();
    let capture = capture.map(|options| {
        let addresses = CaptureAddresses::from_transport(local, Some(peer));
        let writer = Arc::new(Mutex::new(PcapWriter::new(options.sink, addresses)));
        writer.lock().expect("capture poisoned").connection_established();
        (writer, options.mode)
    });

    let (read_half, write_half) = socket.into_split();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    let abort = CancellationToken::new();

    let writer_task = tokio::spawn(write_replies(
        write_half,
        reply_rx,
        capture.clone(),
        abort.clone(),
    ));

    let reason = read_calls(
        Arc::clone(&vfs),
        read_half,
        reply_tx,
        registration.quiesce_signal(),
        capture.as_ref().map(|(writer, _)| Arc::clone(writer)),
    )
    .await;

    if reason == CloseReason::ParseError {
        // Error path: tear the transport down, pending replies included.
        abort.cancel();
    }
    let _ = writer_task.await;

    if let Some((writer, _)) = capture {
        writer
            .lock()
            .expect("capture poisoned")
            .connection_closed(reason != CloseReason::PeerClosed);
    }
    debug!(%peer, ?reason, "connection closed");
    drop(registration);
}

async fn read_calls(
    vfs: Arc<dyn Vfs>,
    read_half: OwnedReadHalf,
    reply_tx: mpsc::UnboundedSender<ReplyFrame>,
    quiesce: CancellationToken,
    capture: Option<SharedCapture>,
) -> CloseReason {
    let mut frames = FramedRead::new(read_half, RecordCodec::default());
    loop {
        tokio::select! {
            _ = quiesce.cancelled() => {
                debug!("quiescing: no longer reading calls");
                return CloseReason::Quiesced;
            }
            frame = frames.next() => match frame {
                None => return CloseReason::PeerClosed,
                Some(Ok(message)) => {
                    if let Some(writer) = &capture {
                        let mut wire = BytesMut::with_capacity(4 + message.len());
                        wire.put_u32(FragmentHeader::new(message.len() as u32, true).to_wire());
                        wire.extend_from_slice(&message);
                        writer.lock().expect("capture poisoned").inbound_data(&wire);
                    }
                    match dispatch::decode_call(&message) {
                        Ok(decoded) => {
                            debug!(xid = decoded.xid, "dispatching call");
                            let vfs = Arc::clone(&vfs);
                            let reply_tx = reply_tx.clone();
                            tokio::spawn(async move {
                                let frame = dispatch::execute(vfs, decoded).await;
                                // The connection may be gone by now; the
                                // reply is simply dropped then.
                                let _ = reply_tx.send(frame);
                            });
                        }
                        Err(error) => {
                            warn!(%error, "malformed call; closing connection");
                            return CloseReason::ParseError;
                        }
                    }
                }
                Some(Err(RecordError::LeftOver(left))) => {
                    debug!(bytes = left.0.len(), "stream closed mid-record");
                    return CloseReason::PeerClosed;
                }
                Some(Err(error)) => {
                    warn!(%error, "record framing failed; closing connection");
                    return CloseReason::ParseError;
                }
            }
        }
    }
}

fn frame_wire_bytes(frame: &ReplyFrame) -> Bytes {
    let total = frame.wire_len();
    let mut wire = BytesMut::with_capacity(4 + total);
    wire.put_u32(FragmentHeader::new(total as u32, true).to_wire());
    match frame {
        ReplyFrame::Full(bytes) => wire.extend_from_slice(bytes),
        ReplyFrame::Split { prefix, data, fill } => {
            wire.extend_from_slice(prefix);
            wire.extend_from_slice(data);
            wire.extend_from_slice(&[PAD; 3][..*fill]);
        }
    }
    wire.freeze()
}

async fn write_frame(write_half: &mut OwnedWriteHalf, frame: &ReplyFrame) -> io::Result<()> {
    let total = frame.wire_len();
    if total > MAX_FRAGMENT_LEN as usize {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "reply exceeds fragment bound"));
    }
    match frame {
        ReplyFrame::Full(bytes) => {
            let mut head = BytesMut::with_capacity(4 + bytes.len());
            head.put_u32(FragmentHeader::new(total as u32, true).to_wire());
            head.extend_from_slice(bytes);
            write_half.write_all(&head).await
        }
        ReplyFrame::Split { prefix, data, fill } => {
            let mut head = BytesMut::with_capacity(4 + prefix.len());
            head.put_u32(FragmentHeader::new(total as u32, true).to_wire());
            head.extend_from_slice(prefix);
            write_half.write_all(&head).await?;
            write_half.write_all(data).await?;
            write_half.write_all(&[PAD; 3][..*fill]).await
        }
    }
}

async fn write_replies(
    mut write_half: OwnedWriteHalf,
    mut reply_rx: mpsc::UnboundedReceiver<ReplyFrame>,
    capture: Option<(SharedCapture, EmissionMode)>,
    abort: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = abort.cancelled() => break,
            frame = reply_rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        if let Some((writer, EmissionMode::WhenIssued)) = &capture {
            writer
                .lock()
                .expect("capture poisoned")
                .outbound_data(&frame_wire_bytes(&frame));
        }
        match write_frame(&mut write_half, &frame).await {
            Ok(()) => {
                if let Some((writer, EmissionMode::WhenCompleted)) = &capture {
                    writer
                        .lock()
                        .expect("capture poisoned")
                        .outbound_data(&frame_wire_bytes(&frame));
                }
            }
            Err(error) => {
                warn!(%error, "reply write failed");
                break;
            }
        }
    }
    let _ = write_half.shutdown().await;
}
