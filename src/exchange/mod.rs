//! Request/response pairing over a pipelined transport.
//!
//! An [`Exchange`] buffers one response promise per in-flight request and
//! runs a three-state machine: operational, inactive (clean close) and
//! errored. Transitions are one-way; once the machine leaves operational
//! the buffer is empty and every later write is refused immediately.
//!
//! The exchange owns no I/O. Callers forward the request downstream when
//! [`Exchange::write`] says so, feed inbound responses to
//! [`Exchange::read`], and report transport events via
//! [`Exchange::error_caught`] / [`Exchange::channel_inactive`]. Closing
//! the transport after an error is the caller's job.

pub mod buffer;

use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use buffer::{FifoBuffer, KeyedBuffer, PromiseBuffer};

/// Terminal failure delivered to response promises.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    /// The write happened after the channel had already closed cleanly.
    #[error("channel closed before the request could be written")]
    ChannelClosed,

    /// The channel closed while this request was still waiting.
    #[error("channel closed before receiving a response")]
    ClosedBeforeResponse,

    /// The transport failed; every pending and future promise shares the
    /// same underlying error.
    #[error("transport error: {0}")]
    Transport(Arc<std::io::Error>),
}

impl From<std::io::Error> for ExchangeError {
    fn from(error: std::io::Error) -> Self {
        ExchangeError::Transport(Arc::new(error))
    }
}

/// Anomalies the reading side surfaces to its caller while operational.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadAnomaly<Id> {
    /// A response arrived with nothing outstanding.
    #[error("response arrived on an empty buffer")]
    ResponseOnEmptyBuffer,

    /// A response arrived for an id nobody is waiting on.
    #[error("response for unknown request id")]
    ResponseForInvalidRequest(Id),
}

/// Completion side of one request: receives the response or the failure.
pub type Promise<Resp> = oneshot::Sender<Result<Resp, ExchangeError>>;

#[derive(Debug, Clone)]
enum State {
    Operational,
    Inactive,
    Errored(ExchangeError),
}

/// Exchange with ordered (FIFO) response matching.
pub type OrderedExchange<Resp> = Exchange<Resp, FifoBuffer<Resp>>;

/// Exchange with id-keyed, out-of-order response matching.
pub type KeyedExchange<Id, Resp> = Exchange<Resp, KeyedBuffer<Id, Resp>>;

/// The request/response state machine. See the module docs.
pub struct Exchange<Resp, B: PromiseBuffer<Resp>> {
    state: State,
    buffer: B,
    _resp: PhantomData<Resp>,
}

impl<Resp, B: PromiseBuffer<Resp>> Default for Exchange<Resp, B> {
    fn default() -> Self {
        Self { state: State::Operational, buffer: B::default(), _resp: PhantomData }
    }
}

impl<Resp, B: PromiseBuffer<Resp>> Exchange<Resp, B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts an outbound request. Returns `true` when the caller should
    /// forward the request downstream; otherwise the promise has already
    /// been failed with the machine's terminal state.
    pub fn write(&mut self, id: B::Id, promise: Promise<Resp>) -> bool {
        match &self.state {
            State::Operational => {
                self.buffer.insert(id, promise);
                true
            }
            State::Inactive => {
                let _ = promise.send(Err(ExchangeError::ChannelClosed));
                false
            }
            State::Errored(error) => {
                let _ = promise.send(Err(error.clone()));
                false
            }
        }
    }

    /// Delivers an inbound response to its promise. After a close or an
    /// error, responses are dropped silently.
    pub fn read(&mut self, id: &B::Id, response: Resp) -> Result<(), ReadAnomaly<B::Id>>
    where
        B::Id: Clone,
    {
        if !matches!(self.state, State::Operational) {
            return Ok(());
        }
        if self.buffer.count() == 0 {
            return Err(ReadAnomaly::ResponseOnEmptyBuffer);
        }
        match self.buffer.remove(id) {
            Some(promise) => {
                let _ = promise.send(Ok(response));
                Ok(())
            }
            None => Err(ReadAnomaly::ResponseForInvalidRequest(id.clone())),
        }
    }

    /// Transport failure: fail every pending promise with `error` and
    /// refuse all future writes with the same error.
    pub fn error_caught(&mut self, error: ExchangeError) {
        if !matches!(self.state, State::Operational) {
            return;
        }
        for promise in self.buffer.drain() {
            let _ = promise.send(Err(error.clone()));
        }
        self.state = State::Errored(error);
    }

    /// Clean close: pending promises fail with
    /// [`ExchangeError::ClosedBeforeResponse`], later writes with
    /// [`ExchangeError::ChannelClosed`].
    pub fn channel_inactive(&mut self) {
        if !matches!(self.state, State::Operational) {
            return;
        }
        for promise in self.buffer.drain() {
            let _ = promise.send(Err(ExchangeError::ClosedBeforeResponse));
        }
        self.state = State::Inactive;
    }

    pub fn pending(&self) -> usize {
        self.buffer.count()
    }

    pub fn is_operational(&self) -> bool {
        matches!(self.state, State::Operational)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn promise<Resp>() -> (Promise<Resp>, oneshot::Receiver<Result<Resp, ExchangeError>>) {
        oneshot::channel()
    }

    #[test]
    fn ordered_replies_pop_in_call_order() {
        let mut exchange = OrderedExchange::<u32>::new();
        let (first_tx, mut first_rx) = promise();
        let (second_tx, mut second_rx) = promise();
        assert!(exchange.write((), first_tx));
        assert!(exchange.write((), second_tx));
        assert_eq!(exchange.pending(), 2);

        exchange.read(&(), 10).unwrap();
        exchange.read(&(), 20).unwrap();
        assert_eq!(first_rx.try_recv().unwrap().unwrap(), 10);
        assert_eq!(second_rx.try_recv().unwrap().unwrap(), 20);
        assert_eq!(exchange.pending(), 0);
    }

    #[test]
    fn keyed_replies_arrive_out_of_order() {
        let mut exchange = KeyedExchange::<u32, &'static str>::new();
        let (a_tx, mut a_rx) = promise();
        let (b_tx, mut b_rx) = promise();
        exchange.write(1, a_tx);
        exchange.write(2, b_tx);

        exchange.read(&2, "second").unwrap();
        exchange.read(&1, "first").unwrap();
        assert_eq!(a_rx.try_recv().unwrap().unwrap(), "first");
        assert_eq!(b_rx.try_recv().unwrap().unwrap(), "second");
    }

    #[test]
    fn response_on_empty_buffer_is_surfaced() {
        let mut exchange = OrderedExchange::<u32>::new();
        assert_eq!(exchange.read(&(), 1), Err(ReadAnomaly::ResponseOnEmptyBuffer));
    }

    #[test]
    fn response_for_unknown_id_is_surfaced() {
        let mut exchange = KeyedExchange::<u32, u32>::new();
        let (tx, _rx) = promise();
        exchange.write(5, tx);
        assert_eq!(exchange.read(&6, 0), Err(ReadAnomaly::ResponseForInvalidRequest(6)));
    }

    #[test]
    fn error_fails_pending_and_future_writes() {
        let mut exchange = OrderedExchange::<u32>::new();
        let (pending_tx, mut pending_rx) = promise();
        exchange.write((), pending_tx);

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "boom");
        exchange.error_caught(io.into());
        assert_eq!(exchange.pending(), 0);
        assert!(matches!(
            pending_rx.try_recv().unwrap(),
            Err(ExchangeError::Transport(_))
        ));

        let (late_tx, mut late_rx) = promise();
        assert!(!exchange.write((), late_tx));
        assert!(matches!(late_rx.try_recv().unwrap(), Err(ExchangeError::Transport(_))));
        assert!(!exchange.is_operational());
    }

    #[test]
    fn inactive_fails_pending_then_refuses_writes() {
        let mut exchange = OrderedExchange::<u32>::new();
        let (pending_tx, mut pending_rx) = promise();
        exchange.write((), pending_tx);

        exchange.channel_inactive();
        assert!(matches!(
            pending_rx.try_recv().unwrap(),
            Err(ExchangeError::ClosedBeforeResponse)
        ));
        assert_eq!(exchange.pending(), 0);

        let (late_tx, mut late_rx) = promise();
        assert!(!exchange.write((), late_tx));
        assert!(matches!(late_rx.try_recv().unwrap(), Err(ExchangeError::ChannelClosed)));
    }

    #[test]
    fn responses_after_shutdown_are_dropped_silently() {
        let mut exchange = OrderedExchange::<u32>::new();
        exchange.channel_inactive();
        assert!(exchange.read(&(), 1).is_ok());

        let mut errored = OrderedExchange::<u32>::new();
        errored.error_caught(std::io::Error::other("gone").into());
        assert!(errored.read(&(), 1).is_ok());
    }

    #[test]
    fn transitions_are_one_way() {
        let mut exchange = OrderedExchange::<u32>::new();
        exchange.error_caught(std::io::Error::other("first").into());
        exchange.channel_inactive();
        let (tx, mut rx) = promise();
        exchange.write((), tx);
        assert!(matches!(rx.try_recv().unwrap(), Err(ExchangeError::Transport(_))));
    }
}
