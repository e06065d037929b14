//! Runs an [`AcquisitionSession`] on its own thread.
//!
//! Callers talk to the session through a request channel and get results back on an event
//! channel, so a user interface never blocks on the serial port. Requests that arrive while a
//! cycle is in flight are handled once that cycle has finished.

use crate::{
    acquisition::{AbortHandle, AcquisitionSession, AcquisitionState, SessionSnapshot},
    error::{Error, Result, TimingViolation},
    response::Spectrum,
    timing::{TimingConfig, TimingRequest},
    transport::Transport,
};
use log::{debug, error, warn};
use scopeguard::ScopeGuard;
use std::thread::{self, JoinHandle};
use tokio::sync::{
    mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender},
    watch,
};

const THREAD_NAME: &str = "tcd1304-acquisition";

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Configure(TimingRequest),
    /// Repeat the last configured command
    Acquire,
    Stop,
    Reset,
    Shutdown,
}

#[derive(Debug)]
pub enum Event {
    Configured(TimingConfig),
    Rejected(TimingViolation),
    Spectrum(Spectrum),
    Failed(Error),
    Stopped,
    Reset,
}

pub struct AcquisitionWorker<T: Transport + Send + 'static> {
    requests: UnboundedSender<Request>,
    events: UnboundedReceiver<Event>,
    snapshot: watch::Receiver<SessionSnapshot>,
    abort: AbortHandle,
    thread: Option<JoinHandle<Result<T>>>,
}

impl<T: Transport + Send + 'static> AcquisitionWorker<T> {
    pub fn spawn(session: AcquisitionSession<T>) -> Result<Self> {
        let (requests, request_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(session.snapshot());
        let abort = session.abort_handle();

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(session, request_rx, event_tx, snapshot_tx))?;

        Ok(AcquisitionWorker {
            requests,
            events,
            snapshot,
            abort,
            thread: Some(thread),
        })
    }

    pub fn send(&self, request: Request) -> Result<()> {
        self.requests.send(request).map_err(|_| Error::WorkerStopped)
    }

    pub fn configure(&self, request: TimingRequest) -> Result<()> {
        self.send(Request::Configure(request))
    }

    pub fn acquire(&self) -> Result<()> {
        self.send(Request::Acquire)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Request::Stop)
    }

    pub fn reset(&self) -> Result<()> {
        self.send(Request::Reset)
    }

    /// Fails the cycle in flight without waiting for the request queue
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Must not be called from inside an async runtime
    pub fn blocking_next_event(&mut self) -> Option<Event> {
        self.events.blocking_recv()
    }

    /// Stops the worker after its current cycle and returns the disconnected transport
    pub fn shutdown(mut self) -> Result<T> {
        // The worker may already be gone after a panic, join reports that
        let _ = self.requests.send(Request::Shutdown);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| Error::WorkerStopped)?,
            None => Err(Error::WorkerStopped),
        }
    }
}

impl<T: Transport + Send + 'static> Drop for AcquisitionWorker<T> {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.abort.abort();
            let _ = self.requests.send(Request::Shutdown);
            if thread.join().is_err() {
                error!("Acquisition thread panicked");
            }
        }
    }
}

fn run<T: Transport>(
    session: AcquisitionSession<T>,
    mut requests: UnboundedReceiver<Request>,
    events: UnboundedSender<Event>,
    snapshot: watch::Sender<SessionSnapshot>,
) -> Result<T> {
    // Make sure the port is released even if the loop panics
    let mut session = scopeguard::guard(session, |mut session| {
        if let Err(e) = session.transport_mut().disconnect() {
            warn!("Failed to disconnect: {}", e);
        }
    });
    debug!("Acquisition worker started");

    loop {
        let request = if session.state() == AcquisitionState::Configuring {
            // Streaming, only pick up requests between cycles
            match requests.try_recv() {
                Ok(request) => Some(request),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        } else {
            match requests.blocking_recv() {
                Some(request) => Some(request),
                None => break,
            }
        };

        // Snapshots go out before the event that caused them
        match request {
            Some(Request::Shutdown) => break,
            Some(request) => {
                if let Some(event) = handle(&mut session, request) {
                    snapshot.send_replace(session.snapshot());
                    // Nobody listening is not an error for the device
                    let _ = events.send(event);
                }
            }
            None => {}
        }

        if session.state() == AcquisitionState::Configuring {
            let event = match session.cycle() {
                Ok(spectrum) => Event::Spectrum(spectrum),
                Err(e) => Event::Failed(e),
            };
            snapshot.send_replace(session.snapshot());
            let _ = events.send(event);
        }
    }

    debug!("Acquisition worker stopping");
    ScopeGuard::into_inner(session).close()
}

/// Acquire has no event of its own, the spectrum or failure that follows is its answer
fn handle<T: Transport>(session: &mut AcquisitionSession<T>, request: Request) -> Option<Event> {
    let event = match request {
        Request::Configure(request) => match session.configure(&request) {
            Ok(config) => Event::Configured(config),
            Err(Error::Timing(violation)) => Event::Rejected(violation),
            Err(e) => Event::Failed(e),
        },
        Request::Acquire => match session.arm() {
            Ok(()) => return None,
            Err(e) => Event::Failed(e),
        },
        Request::Stop => {
            session.stop();
            Event::Stopped
        }
        Request::Reset => match session.reset() {
            Ok(()) => Event::Reset,
            Err(e) => Event::Failed(e),
        },
        Request::Shutdown => return None,
    };
    Some(event)
}
