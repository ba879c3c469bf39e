// Stream sessions
//
// A session delivers a chunk sequence to exactly one consumer, one chunk per
// tick, and ends with an explicit end frame unless it is aborted first.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Per-chunk delay used when no latency is configured.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Emitting,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Aborted)
    }
}

/// Why a session stopped before its end frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// The total timeout elapsed.
    TimedOut,
    /// The consumer went away.
    Disconnected,
    /// A frame could not be handed to the consumer.
    WriteFailed,
    /// The owning handle cancelled the session.
    Cancelled,
}

/// One unit of output handed to the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionFrame {
    Data(String),
    End,
}

/// Final state of a session once its task has returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub status: SessionStatus,
    /// Frames accepted by the consumer, end frame included.
    pub frames_emitted: usize,
    pub abort_reason: Option<AbortReason>,
}

/// Chunk delivery state machine.
///
/// `tick` advances it synchronously; `spawn` drives it on the runtime at the
/// configured cadence.
#[derive(Debug)]
pub struct StreamSession {
    chunks: Vec<String>,
    cursor: usize,
    status: SessionStatus,
    delay: Duration,
    timeout: Option<Duration>,
    frames_emitted: usize,
    abort_reason: Option<AbortReason>,
}

impl StreamSession {
    /// # Panics
    ///
    /// Panics if `delay` is zero.
    pub fn new(chunks: Vec<String>, delay: Duration) -> Self {
        assert!(!delay.is_zero(), "session delay must be positive");
        Self {
            chunks,
            cursor: 0,
            status: SessionStatus::Pending,
            delay,
            timeout: None,
            frames_emitted: 0,
            abort_reason: None,
        }
    }

    /// Abort the session once `timeout` has elapsed since start.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Move from `Pending` to `Emitting`. No-op in any other state.
    pub fn begin(&mut self) {
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::Emitting;
        }
    }

    /// Produce the frame for one tick, if the session is still emitting.
    ///
    /// Returns the next chunk while any remain, then the end frame (moving to
    /// `Completed`), then `None` forever.
    pub fn tick(&mut self) -> Option<SessionFrame> {
        if self.status != SessionStatus::Emitting {
            return None;
        }
        match self.chunks.get(self.cursor) {
            Some(chunk) => {
                self.cursor += 1;
                Some(SessionFrame::Data(chunk.clone()))
            }
            None => {
                self.status = SessionStatus::Completed;
                Some(SessionFrame::End)
            }
        }
    }

    /// Move to `Aborted` unless already terminal.
    pub fn abort(&mut self, reason: AbortReason) {
        if !self.status.is_terminal() {
            self.status = SessionStatus::Aborted;
            self.abort_reason = Some(reason);
        }
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            status: self.status,
            frames_emitted: self.frames_emitted,
            abort_reason: self.abort_reason,
        }
    }

    /// Start delivering on the current runtime.
    ///
    /// The returned stream yields frames as ticks fire and ends when the
    /// session reaches a terminal state. Dropping it disconnects the session.
    pub fn spawn(self) -> SessionStream {
        // Room for every chunk plus the end frame, so a send only fails once
        // the consumer is gone.
        let (tx, rx) = mpsc::channel(self.chunks.len() + 1);
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(tx, token.clone()));

        SessionStream {
            frames: rx,
            handle: SessionHandle {
                token,
                task: Some(task),
            },
        }
    }

    async fn run(
        mut self,
        tx: mpsc::Sender<SessionFrame>,
        token: CancellationToken,
    ) -> SessionReport {
        let mut ticker = Ticker::arm(self.delay, token.clone());
        let expiry = expire_at(self.timeout.map(|t| Instant::now() + t));
        tokio::pin!(expiry);

        self.begin();
        debug!(
            target: "session",
            chunks = self.chunks.len(),
            delay_ms = self.delay.as_millis() as u64,
            timeout_ms = self.timeout.map(|t| t.as_millis() as u64),
            "Session started"
        );

        while !self.status.is_terminal() {
            tokio::select! {
                biased;
                _ = tx.closed() => self.abort(AbortReason::Disconnected),
                _ = token.cancelled() => self.abort(AbortReason::Cancelled),
                _ = &mut expiry => self.abort(AbortReason::TimedOut),
                _ = ticker.tick() => {
                    if let Some(frame) = self.tick() {
                        match tx.try_send(frame) {
                            Ok(()) => self.frames_emitted += 1,
                            Err(_) => self.abort(AbortReason::WriteFailed),
                        }
                    }
                }
            }
        }

        ticker.cancel();

        let report = self.report();
        match report.abort_reason {
            None => info!(
                target: "session",
                frames = report.frames_emitted,
                "Session completed"
            ),
            Some(reason) => info!(
                target: "session",
                frames = report.frames_emitted,
                reason = ?reason,
                "Session aborted"
            ),
        }
        report
    }
}

/// Recurring tick owned by a running session.
///
/// Cancelling tears the interval down and signals the shared token; it is
/// idempotent and also runs on drop, so every exit path releases the timer.
struct Ticker {
    interval: Option<Interval>,
    token: CancellationToken,
}

impl Ticker {
    fn arm(period: Duration, token: CancellationToken) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(interval),
            token,
        }
    }

    async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn cancel(&mut self) {
        if self.interval.take().is_some() {
            self.token.cancel();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn expire_at(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Owner side of a running session.
///
/// Dropping the handle cancels the session.
pub struct SessionHandle {
    token: CancellationToken,
    task: Option<JoinHandle<SessionReport>>,
}

impl SessionHandle {
    /// Stop the session. Safe to call any number of times.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the session's timer has been torn down or cancellation was
    /// requested.
    pub fn is_released(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the session task has returned.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Wait for the session task and return its report.
    pub async fn join(mut self) -> Option<SessionReport> {
        let task = self.task.take()?;
        task.await.ok()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Frames of one running session, in emission order.
pub struct SessionStream {
    // Declared before `handle` so a dropped stream reads as a disconnect.
    frames: mpsc::Receiver<SessionFrame>,
    handle: SessionHandle,
}

impl SessionStream {
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn into_parts(self) -> (mpsc::Receiver<SessionFrame>, SessionHandle) {
        (self.frames, self.handle)
    }
}

impl Stream for SessionStream {
    type Item = SessionFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.frames.poll_recv(cx)
    }
}
