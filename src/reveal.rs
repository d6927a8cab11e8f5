//! Progressive reveal of an assistant reply.
//!
//! The reply is already complete when the reveal starts; revealing it one
//! grapheme cluster per tick is purely for perceived responsiveness.  Follow-up
//! directives are removed from the revealed text up front so they never
//! flash on screen, while the consumer still receives the original text on
//! completion.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use unicode_segmentation::UnicodeSegmentation;

use crate::directive;
use crate::observability::{REVEAL_DURATION, REVEAL_TICKS, REVEALS_CANCELLED};

/// Time between revealed graphemes.
pub const DEFAULT_TICK: Duration = Duration::from_millis(20);

const MIN_TICK: Duration = Duration::from_millis(1);

///////////////////////////////////////// PendingStream ////////////////////////////////////////

/// A reply in the middle of being revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStream {
    full_text: String,
    visible: String,
    revealed_graphemes: usize,
    revealed_bytes: usize,
    delta_start: usize,
}

impl PendingStream {
    /// Prepares `full_text` for reveal.
    pub fn new(full_text: impl Into<String>) -> Self {
        let full_text = full_text.into();
        let visible = directive::strip(&full_text).into_owned();
        Self {
            full_text,
            visible,
            revealed_graphemes: 0,
            revealed_bytes: 0,
            delta_start: 0,
        }
    }

    /// The original reply, directives included.
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// The reply with directives removed; what the reveal converges to.
    pub fn visible_text(&self) -> &str {
        &self.visible
    }

    /// The prefix of the visible text revealed so far.
    pub fn revealed(&self) -> &str {
        &self.visible[..self.revealed_bytes]
    }

    /// The grapheme revealed by the latest [`advance`](Self::advance).
    pub fn last_revealed(&self) -> &str {
        &self.visible[self.delta_start..self.revealed_bytes]
    }

    /// Number of graphemes revealed so far.
    pub fn revealed_len(&self) -> usize {
        self.revealed_graphemes
    }

    /// Number of graphemes the reveal will show in total.
    pub fn len(&self) -> usize {
        self.visible.graphemes(true).count()
    }

    /// True when there is nothing visible to reveal.
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// True once every visible grapheme has been revealed.
    pub fn is_complete(&self) -> bool {
        self.revealed_bytes == self.visible.len()
    }

    /// Reveals one more grapheme cluster and returns it, or `None` if
    /// already complete.
    ///
    /// A combining sequence or an emoji joined with zero-width joiners is
    /// revealed whole.
    pub fn advance(&mut self) -> Option<&str> {
        let start = self.revealed_bytes;
        let next = self.visible[start..].graphemes(true).next()?;
        self.delta_start = start;
        self.revealed_bytes = start + next.len();
        self.revealed_graphemes += 1;
        Some(&self.visible[start..self.revealed_bytes])
    }

    /// Consumes the stream, yielding the original reply.
    pub fn into_full_text(self) -> String {
        self.full_text
    }
}

/////////////////////////////////////////// RevealSink /////////////////////////////////////////

/// Receives the progress of a running reveal.
pub trait RevealSink: Send + 'static {
    /// Called on every tick that revealed a grapheme; `delta` is that grapheme.
    fn progress(&mut self, revealed: &str, delta: &str);

    /// Called once with the original, directive-inclusive text.
    fn complete(&mut self, full_text: String);

    /// Called if the reveal was torn down before completing.
    fn cancelled(&mut self) {}
}

////////////////////////////////////////// RevealHandle ////////////////////////////////////////

/// Handle to a running reveal task.
///
/// Dropping the handle cancels the reveal; after cancellation the sink sees
/// no further `progress` or `complete` calls.
#[derive(Debug)]
pub struct RevealHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RevealHandle {
    /// Starts revealing `stream` on `runtime`, one grapheme every `tick`.
    ///
    /// The reveal also stops when `parent` is cancelled.
    pub fn spawn<S: RevealSink>(
        runtime: &Handle,
        stream: PendingStream,
        tick: Duration,
        parent: &CancellationToken,
        sink: S,
    ) -> Self {
        let token = parent.child_token();
        let task = runtime.spawn(run(stream, tick.max(MIN_TICK), token.clone(), sink));
        Self { token, task }
    }

    /// Stops the reveal.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the reveal task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RevealHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run<S: RevealSink>(
    mut stream: PendingStream,
    tick: Duration,
    token: CancellationToken,
    mut sink: S,
) {
    let started = Instant::now();
    let mut ticker = interval_at(started + tick, tick);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                REVEALS_CANCELLED.click();
                sink.cancelled();
                return;
            }
            _ = ticker.tick() => {}
        }
        REVEAL_TICKS.click();
        if stream.advance().is_none() {
            REVEAL_DURATION.add(started.elapsed().as_secs_f64());
            sink.complete(stream.into_full_text());
            return;
        }
        sink.progress(stream.revealed(), stream.last_revealed());
    }
}
