//! Turn raw serial chunks into decoded frames

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::Result;
use crate::wire::{FrameAccumulator, SerialPacket};

/// Extension trait to add deframing to any byte-chunk stream
pub trait DeframeExt: Stream<Item = Vec<u8>> {
    /// Split the byte stream on frame delimiters and decode each frame.
    ///
    /// Chunk boundaries need not line up with frames. Corrupted frames are
    /// yielded as errors and do not end the stream.
    fn deframed(self) -> Deframed<Self>
    where
        Self: Sized,
    {
        Deframed::new(self)
    }
}

impl<T: Stream<Item = Vec<u8>>> DeframeExt for T {}

pin_project! {
    /// A stream combinator that reassembles serial frames
    pub struct Deframed<S> {
        #[pin]
        stream: S,
        accumulator: FrameAccumulator,
        ready: VecDeque<Result<SerialPacket>>,
    }
}

impl<S: Stream<Item = Vec<u8>>> Deframed<S> {
    pub fn new(stream: S) -> Self {
        Self { stream, accumulator: FrameAccumulator::new(), ready: VecDeque::new() }
    }
}

impl<S: Stream<Item = Vec<u8>>> Stream for Deframed<S> {
    type Item = Result<SerialPacket>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(frame) = this.ready.pop_front() {
                return Poll::Ready(Some(frame));
            }

            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(chunk) => this.ready.extend(this.accumulator.push(&chunk)),
                // Bytes after the last closing flag are an incomplete frame
                None => return Poll::Ready(None),
            }
        }
    }
}
