use std::time::{Duration, Instant};

use dashmap::DashMap;

/// §4.5 step 8 first-keyup mute. Only the one frame whose arrival activated
/// a new dynamic subscription is suppressed; the entry this installs is
/// bookkeeping for that decision, not an ongoing suppression window — every
/// later frame on the same stream is ordinary traffic. A voice-terminator
/// frame ends the entry immediately; otherwise it is left to expire after
/// `MUTE_WINDOW` of silence and be swept by `reap_expired`. The map doubles
/// as the stream's end-detector: once the entry is gone (expired or
/// terminated), the stream is over.
pub const MUTE_WINDOW: Duration = Duration::from_secs(2);

#[derive(Default)]
pub struct MutedStreams {
    expiry: DashMap<u32, Instant>,
}

impl MutedStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) a stream's mute window.
    pub fn mute(&self, stream_id: u32) {
        self.expiry.insert(stream_id, Instant::now() + MUTE_WINDOW);
    }

    /// `true` iff this stream is currently muted. Lazily drops an expired
    /// entry on read so a caller never needs to special-case staleness.
    pub fn is_muted(&self, stream_id: u32) -> bool {
        match self.expiry.get(&stream_id) {
            Some(at) if *at > Instant::now() => true,
            Some(_) => {
                drop(self.expiry.remove(&stream_id));
                false
            }
            None => false,
        }
    }

    /// A voice-terminator frame ends the mute immediately, regardless of
    /// remaining window.
    pub fn end_stream(&self, stream_id: u32) {
        self.expiry.remove(&stream_id);
    }

    /// Periodic sweep: drops every entry past its expiry.
    pub fn reap_expired(&self) {
        let now = Instant::now();
        self.expiry.retain(|_, at| *at > now);
    }

    pub fn len(&self) -> usize {
        self.expiry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiry.is_empty()
    }
}
