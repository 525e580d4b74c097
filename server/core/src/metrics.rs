//! Observability hook. The dashboard/Prometheus surface itself is out of
//! scope (spec.md §1); this trait is the seam an external collaborator
//! would implement it against, mirroring `VoiceMetrics`/`NoopMetrics` from
//! the teacher's voice forwarder.

/// Events the routing core reports for observability. None of these are
/// load-bearing for correctness — every call site must behave identically
/// whether or not a real implementation is installed.
pub trait Metrics: Send + Sync {
    fn peer_connected(&self, _peer_id: u32) {}
    fn peer_removed(&self, _peer_id: u32) {}
    fn dmrd_received(&self, _bytes: usize) {}
    fn dmrd_forwarded(&self, _fanout: usize) {}
    fn dmrd_dropped(&self, _reason: &'static str) {}
    fn nak_sent(&self, _peer_id: u32) {}
    fn bridge_activated(&self, _bridge: &str, _tgid: u32) {}
    fn bridge_deactivated(&self, _bridge: &str, _tgid: u32) {}
}

/// Default no-op implementation, installed when the host process wires no
/// external metrics sink.
pub struct NoopMetrics;

impl Metrics for NoopMetrics {}
