/// Delivers a raw bridged DMRD frame to another configured system by name
/// (§4.6's static-bridge targets name a system, not a peer). `nexus-hub`
/// owns every system in a process and implements this to route across
/// them; a bare `MasterServer` under test needs nothing more than
/// `NoopSystemForwarder`.
#[async_trait::async_trait]
pub trait SystemForwarder: Send + Sync {
    async fn forward_to_system(&self, system_name: &str, raw: &[u8]);
}

pub struct NoopSystemForwarder;

#[async_trait::async_trait]
impl SystemForwarder for NoopSystemForwarder {
    async fn forward_to_system(&self, _system_name: &str, _raw: &[u8]) {}
}
