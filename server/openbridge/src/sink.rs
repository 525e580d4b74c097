/// Receives DMRD frames the OpenBridge endpoint accepted from its remote
/// peer (HMAC verified, both-slots policy applied), raw and unparsed.
/// `nexus-hub` wires this to the routing core the same way it wires a
/// `nexus-peer::DmrdSink`.
#[async_trait::async_trait]
pub trait DmrdSink: Send + Sync {
    async fn on_dmrd(&self, raw: &[u8]);
}

pub struct NoopDmrdSink;

#[async_trait::async_trait]
impl DmrdSink for NoopDmrdSink {
    async fn on_dmrd(&self, _raw: &[u8]) {}
}
