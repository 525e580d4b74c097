/// Receives DMRD frames the PEER client reads off the wire from its
/// master, raw and unparsed (§9: forwarding never round-trips through the
/// codec). The YSF transcoder bridge or any other PEER-side collaborator
/// implements this to consume the core.
#[async_trait::async_trait]
pub trait DmrdSink: Send + Sync {
    async fn on_dmrd(&self, raw: &[u8]);
}

pub struct NoopDmrdSink;

#[async_trait::async_trait]
impl DmrdSink for NoopDmrdSink {
    async fn on_dmrd(&self, _raw: &[u8]) {}
}
