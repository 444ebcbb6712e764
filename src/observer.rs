use session::PeerId;

/// Typed handler for inbound channel traffic, installed via
/// [`crate::instance::MeshInstance::on_channel`]. Replaces the source's
/// closure-capture pattern (spec §9) with an explicit trait so captures are
/// never accidentally shared across threads.
pub trait ChannelHandler: Send + Sync {
    fn on_message(&self, peer_id: PeerId, payload: &[u8]);
}

impl<F: Fn(PeerId, &[u8]) + Send + Sync> ChannelHandler for F {
    fn on_message(&self, peer_id: PeerId, payload: &[u8]) {
        self(peer_id, payload)
    }
}

/// Mesh-instance-wide lifecycle hooks. All methods default to no-ops,
/// matching the teacher's `Observer`/`ServiceHandler` shape.
pub trait MeshObserver: Send + Sync {
    #[allow(unused_variables)]
    fn on_peer_live(&self, peer_id: &PeerId) {}

    #[allow(unused_variables)]
    fn on_peer_dead(&self, peer_id: &PeerId) {}

    #[allow(unused_variables)]
    fn on_nat_classified(&self, class: crate::nat::NatClass) {}
}

#[derive(Clone, Default)]
pub struct NoopObserver;

impl MeshObserver for NoopObserver {}
