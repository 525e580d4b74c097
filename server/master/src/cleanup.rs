use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::server::MasterServer;

impl MasterServer {
    /// Periodic housekeeping: reaps timed-out peers and their dependent
    /// state, ages out stale subscriber locations and rejected-origin
    /// cooldowns, expires dynamic talkgroup subscriptions, and retires idle
    /// dynamic bridges. Runs until `cancel` fires.
    pub(crate) async fn run_cleanup_loop(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(self.config.cleanup_period) => {}
            }
            self.run_cleanup_pass();
        }
    }

    fn run_cleanup_pass(&self) {
        let timed_out = self.registry.reap(self.config.ping_timeout);
        for id in &timed_out {
            self.locations.remove_peer(*id);
            self.router.remove_subscriber_from_all_dynamic_bridges(*id);
            self.metrics.peer_removed(*id);
        }
        if !timed_out.is_empty() {
            debug!(count = timed_out.len(), "reaped timed-out peers");
        }

        for peer in self.registry.snapshot_all() {
            peer.state_mut().subscriptions.reap_expired();
        }

        self.locations.reap_stale();
        self.rejected.reap_expired();
        self.muted.reap_expired();
        self.router.deactivate_timed_out_rules();

        let registry = &self.registry;
        let idle_window = self.config.dynamic_bridge_idle;
        self.router.cleanup_inactive_dynamic_bridges(idle_window, |tgid| {
            registry
                .snapshot_all()
                .iter()
                .filter(|p| {
                    p.state().subscriptions.is_subscribed_to_talkgroup(nexus_wire::Timeslot::Ts1, tgid)
                        || p.state().subscriptions.is_subscribed_to_talkgroup(nexus_wire::Timeslot::Ts2, tgid)
                })
                .count()
        });
    }
}
