//! Log severity changes across anvils, hosts and servers.

use std::collections::HashMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use striker_client::api::StrikerApi;
use striker_client::fetch::FetchError;
use striker_client::poller::{PollOptions, StatusPoller, Subscription};
use striker_core::classify::{Classify, EntityKind, Severity};
use striker_core::entity::{
    AnvilOverview, AnvilView, EntityStatus, HostOverview, Inventory, ServerOverview,
};
use striker_core::routes;

/// One entity whose classified severity differs from the last snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityChange {
    pub kind: EntityKind,
    pub uuid: String,
    pub name: String,
    /// `None` the first time the entity is seen.
    pub from: Option<Severity>,
    pub to: Severity,
    pub state: String,
    pub message: Option<String>,
}

impl SeverityChange {
    fn log(&self) {
        let from = self.from.map_or("new", Severity::as_str);
        match self.to {
            Severity::Error => tracing::warn!(
                kind = %self.kind,
                name = %self.name,
                uuid = %self.uuid,
                from,
                to = %self.to,
                state = %self.state,
                message = self.message.as_deref().unwrap_or(""),
                "Severity changed"
            ),
            _ => tracing::info!(
                kind = %self.kind,
                name = %self.name,
                uuid = %self.uuid,
                from,
                to = %self.to,
                state = %self.state,
                message = self.message.as_deref().unwrap_or(""),
                "Severity changed"
            ),
        }
    }
}

/// Last reported severity per entity.
#[derive(Debug, Default)]
pub struct SeverityLog {
    seen: HashMap<(EntityKind, String), Severity>,
}

impl SeverityLog {
    /// Changes since the previous call, limited to `only` when given.
    ///
    /// Entities are reported anvil by anvil: the anvil first, then its hosts
    /// and servers by name. Without a filter, servers whose anvil is unknown
    /// come last.
    pub fn diff(&mut self, inventory: &Inventory, only: Option<&str>) -> Vec<SeverityChange> {
        let mut changes = Vec::new();
        let views: Vec<AnvilView<'_>> = match only {
            Some(uuid) => inventory.anvil(uuid).into_iter().collect(),
            None => inventory.anvils(),
        };

        for view in &views {
            let anvil = view.anvil;
            self.observe(
                &mut changes,
                EntityKind::Anvil,
                &anvil.uuid,
                &anvil.name,
                &anvil.status,
                anvil.status.state.label(),
            );
            for host in &view.hosts {
                self.observe(
                    &mut changes,
                    EntityKind::Host,
                    &host.uuid,
                    &host.name,
                    &host.status,
                    host.status.state.label(),
                );
            }
            for server in &view.servers {
                self.observe(
                    &mut changes,
                    EntityKind::Server,
                    &server.uuid,
                    &server.name,
                    &server.status,
                    server.status.state.label(),
                );
            }
        }

        if only.is_none() {
            let mut orphans = inventory.orphaned_servers();
            orphans.sort_by(|a, b| a.name.cmp(&b.name));
            for server in orphans {
                self.observe(
                    &mut changes,
                    EntityKind::Server,
                    &server.uuid,
                    &server.name,
                    &server.status,
                    server.status.state.label(),
                );
            }
        }

        changes
    }

    fn observe<S: Classify>(
        &mut self,
        changes: &mut Vec<SeverityChange>,
        kind: EntityKind,
        uuid: &str,
        name: &str,
        status: &EntityStatus<S>,
        label: &str,
    ) {
        let to = status.severity();
        let from = self.seen.insert((kind, uuid.to_string()), to);
        if from == Some(to) {
            return;
        }
        changes.push(SeverityChange {
            kind,
            uuid: uuid.to_string(),
            name: name.to_string(),
            from,
            to,
            state: label.to_string(),
            message: status.state_message.clone(),
        });
    }
}

/// The three inventory subscriptions plus the last revision consumed from each.
pub struct Snapshots {
    anvils: Subscription<Vec<AnvilOverview>>,
    hosts: Subscription<Vec<HostOverview>>,
    servers: Subscription<Vec<ServerOverview>>,
    seen: [u64; 3],
}

impl Snapshots {
    pub fn new(
        anvils: Subscription<Vec<AnvilOverview>>,
        hosts: Subscription<Vec<HostOverview>>,
        servers: Subscription<Vec<ServerOverview>>,
    ) -> Self {
        Self {
            anvils,
            hosts,
            servers,
            seen: [0; 3],
        }
    }

    /// Wait until any list has a result not yet consumed.
    ///
    /// Results published while the caller was busy are returned at once.
    /// `None` once every loop has stopped.
    pub async fn next(&mut self) -> Option<()> {
        let [anvils, hosts, servers] = self.seen;
        tokio::select! {
            Some(state) = self.anvils.result_after(anvils) => self.seen[0] = state.revision,
            Some(state) = self.hosts.result_after(hosts) => self.seen[1] = state.revision,
            Some(state) = self.servers.result_after(servers) => self.seen[2] = state.revision,
            else => return None,
        }
        Some(())
    }

    pub fn inventory(&self) -> Inventory {
        Inventory::from_snapshots(
            &self.anvils.value().unwrap_or_default(),
            &self.hosts.value().unwrap_or_default(),
            &self.servers.value().unwrap_or_default(),
        )
    }
}

/// Poll the inventory and log severity changes until `cancel` fires.
///
/// With `anvil_uuid` only that anvil and its members are reported.
pub async fn run(
    api: StrikerApi,
    interval: Duration,
    anvil_uuid: Option<String>,
    cancel: CancellationToken,
) -> Result<(), FetchError> {
    let anvil_poller = StatusPoller::<Vec<AnvilOverview>>::new();
    let host_poller = StatusPoller::<Vec<HostOverview>>::new();
    let server_poller = StatusPoller::<Vec<ServerOverview>>::new();

    let anvils = match &anvil_uuid {
        Some(uuid) => anvil_poller.subscribe(
            routes::anvil(uuid)?,
            api.clone(),
            PollOptions::with_transform(interval, |anvil: AnvilOverview| vec![anvil]),
        ),
        None => anvil_poller.subscribe(routes::ANVILS, api.clone(), PollOptions::new(interval)),
    };
    let hosts = host_poller.subscribe(routes::HOSTS, api.clone(), PollOptions::new(interval));
    let servers = server_poller.subscribe(routes::SERVERS, api, PollOptions::new(interval));
    let mut snapshots = Snapshots::new(anvils, hosts, servers);

    tracing::info!(
        anvil_uuid = anvil_uuid.as_deref().unwrap_or("all"),
        interval_ms = interval.as_millis() as u64,
        "Watching inventory"
    );

    let mut log = SeverityLog::default();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            update = snapshots.next() => {
                if update.is_none() {
                    break;
                }
            }
        }

        for change in log.diff(&snapshots.inventory(), anvil_uuid.as_deref()) {
            change.log();
        }
    }

    anvil_poller.shutdown();
    host_poller.shutdown();
    server_poller.shutdown();
    tracing::info!("Stopped watching inventory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use striker_client::fetch::Fetcher;

    fn inventory(anvil_state: &str, server_state: &str) -> Inventory {
        let anvils: Vec<AnvilOverview> = serde_json::from_value(serde_json::json!([
            { "uuid": "a-1", "name": "an-anvil-01", "state": anvil_state },
            { "uuid": "a-2", "name": "an-anvil-02", "state": "optimal" },
        ]))
        .unwrap();
        let hosts: Vec<HostOverview> = serde_json::from_value(serde_json::json!([
            { "uuid": "h-1", "name": "an-a01n01", "anvilUuid": "a-1", "state": "online" },
        ]))
        .unwrap();
        let servers: Vec<ServerOverview> = serde_json::from_value(serde_json::json!([
            { "uuid": "s-1", "name": "srv01-web", "anvilUuid": "a-1", "state": server_state,
              "stateMessage": "Migrating to an-a01n02" },
            { "uuid": "s-9", "name": "srv09-lost", "anvilUuid": "a-404", "state": "running" },
        ]))
        .unwrap();
        Inventory::from_snapshots(&anvils, &hosts, &servers)
    }

    #[test]
    fn first_snapshot_reports_everything() {
        let mut log = SeverityLog::default();
        let changes = log.diff(&inventory("optimal", "running"), None);
        let names: Vec<_> = changes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            ["an-anvil-01", "an-a01n01", "srv01-web", "an-anvil-02", "srv09-lost"]
        );
        assert!(changes.iter().all(|c| c.from.is_none()));
    }

    #[test]
    fn only_changed_severities_are_reported() {
        let mut log = SeverityLog::default();
        log.diff(&inventory("optimal", "running"), None);

        assert!(log.diff(&inventory("optimal", "idle"), None).is_empty());

        let changes = log.diff(&inventory("degraded", "migrating"), None);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, EntityKind::Anvil);
        assert_eq!(changes[0].to, Severity::Error);
        assert_eq!(changes[1].from, Some(Severity::Ok));
        assert_eq!(changes[1].to, Severity::Warning);
        assert_eq!(changes[1].state, "Migrating");
        assert_eq!(changes[1].message.as_deref(), Some("Migrating to an-a01n02"));
    }

    #[test]
    fn filter_limits_to_one_anvil() {
        let mut log = SeverityLog::default();
        let changes = log.diff(&inventory("optimal", "running"), Some("a-2"));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].uuid, "a-2");
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    struct Fixed<T>(T);

    #[async_trait::async_trait]
    impl<T: Clone + Send + Sync + 'static> Fetcher<T> for Fixed<T> {
        async fn fetch(&self, _key: &str) -> Result<T, FetchError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn results_published_together_are_all_consumed() {
        let anvil_poller = StatusPoller::<Vec<AnvilOverview>>::new();
        let host_poller = StatusPoller::<Vec<HostOverview>>::new();
        let server_poller = StatusPoller::<Vec<ServerOverview>>::new();
        let interval = Duration::from_secs(10);

        let mut snapshots = Snapshots::new(
            anvil_poller.subscribe(routes::ANVILS, Fixed(Vec::new()), PollOptions::new(interval)),
            host_poller.subscribe(routes::HOSTS, Fixed(Vec::new()), PollOptions::new(interval)),
            server_poller.subscribe(routes::SERVERS, Fixed(Vec::new()), PollOptions::new(interval)),
        );

        // All three loops publish their first result before anyone looks.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let quick = Duration::from_millis(1);
        for _ in 0..3 {
            let update = tokio::time::timeout(quick, snapshots.next()).await;
            assert_eq!(update, Ok(Some(())));
        }
        assert!(tokio::time::timeout(quick, snapshots.next()).await.is_err());

        // The next tick wakes it again.
        let update = tokio::time::timeout(interval, snapshots.next()).await;
        assert_eq!(update, Ok(Some(())));
    }

    #[tokio::test(start_paused = true)]
    async fn next_ends_when_every_loop_stops() {
        let anvil_poller = StatusPoller::<Vec<AnvilOverview>>::new();
        let host_poller = StatusPoller::<Vec<HostOverview>>::new();
        let server_poller = StatusPoller::<Vec<ServerOverview>>::new();
        let interval = Duration::from_secs(10);

        let mut snapshots = Snapshots::new(
            anvil_poller.subscribe(routes::ANVILS, Fixed(Vec::new()), PollOptions::new(interval)),
            host_poller.subscribe(routes::HOSTS, Fixed(Vec::new()), PollOptions::new(interval)),
            server_poller.subscribe(routes::SERVERS, Fixed(Vec::new()), PollOptions::new(interval)),
        );
        for _ in 0..3 {
            snapshots.next().await;
        }

        anvil_poller.shutdown();
        host_poller.shutdown();
        server_poller.shutdown();
        assert_eq!(snapshots.next().await, None);
    }
}
