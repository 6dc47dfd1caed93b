//! Directory cache — generation-tagged, in-memory index of platform entities.
//!
//! A [`Generation`] is immutable once built. Refresh builds a whole new
//! generation off to the side and installs it with a single atomic pointer
//! swap, so readers never block and never observe a half-built index. A
//! reader that took a snapshot keeps using it for the rest of its dispatch
//! even if a newer generation is installed meanwhile.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;

use hassbridge_domain::entity::{EntityDomain, EntityRecord, Timestamp};
use hassbridge_domain::error::{BridgeError, Collaborator};
use hassbridge_domain::id::EntityId;

use crate::deadline::{DEFAULT_CALL_TIMEOUT, bounded};
use crate::ports::AutomationPlatform;

/// User-configured aliases keyed by entity id, merged into every generation.
pub type AliasTable = HashMap<EntityId, Vec<String>>;

/// Lowercased, trimmed form used as index key.
#[must_use]
pub fn normalize(token: &str) -> String {
    token.trim().to_lowercase()
}

/// One immutable snapshot of the directory.
#[derive(Debug, Default)]
pub struct Generation {
    number: u64,
    built_at: Option<Timestamp>,
    records: BTreeMap<EntityId, EntityRecord>,
    by_name: HashMap<String, Vec<EntityId>>,
    by_alias: HashMap<String, Vec<EntityId>>,
}

impl Generation {
    /// Build a generation, keeping the first record of any duplicated id.
    #[must_use]
    pub fn build(number: u64, records: Vec<EntityRecord>, aliases: &AliasTable) -> Self {
        let mut by_id = BTreeMap::new();
        for mut record in records {
            if by_id.contains_key(&record.entity_id) {
                tracing::warn!(
                    entity_id = %record.entity_id,
                    generation = number,
                    "duplicate entity id from platform, keeping first"
                );
                continue;
            }
            if let Some(extra) = aliases.get(&record.entity_id) {
                for alias in extra {
                    let alias = alias.trim();
                    if !alias.is_empty() && !record.aliases.iter().any(|a| a == alias) {
                        record.aliases.push(alias.to_string());
                    }
                }
            }
            by_id.insert(record.entity_id.clone(), record);
        }

        let mut by_name: HashMap<String, Vec<EntityId>> = HashMap::new();
        let mut by_alias: HashMap<String, Vec<EntityId>> = HashMap::new();
        // BTreeMap iteration keeps every index bucket sorted by entity id.
        for (id, record) in &by_id {
            by_name
                .entry(normalize(&record.friendly_name))
                .or_default()
                .push(id.clone());
            for alias in &record.aliases {
                let bucket = by_alias.entry(normalize(alias)).or_default();
                if bucket.last() != Some(id) {
                    bucket.push(id.clone());
                }
            }
        }

        Self {
            number,
            built_at: Some(Utc::now()),
            records: by_id,
            by_name,
            by_alias,
        }
    }

    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    #[must_use]
    pub fn built_at(&self) -> Option<Timestamp> {
        self.built_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records ordered by entity id.
    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn lookup_by_id(&self, id: &EntityId) -> Option<&EntityRecord> {
        self.records.get(id)
    }

    /// Ids whose friendly name equals `token`, ignoring case.
    #[must_use]
    pub fn ids_by_name(&self, token: &str) -> &[EntityId] {
        self.by_name.get(&normalize(token)).map_or(&[], Vec::as_slice)
    }

    /// Ids carrying `token` as an alias, ignoring case.
    #[must_use]
    pub fn ids_by_alias(&self, token: &str) -> &[EntityId] {
        self.by_alias.get(&normalize(token)).map_or(&[], Vec::as_slice)
    }

    /// Records whose friendly name or any alias equals `token`, ignoring case.
    #[must_use]
    pub fn lookup_by_name_or_alias(&self, token: &str) -> Vec<&EntityRecord> {
        let mut ids: Vec<&EntityId> = self
            .ids_by_name(token)
            .iter()
            .chain(self.ids_by_alias(token))
            .collect();
        ids.sort();
        ids.dedup();
        ids.into_iter()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// Ids whose friendly name or an alias contains `token`, ignoring case.
    #[must_use]
    pub fn ids_containing(&self, token: &str) -> Vec<EntityId> {
        let needle = normalize(token);
        if needle.is_empty() {
            return Vec::new();
        }
        self.records
            .values()
            .filter(|record| record.names().any(|name| name.to_lowercase().contains(&needle)))
            .map(|record| record.entity_id.clone())
            .collect()
    }

    /// Substring search over entity id, friendly name and aliases.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&EntityRecord> {
        let needle = normalize(query);
        if needle.is_empty() {
            return Vec::new();
        }
        self.records
            .values()
            .filter(|record| {
                record.entity_id.as_str().contains(&needle)
                    || record.names().any(|name| name.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Records of one domain grouped by area; the ungrouped bucket is keyed `None` and sorts first.
    #[must_use]
    pub fn by_domain_and_area(
        &self,
        domain: EntityDomain,
    ) -> BTreeMap<Option<&str>, Vec<&EntityRecord>> {
        let mut grouped: BTreeMap<Option<&str>, Vec<&EntityRecord>> = BTreeMap::new();
        for record in self.records.values().filter(|r| r.domain == domain) {
            grouped
                .entry(record.area.as_deref())
                .or_default()
                .push(record);
        }
        grouped
    }
}

/// Summary of a successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub generation: u64,
    pub entity_count: usize,
    /// False when a newer generation was installed while this one was fetched.
    pub installed: bool,
}

/// The directory cache service.
pub struct DirectoryCache<P> {
    platform: P,
    aliases: AliasTable,
    current: ArcSwap<Generation>,
    next_number: AtomicU64,
    call_timeout: Duration,
}

impl<P: AutomationPlatform> DirectoryCache<P> {
    /// Create an empty cache (generation 0). Call [`refresh`](Self::refresh) to populate it.
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            aliases: AliasTable::new(),
            current: ArcSwap::from_pointee(Generation::default()),
            next_number: AtomicU64::new(1),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// The active generation. Hold on to it for the whole dispatch.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    /// Fetch the entity list and install it as a new generation.
    ///
    /// Generation numbers are assigned when the fetch starts. If a later
    /// refresh has already installed a newer generation by the time this one
    /// completes, this result is discarded.
    ///
    /// # Errors
    ///
    /// Returns the platform error (or a timeout). The previous generation
    /// stays active and keeps serving lookups.
    pub async fn refresh(&self) -> Result<RefreshReport, BridgeError> {
        let number = self.next_number.fetch_add(1, Ordering::Relaxed);
        let fetched = bounded(
            Collaborator::AutomationPlatform,
            self.call_timeout,
            self.platform.list_entities(),
        )
        .await;

        let records = match fetched {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(
                    generation = number,
                    active = self.current.load().number(),
                    error = %err,
                    "directory refresh failed, keeping previous generation"
                );
                return Err(err);
            }
        };

        let fresh = Arc::new(Generation::build(number, records, &self.aliases));
        let entity_count = fresh.len();
        let previous = self.current.rcu(|active| {
            if active.number() < number {
                Arc::clone(&fresh)
            } else {
                Arc::clone(active)
            }
        });
        let installed = previous.number() < number;

        if installed {
            tracing::info!(generation = number, entity_count, "directory generation installed");
        } else {
            tracing::debug!(
                generation = number,
                active = previous.number(),
                "stale directory generation discarded"
            );
        }

        Ok(RefreshReport {
            generation: number,
            entity_count,
            installed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hassbridge_domain::context::ContextSnapshot;
    use hassbridge_domain::entity::EntityState;
    use hassbridge_domain::error::{TransportError, TransportErrorKind};
    use hassbridge_domain::outcome::{ActionCall, ActionResponse};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::Mutex;

    enum Scripted {
        Entities(Vec<EntityRecord>, Duration),
        Unreachable,
    }

    #[derive(Default)]
    struct ScriptedPlatform {
        responses: Mutex<VecDeque<Scripted>>,
    }

    impl ScriptedPlatform {
        fn push(&self, response: Scripted) {
            self.responses.lock().unwrap().push_back(response);
        }
    }

    impl AutomationPlatform for ScriptedPlatform {
        fn list_entities(
            &self,
        ) -> impl Future<Output = Result<Vec<EntityRecord>, BridgeError>> + Send {
            let next = self.responses.lock().unwrap().pop_front();
            async move {
                match next {
                    Some(Scripted::Entities(records, delay)) => {
                        tokio::time::sleep(delay).await;
                        Ok(records)
                    }
                    Some(Scripted::Unreachable) | None => Err(TransportError::new(
                        Collaborator::AutomationPlatform,
                        TransportErrorKind::Unreachable,
                    )
                    .into()),
                }
            }
        }

        fn call_action(
            &self,
            _call: ActionCall,
        ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send {
            async { Ok(ActionResponse::default()) }
        }

        fn run_script(
            &self,
            _script_id: EntityId,
        ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send {
            async { Ok(ActionResponse::default()) }
        }

        fn get_context_snapshot(
            &self,
        ) -> impl Future<Output = Result<ContextSnapshot, BridgeError>> + Send {
            async { Ok(ContextSnapshot::default()) }
        }
    }

    fn record(id: &str, name: &str) -> EntityRecord {
        EntityRecord::builder()
            .entity_id(id)
            .friendly_name(name)
            .build()
            .unwrap()
    }

    fn id(raw: &str) -> EntityId {
        EntityId::parse(raw).unwrap()
    }

    fn now(records: Vec<EntityRecord>) -> Scripted {
        Scripted::Entities(records, Duration::ZERO)
    }

    #[tokio::test]
    async fn should_start_with_empty_generation_zero() {
        let cache = DirectoryCache::new(ScriptedPlatform::default());
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.number(), 0);
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn should_install_new_generation_on_refresh() {
        let platform = ScriptedPlatform::default();
        platform.push(now(vec![record("light.desk", "Desk Lamp")]));
        let cache = DirectoryCache::new(platform);

        let report = cache.refresh().await.unwrap();

        assert!(report.installed);
        assert_eq!(report.entity_count, 1);
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.number(), report.generation);
        assert!(snapshot.lookup_by_id(&id("light.desk")).is_some());
    }

    #[tokio::test]
    async fn should_keep_previous_generation_when_refresh_fails() {
        let platform = ScriptedPlatform::default();
        platform.push(now(vec![record("light.desk", "Desk Lamp")]));
        platform.push(Scripted::Unreachable);
        let cache = DirectoryCache::new(platform);
        cache.refresh().await.unwrap();

        let result = cache.refresh().await;

        assert!(result.unwrap_err().is_unreachable());
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.lookup_by_id(&id("light.desk")).is_some());
    }

    #[tokio::test]
    async fn should_match_name_and_alias_case_insensitively() {
        let platform = ScriptedPlatform::default();
        platform.push(now(vec![
            record("light.desk", "Desk Lamp"),
            record("light.hall", "Hall"),
        ]));
        let aliases = AliasTable::from([(id("light.hall"), vec!["Entrance".to_string()])]);
        let cache = DirectoryCache::new(platform).with_aliases(aliases);
        cache.refresh().await.unwrap();
        let snapshot = cache.snapshot();

        let by_name = snapshot.lookup_by_name_or_alias("desk lamp");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].entity_id, id("light.desk"));

        let by_alias = snapshot.lookup_by_name_or_alias("ENTRANCE");
        assert_eq!(by_alias.len(), 1);
        assert_eq!(by_alias[0].entity_id, id("light.hall"));
    }

    #[tokio::test]
    async fn should_keep_first_record_of_duplicated_id() {
        let platform = ScriptedPlatform::default();
        platform.push(now(vec![
            record("switch.fan", "Fan"),
            record("switch.fan", "Other Fan"),
        ]));
        let cache = DirectoryCache::new(platform);
        cache.refresh().await.unwrap();

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.lookup_by_id(&id("switch.fan")).unwrap().friendly_name,
            "Fan"
        );
        assert!(snapshot.ids_by_name("other fan").is_empty());
    }

    #[tokio::test]
    async fn should_search_ids_names_and_aliases() {
        let platform = ScriptedPlatform::default();
        platform.push(now(vec![
            record("light.kitchen_ceiling", "Ceiling"),
            record("switch.kettle", "Kettle"),
            record("sensor.outdoor", "Garden"),
        ]));
        let aliases = AliasTable::from([(id("sensor.outdoor"), vec!["Kitchen window".to_string()])]);
        let cache = DirectoryCache::new(platform).with_aliases(aliases);
        cache.refresh().await.unwrap();

        let hits: Vec<_> = cache
            .snapshot()
            .search("KITCHEN")
            .into_iter()
            .map(|r| r.entity_id.to_string())
            .collect();
        assert_eq!(hits, vec!["light.kitchen_ceiling", "sensor.outdoor"]);
    }

    #[tokio::test]
    async fn should_group_domain_records_by_area() {
        let platform = ScriptedPlatform::default();
        platform.push(now(vec![
            EntityRecord::builder()
                .entity_id("light.b")
                .area("Bedroom")
                .state(EntityState::On)
                .build()
                .unwrap(),
            record("light.loose", "Loose"),
            record("switch.fan", "Fan"),
        ]));
        let cache = DirectoryCache::new(platform);
        cache.refresh().await.unwrap();
        let snapshot = cache.snapshot();

        let grouped = snapshot.by_domain_and_area(EntityDomain::Light);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&Some("Bedroom")].len(), 1);
        assert_eq!(grouped[&None].len(), 1);
    }

    #[tokio::test]
    async fn should_keep_serving_old_generation_to_holders_after_swap() {
        let platform = ScriptedPlatform::default();
        platform.push(now(vec![record("light.old", "Old")]));
        platform.push(now(vec![record("light.new", "New")]));
        let cache = DirectoryCache::new(platform);
        cache.refresh().await.unwrap();

        let held = cache.snapshot();
        cache.refresh().await.unwrap();

        assert!(held.lookup_by_id(&id("light.old")).is_some());
        assert!(held.lookup_by_id(&id("light.new")).is_none());
        assert_eq!(held.ids_by_name("old"), &[id("light.old")]);

        let current = cache.snapshot();
        assert!(current.number() > held.number());
        assert!(current.lookup_by_id(&id("light.new")).is_some());
        assert!(current.lookup_by_id(&id("light.old")).is_none());
    }

    #[tokio::test]
    async fn should_discard_slower_older_refresh() {
        let platform = ScriptedPlatform::default();
        platform.push(Scripted::Entities(
            vec![record("light.stale", "Stale")],
            Duration::from_millis(100),
        ));
        platform.push(now(vec![record("light.fresh", "Fresh")]));
        let cache = DirectoryCache::new(platform);

        let (slow, fast) = tokio::join!(cache.refresh(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.refresh().await
        });

        let slow = slow.unwrap();
        let fast = fast.unwrap();
        assert!(slow.generation < fast.generation);
        assert!(fast.installed);
        assert!(!slow.installed);
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.number(), fast.generation);
        assert!(snapshot.lookup_by_id(&id("light.fresh")).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_never_expose_torn_generation_to_concurrent_readers() {
        let platform = ScriptedPlatform::default();
        for round in 0..20 {
            let records = (0..10)
                .map(|i| record(&format!("light.g{round}_{i}"), &format!("Lamp {round} {i}")))
                .collect();
            platform.push(now(records));
        }
        let cache = Arc::new(DirectoryCache::new(platform));
        cache.refresh().await.unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let generation = cache.snapshot();
                        for record in generation.records() {
                            let ids = generation.ids_by_name(&record.friendly_name);
                            assert!(ids.contains(&record.entity_id));
                        }
                        assert_eq!(generation.len(), 10);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for _ in 0..19 {
            cache.refresh().await.unwrap();
        }
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(cache.snapshot().number(), 20);
    }
}
