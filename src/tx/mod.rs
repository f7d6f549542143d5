//! Transaction-scoped relation loading.
//!
//! A [`RelationTx`] answers relation queries for single vertices. The first
//! time a scope of a vertex is asked for, the relations are fetched from the
//! [`RelationStore`], materialized into the transaction's arena and the
//! fetch is recorded in the vertex's [`LoadingStatus`]. Later queries that
//! the status covers are answered from memory alone.

mod options;

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::query::{analyze, RelationQuery, ResolvedQuery, TypeCatalog, Value};
use crate::storage::{
    CodecRegistry, Dir, FetchRequest, LoadingStatus, Relation, RelationArena, RelationMetrics,
    RelationStore,
};
use crate::types::{RelationId, TypeId, VertexId};

pub use options::TxOptions;

/// One transaction's view of the relations it has touched.
pub struct RelationTx {
    catalog: Arc<dyn TypeCatalog>,
    store: Arc<dyn RelationStore>,
    codecs: Arc<CodecRegistry>,
    options: TxOptions,
    metrics: Arc<dyn RelationMetrics>,
    arena: RelationArena,
    loading: FxHashMap<VertexId, LoadingStatus>,
    removed: FxHashSet<RelationId>,
}

impl RelationTx {
    /// Opens a transaction over `store`.
    pub fn new(
        catalog: Arc<dyn TypeCatalog>,
        store: Arc<dyn RelationStore>,
        codecs: Arc<CodecRegistry>,
        options: TxOptions,
    ) -> Self {
        let metrics = options.metrics_or_default();
        Self {
            catalog,
            store,
            codecs,
            arena: RelationArena::with_metrics(metrics.clone()),
            metrics,
            options,
            loading: FxHashMap::default(),
            removed: FxHashSet::default(),
        }
    }

    /// Options the transaction was opened with.
    pub fn options(&self) -> &TxOptions {
        &self.options
    }

    /// Schema the transaction resolves types against.
    pub fn catalog(&self) -> &Arc<dyn TypeCatalog> {
        &self.catalog
    }

    /// Relations materialized so far.
    pub fn arena(&self) -> &RelationArena {
        &self.arena
    }

    /// Fetches recorded for `vertex`, if any.
    pub fn loading_status(&self, vertex: VertexId) -> Option<&LoadingStatus> {
        self.loading.get(&vertex)
    }

    /// Ids of the relations of the query's vertex that match it.
    pub fn relations(&mut self, query: &RelationQuery) -> Result<Vec<RelationId>> {
        let catalog = Arc::clone(&self.catalog);
        let resolved = query.resolve(catalog.as_ref())?;
        let vertex = query.vertex();
        let hit = self.options.loading_cache
            && self
                .loading
                .get(&vertex)
                .is_some_and(|status| status.has_loaded(&resolved));
        self.metrics.loading_status(hit);
        if hit {
            debug!(vertex = %vertex, scope = ?resolved.scope(), "relcache.loading.hit");
        } else {
            debug!(vertex = %vertex, scope = ?resolved.scope(), "relcache.loading.miss");
            self.load(&resolved)?;
        }

        let mut matched = Vec::new();
        let mut dropped = 0usize;
        for relation in self.arena.relations_of(vertex) {
            if !resolved.matches_scope(relation, catalog.as_ref())? {
                continue;
            }
            if resolved.satisfies_constraints(relation) {
                matched.push(relation.id());
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.metrics.post_filtered(dropped);
        }
        Ok(matched)
    }

    fn load(&mut self, resolved: &ResolvedQuery<'_>) -> Result<()> {
        let vertex = resolved.query().vertex();
        let coverage = analyze(resolved)?;
        let dir = resolved.direction();
        self.metrics.store_fetch(dir.as_str(), coverage.exact);
        let rows = self.store.fetch(&FetchRequest {
            query: resolved,
            coverage,
        })?;
        let fetched = rows.len();
        // Nothing is materialized until every row decodes and verifies.
        let mut decoded = Vec::with_capacity(fetched);
        for row in rows {
            if self.removed.contains(&row.id()) {
                continue;
            }
            if row.direction(vertex).is_none() {
                return Err(GraphError::invariant(format!(
                    "store returned relation {} not incident on {vertex}",
                    row.id()
                )));
            }
            let facts = self.catalog.type_facts(row.ty())?;
            let relation = row.decode(&facts, &self.codecs)?;
            if coverage.exact
                && self.options.verify_exact_fetches
                && !resolved.satisfies_constraints(&relation)
            {
                return Err(GraphError::invariant(format!(
                    "index-exact fetch for {vertex} returned non-matching relation {}",
                    relation.id()
                )));
            }
            decoded.push(relation);
        }
        let mut materialized = 0usize;
        for relation in decoded {
            if self.arena.insert(relation)? {
                materialized += 1;
            }
        }
        if self.options.loading_cache {
            self.loading.entry(vertex).or_default().mark_loaded(resolved);
        }
        debug!(
            vertex = %vertex,
            dir = %dir,
            exact = coverage.exact,
            prefix_len = coverage.prefix_len,
            fetched,
            materialized,
            "relcache.fetch"
        );
        Ok(())
    }

    /// Looks up a materialized relation.
    pub fn relation(&self, id: RelationId) -> Result<&Relation> {
        self.arena.get(id)
    }

    /// Resolves a type name against the catalog.
    pub fn type_id(&self, name: &str) -> Result<TypeId> {
        self.catalog.resolve_type(name)
    }

    /// Creates an edge of type `ty` inside the transaction.
    pub fn add_edge<I>(
        &mut self,
        ty: TypeId,
        start: VertexId,
        end: VertexId,
        attrs: I,
    ) -> Result<RelationId>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let facts = self.catalog.type_facts(ty)?;
        let id = self.arena.add_edge(&facts, start, end, attrs)?;
        debug!(relation = %id, ty = %ty, start = %start, end = %end, "relcache.tx.add_edge");
        Ok(id)
    }

    /// Creates a property of type `ty` on `vertex` inside the transaction.
    pub fn add_property(&mut self, ty: TypeId, vertex: VertexId, value: Value) -> Result<RelationId> {
        let facts = self.catalog.type_facts(ty)?;
        let id = self.arena.add_property(&facts, vertex, value)?;
        debug!(relation = %id, ty = %ty, vertex = %vertex, "relcache.tx.add_property");
        Ok(id)
    }

    /// Removes a relation from every vertex holding it.
    ///
    /// The relation stays removed for the rest of the transaction: later
    /// fetches skip it even if storage still returns it.
    pub fn remove_relation(&mut self, id: RelationId) -> Result<Relation> {
        let relation = self.arena.force_delete(id)?;
        self.removed.insert(id);
        Ok(relation)
    }

    /// The single hidden functional relation of type `ty` on `vertex`.
    pub fn hidden_functional_property(
        &mut self,
        vertex: VertexId,
        ty: TypeId,
    ) -> Result<Option<RelationId>> {
        let facts = self.catalog.type_facts(ty)?;
        if !(facts.hidden && facts.functional) {
            return Err(GraphError::InvalidArgument(format!(
                "type '{}' is not hidden and functional",
                facts.name
            )));
        }
        let query = RelationQuery::new(vertex)
            .direction(Dir::Out)
            .of_type(ty)
            .with_hidden();
        let ids = self.relations(&query)?;
        match ids.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(*id)),
            many => Err(GraphError::invariant(format!(
                "functional type '{}' has {} relations on {vertex}",
                facts.name,
                many.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{InMemoryCatalog, TypeFacts};
    use crate::storage::{CounterMetrics, MemoryStore, StoredRelation};
    use crate::types::GroupId;
    use std::sync::atomic::Ordering;

    const KNOWS: TypeId = TypeId(1);
    const NAME: TypeId = TypeId(2);
    const V1: VertexId = VertexId(1);

    fn catalog() -> Arc<InMemoryCatalog> {
        Arc::new(
            InMemoryCatalog::new()
                .with_type(TypeFacts::edge(KNOWS, "knows", GroupId(1)).key_signature(["since"]))
                .with_type(
                    TypeFacts::property(NAME, "_name", GroupId(1))
                        .hidden()
                        .functional(),
                ),
        )
    }

    fn open(store: MemoryStore, metrics: Arc<CounterMetrics>) -> RelationTx {
        RelationTx::new(
            catalog(),
            Arc::new(store),
            Arc::new(CodecRegistry::builtin()),
            TxOptions::new().metrics(metrics),
        )
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new(catalog(), Arc::new(CodecRegistry::builtin()));
        for (end, since) in [(2, 2019), (3, 2021)] {
            store
                .insert_edge(
                    KNOWS,
                    V1,
                    VertexId(end),
                    [("since".to_string(), Value::Int(since))],
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn second_query_is_served_from_memory() {
        let metrics = Arc::new(CounterMetrics::default());
        let mut tx = open(store(), metrics.clone());
        let query = RelationQuery::new(V1).direction(Dir::Out).of_type(KNOWS);
        assert_eq!(tx.relations(&query).unwrap().len(), 2);
        assert_eq!(tx.relations(&query).unwrap().len(), 2);
        assert_eq!(metrics.loading_misses.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.loading_hits.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.relations_created.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn removed_relation_is_not_rematerialized() {
        let metrics = Arc::new(CounterMetrics::default());
        let mut tx = open(store(), metrics);
        let ids = tx
            .relations(&RelationQuery::new(V1).direction(Dir::Out).of_type(KNOWS))
            .unwrap();
        tx.remove_relation(ids[0]).unwrap();
        let all = tx.relations(&RelationQuery::new(V1)).unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all.contains(&ids[0]));
    }

    #[test]
    fn hidden_functional_property_requires_matching_type() {
        let metrics = Arc::new(CounterMetrics::default());
        let mut tx = open(store(), metrics);
        assert!(matches!(
            tx.hidden_functional_property(V1, KNOWS),
            Err(GraphError::InvalidArgument(_))
        ));
        assert_eq!(tx.hidden_functional_property(V1, NAME).unwrap(), None);
        let id = tx.add_property(NAME, V1, Value::from("ann")).unwrap();
        assert_eq!(tx.hidden_functional_property(V1, NAME).unwrap(), Some(id));
        tx.add_property(NAME, V1, Value::from("bob")).unwrap();
        assert!(matches!(
            tx.hidden_functional_property(V1, NAME),
            Err(GraphError::InvariantViolation(_))
        ));
    }

    struct LyingStore;

    impl RelationStore for LyingStore {
        fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<StoredRelation>> {
            let codecs = CodecRegistry::builtin();
            let edge = |id, end, since| -> Result<StoredRelation> {
                Ok(StoredRelation::Edge {
                    id: RelationId(id),
                    ty: KNOWS,
                    start: request.query.query().vertex(),
                    end: VertexId(end),
                    attrs: vec![("since".to_string(), codecs.encode(&Value::Int(since))?)],
                })
            };
            Ok(vec![edge(39, 8, 2021)?, edge(40, 9, 1999)?])
        }
    }

    #[test]
    fn exact_fetch_returning_extra_rows_is_an_invariant_violation() {
        let query = RelationQuery::new(V1)
            .of_type(KNOWS)
            .has("since", Value::Int(2021));
        let mut tx = RelationTx::new(
            catalog(),
            Arc::new(LyingStore),
            Arc::new(CodecRegistry::builtin()),
            TxOptions::new(),
        );
        assert!(matches!(
            tx.relations(&query),
            Err(GraphError::InvariantViolation(_))
        ));
        assert!(tx.arena().is_empty());
        assert!(tx.arena().relation_ids(VertexId(8)).is_empty());
        assert!(tx.loading_status(V1).is_none());

        let mut lenient = RelationTx::new(
            catalog(),
            Arc::new(LyingStore),
            Arc::new(CodecRegistry::builtin()),
            TxOptions::new().verify_exact_fetches(false),
        );
        assert_eq!(lenient.relations(&query).unwrap(), vec![RelationId(39)]);
    }
}
