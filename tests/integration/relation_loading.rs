#![allow(missing_docs)]

use std::ops::Bound;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use penumbra::{
    query::{AttributeInterval, InMemoryCatalog, RelationQuery, TypeCatalog, TypeFacts, Value},
    storage::{CodecRegistry, CounterMetrics, Dir, Directionality, MemoryStore},
    GraphError, GroupId, RelationTx, Result, TxOptions, TypeId, VertexId,
};

const SOCIAL: GroupId = GroupId(1);
const SYSTEM: GroupId = GroupId(2);
const FOLLOWS: TypeId = TypeId(10);
const FRIEND: TypeId = TypeId(11);
const MENTIONS: TypeId = TypeId(12);
const CREATED_BY: TypeId = TypeId(20);

const ANN: VertexId = VertexId(1);
const BOB: VertexId = VertexId(2);
const CAT: VertexId = VertexId(3);
const DAN: VertexId = VertexId(4);

fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(
        InMemoryCatalog::new()
            .with_type(TypeFacts::edge(FOLLOWS, "follows", SOCIAL).key_signature(["weight"]))
            .with_type(
                TypeFacts::edge(FRIEND, "friend", SOCIAL)
                    .directionality(Directionality::Undirected),
            )
            .with_type(
                TypeFacts::edge(MENTIONS, "mentions", SOCIAL)
                    .directionality(Directionality::Unidirected),
            )
            .with_type(
                TypeFacts::property(CREATED_BY, "_created_by", SYSTEM)
                    .hidden()
                    .functional(),
            ),
    )
}

fn seeded_store(catalog: Arc<InMemoryCatalog>) -> Result<MemoryStore> {
    let mut store = MemoryStore::new(catalog, Arc::new(CodecRegistry::builtin()));
    for (end, weight) in [(BOB, 1), (CAT, 5), (DAN, 9)] {
        store.insert_edge(
            FOLLOWS,
            ANN,
            end,
            [("weight".to_string(), Value::Int(weight))],
        )?;
    }
    store.insert_edge(FOLLOWS, BOB, ANN, [("weight".to_string(), Value::Int(3))])?;
    store.insert_edge(FRIEND, CAT, ANN, [])?;
    store.insert_edge(MENTIONS, ANN, DAN, [])?;
    store.insert_property(CREATED_BY, ANN, Value::from("importer"))?;
    Ok(store)
}

struct Fixture {
    tx: RelationTx,
    store: Arc<MemoryStore>,
    metrics: Arc<CounterMetrics>,
}

fn open(options: TxOptions) -> Result<Fixture> {
    let catalog = catalog();
    let store = Arc::new(seeded_store(catalog.clone())?);
    let metrics = Arc::new(CounterMetrics::default());
    let tx = RelationTx::new(
        catalog,
        store.clone(),
        Arc::new(CodecRegistry::builtin()),
        options.metrics(metrics.clone()),
    );
    Ok(Fixture { tx, store, metrics })
}

fn ends(tx: &RelationTx, ids: &[penumbra::RelationId], from: VertexId) -> Result<Vec<VertexId>> {
    let mut out = Vec::new();
    for id in ids {
        let relation = tx.relation(*id)?;
        let binary = relation
            .as_binary()
            .ok_or_else(|| GraphError::InvalidArgument(format!("{id} is not binary")))?;
        out.push(binary.get_other_vertex(from)?);
    }
    out.sort();
    Ok(out)
}

#[test]
fn full_type_fetch_is_cached_per_direction() -> Result<()> {
    let mut fx = open(TxOptions::new())?;
    let out_follows = RelationQuery::new(ANN).direction(Dir::Out).of_type(FOLLOWS);

    let ids = fx.tx.relations(&out_follows)?;
    assert_eq!(ends(&fx.tx, &ids, ANN)?, vec![BOB, CAT, DAN]);
    assert_eq!(fx.store.fetch_count(), 1);

    let again = fx.tx.relations(&out_follows)?;
    assert_eq!(again, ids);
    assert_eq!(fx.store.fetch_count(), 1, "second query served from memory");

    let status = fx.tx.loading_status(ANN).expect("status recorded");
    assert_eq!(status.type_code(FOLLOWS), 0b01);
    assert_eq!(status.group_code(SOCIAL), 0);

    let in_follows = RelationQuery::new(ANN).direction(Dir::In).of_type(FOLLOWS);
    let incoming = fx.tx.relations(&in_follows)?;
    assert_eq!(ends(&fx.tx, &incoming, ANN)?, vec![BOB]);
    assert_eq!(fx.store.fetch_count(), 2);

    assert_eq!(fx.metrics.loading_hits.load(Ordering::Relaxed), 1);
    assert_eq!(fx.metrics.loading_misses.load(Ordering::Relaxed), 2);
    assert_eq!(fx.metrics.fetches_out.load(Ordering::Relaxed), 1);
    assert_eq!(fx.metrics.fetches_in.load(Ordering::Relaxed), 1);
    Ok(())
}

#[test]
fn out_and_in_fetches_together_cover_both() -> Result<()> {
    let mut fx = open(TxOptions::new())?;
    fx.tx
        .relations(&RelationQuery::new(ANN).direction(Dir::Out).of_type(FOLLOWS))?;
    fx.tx
        .relations(&RelationQuery::new(ANN).direction(Dir::In).of_type(FOLLOWS))?;
    let both = fx.tx.relations(&RelationQuery::new(ANN).of_type(FOLLOWS))?;
    assert_eq!(both.len(), 4);
    assert_eq!(fx.store.fetch_count(), 2);
    Ok(())
}

#[test]
fn keyed_fetch_is_filtered_but_not_recorded() -> Result<()> {
    let mut fx = open(TxOptions::new())?;
    let heavy = RelationQuery::new(ANN)
        .direction(Dir::Out)
        .of_type(FOLLOWS)
        .interval("weight", AttributeInterval::at_least(Value::Int(5)));
    let ids = fx.tx.relations(&heavy)?;
    assert_eq!(ends(&fx.tx, &ids, ANN)?, vec![CAT, DAN]);
    assert!(fx
        .tx
        .loading_status(ANN)
        .map_or(true, |status| status.is_empty()));

    fx.tx.relations(&heavy)?;
    assert_eq!(fx.store.fetch_count(), 2, "keyed fetch is never a cache hit");

    let all_out = fx
        .tx
        .relations(&RelationQuery::new(ANN).direction(Dir::Out).of_type(FOLLOWS))?;
    assert_eq!(all_out.len(), 3);
    let light = RelationQuery::new(ANN)
        .direction(Dir::Out)
        .of_type(FOLLOWS)
        .has("weight", Value::Int(1));
    let light_ids = fx.tx.relations(&light)?;
    assert_eq!(ends(&fx.tx, &light_ids, ANN)?, vec![BOB]);
    assert_eq!(fx.store.fetch_count(), 3, "full type fetch covers keyed queries");
    Ok(())
}

#[test]
fn holed_range_is_inexact_and_filtered_in_memory() -> Result<()> {
    let mut fx = open(TxOptions::new())?;
    let interval = AttributeInterval::range(
        Bound::Included(Value::Int(0)),
        Bound::Included(Value::Int(10)),
    )?
        .with_hole(Value::Int(4), Value::Int(6))?;
    let query = RelationQuery::new(ANN)
        .direction(Dir::Out)
        .of_type(FOLLOWS)
        .interval("weight", interval);
    let ids = fx.tx.relations(&query)?;
    assert_eq!(ends(&fx.tx, &ids, ANN)?, vec![BOB, DAN]);
    assert_eq!(fx.metrics.inexact_fetches.load(Ordering::Relaxed), 1);
    assert_eq!(fx.metrics.filtered_out.load(Ordering::Relaxed), 1);
    Ok(())
}

#[test]
fn group_fetch_covers_member_types() -> Result<()> {
    let mut fx = open(TxOptions::new())?;
    let social = fx.tx.relations(&RelationQuery::new(ANN).in_group(SOCIAL))?;
    assert_eq!(social.len(), 6);
    assert_eq!(fx.tx.loading_status(ANN).map(|s| s.group_code(SOCIAL)), Some(0b11));

    let friends = fx.tx.relations(&RelationQuery::new(ANN).of_type(FRIEND))?;
    assert_eq!(ends(&fx.tx, &friends, ANN)?, vec![CAT]);
    let mentions = fx
        .tx
        .relations(&RelationQuery::new(ANN).direction(Dir::Out).of_type(MENTIONS))?;
    assert_eq!(mentions.len(), 1);
    assert_eq!(fx.store.fetch_count(), 1);
    Ok(())
}

#[test]
fn hidden_relations_are_loaded_but_not_returned() -> Result<()> {
    let mut fx = open(TxOptions::new())?;
    let visible = fx.tx.relations(&RelationQuery::new(ANN))?;
    assert_eq!(visible.len(), 6);
    let everything = fx.tx.relations(&RelationQuery::new(ANN).with_hidden())?;
    assert_eq!(everything.len(), 7);
    assert_eq!(fx.store.fetch_count(), 1);

    let owner = fx
        .tx
        .hidden_functional_property(ANN, CREATED_BY)?
        .expect("property present");
    let value = fx
        .tx
        .relation(owner)?
        .as_property()
        .map(|p| p.value().clone());
    assert_eq!(value, Some(Value::from("importer")));
    assert_eq!(fx.store.fetch_count(), 1);
    Ok(())
}

#[test]
fn unidirected_edge_is_invisible_from_its_target() -> Result<()> {
    let mut fx = open(TxOptions::new())?;
    let at_dan = fx.tx.relations(&RelationQuery::new(DAN).of_type(MENTIONS))?;
    assert!(at_dan.is_empty());
    let from_ann = fx
        .tx
        .relations(&RelationQuery::new(ANN).direction(Dir::Out).of_type(MENTIONS))?;
    assert_eq!(from_ann.len(), 1);
    let removed = fx.tx.remove_relation(from_ann[0])?;
    assert_eq!(removed.ty(), MENTIONS);
    assert!(fx.tx.arena().relation_ids(DAN).is_empty());
    Ok(())
}

#[test]
fn local_edges_merge_with_fetched_ones() -> Result<()> {
    let mut fx = open(TxOptions::new())?;
    let local = fx.tx.add_edge(
        FOLLOWS,
        ANN,
        VertexId(99),
        [("weight".to_string(), Value::Int(7))],
    )?;
    let ids = fx
        .tx
        .relations(&RelationQuery::new(ANN).direction(Dir::Out).of_type(FOLLOWS))?;
    assert_eq!(ids.len(), 4);
    assert!(ids.contains(&local));

    fx.tx.remove_relation(local)?;
    assert!(matches!(fx.tx.relation(local), Err(GraphError::NotFound(_))));
    let ids = fx
        .tx
        .relations(&RelationQuery::new(ANN).direction(Dir::Out).of_type(FOLLOWS))?;
    assert_eq!(ids.len(), 3);
    assert_eq!(fx.metrics.relations_deleted.load(Ordering::Relaxed), 1);
    Ok(())
}

#[test]
fn disabled_cache_always_reaches_storage() -> Result<()> {
    let mut fx = open(TxOptions::new().loading_cache(false))?;
    let query = RelationQuery::new(ANN).direction(Dir::Out).of_type(FOLLOWS);
    assert_eq!(fx.tx.relations(&query)?.len(), 3);
    assert_eq!(fx.tx.relations(&query)?.len(), 3);
    assert_eq!(fx.store.fetch_count(), 2);
    assert!(fx.tx.loading_status(ANN).is_none());
    assert_eq!(fx.metrics.relations_created.load(Ordering::Relaxed), 3);
    Ok(())
}

#[test]
fn contract_violations_fail_fast() -> Result<()> {
    let mut fx = open(TxOptions::new())?;
    assert!(matches!(
        fx.tx.relations(&RelationQuery::new(ANN).of_type(TypeId(404))),
        Err(GraphError::UnknownType(TypeId(404)))
    ));
    assert!(matches!(
        fx.tx
            .relations(&RelationQuery::new(ANN).of_type(FOLLOWS).in_group(SYSTEM)),
        Err(GraphError::InvalidArgument(_))
    ));
    assert!(matches!(
        fx.tx.hidden_functional_property(ANN, FOLLOWS),
        Err(GraphError::InvalidArgument(_))
    ));
    assert_eq!(fx.store.fetch_count(), 0);
    assert_eq!(fx.tx.type_id("friend")?, FRIEND);
    assert!(fx.tx.catalog().type_facts(FRIEND)?.directionality == Directionality::Undirected);
    Ok(())
}

#[test]
fn undirected_edge_answers_both_directions_at_both_endpoints() -> Result<()> {
    let mut fx = open(TxOptions::new())?;
    for (vertex, other) in [(ANN, CAT), (CAT, ANN)] {
        for dir in [Dir::Out, Dir::In] {
            let query = RelationQuery::new(vertex).direction(dir).of_type(FRIEND);
            let ids = fx.tx.relations(&query)?;
            assert_eq!(ends(&fx.tx, &ids, vertex)?, vec![other], "{vertex} {dir}");
        }
    }
    let status = fx.tx.loading_status(ANN).expect("status recorded");
    assert_eq!(status.type_code(FRIEND), 0b11);
    assert_eq!(fx.store.fetch_count(), 4);
    Ok(())
}
