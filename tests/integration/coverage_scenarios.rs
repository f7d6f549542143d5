#![allow(missing_docs)]

use std::ops::Bound;

use penumbra::{
    query::{
        analyze, coverage::usable_key_prefix, has_key_prefix_constraint, is_index_exact,
        InMemoryCatalog, RelationQuery, TypeFacts, Value,
    },
    AttributeInterval, GraphError, GroupId, LoadingStatus, Result, TypeId, VertexId,
};

const RATED: TypeId = TypeId(1);
const TAGGED: TypeId = TypeId(2);
const MEDIA: GroupId = GroupId(4);
const V: VertexId = VertexId(42);

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_type(TypeFacts::edge(RATED, "rated", MEDIA).key_signature(["stars", "year", "source"]))
        .with_type(TypeFacts::edge(TAGGED, "tagged", MEDIA))
}

fn closed(lo: i64, hi: i64) -> Result<AttributeInterval> {
    AttributeInterval::range(Bound::Included(Value::Int(lo)), Bound::Included(Value::Int(hi)))
}

fn rated() -> RelationQuery {
    RelationQuery::new(V).of_type(RATED)
}

#[test]
fn json_fixtures_resolve_and_analyze() -> Result<()> {
    let catalog = catalog();
    let fixtures = [
        (
            r#"{"vertex":42,"type":1,"constraints":{
                "stars":{"op":"eq","arg":{"t":"Int","v":5}},
                "year":{"op":"eq","arg":{"t":"Int","v":2020}}}}"#,
            true,
            2,
        ),
        (
            r#"{"vertex":42,"direction":"in","type":1,"constraints":{
                "stars":{"op":"eq","arg":{"t":"Int","v":5}},
                "source":{"op":"eq","arg":{"t":"String","v":"web"}}}}"#,
            false,
            1,
        ),
        (r#"{"vertex":42,"group":4}"#, true, 0),
    ];
    for (json, exact, prefix) in fixtures {
        let query: RelationQuery =
            serde_json::from_str(json).map_err(|e| GraphError::InvalidArgument(e.to_string()))?;
        let resolved = query.resolve(&catalog)?;
        let coverage = analyze(&resolved)?;
        assert_eq!(coverage.exact, exact, "{json}");
        assert_eq!(coverage.prefix_len, prefix, "{json}");
    }
    Ok(())
}

#[test]
fn range_ends_the_prefix() -> Result<()> {
    let catalog = catalog();
    let trailing = rated()
        .has("stars", Value::Int(4))
        .interval("year", closed(2000, 2010)?);
    let resolved = trailing.resolve(&catalog)?;
    assert!(is_index_exact(&resolved)?);
    assert_eq!(usable_key_prefix(&resolved)?, ["stars", "year"]);

    let past_range = rated()
        .interval("stars", closed(3, 5)?)
        .has("year", Value::Int(2001));
    let resolved = past_range.resolve(&catalog)?;
    assert!(!is_index_exact(&resolved)?);
    assert_eq!(usable_key_prefix(&resolved)?, ["stars"]);
    Ok(())
}

#[test]
fn holes_demote_exactness_but_keep_the_earlier_prefix() -> Result<()> {
    let catalog = catalog();
    let holed = closed(2000, 2020)?.with_hole(Value::Int(2005), Value::Int(2006))?;
    let query = rated().has("stars", Value::Int(4)).interval("year", holed);
    let resolved = query.resolve(&catalog)?;
    let coverage = analyze(&resolved)?;
    assert!(!coverage.exact);
    assert_eq!(coverage.prefix_len, 1);
    Ok(())
}

#[test]
fn point_interval_counts_as_equality() -> Result<()> {
    let catalog = catalog();
    let query = rated()
        .interval("stars", AttributeInterval::point(Value::Int(3)))
        .has("year", Value::Int(1999));
    assert!(is_index_exact(&query.resolve(&catalog)?)?);
    Ok(())
}

#[test]
fn hole_on_a_point_is_an_invariant_violation() {
    let err = AttributeInterval::point(Value::Int(3))
        .with_hole(Value::Int(3), Value::Int(3))
        .unwrap_err();
    assert_eq!(err.code(), "InvariantViolation");
}

#[test]
fn key_prefix_gates_loading_status() -> Result<()> {
    let catalog = catalog();
    let mut status = LoadingStatus::new();

    let keyed = rated().has("stars", Value::Int(5));
    let resolved = keyed.resolve(&catalog)?;
    assert!(has_key_prefix_constraint(&resolved));
    status.mark_loaded(&resolved);
    assert!(status.is_empty());

    let unkeyed = rated().has("source", Value::from("web"));
    let resolved = unkeyed.resolve(&catalog)?;
    assert!(!has_key_prefix_constraint(&resolved));
    status.mark_loaded(&resolved);
    assert!(status.has_loaded(&rated().resolve(&catalog)?));

    let no_keys = RelationQuery::new(V).of_type(TAGGED).has("label", Value::from("x"));
    assert!(!has_key_prefix_constraint(&no_keys.resolve(&catalog)?));
    let group_only = RelationQuery::new(V).in_group(MEDIA).has("stars", Value::Int(5));
    assert!(!has_key_prefix_constraint(&group_only.resolve(&catalog)?));
    assert!(!has_key_prefix_constraint(&rated().resolve(&catalog)?));
    Ok(())
}

#[test]
fn mark_loaded_chains() -> Result<()> {
    let catalog = catalog();
    let out = RelationQuery::new(V).direction(penumbra::Dir::Out);
    let inc = RelationQuery::new(V).direction(penumbra::Dir::In);
    let mut status = LoadingStatus::new();
    status
        .mark_loaded(&out.resolve(&catalog)?)
        .mark_loaded(&inc.resolve(&catalog)?);
    assert_eq!(status.all_loaded(), 0b11);
    assert!(status.has_loaded(&rated().has("stars", Value::Int(1)).resolve(&catalog)?));
    Ok(())
}
