//! Memory Adapter End-to-End Tests
//!
//! Every public operation run against the in-memory adapter through the
//! full pipeline: attribute/column mapping, key generation, uniqueness,
//! populates and aggregates.

use std::sync::{Arc, Mutex};

use serde_json::json;
use sluice::schema::{AttributeDef, ModelDef, Orm};
use sluice::{
    BoxError, LifecycleHooks, MemoryAdapter, Meta, OrmConfig, QueryDescriptor, QueryError, Record,
};

fn orm(hooks: LifecycleHooks) -> Arc<Orm> {
    let config = OrmConfig::new()
        .with_datastore("default", "memory")
        .with_model(
            ModelDef::new("user", "default")
                .with_attribute("id", AttributeDef::number())
                .with_attribute("name", AttributeDef::string().required().column("full_name"))
                .with_attribute("email", AttributeDef::string().unique().column("email_address"))
                .with_attribute("age", AttributeDef::number())
                .with_attribute("pets", AttributeDef::has_many("pet", "owner")),
        )
        .with_model(
            ModelDef::new("pet", "default")
                .with_attribute("id", AttributeDef::number())
                .with_attribute("name", AttributeDef::string())
                .with_attribute("owner", AttributeDef::belongs_to("user").column("owner_id")),
        );
    Orm::builder(config)
        .with_adapter("memory", MemoryAdapter::new())
        .with_hooks("user", hooks)
        .build()
        .unwrap()
}

async fn seed(orm: &Arc<Orm>) {
    let users = orm.handle("user").unwrap();
    users
        .create_each(
            json!([
                {"name": "Ada", "email": "ada@example.com", "age": 36},
                {"name": "Grace", "email": "grace@example.com", "age": 45},
                {"name": "Linus", "age": 21}
            ]),
            Meta::new(),
        )
        .await
        .unwrap();

    let pets = orm.handle("pet").unwrap();
    pets.create_each(
        json!([
            {"name": "Rex", "owner": 1},
            {"name": "Tom", "owner": 1},
            {"name": "Nibbles", "owner": 2}
        ]),
        Meta::new(),
    )
    .await
    .unwrap();
}

fn names(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r["name"].as_str().unwrap()).collect()
}

#[tokio::test]
async fn test_create_assigns_keys_and_maps_columns() {
    let orm = orm(LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let created = users
        .create(json!({"name": "Ada", "email": "ada@example.com"}), Meta::new().fetch())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created["id"], json!(1));
    assert_eq!(created["name"], json!("Ada"));
    assert_eq!(created["age"], json!(null));

    let created = users
        .create(json!({"name": "Grace"}), Meta::new())
        .await
        .unwrap();
    assert_eq!(created, None);

    let all = users.find(json!({})).await.unwrap();
    assert_eq!(names(&all), vec!["Ada", "Grace"]);
    assert_eq!(all[1]["id"], json!(2));
}

#[tokio::test]
async fn test_find_filters_sorts_and_projects() {
    let orm = orm(LifecycleHooks::new());
    seed(&orm).await;
    let users = orm.handle("user").unwrap();

    let found = users
        .find(json!({
            "where": {"age": {">": 30}},
            "sort": "age DESC",
            "select": ["name"]
        }))
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[0], json!({"id": 2, "name": "Grace"}).as_object().cloned().unwrap());
    assert_eq!(found[1], json!({"id": 1, "name": "Ada"}).as_object().cloned().unwrap());

    let found = users
        .find(json!({"name": {"startsWith": "li"}}))
        .await
        .unwrap();
    assert_eq!(names(&found), vec!["Linus"]);

    let found = users.find(json!([3, 1])).await.unwrap();
    assert_eq!(names(&found), vec!["Ada", "Linus"]);
}

#[tokio::test]
async fn test_populates_collections_and_singular_associations() {
    let orm = orm(LifecycleHooks::new());
    seed(&orm).await;

    let outcome = orm
        .handle("user")
        .unwrap()
        .execute(
            QueryDescriptor::find("user", json!({"sort": "id ASC"}))
                .with_populate("pets", json!({"sort": "name DESC"})),
        )
        .await
        .unwrap();
    let users = outcome.into_records().unwrap();

    assert_eq!(names(&users), vec!["Ada", "Grace", "Linus"]);
    assert_eq!(
        users[0]["pets"],
        json!([{"id": 2, "name": "Tom", "owner": 1}, {"id": 1, "name": "Rex", "owner": 1}])
    );
    assert_eq!(users[1]["pets"], json!([{"id": 3, "name": "Nibbles", "owner": 2}]));
    assert_eq!(users[2]["pets"], json!([]));

    let outcome = orm
        .handle("pet")
        .unwrap()
        .execute(QueryDescriptor::find("pet", json!({"id": 3})).with_populate("owner", json!(true)))
        .await
        .unwrap();
    let pets = outcome.into_records().unwrap();
    assert_eq!(pets[0]["owner"]["name"], json!("Grace"));
    assert_eq!(pets[0]["owner"]["email"], json!("grace@example.com"));
}

#[tokio::test]
async fn test_aggregates() {
    let orm = orm(LifecycleHooks::new());
    seed(&orm).await;
    let users = orm.handle("user").unwrap();

    assert_eq!(users.count(json!({})).await.unwrap(), 3);
    assert_eq!(users.count(json!({"age": {"<": 40}})).await.unwrap(), 2);
    assert_eq!(users.sum("age", json!({})).await.unwrap(), 102.0);
    assert_eq!(users.avg("age", json!({"id": {"in": [1, 2]}})).await.unwrap(), 40.5);

    // never matches: answered without the adapter
    assert_eq!(users.count(json!({"id": {"in": []}})).await.unwrap(), 0);
    assert_eq!(users.avg("age", json!({"id": {"in": []}})).await.unwrap(), 0.0);

    let err = users.sum("name", json!({})).await.unwrap_err();
    assert_eq!(err.code(), "E_INVALID_NUMERIC_ATTR_NAME");
}

#[tokio::test]
async fn test_uniqueness_reported_with_attribute_names() {
    let orm = orm(LifecycleHooks::new());
    seed(&orm).await;
    let users = orm.handle("user").unwrap();

    let err = users
        .create(json!({"name": "Impostor", "email": "ada@example.com"}), Meta::new())
        .await
        .unwrap_err();
    match &err {
        QueryError::NotUnique { attr_names, .. } => {
            assert_eq!(attr_names, &vec!["email".to_string()])
        }
        other => panic!("expected NotUnique, got {:?}", other),
    }

    let err = users
        .update(json!({"id": 2}), json!({"email": "ada@example.com"}), Meta::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_UNIQUE");

    // nothing was written by either failed mutation
    assert_eq!(users.count(json!({})).await.unwrap(), 3);
    let grace = users.find(json!(2)).await.unwrap();
    assert_eq!(grace[0]["email"], json!("grace@example.com"));
}

#[tokio::test]
async fn test_update_and_destroy_with_hooks() {
    let destroyed = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&destroyed);
    let hooks = LifecycleHooks::new().after_destroy(move |record: Record| {
        log.lock().unwrap().push(record["name"].as_str().unwrap_or_default().to_string());
        async move { Ok::<_, BoxError>(record) }
    });
    let orm = orm(hooks);
    seed(&orm).await;
    let users = orm.handle("user").unwrap();

    let updated = users
        .update(json!({"age": {">=": 36}}), json!({"age": 50}), Meta::new().fetch())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(names(&updated), vec!["Ada", "Grace"]);
    assert!(updated.iter().all(|r| r["age"] == json!(50)));

    let removed = users
        .destroy(json!({"age": 50}), Meta::new().fetch())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(names(&removed), vec!["Ada", "Grace"]);
    assert_eq!(*destroyed.lock().unwrap(), vec!["Ada", "Grace"]);

    let left = users.find(json!({})).await.unwrap();
    assert_eq!(names(&left), vec!["Linus"]);
}

#[tokio::test]
async fn test_before_destroy_can_narrow_criteria() {
    use sluice::query::{Clause, Criteria, Predicate};

    let hooks = LifecycleHooks::new().before_destroy(|mut criteria: Criteria| async move {
        criteria.where_clause = Clause::And(vec![
            criteria.where_clause,
            Clause::Predicate(Predicate::eq("name", json!("Linus"))),
        ]);
        Ok::<_, BoxError>(criteria)
    });
    let orm = orm(hooks);
    seed(&orm).await;
    let users = orm.handle("user").unwrap();

    users.destroy(json!({}), Meta::new()).await.unwrap();
    let left = users.find(json!({})).await.unwrap();
    assert_eq!(names(&left), vec!["Ada", "Grace"]);
}

#[tokio::test]
async fn test_stream_over_memory_adapter() {
    let orm = orm(LifecycleHooks::new());
    let users = orm.handle("user").unwrap();
    let people: Vec<_> = (0..70)
        .map(|i| json!({"name": format!("user-{:02}", i), "age": i}))
        .collect();
    users.create_each(json!(people), Meta::new()).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    users
        .each_record(json!({"where": {"age": {">=": 10}}, "sort": "age DESC"}), move |r: Record| {
            sink.lock().unwrap().push(r["age"].as_u64().unwrap());
            async move { Ok::<_, BoxError>(sluice::Flow::Continue) }
        })
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), (10..70).rev().collect::<Vec<_>>());
}

#[tokio::test]
async fn test_sort_priority_comes_from_list_order() {
    let orm = orm(LifecycleHooks::new());
    let users = orm.handle("user").unwrap();
    users
        .create_each(json!([{"name": "B", "age": 1}, {"name": "A", "age": 2}]), Meta::new())
        .await
        .unwrap();

    let err = users
        .find(json!({"sort": {"name": "ASC", "age": "ASC"}}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_INVALID_CRITERIA");

    let found = users
        .find(json!({"sort": [{"name": "ASC"}, {"age": "ASC"}]}))
        .await
        .unwrap();
    assert_eq!(names(&found), vec!["A", "B"]);

    let found = users
        .find(json!({"sort": [{"age": "DESC"}, {"name": "ASC"}]}))
        .await
        .unwrap();
    assert_eq!(names(&found), vec!["A", "B"]);
}
