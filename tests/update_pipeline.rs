//! Update Pipeline Tests
//!
//! End-to-end behavior of one mutation through the whole chain:
//! - Fetch controls whether records come back
//! - Queries that can never match skip the adapter
//! - Hooks run in order and abort on the first failure
//! - Adapter failures are normalized, uniqueness with the caller's location

mod common;

use std::sync::{Arc, Mutex};

use common::{capture_warnings, ids, orm_with, ScriptedAdapter};
use serde_json::json;
use sluice::adapter::AdapterError;
use sluice::{BoxError, HookName, LifecycleHooks, Meta, Method, QueryError, Record};

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap()
}

// =============================================================================
// Fetch
// =============================================================================

#[tokio::test]
async fn test_update_with_fetch_returns_logical_records() {
    let adapter = ScriptedAdapter::new();
    adapter.reply(Ok(Some(json!([{"id": 1, "full_name": "Ada"}]))));
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let (logs, _guard) = capture_warnings();
    let updated = users
        .update(json!({"id": 1}), json!({"name": "Ada"}), Meta::new().fetch())
        .await
        .unwrap();

    assert_eq!(updated, Some(vec![record(json!({"id": 1, "name": "Ada"}))]));
    assert!(logs.contents().is_empty(), "unexpected log output: {}", logs.contents());

    let calls = adapter.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::Update);
    assert_eq!(calls[0].table, "user");
    assert_eq!(calls[0].values_to_set.as_ref().unwrap()["full_name"], json!("Ada"));
}

#[tokio::test]
async fn test_update_without_fetch_ignores_payload_and_warns() {
    let adapter = ScriptedAdapter::new();
    adapter.reply(Ok(Some(json!([{"id": 1, "full_name": "Ada"}]))));
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let (logs, _guard) = capture_warnings();
    let updated = users
        .update(json!({"id": 1}), json!({"name": "Ada"}), Meta::new())
        .await
        .unwrap();

    assert_eq!(updated, None);
    let output = logs.contents();
    assert!(output.contains("WARN"), "no warning logged: {}", output);
    assert!(output.contains("was not requested"));
}

#[tokio::test]
async fn test_update_without_fetch_and_no_payload_is_quiet() {
    let adapter = ScriptedAdapter::new();
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let (logs, _guard) = capture_warnings();
    let updated = users
        .update(json!({"id": 1}), json!({"name": "Ada"}), Meta::new())
        .await
        .unwrap();

    assert_eq!(updated, None);
    assert!(logs.contents().is_empty());
}

#[tokio::test]
async fn test_unsatisfiable_update_skips_adapter() {
    let adapter = ScriptedAdapter::new();
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let updated = users
        .update(json!({"id": {"in": []}}), json!({"name": "Ada"}), Meta::new().fetch())
        .await
        .unwrap();
    assert_eq!(updated, Some(Vec::new()));

    let updated = users
        .update(json!({"id": {"in": []}}), json!({"name": "Ada"}), Meta::new())
        .await
        .unwrap();
    assert_eq!(updated, None);

    assert!(adapter.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_values_never_reach_adapter() {
    let adapter = ScriptedAdapter::new();
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let err = users
        .update(json!({"id": 1}), json!({"nickname": "A"}), Meta::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_INVALID_VALUES_TO_SET");
    assert!(err.is_usage_error());

    let err = users
        .update(json!({"id": 1}), json!({"age": "old"}), Meta::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_INVALID_VALUES_TO_SET");

    assert!(adapter.calls().is_empty());
}

// =============================================================================
// Lifecycle hooks
// =============================================================================

#[tokio::test]
async fn test_after_update_runs_once_per_record_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let hooks = LifecycleHooks::new().after_update(move |mut record: Record| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(record["id"].as_u64().unwrap());
            record.insert("seen".into(), json!(true));
            Ok::<_, BoxError>(record)
        }
    });

    let adapter = ScriptedAdapter::new();
    adapter.reply(Ok(Some(json!([
        {"id": 3, "full_name": "C"},
        {"id": 1, "full_name": "A"},
        {"id": 2, "full_name": "B"}
    ]))));
    let orm = orm_with(Arc::clone(&adapter), hooks);
    let users = orm.handle("user").unwrap();

    let updated = users
        .update(json!({}), json!({"age": 40}), Meta::new().fetch())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![3, 1, 2]);
    assert_eq!(ids(&updated), vec![3, 1, 2]);
    assert!(updated.iter().all(|r| r["seen"] == json!(true)));
}

#[tokio::test]
async fn test_failing_after_hook_stops_remaining_hooks() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let hooks = LifecycleHooks::new().after_update(move |record: Record| {
        let log = Arc::clone(&log);
        async move {
            let id = record["id"].as_u64().unwrap();
            log.lock().unwrap().push(id);
            let result: Result<Record, BoxError> = if id == 1 {
                Err("audit log unavailable".into())
            } else {
                Ok(record)
            };
            result
        }
    });

    let adapter = ScriptedAdapter::new();
    adapter.reply(Ok(Some(json!([
        {"id": 3, "full_name": "C"},
        {"id": 1, "full_name": "A"},
        {"id": 2, "full_name": "B"}
    ]))));
    let orm = orm_with(Arc::clone(&adapter), hooks);
    let users = orm.handle("user").unwrap();

    let err = users
        .update(json!({}), json!({"age": 40}), Meta::new().fetch())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "E_HOOK");
    assert!(matches!(err, QueryError::Hook { hook: HookName::AfterUpdate, .. }));
    assert_eq!(err.to_string(), "audit log unavailable");
    assert_eq!(*seen.lock().unwrap(), vec![3, 1]);
}

#[tokio::test]
async fn test_before_update_rewrites_values() {
    let hooks = LifecycleHooks::new().before_update(|mut values: Record| async move {
        if let Some(name) = values.get("name").and_then(|v| v.as_str()) {
            let upper = name.to_uppercase();
            values.insert("name".into(), json!(upper));
        }
        Ok::<_, BoxError>(values)
    });

    let adapter = ScriptedAdapter::new();
    let orm = orm_with(Arc::clone(&adapter), hooks);
    let users = orm.handle("user").unwrap();

    users
        .update(json!({"id": 1}), json!({"name": "Ada"}), Meta::new())
        .await
        .unwrap();

    let calls = adapter.calls();
    assert_eq!(calls[0].values_to_set.as_ref().unwrap()["full_name"], json!("ADA"));
}

#[tokio::test]
async fn test_failing_before_hook_aborts_before_adapter() {
    let hooks = LifecycleHooks::new()
        .before_update(|_: Record| async move { Err::<Record, BoxError>("read only".into()) });

    let adapter = ScriptedAdapter::new();
    let orm = orm_with(Arc::clone(&adapter), hooks);
    let users = orm.handle("user").unwrap();

    let err = users
        .update(json!({"id": 1}), json!({"name": "Ada"}), Meta::new())
        .await
        .unwrap_err();

    assert!(matches!(err, QueryError::Hook { hook: HookName::BeforeUpdate, .. }));
    assert_eq!(err.to_string(), "read only");
    assert!(adapter.calls().is_empty());
}

#[tokio::test]
async fn test_skip_all_lifecycle_callbacks() {
    let hooks = LifecycleHooks::new()
        .before_update(|_: Record| async move { Err::<Record, BoxError>("before".into()) })
        .after_update(|_: Record| async move { Err::<Record, BoxError>("after".into()) });

    let adapter = ScriptedAdapter::new();
    adapter.reply(Ok(Some(json!([{"id": 1, "full_name": "Ada"}]))));
    let orm = orm_with(Arc::clone(&adapter), hooks);
    let users = orm.handle("user").unwrap();

    let updated = users
        .update(
            json!({"id": 1}),
            json!({"name": "Ada"}),
            Meta::new().fetch().skip_lifecycle_callbacks(),
        )
        .await
        .unwrap();
    assert_eq!(updated.map(|r| r.len()), Some(1));
}

#[tokio::test]
async fn test_after_hooks_need_fetched_records() {
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let hooks = LifecycleHooks::new().after_update(move |record: Record| {
        *counter.lock().unwrap() += 1;
        async move { Ok::<_, BoxError>(record) }
    });

    let adapter = ScriptedAdapter::new();
    let orm = orm_with(Arc::clone(&adapter), hooks);
    let users = orm.handle("user").unwrap();

    users
        .update(json!({"id": 1}), json!({"name": "Ada"}), Meta::new())
        .await
        .unwrap();
    assert_eq!(*calls.lock().unwrap(), 0);
}

// =============================================================================
// Adapter failures
// =============================================================================

#[tokio::test]
async fn test_uniqueness_violation_is_rewritten() {
    let adapter = ScriptedAdapter::new();
    adapter.reply(Err(AdapterError::not_unique(vec!["email_address".to_string()])));
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let (criteria, values) = (json!({"id": 1}), json!({"email": "ada@example.com"}));
    let line = line!() + 1;
    let pending = users.update(criteria, values, Meta::new());
    let err = pending.await.unwrap_err();

    assert_eq!(err.code(), "E_UNIQUE");
    match err {
        QueryError::NotUnique {
            model,
            attr_names,
            footprint,
            origin,
            ..
        } => {
            assert_eq!(model, "user");
            assert_eq!(attr_names, vec!["email".to_string()]);
            assert_eq!(footprint["identity"], json!("notUnique"));
            assert_eq!(footprint["keys"], json!(["email"]));
            assert_eq!(origin.method(), Method::Update);
            assert!(origin.file().ends_with("update_pipeline.rs"), "{}", origin.file());
            assert_eq!(origin.line(), line);
        }
        other => panic!("expected NotUnique, got {:?}", other),
    }
}

#[tokio::test]
async fn test_plain_adapter_error_is_tagged_with_model() {
    let adapter = ScriptedAdapter::new();
    adapter.reply(Err(AdapterError::new("connection reset")));
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let err = users
        .update(json!({"id": 1}), json!({"name": "Ada"}), Meta::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "E_ADAPTER");
    assert!(err.to_string().contains("connection reset"));
    assert!(err.to_string().contains("user"));
}

#[tokio::test]
async fn test_malformed_adapter_error_is_contract_violation() {
    let adapter = ScriptedAdapter::new();
    adapter.reply(Err(AdapterError::Malformed(json!("nope"))));
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let err = users
        .update(json!({"id": 1}), json!({"name": "Ada"}), Meta::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_ADAPTER_CONTRACT");
    match &err {
        QueryError::AdapterContract { model, datastore, method, .. } => {
            assert_eq!(model, "user");
            assert_eq!(datastore, "default");
            assert_eq!(*method, Method::Update);
        }
        other => panic!("expected AdapterContract, got {:?}", other),
    }
    assert!(err.to_string().contains("model 'user'"));
}

#[tokio::test]
async fn test_non_array_fetch_reply_is_contract_violation() {
    let adapter = ScriptedAdapter::new();
    adapter.reply(Ok(Some(json!({"id": 1, "full_name": "Ada"}))));
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let err = users
        .update(json!({"id": 1}), json!({"name": "Ada"}), Meta::new().fetch())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_ADAPTER_CONTRACT");
    assert!(matches!(err, QueryError::AdapterContract { ref model, .. } if model == "user"));
}

#[tokio::test]
async fn test_drifted_record_is_reported() {
    let adapter = ScriptedAdapter::new();
    adapter.reply(Ok(Some(json!([{"id": 1, "full_name": 42}]))));
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let err = users
        .update(json!({"id": 1}), json!({"name": "Ada"}), Meta::new().fetch())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_SCHEMA_DRIFT");
}

#[tokio::test]
async fn test_missing_adapter_method_is_unsupported() {
    let adapter = ScriptedAdapter::new();
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let err = users.destroy(json!({"id": 1}), Meta::new()).await.unwrap_err();
    assert_eq!(err.code(), "E_UNSUPPORTED_OPERATION");
    assert!(matches!(
        err,
        QueryError::UnsupportedOperation { method: Method::Destroy, .. }
    ));
}

#[tokio::test]
async fn test_count_rejects_non_integer_reply() {
    let adapter = ScriptedAdapter::new();
    adapter.reply(Ok(Some(json!("three"))));
    adapter.reply(Ok(Some(json!(3))));
    let orm = orm_with(Arc::clone(&adapter), LifecycleHooks::new());
    let users = orm.handle("user").unwrap();

    let err = users.count(json!({})).await.unwrap_err();
    assert_eq!(err.code(), "E_ADAPTER_CONTRACT");
    assert_eq!(users.count(json!({})).await.unwrap(), 3);
}
