use std::sync::Arc;

use serde_json::json;

use fieldwright_core::{EntityKind, OperationId};
use fieldwright_engine::{Engine, EngineConfig, HostError, RollbackStatus};
use fieldwright_harness::{HostCall, InMemoryHost, TestRig};

fn scaffold() -> serde_json::Value {
    json!({
        "name": "Blog scaffold",
        "operations": [
            {"target": "field", "name": "Summary", "handle": "summary", "fieldType": "text"},
            {"target": "field", "name": "Body", "handle": "body", "fieldType": "plain_text",
             "settings": {"multiline": true}},
            {"target": "entryType", "name": "Post", "handle": "post",
             "fields": [{"handle": "summary", "required": true}, {"handle": "body"}]},
            {"target": "section", "name": "Blog", "handle": "blog", "entryTypes": ["post"]},
            {"target": "categoryGroup", "name": "Regions", "handle": "regions"},
            {"target": "tagGroup", "name": "Topics", "handle": "topics"},
        ]
    })
}

fn apply_scaffold(rig: &TestRig) -> Result<OperationId, Box<dyn std::error::Error>> {
    let outcome = rig.apply(scaffold())?;
    assert_eq!(outcome.report.failed_count(), 0);
    Ok(outcome.operation_id.ok_or("operation not recorded")?)
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn rollback_restores_prior_state() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    rig.apply(json!({"operations": [
        {"target": "field", "name": "Legacy", "handle": "legacy", "fieldType": "number"},
    ]}))?;
    let before = rig.host.snapshot();
    let schema_before = rig.engine.registry().generate_schema();

    let id = apply_scaffold(&rig)?;
    assert_eq!(rig.host.snapshot().len(), before.len() + 6);

    let report = rig.engine.rollback_operation(id)?.ok_or("nothing rolled back")?;
    assert!(report.is_clean());
    assert_eq!(report.entries.len(), 6);
    assert_eq!(report.detachments.len(), 1);
    assert_eq!(rig.host.snapshot(), before);
    assert_eq!(rig.engine.registry().generate_schema(), schema_before);

    let operation = rig.engine.rollback().get_operation(id)?.ok_or("operation missing")?;
    assert!(operation.rolled_back);
    assert!(operation.rolled_back_at.is_some());
    assert!(!operation.is_active());
    Ok(())
}

#[test]
fn second_rollback_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    let id = apply_scaffold(&rig)?;
    assert!(rig.engine.rollback_operation(id)?.is_some());

    rig.host.clear_calls();
    assert!(rig.engine.rollback_operation(id)?.is_none());
    assert!(rig.host.calls().is_empty());
    Ok(())
}

#[test]
fn unknown_operation_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    apply_scaffold(&rig)?;
    rig.host.clear_calls();

    assert!(rig.engine.rollback_operation(OperationId::new())?.is_none());
    assert!(rig.host.calls().is_empty());
    assert_eq!(rig.host.count(EntityKind::Field), 2);
    Ok(())
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn deletion_follows_dependency_order() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    let id = apply_scaffold(&rig)?;
    rig.host.clear_calls();

    rig.engine.rollback_operation(id)?.ok_or("nothing rolled back")?;
    assert_eq!(
        rig.host.calls(),
        vec![
            HostCall::Detach("blog".into()),
            HostCall::Delete(EntityKind::Section, "blog".into()),
            HostCall::Delete(EntityKind::EntryType, "post".into()),
            HostCall::Delete(EntityKind::Field, "body".into()),
            HostCall::Delete(EntityKind::Field, "summary".into()),
            HostCall::Delete(EntityKind::CategoryGroup, "regions".into()),
            HostCall::Delete(EntityKind::TagGroup, "topics".into()),
        ]
    );
    Ok(())
}

#[test]
fn rollback_all_runs_newest_first() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    let mut ids = Vec::new();
    for handle in ["first", "second", "third"] {
        let outcome = rig.apply(json!({"operations": [
            {"target": "tagGroup", "name": handle, "handle": handle},
        ]}))?;
        ids.push(outcome.operation_id.ok_or("operation not recorded")?);
    }
    rig.engine.rollback_operation(ids[1])?;
    rig.host.clear_calls();

    let reports = rig.engine.rollback().rollback_all()?;
    let rolled: Vec<OperationId> = reports.iter().map(|r| r.operation_id).collect();
    assert_eq!(rolled, vec![ids[2], ids[0]]);
    assert_eq!(
        rig.host.calls(),
        vec![
            HostCall::Delete(EntityKind::TagGroup, "third".into()),
            HostCall::Delete(EntityKind::TagGroup, "first".into()),
        ]
    );
    assert!(rig.engine.rollback().active_operations()?.is_empty());
    Ok(())
}

// ============================================================================
// Partial rollback
// ============================================================================

#[test]
fn entity_removed_out_of_band_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    let id = apply_scaffold(&rig)?;
    assert!(rig.host.remove(EntityKind::TagGroup, "topics"));

    let report = rig.engine.rollback_operation(id)?.ok_or("nothing rolled back")?;
    assert!(!report.is_clean());
    assert!(report.failed().is_empty());
    let skipped = report.skipped();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].item.handle, "topics");
    assert_eq!(report.deleted(EntityKind::Field).len(), 2);
    assert!(rig.host.snapshot().is_empty());
    Ok(())
}

#[test]
fn failed_delete_does_not_stop_the_pass() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    let id = apply_scaffold(&rig)?;
    rig.host.fail_delete(EntityKind::Field, "summary");

    let report = rig.engine.rollback_operation(id)?.ok_or("nothing rolled back")?;
    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].item.handle, "summary");
    assert_eq!(
        failed[0].status,
        RollbackStatus::Failed(HostError::Unavailable("could not delete field 'summary'".into()).to_string())
    );
    assert_eq!(report.deleted(EntityKind::Field).len(), 1);
    assert_eq!(report.deleted(EntityKind::TagGroup).len(), 1);

    assert_eq!(rig.host.count(EntityKind::Field), 1);
    assert_eq!(rig.host.count(EntityKind::TagGroup), 0);
    let operation = rig.engine.rollback().get_operation(id)?.ok_or("operation missing")?;
    assert!(operation.rolled_back);
    Ok(())
}

#[test]
fn field_used_by_later_entry_type_is_kept() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    let id = apply_scaffold(&rig)?;
    rig.apply(json!({"operations": [
        {"target": "entryType", "name": "Page", "handle": "page", "fields": [{"handle": "summary"}]},
    ]}))?;

    let report = rig.engine.rollback_operation(id)?.ok_or("nothing rolled back")?;
    assert!(report.failed().is_empty());
    assert!(!report.is_clean());
    let protected = report.protected();
    assert_eq!(protected.len(), 1);
    assert_eq!(protected[0].item.handle, "summary");
    assert_eq!(
        protected[0].status,
        RollbackStatus::Protected("field 'summary' is used by entryType 'page'".into())
    );
    assert_eq!(report.deleted(EntityKind::Field).len(), 1);
    assert_eq!(rig.host.references_of(EntityKind::EntryType, "page"), Some(vec!["summary".into()]));
    Ok(())
}

#[test]
fn report_serializes_status_and_reason() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    let id = apply_scaffold(&rig)?;
    rig.host.remove(EntityKind::TagGroup, "topics");

    let report = rig.engine.rollback_operation(id)?.ok_or("nothing rolled back")?;
    let value = serde_json::to_value(&report)?;
    assert_eq!(value["operationId"], id.to_string());
    assert_eq!(value["entries"][0]["kind"], "section");
    assert_eq!(value["entries"][0]["status"], "deleted");
    let last = &value["entries"][5];
    assert_eq!(last["item"]["handle"], "topics");
    assert_eq!(last["status"], "skipped");
    assert_eq!(last["reason"], "tagGroup 'topics' no longer exists");
    Ok(())
}

// ============================================================================
// Operation log
// ============================================================================

#[test]
fn deleting_a_record_leaves_entities_alone() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    let id = apply_scaffold(&rig)?;

    assert!(rig.engine.rollback().delete_operation(id)?);
    assert!(!rig.engine.rollback().delete_operation(id)?);
    assert!(rig.engine.rollback_operation(id)?.is_none());
    assert_eq!(rig.host.snapshot().len(), 6);
    Ok(())
}

#[test]
fn cleanup_only_drops_rolled_back_records() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    let mut ids = Vec::new();
    for handle in ["first", "second", "third"] {
        let outcome = rig.apply(json!({"operations": [
            {"target": "tagGroup", "name": handle, "handle": handle},
        ]}))?;
        ids.push(outcome.operation_id.ok_or("operation not recorded")?);
    }
    rig.engine.rollback_operation(ids[0])?.ok_or("nothing rolled back")?;

    assert_eq!(rig.engine.rollback().cleanup_operations(0)?, 1);
    assert_eq!(rig.engine.rollback().cleanup_operations(0)?, 0);
    let remaining: Vec<OperationId> =
        rig.engine.rollback().get_operations()?.iter().map(|op| op.id).collect();
    assert_eq!(remaining, vec![ids[2], ids[1]]);

    let report = rig.engine.rollback_operation(ids[1])?.ok_or("active operation was pruned")?;
    assert!(report.is_clean());
    Ok(())
}

#[test]
fn operations_survive_engine_restart() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = EngineConfig {
        operation_log: Some(dir.path().join("operations.db")),
        ..EngineConfig::default()
    };
    let host = Arc::new(InMemoryHost::new());

    let id = {
        let engine = Engine::open(Arc::clone(&host), config.clone())?;
        let outcome = engine.apply_json("generate", "cli", &scaffold().to_string())?;
        outcome.operation_id.ok_or("operation not recorded")?
    };

    let engine = Engine::open(Arc::clone(&host), config)?;
    let operation = engine.rollback().get_operation(id)?.ok_or("operation lost")?;
    assert_eq!(operation.source, "cli");
    assert_eq!(operation.description.as_deref(), Some("Blog scaffold"));

    let report = engine.rollback_operation(id)?.ok_or("nothing rolled back")?;
    assert!(report.is_clean());
    assert!(host.snapshot().is_empty());
    Ok(())
}

#[test]
fn concurrent_rollbacks_run_once() -> Result<(), Box<dyn std::error::Error>> {
    let rig = TestRig::new()?;
    let id = apply_scaffold(&rig)?;
    rig.host.clear_calls();

    let results: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| rig.engine.rollback_operation(id).map(|r| r.is_some())))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rollback thread panicked"))
            .collect::<Result<Vec<bool>, _>>()
    })?;

    assert_eq!(results.iter().filter(|done| **done).count(), 1);
    assert_eq!(rig.host.calls().len(), 7);
    Ok(())
}
