mod common;

use std::time::Duration;

use common::*;
use cyphervector::{GraphMapError, Outcome, OutcomeStatus, SessionError, StatusDetail};
use serde_json::json;
use uuid::Uuid;

const MERGE_PERSON: &str =
    "MERGE (e:Person { id: $id }) ON CREATE SET e = $entity ON MATCH SET e = $entity";
const FIND_PERSON: &str = "MATCH (x:Person { id: $value }) RETURN x LIMIT 1";

fn stored_person(id: Uuid, name: &str) -> serde_json::Value {
    json!({ "id": id.to_string(), "name": name, "email": "stored@example.org" })
}

#[tokio::test]
async fn test_save_mints_identity_and_merges_in_unit_of_work() {
    let session = MockSession::empty();
    let service = service(session.clone());

    let outcome = service.save(Person::named("Ada")).await.expect("save");
    let saved = outcome.into_data().expect("saved entity");
    let id = saved.root.id.expect("minted id");
    assert!(saved.root.created_at.is_some());
    assert!(saved.root.modified_at.is_none());

    let statements = session.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].text(), MERGE_PERSON);
    assert!(statements[0].in_tx);
    assert_eq!(statements[0].param("id"), Some(&json!(id.to_string())));
    assert_eq!(
        statements[0].param("entity").and_then(|e| e.get("name")),
        Some(&json!("Ada"))
    );
    assert_eq!((session.commits(), session.rollbacks()), (1, 0));
}

#[tokio::test]
async fn test_saving_twice_keeps_the_same_id() {
    let session = MockSession::empty();
    let service = service(session.clone());

    let first = service
        .save(Person::named("Ada"))
        .await
        .expect("save")
        .into_data()
        .expect("first");
    let second = service
        .save(first.clone())
        .await
        .expect("save again")
        .into_data()
        .expect("second");

    assert_eq!(first.root.id, second.root.id);
    assert_eq!(first.root.created_at, second.root.created_at);
    assert!(second.root.modified_at.is_some());
    let ids: Vec<_> = session
        .statements()
        .iter()
        .map(|s| s.param("id").cloned())
        .collect();
    assert_eq!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_session_fault_becomes_error_outcome() {
    let session = MockSession::new(|_| Err(SessionError::connection("socket closed")));
    let service = service(session.clone());

    let outcome = service.save(Person::named("Ada")).await.expect("no declaration defect");
    assert_eq!(outcome.status(), OutcomeStatus::Error);
    match outcome {
        Outcome::Error { fault, input } => {
            assert!(matches!(fault, GraphMapError::Session(_)));
            let input = input.expect("input recorded");
            assert_eq!(input["entity"]["name"], json!("Ada"));
        }
        other => panic!("expected error outcome, got {other:?}"),
    }
    assert_eq!((session.commits(), session.rollbacks()), (0, 1));
}

#[tokio::test]
async fn test_declaration_defect_is_an_err() {
    let service = service(MockSession::empty());
    let err = service.save(Broken::default()).await.unwrap_err();
    assert!(matches!(err, GraphMapError::InvalidDeclaration(_)));
}

#[tokio::test]
async fn test_save_or_update_inserts_new_entity() {
    let session = MockSession::empty();
    let service = service(session.clone());

    let outcome = service
        .save_or_update(
            Person::named("Grace"),
            |p| {
                p.email = Some("grace@example.org".into());
                Ok(())
            },
            |_| panic!("update callback must not run on insert"),
        )
        .await
        .expect("save_or_update");

    let saved = outcome.into_data().expect("inserted");
    assert!(saved.root.id.is_some());
    assert_eq!(saved.email.as_deref(), Some("grace@example.org"));
    assert_eq!(session.texts(), vec![MERGE_PERSON.to_string()]);
}

#[tokio::test]
async fn test_save_or_update_applies_callback_to_stored_copy() {
    let id = Uuid::new_v4();
    let session = MockSession::new(move |statement| {
        if statement.text == FIND_PERSON {
            Ok(vec![row(json!({ "x": stored_person(id, "Stored") }))])
        } else {
            Ok(Vec::new())
        }
    });
    let service = service(session.clone());

    let mut incoming = Person::stored(id, "Incoming");
    incoming.email = Some("incoming@example.org".into());

    let outcome = service
        .save_or_update(
            incoming,
            |_| panic!("insert callback must not run on update"),
            |stored| {
                stored.root.name = Some("Renamed".into());
                Ok(())
            },
        )
        .await
        .expect("save_or_update");

    let saved = outcome.into_data().expect("updated");
    assert_eq!(saved.root.name.as_deref(), Some("Renamed"));
    // Fields the callback does not copy keep their stored values.
    assert_eq!(saved.email.as_deref(), Some("stored@example.org"));
    assert!(saved.root.modified_at.is_some());

    let statements = session.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0].text(), FIND_PERSON);
    assert_eq!(statements[1].text(), MERGE_PERSON);
    assert!(statements.iter().all(|s| s.in_tx));
    assert_eq!(session.commits(), 1);
}

#[tokio::test]
async fn test_update_of_missing_node_is_not_found() {
    let session = MockSession::empty();
    let service = service(session.clone());

    let outcome = service
        .update::<Person, _>(Uuid::new_v4(), |_| Ok(()))
        .await
        .expect("update");

    assert_eq!(outcome.detail(), Some(StatusDetail::NotFound));
    assert_eq!(session.texts(), vec![FIND_PERSON.to_string()]);
}

#[tokio::test]
async fn test_failing_callback_rolls_back() {
    let id = Uuid::new_v4();
    let session = MockSession::new(move |statement| {
        if statement.text == FIND_PERSON {
            Ok(vec![row(json!({ "x": stored_person(id, "Stored") }))])
        } else {
            Ok(Vec::new())
        }
    });
    let service = service(session.clone());

    let outcome = service
        .update::<Person, _>(id, |_| Err(GraphMapError::invalid_input("refused")))
        .await
        .expect("update");

    assert_eq!(outcome.status(), OutcomeStatus::Error);
    assert_eq!((session.commits(), session.rollbacks()), (0, 1));
    assert!(!session.texts().iter().any(|t| t.starts_with("MERGE")));
}

#[tokio::test]
async fn test_soft_delete_and_undelete_toggle_flag() {
    let id = Uuid::new_v4();
    let session = MockSession::new(move |statement| {
        if statement.text == FIND_PERSON {
            Ok(vec![row(json!({ "x": stored_person(id, "Ada") }))])
        } else {
            Ok(Vec::new())
        }
    });
    let service = service(session.clone());
    let people = service.entities::<Person>();

    assert!(people.delete_node(id).await.expect("delete").is_success());
    assert!(people.undelete_node(id).await.expect("undelete").is_success());

    let merges: Vec<_> = session
        .statements()
        .into_iter()
        .filter(|s| s.text() == MERGE_PERSON)
        .collect();
    assert_eq!(merges.len(), 2);
    assert_eq!(merges[0].param("entity").map(|e| &e["is_deleted"]), Some(&json!(true)));
    assert_eq!(merges[1].param("entity").map(|e| &e["is_deleted"]), Some(&json!(false)));
    assert_eq!(session.commits(), 2);
}

#[tokio::test]
async fn test_delete_missing_node_is_not_found() {
    let service = service(MockSession::empty());
    let outcome = service.delete_node::<Person>(Uuid::new_v4()).await.expect("delete");
    assert_eq!(outcome.detail(), Some(StatusDetail::NotFound));
}

#[tokio::test]
async fn test_purge_detaches_and_deletes() {
    let session = MockSession::empty();
    let service = service(session.clone());
    let id = Uuid::new_v4();

    let outcome = service.purge_node::<Person>(id).await.expect("purge");

    assert!(outcome.is_success());
    let statements = session.statements();
    assert_eq!(statements[0].text(), "MATCH (x:Person { id: $id }) DETACH DELETE x");
    assert_eq!(statements[0].param("id"), Some(&json!(id.to_string())));
}

#[tokio::test]
async fn test_find_lookups() {
    let id = Uuid::new_v4();
    let session = MockSession::new(move |statement| {
        match statement.param("value").and_then(|v| v.as_str()) {
            Some("ada") => Ok(vec![row(json!({ "x": stored_person(id, "Ada") }))]),
            _ => Ok(Vec::new()),
        }
    });
    let service = service(session.clone());

    let found = service.find_by_code::<Person>("ada").await.expect("by code");
    assert_eq!(found.and_then(|p| p.root.id), Some(id));
    assert!(service.find::<Person>(Uuid::new_v4()).await.expect("by id").is_none());
    assert!(service.find_by_name::<Person>("nobody").await.expect("by name").is_none());

    let texts = session.texts();
    assert_eq!(texts[0], "MATCH (x:Person { code: $value }) RETURN x LIMIT 1");
    assert_eq!(texts[1], FIND_PERSON);
    assert_eq!(texts[2], "MATCH (x:Person { name: $value }) RETURN x LIMIT 1");
    assert_eq!(session.begun(), 0);
}

#[tokio::test]
async fn test_all_cached_is_dropped_on_save() {
    let session = MockSession::new(|statement| {
        if statement.text.starts_with("MATCH (x:Person) RETURN x") {
            Ok(vec![row(json!({ "x": { "name": "Ada" } }))])
        } else {
            Ok(Vec::new())
        }
    });
    let service = service(session.clone());
    let ttl = Duration::from_secs(60);
    let scans = |session: &MockSession| {
        session
            .texts()
            .iter()
            .filter(|t| t.starts_with("MATCH (x:Person) RETURN x"))
            .count()
    };

    let first = service.all_cached::<Person>(Some("x.name"), ttl).await.expect("scan");
    let again = service.all_cached::<Person>(Some("x.name"), ttl).await.expect("cached");
    assert_eq!(first, again);
    assert_eq!(scans(&*session), 1);
    assert_eq!(
        session.texts()[0],
        "MATCH (x:Person) RETURN x ORDER BY x.name"
    );

    service.save(Person::named("Grace")).await.expect("save");
    service.all_cached::<Person>(Some("x.name"), ttl).await.expect("rescan");
    assert_eq!(scans(&*session), 2);
}
