//! Data-access layer against a real PostgreSQL. Runs when DATABASE_URL is set.

mod common;

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};

use entity_crud_api::config::AppConfig;
use entity_crud_api::database::{ddl, DatabaseError, NewRecord, PaginateOptions, Patch, Record};
use entity_crud_api::entity::{EntityDescriptor, FieldDef, Relation};
use entity_crud_api::validation::SchemaMode;

fn object(v: Value) -> Record {
    v.as_object().cloned().expect("object")
}

#[tokio::test]
async fn create_then_update_keeps_audit_columns() -> Result<()> {
    let Some(pool) = common::database_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(());
    };
    let entity = common::scratch_basics(&pool).await?;
    let repo = common::repository(&pool, &entity);

    let payload = object(json!({ "info": "a", "db": "x", "isActive": false, "isDeleted": true }));
    let created = repo.create_one(NewRecord::build(&entity, &payload, 7)?).await?;
    assert_eq!(created["id"], 1, "first id in a fresh table: {:?}", created);
    assert_eq!(created["info"], "a");
    assert_eq!(created["db"], "x");
    assert_eq!(created["isActive"], true);
    assert_eq!(created["isDeleted"], false);
    assert_eq!(created["addedBy"], 7);
    assert!(created["updatedBy"].is_null());
    assert!(created["createdAt"].is_string());

    let patch = Patch::build(&entity, &object(json!({ "info": "b", "addedBy": 999 })), 8, SchemaMode::Update)?;
    let updated = repo.update(Some(json!({ "id": 1 })), patch).await?.expect("row updated");
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0]["info"], "b");
    assert_eq!(updated[0]["addedBy"], 7, "addedBy must never change");
    assert_eq!(updated[0]["updatedBy"], 8);

    let missing = repo
        .update(Some(json!({ "id": 999 })), Patch::soft_delete(&entity, 8))
        .await?;
    assert!(missing.is_none(), "update of an unknown id should report no match");

    common::drop_table(&pool, &entity).await;
    Ok(())
}

#[tokio::test]
async fn paginate_count_and_filters() -> Result<()> {
    let Some(pool) = common::database_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(());
    };
    let entity = common::scratch_basics(&pool).await?;
    let repo = common::repository(&pool, &entity);
    let config = AppConfig::development().filter;

    assert!(repo.paginate(None, &PaginateOptions::new(&config)).await?.is_none());
    assert_eq!(repo.count(None).await?, 0);
    assert_eq!(repo.create_many(vec![]).await?, 0);

    let records = ["alpha", "beta", "gamma", "delta", "epsilon"]
        .iter()
        .map(|info| NewRecord::build(&entity, &object(json!({ "info": info, "db": "main" })), 1))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(repo.create_many(records).await?, 5);

    let mut options = PaginateOptions::new(&config);
    options.limit = 2;
    options.page = 2;
    options.sort = Some(json!({ "info": "desc" }));
    let page = repo.paginate(None, &options).await?.expect("page");
    assert_eq!(page.total_records, 5);
    assert_eq!(page.total_pages, 3);
    let infos: Vec<_> = page.data.iter().map(|r| r["info"].clone()).collect();
    assert_eq!(infos, vec![json!("delta"), json!("beta")]);

    options.page = 9;
    let past_end = repo.paginate(None, &options).await?.expect("matches exist");
    assert!(past_end.data.is_empty());

    options.page = 1;
    options.select = Some(vec!["id".into(), "info".into()]);
    let projected = repo.paginate(Some(json!({ "info": "alpha" })), &options).await?.expect("page");
    assert_eq!(projected.data.len(), 1);
    assert!(projected.data[0].get("db").is_none(), "projection should drop db: {:?}", projected.data[0]);

    let n = repo
        .count(Some(json!({ "$or": [{ "info": { "$like": "%ta" } }, { "id": { "$in": [1] } }] })))
        .await?;
    assert_eq!(n, 3, "alpha by id, beta and delta by suffix");
    assert_eq!(repo.count(Some(json!({ "id": { "$between": [2, 4] } }))).await?, 3);
    assert_eq!(repo.count(Some(json!({ "db": [] }))).await?, 0);

    let first = repo.find_one(Some(json!({ "db": "main" }))).await?.expect("found");
    assert_eq!(first["info"], "alpha", "find_one orders by id");
    assert!(repo.find_one(Some(json!({ "info": "zeta" }))).await?.is_none());

    common::drop_table(&pool, &entity).await;
    Ok(())
}

#[tokio::test]
async fn soft_and_hard_deletes() -> Result<()> {
    let Some(pool) = common::database_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(());
    };
    let entity = common::scratch_basics(&pool).await?;
    let repo = common::repository(&pool, &entity);

    for info in ["a", "b", "c"] {
        repo.create_one(NewRecord::build(&entity, &object(json!({ "info": info })), 7)?)
            .await?;
    }

    let soft = repo
        .update(Some(json!({ "id": { "$in": [1, 2] } })), Patch::soft_delete(&entity, 8))
        .await?
        .expect("rows soft deleted");
    assert_eq!(soft.len(), 2);
    assert!(soft.iter().all(|r| r["isDeleted"] == true && r["updatedBy"] == 8));

    // Soft-deleted rows stay visible
    let still_there = repo.find_by_pk(1).await?.expect("soft deleted row is retrievable");
    assert_eq!(still_there["isDeleted"], true);

    assert_eq!(repo.delete_by_pk(3).await?, 1);
    assert!(repo.find_by_pk(3).await?.is_none());
    assert_eq!(repo.delete_by_pk(3).await?, 0, "deleting twice removes nothing");

    assert_eq!(repo.destroy(Some(json!({ "id": { "$in": [1, 2, 99] } }))).await?, 2);
    assert_eq!(repo.count(None).await?, 0);

    common::drop_table(&pool, &entity).await;
    Ok(())
}

#[tokio::test]
async fn unknown_filter_columns_are_errors() -> Result<()> {
    let Some(pool) = common::database_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(());
    };
    let entity = common::scratch_basics(&pool).await?;
    let repo = common::repository(&pool, &entity);

    let err = repo.count(Some(json!({ "password": "x" }))).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Filter(_)), "unexpected error: {:?}", err);

    common::drop_table(&pool, &entity).await;
    Ok(())
}

#[tokio::test]
async fn include_attaches_related_rows() -> Result<()> {
    let Some(pool) = common::database_pool().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(());
    };
    let basics = common::scratch_basics(&pool).await?;
    let notes = EntityDescriptor::new("Notes")
        .with_table(format!("{}_notes", basics.table))
        .field(FieldDef::string("title"))
        .field(FieldDef::integer("basicId").nullable())
        .relation(Relation {
            name: "basic".into(),
            table: basics.table.clone(),
            foreign_key: "basicId".into(),
        })
        .with_standard_columns();
    ddl::ensure_table(&pool, &notes).await?;
    let notes = Arc::new(notes);

    common::repository(&pool, &basics)
        .create_one(NewRecord::build(&basics, &object(json!({ "info": "parent" })), 1)?)
        .await?;
    let repo = common::repository(&pool, &notes);
    for payload in [json!({ "title": "linked", "basicId": 1 }), json!({ "title": "orphan" })] {
        repo.create_one(NewRecord::build(&notes, &object(payload), 1)?).await?;
    }

    let mut options = PaginateOptions::new(&AppConfig::development().filter);
    options.include = vec!["basic".into()];
    let page = repo.paginate(None, &options).await?.expect("notes exist");
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0]["basic"]["info"], "parent", "linked note: {:?}", page.data[0]);
    assert!(page.data[1]["basic"].is_null());

    common::drop_table(&pool, &notes).await;
    common::drop_table(&pool, &basics).await;
    Ok(())
}
