mod common;

use pretty_assertions::assert_eq;

use common::{install_schema, install_tds_schema, mysql_database, tds_database, users_columns};
use dbstore::schema::{ColumnSpec, LengthSpec};
use dbstore::{Column, ColumnPosition, CreateOptions, Error, IndexKind, TableSpec};

#[tokio::test]
async fn introspection_round_trips_rendered_columns() {
    let (gateway, db) = mysql_database();
    let desired = users_columns();
    install_schema(&gateway, "users", &desired);

    let table = db.table("users");
    let live = table.columns().await.unwrap();

    assert_eq!(
        live.names().collect::<Vec<_>>(),
        desired.iter().map(Column::name).collect::<Vec<_>>()
    );
    for column in &desired {
        let introspected = live.get(column.name()).unwrap();
        assert!(
            column.same_definition(introspected),
            "{} came back as {:?}",
            column.name(),
            introspected
        );
        assert_eq!(introspected.index(), column.index(), "index of {}", column.name());
    }
}

#[tokio::test]
async fn columns_are_cached_until_reload() {
    let (gateway, db) = mysql_database();
    install_schema(&gateway, "users", &users_columns());
    let table = db.table("users");

    table.columns().await.unwrap();
    table.columns().await.unwrap();
    fn catalog_reads(gateway: &dbstore::ScriptedGateway) -> usize {
        gateway
            .queries()
            .iter()
            .filter(|q| q.sql.contains(common::COLUMNS_QUERY))
            .count()
    }
    assert_eq!(catalog_reads(&gateway), 1);

    table.reload_columns().await.unwrap();
    assert_eq!(catalog_reads(&gateway), 2);
}

#[tokio::test]
async fn second_alter_emits_nothing() {
    let (gateway, db) = mysql_database();
    let desired = users_columns();

    let mut current: Vec<Column> = desired.iter().filter(|c| c.name() != "bio").cloned().collect();
    current[2] = Column::new("name", "VARCHAR").with_length("50").with_nullable(true);
    install_schema(&gateway, "users", &current);

    let table = db.table("users");
    let statements = table.alter(&desired).await.unwrap();
    assert_eq!(
        statements,
        vec![
            "ALTER TABLE shop.users MODIFY name VARCHAR(100) NULL AFTER email".to_string(),
            "ALTER TABLE shop.users ADD COLUMN bio TEXT NULL AFTER balance".to_string(),
        ]
    );
    assert_eq!(gateway.executed(), statements);

    // The server now reports the altered table.
    install_schema(&gateway, "users", &desired);
    table.reload_columns().await.unwrap();
    gateway.clear_log();

    assert!(table.alter(&desired).await.unwrap().is_empty());
    assert!(gateway.executed().is_empty());
}

#[tokio::test]
async fn swapping_two_columns_moves_one() {
    let (gateway, db) = mysql_database();
    let current = users_columns();
    install_schema(&gateway, "users", &current);

    let mut desired = current.clone();
    desired.swap(1, 2);

    let statements = db.table("users").plan_alter(&desired).await.unwrap();
    assert_eq!(
        statements,
        vec!["ALTER TABLE shop.users MODIFY name VARCHAR(100) NULL AFTER id".to_string()]
    );
}

#[tokio::test]
async fn moving_a_column_first() {
    let (gateway, db) = mysql_database();
    let current = users_columns();
    install_schema(&gateway, "users", &current);

    let mut desired = current.clone();
    let created = desired.pop().unwrap();
    desired.insert(0, created);

    let statements = db.table("users").plan_alter(&desired).await.unwrap();
    assert_eq!(
        statements,
        vec!["ALTER TABLE shop.users MODIFY created DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP FIRST".to_string()]
    );
}

#[tokio::test]
async fn index_changes_and_drops() {
    let (gateway, db) = mysql_database();
    let current = users_columns();
    install_schema(&gateway, "users", &current);

    let desired: Vec<Column> = current
        .iter()
        .filter(|c| c.name() != "bio")
        .map(|c| match c.name() {
            "email" => Column::new("email", "VARCHAR").with_length("255").with_index(IndexKind::Index),
            "born" => c.clone().with_index(IndexKind::Index),
            _ => c.clone(),
        })
        .collect();

    let statements = db.table("users").plan_alter(&desired).await.unwrap();
    assert_eq!(
        statements,
        vec![
            "ALTER TABLE shop.users DROP INDEX email".to_string(),
            "ALTER TABLE shop.users ADD INDEX email(email)".to_string(),
            "ALTER TABLE shop.users ADD INDEX born(born)".to_string(),
            "ALTER TABLE shop.users DROP COLUMN bio".to_string(),
        ]
    );
}

#[tokio::test]
async fn altering_a_missing_table_fails() {
    let (_gateway, db) = mysql_database();
    let result = db.table("ghosts").alter(&users_columns()).await;
    assert!(matches!(result, Err(Error::SchemaError(_))));
}

#[tokio::test]
async fn invalid_auto_increment_is_rejected_before_any_statement() {
    let (gateway, db) = mysql_database();
    install_schema(&gateway, "users", &users_columns());

    let mut desired = users_columns();
    desired[4] = Column::new("balance", "INT").with_auto_increment(true);

    let result = db.table("users").alter(&desired).await;
    assert!(matches!(result, Err(Error::ValidationError(_))));
    assert!(gateway.executed().is_empty());
}

#[tokio::test]
async fn create_with_and_without_indexes() {
    let (gateway, db) = mysql_database();
    let table = db.table("users");
    let columns = vec![
        Column::new("id", "INT").with_auto_increment(true).with_index(IndexKind::Primary),
        Column::new("email", "VARCHAR").with_length("255").with_index(IndexKind::Unique),
    ];

    let statements = table
        .create(
            &columns,
            CreateOptions {
                drop: true,
                include_index: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        statements,
        vec![
            "DROP TABLE IF EXISTS users".to_string(),
            "CREATE TABLE shop.users (\nid INT NOT NULL AUTO_INCREMENT, email VARCHAR(255) NOT NULL, PRIMARY KEY(id), UNIQUE(email)) CHARACTER SET utf8".to_string(),
        ]
    );
    assert_eq!(gateway.executed(), statements);

    let bare = table
        .plan_create(
            &columns,
            CreateOptions {
                drop: false,
                include_index: false,
            },
        )
        .unwrap();
    assert_eq!(
        bare,
        vec!["CREATE TABLE shop.users (\nid INT NOT NULL AUTO_INCREMENT, email VARCHAR(255) NOT NULL) CHARACTER SET utf8".to_string()]
    );
}

#[tokio::test]
async fn add_column_after_an_existing_one() {
    let (gateway, db) = mysql_database();
    install_schema(&gateway, "users", &users_columns());
    let table = db.table("users");

    let nickname = Column::new("nickname", "VARCHAR")
        .with_length("20")
        .with_nullable(true)
        .with_index(IndexKind::Unique);
    let statements = table
        .add_column(&nickname, ColumnPosition::After("name".to_string()))
        .await
        .unwrap();
    assert_eq!(
        statements,
        vec![
            "ALTER TABLE shop.users ADD COLUMN nickname VARCHAR(20) NULL AFTER name".to_string(),
            "ALTER TABLE shop.users ADD UNIQUE INDEX nickname(nickname)".to_string(),
        ]
    );

    let duplicate = table.add_column(&Column::new("email", "VARCHAR"), ColumnPosition::End).await;
    assert!(matches!(duplicate, Err(Error::ValidationError(_))));
}

fn users_spec(recreate: bool) -> TableSpec {
    TableSpec {
        name: "users".to_string(),
        recreate,
        columns: vec![
            ColumnSpec {
                name: "id".to_string(),
                data_type: "INT".to_string(),
                length: None,
                default: None,
                nullable: false,
                auto_increment: true,
                index: Some(IndexKind::Primary),
                attributes: None,
                extra: None,
            },
            ColumnSpec {
                name: "email".to_string(),
                data_type: "VARCHAR".to_string(),
                length: Some(LengthSpec::Number(255)),
                default: None,
                nullable: false,
                auto_increment: false,
                index: None,
                attributes: None,
                extra: None,
            },
        ],
    }
}

#[tokio::test]
async fn sync_creates_missing_tables() {
    let (gateway, db) = mysql_database();

    let statements = db.sync(&users_spec(false)).await.unwrap();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with("CREATE TABLE shop.users ("));
    assert_eq!(gateway.executed(), statements);
}

#[tokio::test]
async fn sync_alters_existing_tables() {
    let (gateway, db) = mysql_database();
    let spec = users_spec(false);
    install_schema(&gateway, "users", &spec.columns().unwrap()[..1]);

    let statements = db.sync(&spec).await.unwrap();
    assert_eq!(
        statements,
        vec!["ALTER TABLE shop.users ADD COLUMN email VARCHAR(255) NOT NULL AFTER id".to_string()]
    );
}

#[tokio::test]
async fn planned_sync_executes_nothing() {
    let (gateway, db) = mysql_database();
    install_schema(&gateway, "users", &users_spec(false).columns().unwrap());

    let statements = db.plan_sync(&users_spec(true)).await.unwrap();
    assert_eq!(statements[0], "DROP TABLE IF EXISTS users");
    assert!(gateway.executed().is_empty());
}

#[tokio::test]
async fn tds_indexes_survive_introspection_and_converge() {
    let (gateway, db) = tds_database();
    let desired = vec![
        Column::new("id", "INT").with_auto_increment(true).with_index(IndexKind::Primary),
        Column::new("email", "VARCHAR").with_length("255").with_index(IndexKind::Unique),
        Column::new("name", "VARCHAR").with_length("100").with_nullable(true),
        Column::new("score", "INT").with_index(IndexKind::Index),
    ];
    install_tds_schema(&gateway, "users", &desired);

    let table = db.table("users");
    let live = table.columns().await.unwrap();
    for column in &desired {
        let introspected = live.get(column.name()).unwrap();
        assert!(column.same_definition(introspected), "{} came back as {:?}", column.name(), introspected);
        assert_eq!(introspected.index(), column.index(), "index of {}", column.name());
    }

    assert!(table.plan_alter(&desired).await.unwrap().is_empty());
}
