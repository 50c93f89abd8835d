//! Form sets saving a parent row and its children through SQLite.

use std::sync::{Arc, LazyLock};

use miniform_core::MiniformError;
use miniform_db::fields::{FieldDef, FieldType};
use miniform_db::model::ModelMeta;
use miniform_db::{register_meta, DbExecutor, Row, Value};
use miniform_db_backends::SqliteBackend;
use miniform_forms::{Form, FormSet, ModelForm};
use miniform_http::FormData;

static ORDERS: LazyLock<ModelMeta> = LazyLock::new(|| {
    ModelMeta::new(
        "Order",
        "fs_orders",
        vec![
            FieldDef::new("id", FieldType::AutoField).primary_key(),
            FieldDef::new("customer", FieldType::CharField).max_length(60),
        ],
    )
});

static LINES: LazyLock<ModelMeta> = LazyLock::new(|| {
    ModelMeta::new(
        "Line",
        "fs_lines",
        vec![
            FieldDef::new("id", FieldType::AutoField).primary_key(),
            FieldDef::new("order_id", FieldType::foreign_key("fs_orders")),
            FieldDef::new("sku", FieldType::CharField).max_length(20).unique(),
            FieldDef::new("quantity", FieldType::IntegerField).default(1),
        ],
    )
});

async fn setup() -> Arc<dyn DbExecutor> {
    register_meta(&ORDERS);
    register_meta(&LINES);
    let db = SqliteBackend::memory().unwrap();
    db.execute_sql(&ORDERS.create_table_sql(), &[]).await.unwrap();
    db.execute_sql(&LINES.create_table_sql(), &[]).await.unwrap();
    Arc::new(db)
}

async fn order_set(db: &Arc<dyn DbExecutor>, pk: Option<i64>) -> FormSet {
    let mut parent = ModelForm::builder(&ORDERS).session(Arc::clone(db));
    if let Some(pk) = pk {
        parent = parent.pk(pk);
    }
    FormSet::builder(parent.build().await.unwrap(), ModelForm::builder(&LINES), "order_id")
        .prefix("lines")
        .extra(2)
        .build()
        .await
        .unwrap()
}

async fn lines(db: &Arc<dyn DbExecutor>) -> Vec<Row> {
    db.query("SELECT * FROM fs_lines ORDER BY id", &[]).await.unwrap()
}

#[tokio::test]
async fn test_save_parent_and_children() {
    let db = setup().await;
    let mut set = order_set(&db, None).await;
    set.bind(&FormData::from_pairs([
        ("lines_TOTAL_FORMS", "3"),
        ("customer", "Ann"),
        ("lines_0_sku", "TEA-1"),
        ("lines_0_quantity", "2"),
        ("lines_2_sku", "CUP-9"),
        ("lines_2_quantity", "12"),
    ]))
    .await
    .unwrap();
    assert_eq!(set.children().len(), 3);
    assert!(set.is_valid().await, "{:?}", set.errors());

    let pk = set.save().await.unwrap();
    assert_eq!(pk, Value::Int(1));
    assert_eq!(set.parent().current_pk(), Some(Value::Int(1)));
    assert_eq!(set.children()[0].current_pk(), Some(Value::Int(1)));
    assert_eq!(set.children()[1].current_pk(), None);

    let rows = lines(&db).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get::<String>("sku").unwrap(), "TEA-1");
    assert_eq!(rows[0].get::<i64>("quantity").unwrap(), 2);
    assert_eq!(rows[1].get::<String>("sku").unwrap(), "CUP-9");
    assert_eq!(rows[1].get::<i64>("quantity").unwrap(), 12);
    for row in &rows {
        assert_eq!(row.get::<i64>("order_id").unwrap(), 1);
    }
}

#[tokio::test]
async fn test_edit_loads_existing_children() {
    let db = setup().await;
    let mut set = order_set(&db, None).await;
    set.bind(&FormData::from_pairs([
        ("customer", "Ann"),
        ("lines_0_sku", "TEA-1"),
        ("lines_0_quantity", "1"),
        ("lines_1_sku", "CUP-9"),
        ("lines_1_quantity", "3"),
    ]))
    .await
    .unwrap();
    assert!(set.is_valid().await);
    let pk = set.save().await.unwrap();

    let mut edit = order_set(&db, pk.as_i64()).await;
    assert_eq!(edit.children().len(), 4);
    assert_eq!(
        edit.children()[1].field("sku").unwrap().core().value,
        Value::from("CUP-9")
    );
    assert!(edit.render().contains("value=\"4\""));

    // Fewer forms than loaded rows keeps the loaded ones.
    edit.bind(&FormData::from_pairs([
        ("lines_TOTAL_FORMS", "1"),
        ("customer", "Ann Lee"),
        ("lines_0_sku", "TEA-2"),
        ("lines_0_quantity", "1"),
        ("lines_1_sku", "CUP-9"),
        ("lines_1_quantity", "6"),
    ]))
    .await
    .unwrap();
    assert_eq!(edit.children().len(), 2);
    assert!(edit.is_valid().await, "{:?}", edit.errors());
    assert_eq!(edit.save().await.unwrap(), pk);

    let rows = lines(&db).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get::<String>("sku").unwrap(), "TEA-2");
    assert_eq!(rows[1].get::<i64>("quantity").unwrap(), 6);
    let order = db
        .query_one("SELECT customer FROM fs_orders WHERE id = ?", &[pk])
        .await
        .unwrap();
    assert_eq!(order.get::<String>("customer").unwrap(), "Ann Lee");
}

#[tokio::test]
async fn test_child_error_keys() {
    let db = setup().await;
    let mut set = order_set(&db, None).await;
    set.bind(&FormData::from_pairs([
        ("customer", ""),
        ("lines_1_quantity", "lots"),
    ]))
    .await
    .unwrap();
    assert!(!set.is_valid().await);
    assert_eq!(set.active(), [1]);
    assert!(set.errors().contains_key("customer"));
    assert!(set.errors().contains_key("lines_1_sku"));
    assert!(set.errors().contains_key("lines_1_quantity"));
    assert!(lines(&db).await.is_empty());
}

#[tokio::test]
async fn test_failed_child_rolls_back_parent() {
    let db = setup().await;
    let mut set = order_set(&db, None).await;
    // Both children pass the unique check because neither row exists yet.
    set.bind(&FormData::from_pairs([
        ("customer", "Ann"),
        ("lines_0_sku", "DUP"),
        ("lines_0_quantity", "1"),
        ("lines_1_sku", "DUP"),
        ("lines_1_quantity", "1"),
    ]))
    .await
    .unwrap();
    assert!(set.is_valid().await);

    let err = set.save().await.unwrap_err();
    assert!(matches!(err, MiniformError::IntegrityError(_)));
    let orders = db.query("SELECT * FROM fs_orders", &[]).await.unwrap();
    assert!(orders.is_empty());
    assert!(lines(&db).await.is_empty());
    assert_eq!(set.parent().current_pk(), None);
}

#[tokio::test]
async fn test_form_dict() {
    let db = setup().await;
    let set = order_set(&db, None).await;
    let dict = set.form_dict();
    assert_eq!(dict["total_forms"], 2);
    assert_eq!(dict["forms"].as_array().unwrap().len(), 2);
    assert_eq!(dict["form"]["customer"]["name"], "customer");
    assert_eq!(dict["forms"][1]["sku"]["name"], "lines_1_sku");
}
