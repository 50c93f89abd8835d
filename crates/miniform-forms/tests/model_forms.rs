//! Model forms saving through a SQLite session.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use miniform_core::{MiniformError, Settings, SETTINGS};
use miniform_db::fields::{FieldDef, FieldType, FileConfig};
use miniform_db::model::ModelMeta;
use miniform_db::{register_meta, DbExecutor, Value};
use miniform_db_backends::SqliteBackend;
use miniform_forms::{
    check_password, FieldUpdate, FileStorage, Form, ModelForm, ModelFormConfig, WidgetKind,
};
use miniform_http::{FormData, UploadedFile};

static PUBLISHERS: LazyLock<ModelMeta> = LazyLock::new(|| {
    ModelMeta::new(
        "Publisher",
        "mf_publishers",
        vec![
            FieldDef::new("id", FieldType::AutoField).primary_key(),
            FieldDef::new("name", FieldType::CharField).max_length(40),
        ],
    )
});

static AUTHORS: LazyLock<ModelMeta> = LazyLock::new(|| {
    ModelMeta::new(
        "Author",
        "mf_authors",
        vec![
            FieldDef::new("id", FieldType::AutoField).primary_key(),
            FieldDef::new("name", FieldType::CharField)
                .max_length(40)
                .unique(),
            FieldDef::new("email", FieldType::EmailField).nullable(),
            FieldDef::new(
                "password",
                FieldType::PasswordField {
                    min_length: 8,
                    max_length: 64,
                },
            ),
            FieldDef::new("active", FieldType::BooleanField).default(true),
            FieldDef::new("publisher", FieldType::foreign_key("mf_publishers")).nullable(),
            FieldDef::new(
                "avatar",
                FieldType::FileField(FileConfig::new("avatars", 64).allowed_extensions([".txt"])),
            )
            .nullable(),
        ],
    )
});

struct TempRoot(PathBuf);

impl TempRoot {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("miniform-forms-{}", uuid::Uuid::new_v4())))
    }

    fn storage(&self) -> FileStorage {
        FileStorage::new(&self.0, "/media/")
    }
}

impl Drop for TempRoot {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

async fn setup() -> Arc<dyn DbExecutor> {
    // Keep bcrypt fast; the first configure in this process wins.
    let _ = SETTINGS.configure(Settings {
        password_hash_cost: 4,
        ..Settings::default()
    });
    register_meta(&PUBLISHERS);
    register_meta(&AUTHORS);

    let db = SqliteBackend::memory().unwrap();
    db.execute_sql(&PUBLISHERS.create_table_sql(), &[]).await.unwrap();
    db.execute_sql(&AUTHORS.create_table_sql(), &[]).await.unwrap();
    db.execute_sql(
        "INSERT INTO mf_publishers (name) VALUES (?), (?)",
        &[Value::from("Acme"), Value::from("Globex")],
    )
    .await
    .unwrap();
    Arc::new(db)
}

async fn author_form(db: &Arc<dyn DbExecutor>, storage: FileStorage) -> ModelForm {
    ModelForm::builder(&AUTHORS)
        .session(Arc::clone(db))
        .storage(storage)
        .build()
        .await
        .unwrap()
}

fn ann() -> FormData {
    FormData::from_pairs([
        ("name", "Ann"),
        ("email", "ann@example.com"),
        ("password", "correct-horse"),
        ("active", "on"),
        ("publisher", "2"),
    ])
}

async fn count(db: &Arc<dyn DbExecutor>) -> i64 {
    db.query_one("SELECT COUNT(*) AS n FROM mf_authors", &[])
        .await
        .unwrap()
        .get("n")
        .unwrap()
}

#[tokio::test]
async fn test_insert_hashes_password() {
    let db = setup().await;
    let root = TempRoot::new();
    let mut form = author_form(&db, root.storage()).await;
    form.bind(&ann());
    assert!(form.is_valid().await, "{:?}", form.errors());

    let pk = form.save().await.unwrap();
    assert_eq!(pk, Value::Int(1));
    assert_eq!(form.current_pk(), Some(Value::Int(1)));
    assert_eq!(form.object().unwrap()["name"], Value::from("Ann"));
    assert!(!form.object().unwrap().contains_key("password"));

    let row = db
        .query_one("SELECT * FROM mf_authors WHERE id = ?", &[pk])
        .await
        .unwrap();
    let stored: String = row.get("password").unwrap();
    assert_ne!(stored, "correct-horse");
    assert!(check_password("correct-horse", &stored).await);
    assert_eq!(row.get::<i64>("publisher").unwrap(), 2);
    assert!(row.get::<bool>("active").unwrap());
    assert_eq!(row.get::<Option<String>>("avatar").unwrap(), None);
}

#[tokio::test]
async fn test_update_by_pk_keeps_password() {
    let db = setup().await;
    let root = TempRoot::new();
    let mut form = author_form(&db, root.storage()).await;
    form.bind(&ann());
    assert!(form.is_valid().await);
    let pk = form.save().await.unwrap();
    let before: String = db
        .query_one("SELECT password FROM mf_authors WHERE id = ?", &[pk.clone()])
        .await
        .unwrap()
        .get("password")
        .unwrap();

    let mut edit = ModelForm::builder(&AUTHORS)
        .session(Arc::clone(&db))
        .storage(root.storage())
        .pk(pk.clone())
        .build()
        .await
        .unwrap();
    assert_eq!(edit.field("name").unwrap().core().value, Value::from("Ann"));
    let password = edit.field("password").unwrap();
    assert_eq!(password.kind(), WidgetKind::Password);
    assert!(!password.core().required);
    assert!(password.core().value.is_null());

    // Same name on the same row is not a unique violation.
    edit.bind(&FormData::from_pairs([
        ("name", "Ann"),
        ("email", "ann@corp.example"),
        ("password", ""),
        ("publisher", "1"),
    ]));
    assert!(edit.is_valid().await, "{:?}", edit.errors());
    assert_eq!(edit.save().await.unwrap(), pk);

    let row = db
        .query_one("SELECT * FROM mf_authors WHERE id = ?", &[pk])
        .await
        .unwrap();
    assert_eq!(row.get::<String>("email").unwrap(), "ann@corp.example");
    assert_eq!(row.get::<String>("password").unwrap(), before);
    assert_eq!(row.get::<i64>("publisher").unwrap(), 1);
    assert!(!row.get::<bool>("active").unwrap());
    assert_eq!(count(&db).await, 1);
}

#[tokio::test]
async fn test_unique_violation() {
    let db = setup().await;
    let root = TempRoot::new();
    let mut first = author_form(&db, root.storage()).await;
    first.bind(&ann());
    assert!(first.is_valid().await);
    first.save().await.unwrap();

    let mut second = author_form(&db, root.storage()).await;
    second.bind(&ann());
    assert!(!second.is_valid().await);
    assert_eq!(second.errors()["name"], "Value must be unique");
    assert!(!second.cleaned_data().contains_key("name"));
    assert_eq!(second.field("name").unwrap().errors(), ["Value must be unique"]);
}

#[tokio::test]
async fn test_missing_row_is_inserted() {
    let db = setup().await;
    let root = TempRoot::new();
    let mut form = ModelForm::builder(&AUTHORS)
        .session(Arc::clone(&db))
        .storage(root.storage())
        .object([("id", 42_i64)])
        .build()
        .await
        .unwrap();
    form.bind(&ann());
    assert!(form.is_valid().await);

    let pk = form.save().await.unwrap();
    assert_eq!(pk, Value::Int(1));
    assert_eq!(form.object().unwrap()["id"], Value::Int(1));
    assert_eq!(count(&db).await, 1);
}

#[tokio::test]
async fn test_load_missing_pk() {
    let db = setup().await;
    let err = ModelForm::builder(&AUTHORS)
        .session(db)
        .pk(7_i64)
        .build()
        .await
        .err()
        .unwrap();
    assert!(matches!(err, MiniformError::DoesNotExist(_)));
}

#[tokio::test]
async fn test_save_without_session() {
    let mut form = ModelForm::builder(&PUBLISHERS).build().await.unwrap();
    form.bind(&FormData::from_pairs([("name", "Initech")]));
    assert!(form.is_valid().await);
    let err = form.save().await.unwrap_err();
    assert!(matches!(err, MiniformError::ImproperlyConfigured(_)));
}

#[tokio::test]
async fn test_password_length_rejected() {
    let db = setup().await;
    let root = TempRoot::new();
    let mut form = author_form(&db, root.storage()).await;
    let mut data = ann();
    data.insert("password", "short");
    form.bind(&data);
    assert!(!form.is_valid().await);
    assert!(form.errors().contains_key("password"));
    assert_eq!(count(&db).await, 0);
}

#[tokio::test]
async fn test_foreign_key_options() {
    let db = setup().await;
    let root = TempRoot::new();
    let mut form = author_form(&db, root.storage()).await;
    let publisher = form.field("publisher").unwrap();
    assert_eq!(publisher.kind(), WidgetKind::Select);
    assert_eq!(
        publisher.core().options,
        [
            ("1".to_string(), "1".to_string()),
            ("2".to_string(), "2".to_string())
        ]
    );

    form.update_field(
        "publisher",
        FieldUpdate::new().label("Publisher").options_visible("name"),
    )
    .await
    .unwrap();
    let publisher = form.field("publisher").unwrap();
    assert_eq!(publisher.core().label, "Publisher");
    assert_eq!(
        publisher.core().options,
        [
            ("1".to_string(), "Acme".to_string()),
            ("2".to_string(), "Globex".to_string())
        ]
    );

    let mut data = ann();
    data.insert("publisher", "9");
    form.bind(&data);
    assert!(!form.is_valid().await);
    assert!(form.errors().contains_key("publisher"));
}

#[tokio::test]
async fn test_config_groups() {
    let db = setup().await;
    let config = ModelFormConfig::new()
        .with_exclude(["avatar"])
        .with_hidden(["id"])
        .with_readonly(["email"])
        .with_disabled(["active"])
        .with_protect(["email", "publisher"]);
    let form = ModelForm::builder(&AUTHORS)
        .session(db)
        .config(config)
        .build()
        .await
        .unwrap();

    assert!(form.field("avatar").is_none());
    assert!(form.field("id").unwrap().core().hidden);
    let email = form.field("email").unwrap();
    assert!(email.core().readonly);
    assert_eq!(email.kind(), WidgetKind::Password);
    assert_eq!(form.field("publisher").unwrap().kind(), WidgetKind::Select);
    assert!(form.field("active").unwrap().core().disabled);
    assert!(form.field("name").unwrap().core().required);
    assert!(!form.field("email").unwrap().core().required);
}

#[tokio::test]
async fn test_upload_saved_then_replaced() {
    let db = setup().await;
    let root = TempRoot::new();
    let storage = root.storage();

    let mut form = author_form(&db, storage.clone()).await;
    let mut data = ann();
    data.insert_file("avatar", UploadedFile::new("first.txt", "text/plain", b"one".to_vec()));
    form.bind(&data);
    assert!(form.is_valid().await, "{:?}", form.errors());
    let pk = form.save().await.unwrap();
    assert!(storage.exists("avatars/first.txt").await.unwrap());
    assert_eq!(
        form.field("avatar").unwrap().core().value,
        Value::from("avatars/first.txt")
    );

    let mut edit = ModelForm::builder(&AUTHORS)
        .session(Arc::clone(&db))
        .storage(storage.clone())
        .pk(pk.clone())
        .build()
        .await
        .unwrap();
    let mut data = ann();
    data.insert("password", "");
    data.insert_file("avatar", UploadedFile::new("second.txt", "text/plain", b"two".to_vec()));
    edit.bind(&data);
    assert!(edit.is_valid().await, "{:?}", edit.errors());
    edit.save().await.unwrap();

    assert!(storage.exists("avatars/second.txt").await.unwrap());
    assert!(!storage.exists("avatars/first.txt").await.unwrap());
    let row = db
        .query_one("SELECT avatar FROM mf_authors WHERE id = ?", &[pk])
        .await
        .unwrap();
    assert_eq!(row.get::<String>("avatar").unwrap(), "avatars/second.txt");
}

#[tokio::test]
async fn test_upload_removed_on_rollback() {
    let db = setup().await;
    let root = TempRoot::new();
    let storage = root.storage();

    // Both forms pass validation before either one saves.
    let mut first = author_form(&db, storage.clone()).await;
    let mut second = author_form(&db, storage.clone()).await;
    first.bind(&ann());
    let mut data = ann();
    data.insert_file("avatar", UploadedFile::new("late.txt", "text/plain", b"late".to_vec()));
    second.bind(&data);
    assert!(first.is_valid().await);
    assert!(second.is_valid().await);

    first.save().await.unwrap();
    let err = second.save().await.unwrap_err();
    assert!(matches!(err, MiniformError::IntegrityError(_)));
    assert!(!storage.exists("avatars/late.txt").await.unwrap());
    assert_eq!(count(&db).await, 1);
}

#[tokio::test]
async fn test_rejected_upload_type() {
    let db = setup().await;
    let root = TempRoot::new();
    let mut form = author_form(&db, root.storage()).await;
    let mut data = ann();
    data.insert_file("avatar", UploadedFile::new("run.exe", "application/octet-stream", b"MZ".to_vec()));
    form.bind(&data);
    assert!(!form.is_valid().await);
    assert!(form.errors()["avatar"].contains("run.exe"));
}

#[tokio::test]
async fn test_zero_byte_upload_keeps_stored_file() {
    let db = setup().await;
    let root = TempRoot::new();
    let storage = root.storage();

    let mut form = author_form(&db, storage.clone()).await;
    let mut data = ann();
    data.insert_file("avatar", UploadedFile::new("kept.txt", "text/plain", b"kept".to_vec()));
    form.bind(&data);
    assert!(form.is_valid().await, "{:?}", form.errors());
    let pk = form.save().await.unwrap();

    let mut edit = ModelForm::builder(&AUTHORS)
        .session(Arc::clone(&db))
        .storage(storage.clone())
        .pk(pk.clone())
        .build()
        .await
        .unwrap();
    let mut data = ann();
    data.insert("password", "");
    data.insert_file("avatar", UploadedFile::new("blank.txt", "text/plain", Vec::new()));
    edit.bind(&data);
    assert!(edit.is_valid().await, "{:?}", edit.errors());
    assert!(!edit.errors().contains_key("avatar"));
    edit.save().await.unwrap();

    assert!(storage.exists("avatars/kept.txt").await.unwrap());
    assert!(!storage.exists("avatars/blank.txt").await.unwrap());
    let row = db
        .query_one("SELECT avatar FROM mf_authors WHERE id = ?", &[pk])
        .await
        .unwrap();
    assert_eq!(row.get::<String>("avatar").unwrap(), "avatars/kept.txt");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_on_shared_session() {
    let db = setup().await;
    let root = TempRoot::new();
    let mut handles = Vec::new();
    for i in 0..8 {
        let mut form = author_form(&db, root.storage()).await;
        let mut data = ann();
        data.insert("name", format!("Author {i}"));
        form.bind(&data);
        assert!(form.is_valid().await, "{:?}", form.errors());
        handles.push(tokio::spawn(async move { form.save().await }));
    }
    let mut pks = Vec::new();
    for handle in handles {
        pks.push(handle.await.unwrap().unwrap().as_i64().unwrap());
    }
    pks.sort_unstable();
    assert_eq!(pks, (1..=8).collect::<Vec<i64>>());
    assert_eq!(count(&db).await, 8);
}
