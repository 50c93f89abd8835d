//! A parent model form with child forms linked by a foreign key.
//!
//! Children share one prefix and are numbered: with prefix `items`, the
//! first child's fields are named `items_0_<field>`, the next `items_1_...`.
//! A hidden `items_TOTAL_FORMS` input carries the number of children so a
//! page that adds rows on the client gets matching forms when the
//! submission is bound.
//!
//! Children without any submitted input are skipped. Saving writes the
//! parent and then every submitted child, with the child's foreign key set
//! to the parent's primary key, in a single transaction.

use std::collections::BTreeMap;

use miniform_core::error::{MiniformError, MiniformResult};
use miniform_core::logging::form_span;
use miniform_db::executor::fetch_all;
use miniform_db::query::compiler::OrderBy;
use miniform_db::{atomic, FieldType, Query, Value, WhereNode};
use miniform_http::FormData;
use tracing::Instrument;

use crate::form::{Form, FormErrors};
use crate::model_form::{no_session, object_from_row, ModelForm, ModelFormBuilder};

/// Upper bound on the number of children a submission can ask for.
pub const MAX_FORMS: usize = 1000;

/// Collects what a [`FormSet`] is built from.
pub struct FormSetBuilder {
    parent: ModelForm,
    child: ModelFormBuilder,
    fk_field: String,
    prefix: Option<String>,
    extra: usize,
}

impl FormSetBuilder {
    /// The child prefix; defaults to the child table name.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Number of blank children added after the existing ones. Defaults to 1.
    #[must_use]
    pub const fn extra(mut self, extra: usize) -> Self {
        self.extra = extra;
        self
    }

    /// Builds the set. When the parent is bound to a saved row and has a
    /// session, its existing children are loaded first.
    pub async fn build(self) -> MiniformResult<FormSet> {
        let meta = self.child.meta;
        let fk = meta.get_field(&self.fk_field).ok_or_else(|| {
            MiniformError::FieldNotFound(format!("{}.{}", meta.model_name, self.fk_field))
        })?;
        let parent_table = &self.parent.meta().db_table;
        if !matches!(&fk.field_type, FieldType::ForeignKey { to, .. } if to == parent_table) {
            return Err(MiniformError::ImproperlyConfigured(format!(
                "{}.{} is not a foreign key to \"{parent_table}\".",
                meta.model_name, fk.name
            )));
        }

        let mut child = self.child;
        child.config = child.config.extend_exclude([fk.name]);
        if child.session.is_none() {
            if let Some(session) = self.parent.session() {
                child = child.session(session.clone());
            }
        }

        let mut set = FormSet {
            prefix: self.prefix.unwrap_or_else(|| meta.db_table.clone()),
            parent: self.parent,
            child,
            fk_field: fk.name,
            children: Vec::new(),
            existing: 0,
            active: Vec::new(),
            data: None,
            errors: FormErrors::new(),
        };

        if let (Some(pk), Some(session)) = (set.parent.current_pk(), set.parent.session().cloned()) {
            let query = Query::new(meta.db_table.clone())
                .filter(WhereNode::eq(fk.column.clone(), pk))
                .order_by(OrderBy::asc(meta.pk_column()));
            for row in fetch_all(&*session, &query).await? {
                set.push_child(Some(object_from_row(meta, &row))).await?;
            }
            set.existing = set.children.len();
        }
        for _ in 0..self.extra {
            set.push_child(None).await?;
        }
        tracing::debug!(
            prefix = %set.prefix,
            existing = set.existing,
            total = set.children.len(),
            "form set built"
        );
        Ok(set)
    }
}

/// A parent [`ModelForm`] plus child forms referencing it.
pub struct FormSet {
    parent: ModelForm,
    child: ModelFormBuilder,
    fk_field: &'static str,
    prefix: String,
    children: Vec<ModelForm>,
    existing: usize,
    active: Vec<usize>,
    data: Option<FormData>,
    errors: FormErrors,
}

impl FormSet {
    /// Starts a set over `parent`, building children from `child`.
    /// `fk_field` names the child column that references the parent.
    pub fn builder(
        parent: ModelForm,
        child: ModelFormBuilder,
        fk_field: impl Into<String>,
    ) -> FormSetBuilder {
        FormSetBuilder {
            parent,
            child,
            fk_field: fk_field.into(),
            prefix: None,
            extra: 1,
        }
    }

    pub const fn parent(&self) -> &ModelForm {
        &self.parent
    }

    pub fn parent_mut(&mut self) -> &mut ModelForm {
        &mut self.parent
    }

    pub fn children(&self) -> &[ModelForm] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [ModelForm] {
        &mut self.children
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub const fn fk_field(&self) -> &'static str {
        self.fk_field
    }

    /// Name of the hidden input carrying the number of children.
    pub fn total_forms_name(&self) -> String {
        format!("{}_TOTAL_FORMS", self.prefix)
    }

    async fn push_child(&mut self, object: Option<BTreeMap<String, Value>>) -> MiniformResult<()> {
        let index = self.children.len();
        let mut builder = self.child.clone();
        builder.config.prefix = Some(format!("{}_{index}", self.prefix));
        if let Some(object) = object {
            builder = builder.object(object);
        }
        self.children.push(builder.build().await?);
        Ok(())
    }

    /// Adds a blank child form.
    pub async fn add_form(&mut self) -> MiniformResult<()> {
        self.push_child(None).await
    }

    /// Binds a submission to the parent and every child.
    ///
    /// The child count follows the `TOTAL_FORMS` input (capped at
    /// [`MAX_FORMS`]); children loaded from the database are always kept.
    pub async fn bind(&mut self, data: &FormData) -> MiniformResult<()> {
        let wanted = data
            .get(&self.total_forms_name())
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map(|n| n.min(MAX_FORMS));
        if let Some(wanted) = wanted {
            while self.children.len() < wanted {
                self.push_child(None).await?;
            }
            self.children.truncate(wanted.max(self.existing));
        }

        self.parent.bind(data);
        for child in &mut self.children {
            child.bind(data);
        }
        self.data = Some(data.clone());
        self.active.clear();
        self.errors.clear();
        tracing::debug!(prefix = %self.prefix, children = self.children.len(), "form set bound");
        Ok(())
    }

    pub const fn is_bound(&self) -> bool {
        self.data.is_some()
    }

    /// Validates the parent and every child that received input.
    pub async fn is_valid(&mut self) -> bool {
        let Some(data) = &self.data else {
            return false;
        };
        self.active = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| has_input(child, data))
            .map(|(index, _)| index)
            .collect();

        let span = form_span(&self.prefix);
        async {
            let mut valid = self.parent.is_valid().await;
            for &index in &self.active {
                let child_valid = self.children[index].is_valid().await;
                valid = valid && child_valid;
            }

            self.errors = self.parent.errors().clone();
            for &index in &self.active {
                let child = &self.children[index];
                let prefix = child.prefix().unwrap_or_default();
                for (name, message) in child.errors() {
                    self.errors.insert(format!("{prefix}_{name}"), message.clone());
                }
            }
            valid
        }
        .instrument(span)
        .await
    }

    /// Errors from the last validation. Child errors are keyed by the
    /// child's prefixed field name.
    pub const fn errors(&self) -> &FormErrors {
        &self.errors
    }

    /// Indexes of the children that received input at the last validation.
    pub fn active(&self) -> &[usize] {
        &self.active
    }

    /// Saves the parent and the submitted children in one transaction.
    /// Returns the parent's primary key.
    pub async fn save(&mut self) -> MiniformResult<Value> {
        let session = self
            .parent
            .session()
            .cloned()
            .ok_or_else(|| no_session(self.parent.meta()))?;
        let span = form_span(&self.prefix);
        let fk = self.fk_field;
        let parent = &self.parent;
        let children = &self.children;
        let active = &self.active;

        let (parent_saved, child_saved) = atomic(&*session, |txn| async move {
            let parent_saved = parent.write(&txn, &[]).await?;
            let mut saved = Vec::with_capacity(active.len());
            for &index in active {
                let fixed = [(fk, parent_saved.pk.clone())];
                saved.push((index, children[index].write(&txn, &fixed).await?));
            }
            Ok((parent_saved, saved))
        })
        .instrument(span)
        .await?;

        self.parent.apply_saved(&parent_saved);
        for (index, saved) in &child_saved {
            self.children[*index].apply_saved(saved);
        }
        tracing::info!(
            prefix = %self.prefix,
            children = child_saved.len(),
            "form set saved"
        );
        Ok(parent_saved.pk)
    }

    /// The parent form, the management input, then each child form.
    pub fn render(&self) -> String {
        let name = self.total_forms_name();
        let mut html = self.parent.render();
        html.push_str(&format!(
            "<input type=\"hidden\" name=\"{name}\" id=\"{name}\" value=\"{}\" />\n",
            self.children.len()
        ));
        for child in &self.children {
            html.push_str(&child.render());
        }
        html
    }

    /// `{"form": parent, "forms": [children], "total_forms": n}`.
    pub fn form_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "form": self.parent.form_dict(),
            "forms": self.children.iter().map(Form::form_dict).collect::<Vec<_>>(),
            "total_forms": self.children.len(),
        })
    }
}

/// Returns `true` if any of the form's inputs was submitted with a value.
fn has_input(form: &ModelForm, data: &FormData) -> bool {
    form.fields().iter().any(|widget| {
        let key = widget.core().html_name();
        data.get(&key).is_some_and(|v| !v.trim().is_empty())
            || data.get_file(&key).is_some_and(|f| !f.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use miniform_db::{FieldDef, ModelMeta};

    use super::*;

    static ORDERS: LazyLock<ModelMeta> = LazyLock::new(|| {
        ModelMeta::new(
            "Order",
            "formset_orders",
            vec![
                FieldDef::new("id", FieldType::AutoField).primary_key(),
                FieldDef::new("customer", FieldType::CharField),
            ],
        )
    });

    static LINES: LazyLock<ModelMeta> = LazyLock::new(|| {
        ModelMeta::new(
            "Line",
            "formset_lines",
            vec![
                FieldDef::new("id", FieldType::AutoField).primary_key(),
                FieldDef::new("order_id", FieldType::foreign_key("formset_orders")),
                FieldDef::new("product", FieldType::CharField),
                FieldDef::new("quantity", FieldType::IntegerField),
            ],
        )
    });

    async fn order_set(extra: usize) -> FormSet {
        let parent = ModelForm::builder(&ORDERS).build().await.unwrap();
        FormSet::builder(parent, ModelForm::builder(&LINES), "order_id")
            .prefix("lines")
            .extra(extra)
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_children_prefixed_without_fk() {
        let set = order_set(2).await;
        assert_eq!(set.children().len(), 2);
        assert_eq!(set.fk_field(), "order_id");
        let child = &set.children()[1];
        assert_eq!(child.prefix(), Some("lines_1"));
        assert!(child.field("order_id").is_none());
        assert!(child.field("product").is_some());

        let html = set.render();
        assert!(html.contains(
            "<input type=\"hidden\" name=\"lines_TOTAL_FORMS\" id=\"lines_TOTAL_FORMS\" value=\"2\" />"
        ));
        assert!(html.contains("name=\"lines_0_product\""));
        assert!(html.contains("name=\"lines_1_quantity\""));
        assert_eq!(set.form_dict()["total_forms"], 2);
    }

    #[tokio::test]
    async fn test_bind_follows_total_forms() {
        let mut set = order_set(1).await;
        set.bind(&FormData::from_pairs([("lines_TOTAL_FORMS", "3")])).await.unwrap();
        assert_eq!(set.children().len(), 3);
        set.bind(&FormData::from_pairs([("lines_TOTAL_FORMS", "0")])).await.unwrap();
        assert!(set.children().is_empty());
        set.bind(&FormData::from_pairs([("lines_TOTAL_FORMS", "99999")])).await.unwrap();
        assert_eq!(set.children().len(), MAX_FORMS);
    }

    #[tokio::test]
    async fn test_empty_children_skipped() {
        let mut set = order_set(3).await;
        assert!(!set.is_valid().await);

        let data = FormData::from_pairs([
            ("customer", "Ann"),
            ("lines_0_product", "Tea"),
            ("lines_0_quantity", "2"),
            ("lines_2_product", "Cups"),
            ("lines_2_quantity", "x"),
        ]);
        set.bind(&data).await.unwrap();
        assert!(!set.is_valid().await);
        assert_eq!(set.active(), [0, 2]);
        assert_eq!(
            set.errors().keys().collect::<Vec<_>>(),
            ["lines_2_quantity"]
        );

        let mut fixed = data.clone();
        fixed.insert("lines_2_quantity", "1");
        set.bind(&fixed).await.unwrap();
        assert!(set.is_valid().await);
        assert!(set.errors().is_empty());
    }

    #[tokio::test]
    async fn test_fk_field_checked() {
        let parent = ModelForm::builder(&ORDERS).build().await.unwrap();
        let err = FormSet::builder(parent, ModelForm::builder(&LINES), "product")
            .build()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MiniformError::ImproperlyConfigured(_)));

        let parent = ModelForm::builder(&ORDERS).build().await.unwrap();
        let err = FormSet::builder(parent, ModelForm::builder(&LINES), "missing")
            .build()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MiniformError::FieldNotFound(_)));
    }

    #[tokio::test]
    async fn test_save_requires_session() {
        let mut set = order_set(1).await;
        set.bind(&FormData::from_pairs([("customer", "Ann")])).await.unwrap();
        assert!(set.is_valid().await);
        let err = set.save().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Improperly configured: Saving a model Order object from a form is impossible without a session."
        );
    }
}
