use serde::Deserialize;
use serde_json::Value;

use crate::errors::QueryError;
use crate::field_parser::{FieldSpec, Fields};
use crate::filter_compiler::Filters;
use crate::query_ast::{QueryMode, TableRef};

/// Queried table: an entity name (validated before use) or a table
/// reference the caller already holds.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSpec {
    Entity(String),
    Table(TableRef),
}

/// Everything a single query build needs besides the acting user.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table: TableSpec,
    pub fields: Option<Fields>,
    pub filters: Option<Filters>,
    pub order_by: Option<String>,
    pub group_by: Option<String>,
    /// Applied only when non-zero; negative values are rejected
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub distinct: bool,
    pub for_update: bool,
    pub skip_locked: bool,
    /// `false` renders NOWAIT on the row lock
    pub wait: bool,
    pub mode: QueryMode,
}

impl QueryRequest {
    pub fn new(entity: &str) -> Self {
        Self::with_table(TableSpec::Entity(entity.to_string()))
    }

    pub fn for_table(table: TableRef) -> Self {
        Self::with_table(TableSpec::Table(table))
    }

    fn with_table(table: TableSpec) -> Self {
        QueryRequest {
            table,
            fields: None,
            filters: None,
            order_by: None,
            group_by: None,
            limit: None,
            offset: None,
            distinct: false,
            for_update: false,
            skip_locked: false,
            wait: true,
            mode: QueryMode::Select,
        }
    }

    pub fn fields(mut self, fields: impl Into<Fields>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    pub fn filters(mut self, filters: impl Into<Filters>) -> Self {
        self.filters = Some(filters.into());
        self
    }

    pub fn order_by(mut self, order_by: &str) -> Self {
        self.order_by = Some(order_by.to_string());
        self
    }

    pub fn group_by(mut self, group_by: &str) -> Self {
        self.group_by = Some(group_by.to_string());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn for_update(mut self, skip_locked: bool, wait: bool) -> Self {
        self.for_update = true;
        self.skip_locked = skip_locked;
        self.wait = wait;
        self
    }

    pub fn mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Decode a JSON request document:
    ///
    /// ```json
    /// {
    ///   "entity": "Task",
    ///   "fields": ["name", "assigned_to.email", {"items": ["qty"]}],
    ///   "filters": {"status": ["in", ["Open", "Working"]]},
    ///   "order_by": "modified desc",
    ///   "limit": 20
    /// }
    /// ```
    ///
    /// `fields` may also be a single comma-separated string. `mode` is one of
    /// `select` (default), `update`, `insert` or `delete`.
    pub fn from_json(document: &Value) -> Result<Self, QueryError> {
        let doc: RequestDocument = serde_json::from_value(document.clone())
            .map_err(|e| QueryError::InvalidRequest(e.to_string()))?;

        let mut request = QueryRequest::new(&doc.entity);
        request.fields = doc.fields.map(FieldsDocument::into_fields).transpose()?;
        request.filters = doc.filters.filter(|f| !f.is_null()).map(Filters::Json);
        request.order_by = doc.order_by;
        request.group_by = doc.group_by;
        request.limit = doc.limit;
        request.offset = doc.offset;
        request.distinct = doc.distinct;
        request.for_update = doc.for_update;
        request.skip_locked = doc.skip_locked;
        request.wait = doc.wait;
        request.mode = match doc.mode.as_deref() {
            None | Some("select") => QueryMode::Select,
            Some("update") => QueryMode::Update,
            Some("insert") => QueryMode::Insert,
            Some("delete") => QueryMode::Delete,
            Some(other) => {
                return Err(QueryError::InvalidRequest(format!("unknown mode '{other}'")))
            }
        };
        Ok(request)
    }
}

fn default_wait() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RequestDocument {
    entity: String,
    fields: Option<FieldsDocument>,
    filters: Option<Value>,
    order_by: Option<String>,
    group_by: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    #[serde(default)]
    distinct: bool,
    #[serde(default)]
    for_update: bool,
    #[serde(default)]
    skip_locked: bool,
    #[serde(default = "default_wait")]
    wait: bool,
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldsDocument {
    Text(String),
    List(Vec<FieldEntryDocument>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldEntryDocument {
    Text(String),
    /// `{child_fieldname: [sub-fields]}`
    Child(serde_json::Map<String, Value>),
}

impl FieldsDocument {
    fn into_fields(self) -> Result<Fields, QueryError> {
        let entries = match self {
            FieldsDocument::Text(text) => return Ok(Fields::Text(text)),
            FieldsDocument::List(entries) => entries,
        };

        let mut specs = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                FieldEntryDocument::Text(text) => specs.push(FieldSpec::Text(text)),
                FieldEntryDocument::Child(mapping) => {
                    for (fieldname, sub_fields) in mapping {
                        let fields: Vec<String> = serde_json::from_value(sub_fields)
                            .map_err(|_| {
                                QueryError::InvalidRequest(format!(
                                    "child fields of '{fieldname}' must be a list of strings"
                                ))
                            })?;
                        specs.push(FieldSpec::Child { fieldname, fields });
                    }
                }
            }
        }
        Ok(Fields::List(specs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let request = QueryRequest::new("Task");
        assert_eq!(request.table, TableSpec::Entity("Task".to_string()));
        assert!(request.wait);
        assert_eq!(request.mode, QueryMode::Select);

        let request = request.for_update(true, false);
        assert!(request.for_update && request.skip_locked && !request.wait);
    }

    #[test]
    fn test_from_json() {
        let request = QueryRequest::from_json(&json!({
            "entity": "Task",
            "fields": ["name", {"items": ["qty", "rate"]}],
            "filters": {"status": "Open"},
            "order_by": "modified desc",
            "limit": 5,
            "distinct": true
        }))
        .unwrap();

        assert_eq!(
            request.fields,
            Some(Fields::List(vec![
                FieldSpec::from("name"),
                FieldSpec::child("items", &["qty", "rate"]),
            ]))
        );
        assert_eq!(request.filters, Some(Filters::Json(json!({"status": "Open"}))));
        assert_eq!(request.limit, Some(5));
        assert!(request.distinct);
    }

    #[test]
    fn test_from_json_text_fields_and_mode() {
        let request = QueryRequest::from_json(&json!({
            "entity": "Task",
            "fields": "name, subject",
            "mode": "delete"
        }))
        .unwrap();
        assert_eq!(request.fields, Some(Fields::from("name, subject")));
        assert_eq!(request.mode, QueryMode::Delete);
    }

    #[test]
    fn test_from_json_rejects_malformed_documents() {
        let err = QueryRequest::from_json(&json!({"entity": "Task", "mode": "merge"})).unwrap_err();
        assert!(matches!(err, QueryError::InvalidRequest(_)));

        let err = QueryRequest::from_json(&json!({"fields": "name"})).unwrap_err();
        assert!(matches!(err, QueryError::InvalidRequest(_)));

        let err = QueryRequest::from_json(&json!({
            "entity": "Task",
            "fields": [{"items": "qty"}]
        }))
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidRequest(_)));
    }
}
