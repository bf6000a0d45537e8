use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One self-contained database document: schema, saved views and records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub schema: Vec<Field>,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Collection {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Collection {
            id: id.into(),
            name: name.into(),
            schema: Vec::new(),
            views: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.schema.iter().find(|f| f.id == id)
    }

    pub fn view(&self, id: &str) -> Option<&View> {
        self.views.iter().find(|v| v.id == id)
    }

    pub fn record(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn record_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.id == id)
    }
}

/// A schema column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl Field {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: FieldKind) -> Self {
        Field {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }

    /// Rollups and formulas are derived on every read and never stored.
    pub fn is_computed(&self) -> bool {
        matches!(self.kind, FieldKind::Rollup { .. } | FieldKind::Formula { .. })
    }

    /// Declared options for select, multiselect and status fields.
    pub fn options(&self) -> &[String] {
        match &self.kind {
            FieldKind::Select(choices)
            | FieldKind::MultiSelect(choices)
            | FieldKind::Status(choices) => &choices.options,
            _ => &[],
        }
    }

    pub fn relation(&self) -> Option<&RelationConfig> {
        match &self.kind {
            FieldKind::Relation { relation } => Some(relation),
            _ => None,
        }
    }

    pub fn relation_mut(&mut self) -> Option<&mut RelationConfig> {
        match &mut self.kind {
            FieldKind::Relation { relation } => Some(relation),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// Field type tag with its type-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Number,
    Select(Choices),
    #[serde(rename = "multiselect")]
    MultiSelect(Choices),
    Relation {
        #[serde(default)]
        relation: RelationConfig,
    },
    Rollup {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rollup: Option<RollupConfig>,
    },
    Formula {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        formula: Option<FormulaConfig>,
    },
    Date,
    Checkbox,
    Url,
    Email,
    Phone,
    Status(Choices),
    CreatedAt,
    LastEditedAt,
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Select(_) => "select",
            FieldKind::MultiSelect(_) => "multiselect",
            FieldKind::Relation { .. } => "relation",
            FieldKind::Rollup { .. } => "rollup",
            FieldKind::Formula { .. } => "formula",
            FieldKind::Date => "date",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Url => "url",
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::Status(_) => "status",
            FieldKind::CreatedAt => "createdAt",
            FieldKind::LastEditedAt => "lastEditedAt",
        }
    }

    pub fn same_type(&self, other: &FieldKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Options for select-like fields, with optional per-option colors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choices {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(
        rename = "optionColors",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub option_colors: BTreeMap<String, String>,
}

impl Choices {
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Choices {
            options: options.into_iter().map(Into::into).collect(),
            option_colors: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationConfig {
    /// Target collection; `None` means the relation points into its own collection.
    #[serde(
        rename = "targetDatabaseId",
        alias = "targetCollectionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_collection_id: Option<String>,
    /// Reciprocal relation field on the target collection that mirrors inbound links.
    #[serde(
        rename = "targetRelationFieldId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_relation_field_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupConfig {
    pub relation_field_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_field_id: Option<String>,
    pub aggregation: Aggregation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Count,
    CountNotEmpty,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaConfig {
    pub expression: String,
}

/// A record: immutable id, optional free-text body and field values keyed by field id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(rename = "_body", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            body: None,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style setter, handy for fixtures.
    pub fn with(mut self, field_id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field_id.into(), value.into());
        self
    }

    pub fn get(&self, field_id: &str) -> Option<&Value> {
        self.values.get(field_id)
    }

    pub fn set(&mut self, field_id: impl Into<String>, value: Value) {
        self.values.insert(field_id.into(), value);
    }

    /// Ids stored in a relation field. Anything other than a sequence reads as no links.
    pub fn linked_ids(&self, field_id: &str) -> &[String] {
        match self.values.get(field_id) {
            Some(Value::Ids(ids)) => ids,
            _ => &[],
        }
    }
}

/// A saved combination of layout, filters, sorts and display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub view_type: ViewType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_cover_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_fields: Option<Vec<String>>,
    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub filter: Vec<Filter>,
    #[serde(default)]
    pub hidden_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_order: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_widths: Option<BTreeMap<String, f64>>,
}

impl View {
    pub fn new(id: impl Into<String>, name: impl Into<String>, view_type: ViewType) -> Self {
        View {
            id: id.into(),
            name: name.into(),
            view_type,
            group_by: None,
            card_cover_field: None,
            card_fields: None,
            sort: Vec::new(),
            filter: Vec::new(),
            hidden_fields: Vec::new(),
            field_order: None,
            column_widths: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    Table,
    Kanban,
    List,
    Gallery,
    Calendar,
}

impl ViewType {
    /// Layouts that bucket records by a `groupBy` field.
    pub fn is_grouped(&self) -> bool {
        matches!(self, ViewType::Kanban | ViewType::Gallery)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    pub field_id: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field_id: String,
    pub op: FilterOp,
    #[serde(default)]
    pub value: String,
}

/// Filter operator. Unrecognized operators are kept verbatim and let every record through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterOp {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    IsEmpty,
    IsNotEmpty,
    Gt,
    Gte,
    Lt,
    Lte,
    Other(String),
}

impl FilterOp {
    pub fn as_str(&self) -> &str {
        match self {
            FilterOp::Contains => "contains",
            FilterOp::NotContains => "not_contains",
            FilterOp::Equals => "equals",
            FilterOp::NotEquals => "not_equals",
            FilterOp::IsEmpty => "is_empty",
            FilterOp::IsNotEmpty => "is_not_empty",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Other(op) => op,
        }
    }
}

impl From<String> for FilterOp {
    fn from(op: String) -> Self {
        match op.as_str() {
            "contains" => FilterOp::Contains,
            "not_contains" => FilterOp::NotContains,
            "equals" => FilterOp::Equals,
            "not_equals" => FilterOp::NotEquals,
            "is_empty" => FilterOp::IsEmpty,
            "is_not_empty" => FilterOp::IsNotEmpty,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            _ => FilterOp::Other(op),
        }
    }
}

impl From<FilterOp> for String {
    fn from(op: FilterOp) -> Self {
        match op {
            FilterOp::Other(op) => op,
            known => known.as_str().to_string(),
        }
    }
}
