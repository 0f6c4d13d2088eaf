use crate::error::SchemaError;
use crate::value::FieldValue;
use convert_case::{Case, Casing};
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

/// Declared kind of a schema field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Bytes,
    ObjectId,
    Map,
    Struct,
    Slice(Box<FieldKind>),
    Optional(Box<FieldKind>),
}

impl FieldKind {
    pub fn slice(element: FieldKind) -> Self {
        FieldKind::Slice(Box::new(element))
    }

    pub fn optional(inner: FieldKind) -> Self {
        FieldKind::Optional(Box::new(inner))
    }

    /// The kind with any `Optional` wrappers removed
    pub fn base(&self) -> &FieldKind {
        match self {
            FieldKind::Optional(inner) => inner.base(),
            other => other,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::I8 => write!(f, "int8"),
            FieldKind::I16 => write!(f, "int16"),
            FieldKind::I32 => write!(f, "int32"),
            FieldKind::I64 => write!(f, "int64"),
            FieldKind::U8 => write!(f, "uint8"),
            FieldKind::U16 => write!(f, "uint16"),
            FieldKind::U32 => write!(f, "uint32"),
            FieldKind::U64 => write!(f, "uint64"),
            FieldKind::F32 => write!(f, "float32"),
            FieldKind::F64 => write!(f, "float64"),
            FieldKind::String => write!(f, "string"),
            FieldKind::Bytes => write!(f, "bytes"),
            FieldKind::ObjectId => write!(f, "object id"),
            FieldKind::Map => write!(f, "map"),
            FieldKind::Struct => write!(f, "struct"),
            FieldKind::Slice(element) => write!(f, "[]{}", element),
            FieldKind::Optional(inner) => write!(f, "*{}", inner),
        }
    }
}

/// SQL Server identity column spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Bare `IDENTITY`
    Default,
    /// `IDENTITY(seed,increment)`; holds the `(seed,increment)` text
    Spec(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clustering {
    Clustered,
    NonClustered,
}

/// Options parsed from a field tag such as `column:full_name;unique;null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOptions {
    pub ignore: bool,
    pub anonymous: bool,
    pub exported: bool,
    pub nullable: bool,
    pub not_null: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub identity: Option<Identity>,
    pub clustering: Option<Clustering>,
    pub check: Option<String>,
    pub default: Option<String>,
    pub explicit_type: Option<String>,
    pub column: Option<String>,
    /// Unrecognised flags and pairs; kept but otherwise inert
    pub extra: BTreeMap<String, String>,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            ignore: false,
            anonymous: false,
            exported: true,
            nullable: false,
            not_null: false,
            unique: false,
            primary_key: false,
            auto_increment: false,
            identity: None,
            clustering: None,
            check: None,
            default: None,
            explicit_type: None,
            column: None,
            extra: BTreeMap::new(),
        }
    }
}

impl FieldOptions {
    /// Parse a semicolon separated tag of bare flags and `key:value` pairs.
    pub fn parse(tag: &str) -> Self {
        let mut options = FieldOptions::default();

        for part in tag.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once(':') {
                Some((key, value)) => {
                    let value = value.to_string();
                    match key {
                        "column" => options.column = Some(value),
                        "type" => options.explicit_type = Some(value),
                        "default" => options.default = Some(value),
                        "check" => options.check = Some(value),
                        "id" => options.identity = Some(Identity::Spec(value)),
                        other => {
                            options.extra.insert(other.to_string(), value);
                        }
                    }
                }
                None => match part {
                    "pk" => options.primary_key = true,
                    "unique" => options.unique = true,
                    "null" => options.nullable = true,
                    "notnull" => options.not_null = true,
                    "ignore" => options.ignore = true,
                    "ai" => options.auto_increment = true,
                    "id" => options.identity = Some(Identity::Default),
                    "cluster" => options.clustering = Some(Clustering::Clustered),
                    "noncluster" => {
                        if options.clustering.is_none() {
                            options.clustering = Some(Clustering::NonClustered);
                        }
                    }
                    other => {
                        options.extra.insert(other.to_string(), "true".to_string());
                    }
                },
            }
        }

        options
    }

    /// Options for the primary-key column: always auto-increment, primary
    /// key and not null, whatever the tag said.
    pub fn as_primary_key(&self) -> Self {
        let mut options = self.clone();
        options.primary_key = true;
        options.auto_increment = true;
        options.not_null = true;
        if options.identity.is_none() {
            options.identity = Some(Identity::Default);
        }
        options
    }
}

/// Persistence metadata of one schema field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub source_name: String,
    pub column_name: String,
    pub kind: FieldKind,
    pub options: FieldOptions,
}

impl FieldDescriptor {
    pub fn new(source_name: impl Into<String>, kind: FieldKind, tag: &str) -> Self {
        let source_name = source_name.into();
        let options = FieldOptions::parse(tag);
        let column_name = options
            .column
            .clone()
            .unwrap_or_else(|| to_snake(&source_name));

        Self {
            source_name,
            column_name,
            kind,
            options,
        }
    }

    /// Eligible for persistence: exported, not embedded, not ignored.
    pub fn is_persisted(&self) -> bool {
        self.options.exported && !self.options.anonymous && !self.options.ignore
    }
}

/// Field list of one schema type, derived once and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptor {
    pub fn builder(name: impl Into<String>) -> SchemaDescriptorBuilder {
        SchemaDescriptorBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Type name of the schema, e.g. `Player`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every declared field, including ones that are never persisted
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Fields eligible for persistence, in declaration order
    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_persisted())
    }

    pub fn field(&self, source_name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.source_name == source_name)
    }

    /// Default table/collection name: snake case, pluralized.
    pub fn guess_table_name(&self) -> String {
        pluralize(&to_snake(&self.name))
    }
}

pub struct SchemaDescriptorBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptorBuilder {
    /// Add a field with its tag, e.g. `.field("Name", FieldKind::String, "unique")`
    pub fn field(mut self, name: &str, kind: FieldKind, tag: &str) -> Self {
        self.fields.push(FieldDescriptor::new(name, kind, tag));
        self
    }

    /// Add an embedded struct; its own columns are not persisted through it.
    pub fn embedded(mut self, name: &str) -> Self {
        let mut field = FieldDescriptor::new(name, FieldKind::Struct, "");
        field.options.anonymous = true;
        self.fields.push(field);
        self
    }

    /// Add a private field that is never persisted.
    pub fn private(mut self, name: &str, kind: FieldKind) -> Self {
        let mut field = FieldDescriptor::new(name, kind, "");
        field.options.exported = false;
        self.fields.push(field);
        self
    }

    pub fn build(self) -> SchemaDescriptor {
        SchemaDescriptor {
            name: self.name,
            fields: self.fields,
        }
    }
}

/// A persistable entity type.
///
/// Implementors describe their fields once in [`Schema::describe`] and expose
/// them by source name through [`Schema::get_field`] / [`Schema::set_field`].
pub trait Schema: Send + Sync + 'static {
    fn describe() -> SchemaDescriptor
    where
        Self: Sized;

    /// Identifier of this instance
    fn id(&self) -> FieldValue;

    /// Column name of the primary key
    fn key_name(&self) -> &str {
        "id"
    }

    /// Schema namespace for dialects that qualify table names
    fn namespace(&self) -> Option<&str> {
        None
    }

    /// Current value of the field named `field` in the descriptor
    fn get_field(&self, field: &str) -> Option<FieldValue>;

    /// Assign an already-decoded value to the field named `field`
    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), SchemaError>;
}

/// Cache of schema descriptors keyed by schema type
pub struct SchemaRegistry {
    registrations: RwLock<HashMap<TypeId, Arc<SchemaDescriptor>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide registry
    pub fn global() -> &'static SchemaRegistry {
        static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();
        REGISTRY.get_or_init(SchemaRegistry::new)
    }

    /// Descriptor of `S`, derived on first use
    pub fn descriptor<S: Schema>(&self) -> Arc<SchemaDescriptor> {
        let type_id = TypeId::of::<S>();

        {
            let registrations = self
                .registrations
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(descriptor) = registrations.get(&type_id) {
                return descriptor.clone();
            }
        }

        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registrations
            .entry(type_id)
            .or_insert_with(|| Arc::new(S::describe()))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.registrations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Descriptor of `S` from the global registry
pub fn descriptor<S: Schema>() -> Arc<SchemaDescriptor> {
    SchemaRegistry::global().descriptor::<S>()
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub native_type: String,
    pub options: String,
}

impl ColumnSpec {
    pub fn to_sql(&self) -> String {
        format!("{} {} {}", self.name, self.native_type, self.options)
            .trim_end()
            .to_string()
    }
}

/// Table structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Column definitions joined for a CREATE TABLE body
    pub fn columns_sql(&self) -> String {
        self.columns
            .iter()
            .map(ColumnSpec::to_sql)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Index definition; several columns make a composite index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub columns: Vec<String>,
    pub unique: bool,
}

impl Index {
    pub fn new(columns: Vec<impl Into<String>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(columns: Vec<impl Into<String>>) -> Self {
        Self {
            unique: true,
            ..Self::new(columns)
        }
    }

    /// `name_email_index` or `name_email_unique_index`
    pub fn name(&self) -> String {
        let base = self.columns.join("_");
        if self.unique {
            format!("{}_unique_index", base)
        } else {
            format!("{}_index", base)
        }
    }
}

/// `UserID` → `user_id`
pub fn to_snake(name: &str) -> String {
    name.to_case(Case::Snake)
}

/// Naive English plural of a snake_case word.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let ends_with_consonant_y = word.ends_with('y')
        && word
            .chars()
            .rev()
            .nth(1)
            .map_or(false, |c| !"aeiou".contains(c));

    if ends_with_consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Player {
        id: i32,
        name: String,
    }

    impl Schema for Player {
        fn describe() -> SchemaDescriptor {
            SchemaDescriptor::builder("Player")
                .field("ID", FieldKind::I32, "pk")
                .field("Name", FieldKind::String, "")
                .build()
        }

        fn id(&self) -> FieldValue {
            self.id.into()
        }

        fn get_field(&self, field: &str) -> Option<FieldValue> {
            match field {
                "ID" => Some(self.id.into()),
                "Name" => Some(self.name.clone().into()),
                _ => None,
            }
        }

        fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), SchemaError> {
            match field {
                "ID" => self.id = value.decode()?,
                "Name" => self.name = value.decode()?,
                _ => {}
            }
            Ok(())
        }
    }

    #[test]
    fn test_tag_parsing() {
        let options = FieldOptions::parse("column:full_name;unique;null;check:(age > 0);id:(1,5)");
        assert_eq!(options.column.as_deref(), Some("full_name"));
        assert!(options.unique);
        assert!(options.nullable);
        assert_eq!(options.check.as_deref(), Some("(age > 0)"));
        assert_eq!(options.identity, Some(Identity::Spec("(1,5)".to_string())));
        assert!(!options.primary_key);
    }

    #[test]
    fn test_tag_value_keeps_colons() {
        let options = FieldOptions::parse("default:'a:b'");
        assert_eq!(options.default.as_deref(), Some("'a:b'"));
    }

    #[test]
    fn test_unknown_flags_are_inert() {
        let options = FieldOptions::parse("pk;shiny;color:red");
        assert!(options.primary_key);
        assert_eq!(options.extra.get("shiny").map(String::as_str), Some("true"));
        assert_eq!(options.extra.get("color").map(String::as_str), Some("red"));
    }

    #[test]
    fn test_clustering_flags() {
        assert_eq!(
            FieldOptions::parse("pk;cluster").clustering,
            Some(Clustering::Clustered)
        );
        assert_eq!(
            FieldOptions::parse("unique;noncluster").clustering,
            Some(Clustering::NonClustered)
        );
    }

    #[test]
    fn test_primary_key_is_forced() {
        let options = FieldOptions::parse("").as_primary_key();
        assert!(options.primary_key);
        assert!(options.auto_increment);
        assert!(options.not_null);
        assert_eq!(options.identity, Some(Identity::Default));

        let options = FieldOptions::parse("id:(2,5)").as_primary_key();
        assert_eq!(options.identity, Some(Identity::Spec("(2,5)".to_string())));
    }

    #[test]
    fn test_column_names() {
        assert_eq!(FieldDescriptor::new("ID", FieldKind::I32, "").column_name, "id");
        assert_eq!(
            FieldDescriptor::new("SmallSerial", FieldKind::I8, "").column_name,
            "small_serial"
        );
        assert_eq!(
            FieldDescriptor::new("Status", FieldKind::Bool, "column:available").column_name,
            "available"
        );
    }

    #[test]
    fn test_persisted_fields_skip_hidden() {
        let descriptor = SchemaDescriptor::builder("Account")
            .embedded("Base")
            .field("Name", FieldKind::String, "")
            .field("Cache", FieldKind::Map, "ignore")
            .private("secret", FieldKind::String)
            .build();

        let persisted: Vec<&str> = descriptor
            .persisted_fields()
            .map(|f| f.column_name.as_str())
            .collect();
        assert_eq!(persisted, vec!["name"]);
        assert_eq!(descriptor.fields().len(), 4);
    }

    #[test]
    fn test_table_name_guess() {
        assert_eq!(Player::describe().guess_table_name(), "players");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(to_snake("UserAccount"), "user_account");
    }

    #[test]
    fn test_registry_caches_descriptor() {
        let registry = SchemaRegistry::new();
        assert!(registry.is_empty());

        let first = registry.descriptor::<Player>();
        let second = registry.descriptor::<Player>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(first.name(), "Player");
    }

    #[test]
    fn test_schema_default_methods() {
        let mut player = Player {
            id: 1,
            name: "Alice".to_string(),
        };
        assert_eq!(player.key_name(), "id");
        assert_eq!(player.namespace(), None);

        player.set_field("Name", FieldValue::from("Bob")).unwrap();
        assert_eq!(player.get_field("Name"), Some(FieldValue::from("Bob")));
    }

    #[test]
    fn test_index_names() {
        assert_eq!(Index::new(vec!["name"]).name(), "name_index");
        assert_eq!(
            Index::unique(vec!["name", "email"]).name(),
            "name_email_unique_index"
        );
    }

    #[test]
    fn test_column_spec_sql() {
        let spec = TableSpec {
            name: "users".to_string(),
            columns: vec![
                ColumnSpec {
                    name: "id".to_string(),
                    native_type: "SERIAL".to_string(),
                    options: "PRIMARY KEY".to_string(),
                },
                ColumnSpec {
                    name: "name".to_string(),
                    native_type: "TEXT".to_string(),
                    options: String::new(),
                },
            ],
        };
        assert_eq!(spec.columns_sql(), "id SERIAL PRIMARY KEY, name TEXT");
    }
}
