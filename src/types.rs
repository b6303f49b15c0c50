//! The resolved type graph
//!
//! Output side of the compiler. The [`TypeTable`] is the single source of
//! truth: it owns every [`EntityType`] and [`EnumType`], keyed by
//! fully-qualified name. Everything else (navigation edges, base-type links,
//! operation returns) refers to table entries by that stable name, so cycles
//! between entity types are legal and ownership stays single.

use std::collections::HashMap;

use crate::schema::OperationKind;

/// Semantic scalar kind of an entity property, mapped from the EDM primitive
/// name. The wire-format codec picks a native representation from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Integer,
    Decimal,
    DateTime,
    Boolean,
    Uuid,
}

/// Map an EDM primitive type name to its scalar kind. Unknown primitives
/// default to [`ScalarKind::String`]; this never fails.
pub fn resolve_scalar_kind(edm_type: &str) -> ScalarKind {
    match edm_type {
        "Edm.Int16" | "Edm.Int32" | "Edm.Int64" => ScalarKind::Integer,
        "Edm.String" => ScalarKind::String,
        "Edm.Single" | "Edm.Decimal" => ScalarKind::Decimal,
        "Edm.DateTimeOffset" => ScalarKind::DateTime,
        "Edm.Boolean" => ScalarKind::Boolean,
        "Edm.Guid" => ScalarKind::Uuid,
        _ => ScalarKind::String,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Scalar(ScalarKind),
    /// Property whose declared type resolved to an enum; holds the enum's
    /// fully-qualified name in the type table.
    Enum(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
    pub primary_key: bool,
    pub is_collection: bool,
}

/// A resolved relationship edge. `target` is the fully-qualified name of an
/// entity type present in the table; self-referential and mutual edges are
/// expected.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationProperty {
    pub name: String,
    pub target: String,
    pub is_collection: bool,
    pub foreign_key: Option<String>,
}

/// What an operation parameter or return position resolves to: a modeled
/// entity, an enum, or a plain scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Entity(String),
    Enum(String),
    Scalar(ScalarKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: String,
    /// Invocation name; namespace-prefixed for bound operations.
    pub fqname: String,
    pub parameters: Vec<(String, ScalarKind)>,
    pub return_type: Option<TypeRef>,
    pub return_collection_type: Option<TypeRef>,
    pub bound_to_collection: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub fqname: String,
    /// Declaration order; values need not be contiguous or unique.
    pub members: Vec<(String, i64)>,
}

impl EnumType {
    pub fn value_of(&self, label: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(name, _)| name.as_str() == label)
            .map(|(_, value)| *value)
    }

    pub fn label_of(&self, value: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    pub name: String,
    pub fqname: String,
    /// Externally visible collection name. Empty means the type is not
    /// independently queryable.
    pub collection_name: String,
    /// Fully-qualified name of the resolved base type, when inheritance
    /// applied. Subtypes seen before their base compile as root types.
    pub base_type: Option<String>,
    /// Own and inherited properties; an inherited property is never shadowed
    /// by a re-declaration in a subtype.
    pub properties: Vec<Property>,
    pub navigation_properties: Vec<NavigationProperty>,
    /// Operations bound to this type. Operations bound to an ancestor are
    /// reachable by walking `base_type`.
    pub operations: Vec<Operation>,
}

impl EntityType {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn navigation(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation_properties.iter().find(|n| n.name == name)
    }

    pub fn key_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.primary_key)
    }

    pub fn is_queryable(&self) -> bool {
        !self.collection_name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedType {
    Entity(EntityType),
    Enum(EnumType),
}

/// Fully-qualified name → resolved type. Entries are only ever added, never
/// removed; the first writer of a name wins. Iteration follows insertion
/// order, so a rebuilt table from the same document compares equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeTable {
    types: HashMap<String, ResolvedType>,
    order: Vec<String>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, fqname: String, resolved: ResolvedType) {
        if self.types.contains_key(&fqname) {
            return;
        }
        self.order.push(fqname.clone());
        self.types.insert(fqname, resolved);
    }

    pub fn get(&self, fqname: &str) -> Option<&ResolvedType> {
        self.types.get(fqname)
    }

    pub fn entity(&self, fqname: &str) -> Option<&EntityType> {
        match self.types.get(fqname) {
            Some(ResolvedType::Entity(entity)) => Some(entity),
            _ => None,
        }
    }

    pub fn enum_type(&self, fqname: &str) -> Option<&EnumType> {
        match self.types.get(fqname) {
            Some(ResolvedType::Enum(en)) => Some(en),
            _ => None,
        }
    }

    pub(crate) fn entity_mut(&mut self, fqname: &str) -> Option<&mut EntityType> {
        match self.types.get_mut(fqname) {
            Some(ResolvedType::Entity(entity)) => Some(entity),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedType)> {
        self.order
            .iter()
            .filter_map(|name| self.types.get(name).map(|t| (name.as_str(), t)))
    }

    /// Entity type names in insertion order.
    pub(crate) fn entity_names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| matches!(self.types.get(*name), Some(ResolvedType::Entity(_))))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Common root descriptor for all compiled entity types. Downstream query
/// and CRUD layers hang service-level context off this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseEntity {
    pub service_root: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_kind_mapping() {
        assert_eq!(resolve_scalar_kind("Edm.Int32"), ScalarKind::Integer);
        assert_eq!(resolve_scalar_kind("Edm.Int64"), ScalarKind::Integer);
        assert_eq!(resolve_scalar_kind("Edm.Decimal"), ScalarKind::Decimal);
        assert_eq!(resolve_scalar_kind("Edm.Guid"), ScalarKind::Uuid);
        assert_eq!(resolve_scalar_kind("Edm.Boolean"), ScalarKind::Boolean);
        assert_eq!(resolve_scalar_kind("Edm.DateTimeOffset"), ScalarKind::DateTime);
    }

    #[test]
    fn test_unknown_scalar_defaults_to_string() {
        assert_eq!(resolve_scalar_kind("Edm.GeographyPoint"), ScalarKind::String);
        assert_eq!(resolve_scalar_kind(""), ScalarKind::String);
    }

    #[test]
    fn test_type_table_first_writer_wins() {
        let mut table = TypeTable::new();
        table.insert(
            "NS.Status".into(),
            ResolvedType::Enum(EnumType {
                name: "Status".into(),
                fqname: "NS.Status".into(),
                members: vec![("Active".into(), 0)],
            }),
        );
        table.insert(
            "NS.Status".into(),
            ResolvedType::Enum(EnumType {
                name: "Status".into(),
                fqname: "NS.Status".into(),
                members: vec![("Closed".into(), 1)],
            }),
        );
        assert_eq!(table.len(), 1);
        let en = table.enum_type("NS.Status").unwrap();
        assert_eq!(en.members, vec![("Active".to_string(), 0)]);
    }

    #[test]
    fn test_enum_lookup() {
        let en = EnumType {
            name: "Status".into(),
            fqname: "NS.Status".into(),
            members: vec![("Active".into(), 0), ("Closed".into(), 5)],
        };
        assert_eq!(en.value_of("Closed"), Some(5));
        assert_eq!(en.label_of(0), Some("Active"));
        assert_eq!(en.value_of("Missing"), None);
    }
}
