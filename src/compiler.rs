//! Multi-pass compilation of raw schema records into the type graph
//!
//! Strictly sequential passes over the extracted document: enum resolution,
//! type graph construction, relationship resolution, operation binding.
//! Later passes depend on earlier ones (navigation edges need every entity
//! type to exist first), so there is no internal parallelism and no
//! incremental recompile; a new compile starts from an empty table.

use std::collections::HashMap;

use log::{debug, info};
use roxmltree::Document;

use crate::error::MetadataError;
use crate::schema::{self, split_collection, EntityTypeDecl, OperationDecl, OperationKind, SchemaDocument};
use crate::types::{
    resolve_scalar_kind, BaseEntity, EntityType, EnumType, NavigationProperty, Operation,
    Property, PropertyKind, ResolvedType, TypeRef, TypeTable,
};
use crate::xml::PathWalker;

/// Everything one compile produces. Immutable once returned; safe for
/// concurrent reads. A metadata refresh builds a new value and swaps it in.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSchema {
    /// Common root descriptor for all generated entity types.
    pub base: BaseEntity,
    /// Externally visible collection name → entity fully-qualified name.
    pub entity_sets: HashMap<String, String>,
    /// Fully-qualified name → resolved entity or enum type.
    pub types: TypeTable,
    /// Unbound actions at service scope, keyed by short name.
    pub actions: HashMap<String, Operation>,
    /// Unbound functions at service scope, keyed by short name.
    pub functions: HashMap<String, Operation>,
}

impl CompiledSchema {
    /// Look up an entity type by its externally visible collection name.
    pub fn entity_by_collection(&self, collection: &str) -> Option<&EntityType> {
        self.entity_sets
            .get(collection)
            .and_then(|fqname| self.types.entity(fqname))
    }
}

/// Compile a metadata document with no service root attached.
pub fn compile(xml: &str) -> Result<CompiledSchema, MetadataError> {
    compile_with_root(xml, "")
}

/// Compile a metadata document. Only XML parsing can fail; every structural
/// irregularity inside a well-formed document degrades by omission.
pub fn compile_with_root(xml: &str, service_root: &str) -> Result<CompiledSchema, MetadataError> {
    let doc = Document::parse(xml)?;
    let raw = schema::extract(&doc, &PathWalker);

    let mut table = TypeTable::new();
    resolve_enums(&raw, &mut table);
    let entity_sets = build_type_graph(&raw, &mut table);
    resolve_relationships(&raw, &mut table);
    let (actions, functions) = bind_operations(&raw, &mut table);

    info!(
        "Compiled {} entity sets, total {} types",
        entity_sets.len(),
        table.len()
    );

    Ok(CompiledSchema {
        base: BaseEntity {
            service_root: service_root.to_string(),
        },
        entity_sets,
        types: table,
        actions,
        functions,
    })
}

/// Enums carry no cross-references, so they resolve before any entity type;
/// entity properties may then bind to them by name.
fn resolve_enums(raw: &SchemaDocument, table: &mut TypeTable) {
    for schema in &raw.schemas {
        for decl in &schema.enum_types {
            table.insert(
                decl.fqname.clone(),
                ResolvedType::Enum(EnumType {
                    name: decl.name.clone(),
                    fqname: decl.fqname.clone(),
                    members: decl.members.clone(),
                }),
            );
        }
    }
}

/// Entity Set Namer: the declared set name when one binds this type, the
/// bare type name otherwise.
fn collection_name(raw: &SchemaDocument, decl: &EntityTypeDecl) -> String {
    match raw.entity_sets.get(&decl.fqname) {
        Some(set) => set.name.clone(),
        None => decl.name.clone(),
    }
}

/// Second pass: instantiate entity types in extraction order. A declaration
/// whose base type already sits in the table extends it and inherits all
/// ancestor properties transitively. A subtype seen before its base falls
/// back to a root type; single-pass behavior, kept deliberately.
fn build_type_graph(raw: &SchemaDocument, table: &mut TypeTable) -> HashMap<String, String> {
    let mut entity_sets = HashMap::new();

    for schema in &raw.schemas {
        for decl in &schema.entity_types {
            let collection = collection_name(raw, decl);

            let base = decl
                .base_type
                .as_deref()
                .and_then(|base| table.entity(base));
            if decl.base_type.is_some() && base.is_none() {
                debug!(
                    "Base type {} of {} not resolved yet; compiling as root type",
                    decl.base_type.as_deref().unwrap_or_default(),
                    decl.fqname
                );
            }
            let (base_type, mut properties) = match base {
                Some(parent) => (Some(parent.fqname.clone()), parent.properties.clone()),
                None => (None, Vec::new()),
            };

            for prop in &decl.properties {
                // Inherited properties are never shadowed; first writer wins.
                if properties.iter().any(|p| p.name == prop.name) {
                    continue;
                }
                let kind = if table.enum_type(&prop.type_name).is_some() {
                    PropertyKind::Enum(prop.type_name.clone())
                } else {
                    PropertyKind::Scalar(resolve_scalar_kind(&prop.type_name))
                };
                properties.push(Property {
                    name: prop.name.clone(),
                    kind,
                    primary_key: prop.is_primary_key,
                    is_collection: prop.is_collection,
                });
            }

            entity_sets.insert(collection.clone(), decl.fqname.clone());
            table.insert(
                decl.fqname.clone(),
                ResolvedType::Entity(EntityType {
                    name: decl.name.clone(),
                    fqname: decl.fqname.clone(),
                    collection_name: collection,
                    base_type,
                    properties,
                    navigation_properties: Vec::new(),
                    operations: Vec::new(),
                }),
            );
        }
    }

    entity_sets
}

/// Navigation-target policy: an edge resolves only to an entity type already
/// in the table; anything else means the edge is dropped.
fn resolve_target_type(table: &TypeTable, stripped: &str) -> Option<String> {
    table.entity(stripped).map(|entity| entity.fqname.clone())
}

/// Third pass, after every entity type exists, so forward references resolve
/// regardless of declaration order. Edges whose target is missing from the
/// table are dropped. Inherited edges come from the resolved base (which was
/// inserted, and therefore processed, earlier); a same-name declaration in
/// the subtype replaces the inherited edge.
fn resolve_relationships(raw: &SchemaDocument, table: &mut TypeTable) {
    let decls: HashMap<&str, &EntityTypeDecl> = raw
        .schemas
        .iter()
        .flat_map(|s| &s.entity_types)
        .map(|d| (d.fqname.as_str(), d))
        .collect();

    for fqname in table.entity_names() {
        let Some(decl) = decls.get(fqname.as_str()) else {
            continue;
        };

        let mut edges = table
            .entity(&fqname)
            .and_then(|e| e.base_type.as_deref())
            .and_then(|base| table.entity(base))
            .map(|base| base.navigation_properties.clone())
            .unwrap_or_default();

        for nav in &decl.navigation_properties {
            let (is_collection, target) = split_collection(&nav.target);
            let Some(target) = resolve_target_type(table, target) else {
                debug!(
                    "Navigation property {}.{} targets unknown type {}; dropped",
                    fqname, nav.name, nav.target
                );
                continue;
            };
            let edge = NavigationProperty {
                name: nav.name.clone(),
                target,
                is_collection,
                foreign_key: nav.foreign_key.clone(),
            };
            match edges.iter_mut().find(|e| e.name == nav.name) {
                Some(inherited) => *inherited = edge,
                None => edges.push(edge),
            }
        }

        if let Some(entity) = table.entity_mut(&fqname) {
            entity.navigation_properties = edges;
        }
    }
}

/// Shared name lookup for operation return positions: modeled entity or enum
/// first, scalar kind otherwise.
fn resolve_type_ref(table: &TypeTable, name: &str) -> TypeRef {
    match table.get(name) {
        Some(ResolvedType::Entity(entity)) => TypeRef::Entity(entity.fqname.clone()),
        Some(ResolvedType::Enum(en)) => TypeRef::Enum(en.fqname.clone()),
        None => TypeRef::Scalar(resolve_scalar_kind(name)),
    }
}

fn resolve_operation(table: &TypeTable, decl: &OperationDecl) -> Operation {
    Operation {
        kind: decl.kind,
        name: decl.name.clone(),
        fqname: decl.fqname.clone(),
        parameters: decl
            .parameters
            .iter()
            .map(|p| (p.name.clone(), resolve_scalar_kind(&p.type_name)))
            .collect(),
        return_type: decl
            .return_type
            .as_deref()
            .map(|t| resolve_type_ref(table, t)),
        return_collection_type: decl
            .return_collection_type
            .as_deref()
            .map(|t| resolve_type_ref(table, t)),
        bound_to_collection: false,
    }
}

/// Fourth pass: attach bound operations to their entity type; register the
/// rest at service scope by short name. A bound operation whose binding type
/// is missing from the table degrades to an unbound registration rather than
/// disappearing.
fn bind_operations(
    raw: &SchemaDocument,
    table: &mut TypeTable,
) -> (HashMap<String, Operation>, HashMap<String, Operation>) {
    let mut actions = HashMap::new();
    let mut functions = HashMap::new();

    for schema in &raw.schemas {
        for decl in schema.actions.iter().chain(schema.functions.iter()) {
            let mut op = resolve_operation(table, decl);

            if let Some(binding) = decl.binding_type.as_deref() {
                let (bound_to_collection, target) = split_collection(binding);
                if let Some(owner) = resolve_target_type(table, target) {
                    op.bound_to_collection = bound_to_collection;
                    if let Some(entity) = table.entity_mut(&owner) {
                        entity.operations.push(op);
                    }
                    continue;
                }
                debug!(
                    "Binding type {} of {} not resolved; registering as unbound",
                    binding, decl.fqname
                );
            }

            match decl.kind {
                OperationKind::Action => actions.insert(decl.name.clone(), op),
                OperationKind::Function => functions.insert(decl.name.clone(), op),
            };
        }
    }

    (actions, functions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarKind;

    const DOC: &str = r#"<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="NS">
      <EntityType Name="Order">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32"/>
        <Property Name="Tags" Type="Collection(Edm.String)"/>
      </EntityType>
      <EntityContainer Name="Container">
        <EntitySet Name="Orders" EntityType="NS.Order"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

    #[test]
    fn test_compile_minimal_document() {
        let compiled = compile(DOC).unwrap();
        let order = compiled.entity_by_collection("Orders").unwrap();
        assert_eq!(order.fqname, "NS.Order");
        assert_eq!(order.collection_name, "Orders");

        let id = order.property("Id").unwrap();
        assert!(id.primary_key);
        assert_eq!(id.kind, PropertyKind::Scalar(ScalarKind::Integer));

        let tags = order.property("Tags").unwrap();
        assert!(tags.is_collection);
    }

    #[test]
    fn test_malformed_xml_is_a_parse_error() {
        let err = compile("<edmx:Edmx").unwrap_err();
        assert!(matches!(err, MetadataError::Parse(_)));
        assert!(!err.is_retrieval());
    }

    #[test]
    fn test_empty_document_compiles_to_empty_graph() {
        let compiled = compile(
            r#"<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx"><edmx:DataServices/></edmx:Edmx>"#,
        )
        .unwrap();
        assert!(compiled.types.is_empty());
        assert!(compiled.entity_sets.is_empty());
    }
}
