//! Raw schema extraction from the EDMX document
//!
//! First compile pass: walk the document once and produce plain structural
//! records with no cross-referencing. Entity sets are resolved in a deferred
//! second top-level pass because a set may reference an entity type declared
//! in a schema that appears later in document order.

use log::debug;
use roxmltree::{Document, Node};

use crate::xml::XmlQuery;

/// Everything extracted from one metadata document, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    pub schemas: Vec<Schema>,
    /// Entity-set declarations keyed by the fully-qualified type they expose.
    pub entity_sets: std::collections::HashMap<String, EntitySetDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub namespace: String,
    pub entity_types: Vec<EntityTypeDecl>,
    pub enum_types: Vec<EnumTypeDecl>,
    pub actions: Vec<OperationDecl>,
    pub functions: Vec<OperationDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityTypeDecl {
    pub name: String,
    /// `namespace.name`
    pub fqname: String,
    pub base_type: Option<String>,
    pub properties: Vec<PropertyDecl>,
    pub navigation_properties: Vec<NavigationPropertyDecl>,
    pub key_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    /// Collection wrapper already stripped; see `is_collection`.
    pub type_name: String,
    pub is_primary_key: bool,
    pub is_collection: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationPropertyDecl {
    pub name: String,
    /// Possibly still `Collection(...)`-wrapped; stripped during resolution.
    pub target: String,
    pub foreign_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumTypeDecl {
    pub name: String,
    pub fqname: String,
    pub members: Vec<(String, i64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Action,
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDecl {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDecl {
    pub kind: OperationKind,
    pub name: String,
    /// Namespace-prefixed only when bound.
    pub fqname: String,
    pub is_bound: bool,
    /// Binding-parameter type, possibly `Collection(...)`-wrapped.
    pub binding_type: Option<String>,
    pub parameters: Vec<ParameterDecl>,
    pub return_type: Option<String>,
    pub return_collection_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitySetDecl {
    pub name: String,
    /// Fully-qualified entity type the set exposes.
    pub entity_type: String,
    /// The declaration the type name resolved to, if any schema declares it.
    pub entity: Option<EntityTypeDecl>,
}

/// Apply the single hard-coded vendor alias rule. Every type-name attribute
/// read goes through this; callers never special-case it per field.
pub fn normalize_type_name(name: &str) -> String {
    name.replace("mscrm", "Microsoft.Dynamics.CRM")
}

/// `Collection(X)` yields `(true, "X")`; anything else `(false, name)`.
pub fn split_collection(type_name: &str) -> (bool, &str) {
    match type_name
        .strip_prefix("Collection(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, type_name),
    }
}

/// Read and normalize a type-name attribute.
fn type_attr(node: Node, attr: &str) -> Option<String> {
    node.attribute(attr).map(normalize_type_name)
}

fn parse_entity(xmlq: &dyn XmlQuery, element: Node, namespace: &str) -> Option<EntityTypeDecl> {
    let name = element.attribute("Name")?.to_string();
    let fqname = format!("{namespace}.{name}");

    let key_names: Vec<String> = xmlq
        .query(element, "edm:Key/edm:PropertyRef")
        .iter()
        .filter_map(|n| n.attribute("Name"))
        .map(str::to_string)
        .collect();

    let mut properties = Vec::new();
    for property in xmlq.query(element, "edm:Property") {
        let Some(p_name) = property.attribute("Name") else {
            continue;
        };
        let Some(p_type) = type_attr(property, "Type") else {
            continue;
        };
        let (is_collection, p_type) = split_collection(&p_type);
        properties.push(PropertyDecl {
            name: p_name.to_string(),
            type_name: p_type.to_string(),
            is_primary_key: key_names.iter().any(|k| k.as_str() == p_name),
            is_collection,
        });
    }

    let mut navigation_properties = Vec::new();
    for nav in xmlq.query(element, "edm:NavigationProperty") {
        let Some(p_name) = nav.attribute("Name") else {
            continue;
        };
        let Some(target) = type_attr(nav, "Type") else {
            continue;
        };
        let foreign_key = xmlq
            .query(nav, "edm:ReferentialConstraint")
            .first()
            .and_then(|c| c.attribute("Property"))
            .map(str::to_string);
        navigation_properties.push(NavigationPropertyDecl {
            name: p_name.to_string(),
            target,
            foreign_key,
        });
    }

    debug!(
        "Extracted entity type {} ({} properties, {} navigation properties)",
        fqname,
        properties.len(),
        navigation_properties.len()
    );

    Some(EntityTypeDecl {
        name,
        fqname,
        base_type: type_attr(element, "BaseType"),
        properties,
        navigation_properties,
        key_names,
    })
}

fn parse_enum(xmlq: &dyn XmlQuery, element: Node, namespace: &str) -> Option<EnumTypeDecl> {
    let name = element.attribute("Name")?.to_string();
    let mut members = Vec::new();
    for member in xmlq.query(element, "edm:Member") {
        let Some(m_name) = member.attribute("Name") else {
            continue;
        };
        // Members with missing or unparsable values are omitted, not fatal.
        let Some(value) = member.attribute("Value").and_then(|v| v.parse::<i64>().ok()) else {
            continue;
        };
        members.push((m_name.to_string(), value));
    }
    Some(EnumTypeDecl {
        fqname: format!("{namespace}.{name}"),
        name,
        members,
    })
}

fn parse_operation(
    xmlq: &dyn XmlQuery,
    element: Node,
    namespace: &str,
    kind: OperationKind,
) -> Option<OperationDecl> {
    let name = element.attribute("Name")?.to_string();
    let is_bound = element.attribute("IsBound") == Some("true");

    // Bound operations are invoked as SchemaNamespace.Name.
    let fqname = if is_bound {
        format!("{namespace}.{name}")
    } else {
        name.clone()
    };

    let mut binding_type = None;
    let mut parameters = Vec::new();
    for parameter in xmlq.query(element, "edm:Parameter") {
        let Some(p_name) = parameter.attribute("Name") else {
            continue;
        };
        let Some(p_type) = type_attr(parameter, "Type") else {
            continue;
        };
        if is_bound && p_name == "bindingParameter" {
            binding_type = Some(p_type);
            continue;
        }
        parameters.push(ParameterDecl {
            name: p_name.to_string(),
            type_name: p_type,
        });
    }

    let mut return_type = None;
    let mut return_collection_type = None;
    for ret in xmlq.query(element, "edm:ReturnType") {
        let Some(r_type) = type_attr(ret, "Type") else {
            continue;
        };
        let (is_collection, r_type) = split_collection(&r_type);
        if is_collection {
            return_collection_type = Some(r_type.to_string());
        } else {
            return_type = Some(r_type.to_string());
        }
    }

    Some(OperationDecl {
        kind,
        name,
        fqname,
        is_bound,
        binding_type,
        parameters,
        return_type,
        return_collection_type,
    })
}

/// Walk the document once, producing raw structural records. The second loop
/// resolves entity sets against the full schema list, because CSDL places no
/// ordering constraint between a set and the type it targets.
pub fn extract(doc: &Document, xmlq: &dyn XmlQuery) -> SchemaDocument {
    let root = doc.root_element();
    let mut schemas = Vec::new();

    for schema_el in xmlq.query(root, "edmx:DataServices/edm:Schema") {
        let Some(namespace) = schema_el.attribute("Namespace") else {
            continue;
        };

        let mut schema = Schema {
            namespace: namespace.to_string(),
            entity_types: Vec::new(),
            enum_types: Vec::new(),
            actions: Vec::new(),
            functions: Vec::new(),
        };

        for enum_el in xmlq.query(schema_el, "edm:EnumType") {
            if let Some(decl) = parse_enum(xmlq, enum_el, namespace) {
                schema.enum_types.push(decl);
            }
        }
        for entity_el in xmlq.query(schema_el, "edm:EntityType") {
            if let Some(decl) = parse_entity(xmlq, entity_el, namespace) {
                schema.entity_types.push(decl);
            }
        }
        for action_el in xmlq.query(schema_el, "edm:Action") {
            if let Some(decl) = parse_operation(xmlq, action_el, namespace, OperationKind::Action) {
                schema.actions.push(decl);
            }
        }
        for function_el in xmlq.query(schema_el, "edm:Function") {
            if let Some(decl) =
                parse_operation(xmlq, function_el, namespace, OperationKind::Function)
            {
                schema.functions.push(decl);
            }
        }

        schemas.push(schema);
    }

    let mut entity_sets = std::collections::HashMap::new();
    for schema_el in xmlq.query(root, "edmx:DataServices/edm:Schema") {
        for set_el in xmlq.query(schema_el, "edm:EntityContainer/edm:EntitySet") {
            let Some(set_name) = set_el.attribute("Name") else {
                continue;
            };
            let Some(set_type) = type_attr(set_el, "EntityType") else {
                continue;
            };
            let entity = schemas
                .iter()
                .flat_map(|s| &s.entity_types)
                .find(|e| e.fqname == set_type)
                .cloned();
            entity_sets.insert(
                set_type.clone(),
                EntitySetDecl {
                    name: set_name.to_string(),
                    entity_type: set_type,
                    entity,
                },
            );
        }
    }

    debug!(
        "Extracted {} schemas, {} entity sets",
        schemas.len(),
        entity_sets.len()
    );

    SchemaDocument {
        schemas,
        entity_sets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_collection() {
        assert_eq!(split_collection("Collection(NS.Foo)"), (true, "NS.Foo"));
        assert_eq!(split_collection("NS.Foo"), (false, "NS.Foo"));
        assert_eq!(split_collection("Edm.String"), (false, "Edm.String"));
    }

    #[test]
    fn test_vendor_alias_normalization() {
        assert_eq!(
            normalize_type_name("mscrm.account"),
            "Microsoft.Dynamics.CRM.account"
        );
        assert_eq!(normalize_type_name("NS.Order"), "NS.Order");
    }
}
