//! Namespace-qualified path queries over the parsed EDMX document
//!
//! The rest of the compiler never touches roxmltree directly; it goes through
//! the [`XmlQuery`] contract with paths like `edmx:DataServices/edm:Schema`.
//! Two backing strategies implement the contract and are interchangeable —
//! callers never branch on which one is active.

use roxmltree::Node;

/// OASIS namespace URI for EDM schema elements.
pub const EDM_NS: &str = "http://docs.oasis-open.org/odata/ns/edm";
/// OASIS namespace URI for the EDMX wrapper elements.
pub const EDMX_NS: &str = "http://docs.oasis-open.org/odata/ns/edmx";

/// Resolve one of the two fixed prefixes to its namespace URI.
fn resolve_prefix(prefix: &str) -> Option<&'static str> {
    match prefix {
        "edm" => Some(EDM_NS),
        "edmx" => Some(EDMX_NS),
        _ => None,
    }
}

/// One `prefix:LocalName` step of a path, resolved against the fixed map.
#[derive(Debug, Clone, Copy)]
struct Segment<'p> {
    namespace: &'static str,
    local: &'p str,
}

/// `None` if any step lacks a prefix or uses one outside the fixed map; a
/// path that cannot resolve must match nothing, not a shortened path.
fn parse_path(path: &str) -> Option<Vec<Segment<'_>>> {
    path.split('/')
        .map(|step| {
            let (prefix, local) = step.split_once(':')?;
            let namespace = resolve_prefix(prefix)?;
            Some(Segment { namespace, local })
        })
        .collect()
}

fn matches(node: &Node, segment: &Segment) -> bool {
    node.is_element()
        && node.tag_name().name() == segment.local
        && node.tag_name().namespace() == Some(segment.namespace)
}

/// Uniform tree-query contract: all elements reached from `node` by walking
/// the child axis along `path`, in document order.
pub trait XmlQuery {
    fn query<'a, 'input>(&self, node: Node<'a, 'input>, path: &str) -> Vec<Node<'a, 'input>>;
}

/// Iterative strategy: expands a frontier of nodes one path segment at a time.
#[derive(Debug, Default)]
pub struct PathWalker;

impl XmlQuery for PathWalker {
    fn query<'a, 'input>(&self, node: Node<'a, 'input>, path: &str) -> Vec<Node<'a, 'input>> {
        let Some(segments) = parse_path(path) else {
            return Vec::new();
        };
        let mut frontier = vec![node];
        for segment in segments {
            frontier = frontier
                .iter()
                .flat_map(|n| n.children())
                .filter(|n| matches(n, &segment))
                .collect();
        }
        frontier
    }
}

/// Recursive-descent strategy: matches the whole remaining path below each
/// candidate child. Same results as [`PathWalker`], different traversal.
#[derive(Debug, Default)]
pub struct RecursiveWalker;

impl RecursiveWalker {
    fn collect<'a, 'input>(
        node: Node<'a, 'input>,
        segments: &[Segment],
        out: &mut Vec<Node<'a, 'input>>,
    ) {
        let Some((first, rest)) = segments.split_first() else {
            out.push(node);
            return;
        };
        for child in node.children().filter(|n| matches(n, first)) {
            Self::collect(child, rest, out);
        }
    }
}

impl XmlQuery for RecursiveWalker {
    fn query<'a, 'input>(&self, node: Node<'a, 'input>, path: &str) -> Vec<Node<'a, 'input>> {
        let Some(segments) = parse_path(path) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        Self::collect(node, &segments, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    const DOC: &str = r#"<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="NS">
      <EntityType Name="Order">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32"/>
        <Property Name="Total" Type="Edm.Decimal"/>
      </EntityType>
      <EntityType Name="Customer"/>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

    #[test]
    fn test_child_path_query() {
        let doc = Document::parse(DOC).unwrap();
        let walker = PathWalker;
        let schemas = walker.query(doc.root_element(), "edmx:DataServices/edm:Schema");
        assert_eq!(schemas.len(), 1);

        let entities = walker.query(schemas[0], "edm:EntityType");
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].attribute("Name"), Some("Order"));

        let keys = walker.query(entities[0], "edm:Key/edm:PropertyRef");
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].attribute("Name"), Some("Id"));
    }

    #[test]
    fn test_query_misses_grandchildren() {
        let doc = Document::parse(DOC).unwrap();
        // Property is two levels below Schema; a single-segment path must not reach it.
        let schemas = PathWalker.query(doc.root_element(), "edmx:DataServices/edm:Schema");
        assert!(PathWalker.query(schemas[0], "edm:Property").is_empty());
    }

    #[test]
    fn test_strategies_are_interchangeable() {
        let doc = Document::parse(DOC).unwrap();
        let paths = [
            "edmx:DataServices/edm:Schema",
            "edmx:DataServices/edm:Schema/edm:EntityType",
            "edmx:DataServices/edm:Schema/edm:EntityType/edm:Property",
            "edm:NoSuchElement",
            "edmx:DataServices/bad:Nope/edm:Schema",
        ];
        for path in paths {
            let a = PathWalker.query(doc.root_element(), path);
            let b = RecursiveWalker.query(doc.root_element(), path);
            let a_names: Vec<_> = a.iter().map(|n| n.attribute("Name")).collect();
            let b_names: Vec<_> = b.iter().map(|n| n.attribute("Name")).collect();
            assert_eq!(a_names, b_names, "strategies diverged on {path}");
            assert_eq!(a.len(), b.len());
        }
    }

    #[test]
    fn test_unknown_prefix_yields_nothing() {
        let doc = Document::parse(DOC).unwrap();
        assert!(PathWalker.query(doc.root_element(), "foo:DataServices").is_empty());
        assert!(RecursiveWalker.query(doc.root_element(), "foo:DataServices").is_empty());
    }

    #[test]
    fn test_unresolvable_segment_matches_nothing_not_a_shorter_path() {
        let doc = Document::parse(DOC).unwrap();
        let root = doc.root_element();
        // A bad step in the middle must not collapse the path onto whatever
        // the surviving steps happen to reach.
        for path in [
            "edmx:DataServices/bad:Nope/edm:Schema",
            "edmx:DataServices/DataServices/edm:Schema",
            "DataServices",
        ] {
            assert!(PathWalker.query(root, path).is_empty(), "PathWalker matched {path}");
            assert!(
                RecursiveWalker.query(root, path).is_empty(),
                "RecursiveWalker matched {path}"
            );
        }
    }
}
