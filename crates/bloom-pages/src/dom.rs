//! DOM plumbing over html5ever's reference-counted tree.
//!
//! Both the source XHTML pages and the Bloom template document are handled
//! through these helpers; Bloom-specific operations live in `doc`.

use std::cell::RefCell;
use std::rc::Rc;

use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{ns, Attribute, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};

/// Parse a complete HTML/XHTML document into a DOM tree.
pub fn parse_document_str(html: &str) -> RcDom {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: false,
            ..Default::default()
        },
        ..Default::default()
    };

    parse_document(RcDom::default(), opts)
        .from_utf8()
        .one(html.as_bytes())
}

/// Parse a markup fragment and return its top-level nodes, detached and
/// ready to be adopted into another tree.
pub fn parse_body_fragment(markup: &str) -> Vec<Handle> {
    let wrapped = format!(
        "<!DOCTYPE html><html><head></head><body>{}</body></html>",
        markup
    );
    let dom = parse_document_str(&wrapped);
    match find_first_element(&dom.document, "body") {
        Some(body) => {
            let children = body.children.take();
            for child in &children {
                child.parent.set(None);
            }
            children
        }
        None => Vec::new(),
    }
}

/// Serialize a DOM tree back to an HTML string.
pub fn serialize_document(dom: &RcDom) -> String {
    let mut bytes = Vec::new();
    let document: SerializableHandle = dom.document.clone().into();
    serialize(&mut bytes, &document, SerializeOpts::default()).expect("serialization failed");
    String::from_utf8(bytes).unwrap_or_default()
}

/// Serialize a node including its own tag (outer markup).
pub fn outer_html(handle: &Handle) -> String {
    let mut bytes = Vec::new();
    let serializable: SerializableHandle = handle.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    serialize(&mut bytes, &serializable, opts).expect("serialization failed");
    String::from_utf8(bytes).unwrap_or_default()
}

/// Serialize only a node's children (inner markup).
pub fn inner_html(handle: &Handle) -> String {
    handle
        .children
        .borrow()
        .iter()
        .map(outer_html)
        .collect::<Vec<_>>()
        .concat()
}

/// Concatenated text content of a node, tags ignored.
pub fn text_content(handle: &Handle) -> String {
    let mut text = String::new();
    text_recursive(handle, &mut text);
    text
}

fn text_recursive(handle: &Handle, text: &mut String) {
    match handle.data {
        NodeData::Text { ref contents } => {
            text.push_str(&contents.borrow());
        }
        NodeData::Element { .. } => {
            for child in handle.children.borrow().iter() {
                text_recursive(child, text);
            }
        }
        _ => {}
    }
}

/// Is this node an element with the given local name?
pub fn is_element(handle: &Handle, name: &str) -> bool {
    matches!(handle.data, NodeData::Element { name: ref qname, .. } if qname.local.as_ref() == name)
}

/// Get an attribute value from an element.
pub fn attr(handle: &Handle, attr_name: &str) -> Option<String> {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        for attr in attrs.borrow().iter() {
            if attr.name.local.as_ref() == attr_name {
                return Some(attr.value.to_string());
            }
        }
    }
    None
}

/// Set an attribute on an element, replacing any existing value.
pub fn set_attr(handle: &Handle, attr_name: &str, value: &str) {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        let mut attrs_mut = attrs.borrow_mut();
        for attr in attrs_mut.iter_mut() {
            if attr.name.local.as_ref() == attr_name {
                attr.value = value.into();
                return;
            }
        }
        attrs_mut.push(Attribute {
            name: QualName::new(None, ns!(), attr_name.into()),
            value: value.into(),
        });
    }
}

/// True when the element's `class` attribute contains the given class.
pub fn has_class(handle: &Handle, class: &str) -> bool {
    attr(handle, "class")
        .map(|c| c.split_whitespace().any(|x| x == class))
        .unwrap_or(false)
}

/// Depth-first search for the first element with the given local name.
pub fn find_first_element(handle: &Handle, name: &str) -> Option<Handle> {
    if is_element(handle, name) {
        return Some(handle.clone());
    }
    for child in handle.children.borrow().iter() {
        if let Some(found) = find_first_element(child, name) {
            return Some(found);
        }
    }
    None
}

/// Depth-first collection of every node matching a predicate.
pub fn find_all_where(handle: &Handle, pred: &impl Fn(&Handle) -> bool) -> Vec<Handle> {
    let mut results = Vec::new();
    find_recursive(handle, pred, &mut results);
    results
}

fn find_recursive(handle: &Handle, pred: &impl Fn(&Handle) -> bool, results: &mut Vec<Handle>) {
    if pred(handle) {
        results.push(handle.clone());
    }
    for child in handle.children.borrow().iter() {
        find_recursive(child, pred, results);
    }
}

/// Create a detached element node in the HTML namespace.
pub fn new_element(name: &str, attributes: &[(&str, &str)]) -> Handle {
    let attrs = attributes
        .iter()
        .map(|(key, value)| Attribute {
            name: QualName::new(None, ns!(), (*key).into()),
            value: (*value).into(),
        })
        .collect();
    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), name.into()),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// Create a detached text node.
pub fn new_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(text.into()),
    })
}

/// Append a child, fixing up its parent pointer.
pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Replace all of a node's children with the given nodes.
pub fn replace_children(parent: &Handle, new_children: Vec<Handle>) {
    let mut children = parent.children.borrow_mut();
    children.clear();
    for child in new_children {
        child.parent.set(Some(Rc::downgrade(parent)));
        children.push(child);
    }
}
