//! SOAP plumbing shared by the entity codecs
//!
//! Request bodies are rendered with `quick-xml` into [`XmlFragment`]s
//! using the `m:` (messages) and `t:` (types) prefixes. Responses come
//! back from the transport as structured [`Value`]s; [`parse_response`]
//! produces that shape from a raw SOAP envelope.

use crate::error::{Error, Result};
use crate::folder::ListOptions;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Namespace of the `m:` prefix.
pub const MESSAGES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/messages";
/// Namespace of the `t:` prefix.
pub const TYPES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/types";
const SOAP_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// A rendered piece of request XML.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XmlFragment(String);

impl XmlFragment {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for XmlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) type XmlWriter = Writer<Vec<u8>>;

/// Run `build` against a fresh writer and collect the output.
pub(crate) fn fragment<F>(build: F) -> Result<XmlFragment>
where
    F: FnOnce(&mut XmlWriter) -> Result<()>,
{
    let mut writer = Writer::new(Vec::new());
    build(&mut writer)?;
    Ok(XmlFragment(
        String::from_utf8_lossy(&writer.into_inner()).into_owned(),
    ))
}

pub(crate) fn open(writer: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
    let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
    writer.write_event(Event::Start(start))?;
    Ok(())
}

pub(crate) fn close(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

pub(crate) fn empty(writer: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
    let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
    writer.write_event(Event::Empty(start))?;
    Ok(())
}

/// `<name attrs>text</name>`, with `text` escaped.
pub(crate) fn text(
    writer: &mut XmlWriter,
    name: &str,
    attributes: &[(&str, &str)],
    content: &str,
) -> Result<()> {
    open(writer, name, attributes)?;
    writer.write_event(Event::Text(BytesText::new(content)))?;
    close(writer, name)
}

/// Splice an already rendered fragment into the output.
pub(crate) fn splice(writer: &mut XmlWriter, fragment: &XmlFragment) {
    writer.get_mut().extend_from_slice(fragment.as_str().as_bytes());
}

/// Wrap a request body in a SOAP envelope declaring the `m:` and `t:`
/// namespaces, for transports that post raw XML.
#[must_use]
pub fn envelope(body: &XmlFragment) -> XmlFragment {
    XmlFragment(format!(
        r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="{SOAP_NS}" xmlns:m="{MESSAGES_NS}" xmlns:t="{TYPES_NS}"><soap:Body>{body}</soap:Body></soap:Envelope>"#
    ))
}

/// The remote calls issued by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindItem,
    FindFolder,
    GetItem,
    CreateItem,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FindItem => "FindItem",
            Self::FindFolder => "FindFolder",
            Self::GetItem => "GetItem",
            Self::CreateItem => "CreateItem",
        }
    }

    const fn response_message(self) -> &'static str {
        match self {
            Self::FindItem => "FindItemResponseMessage",
            Self::FindFolder => "FindFolderResponseMessage",
            Self::GetItem => "GetItemResponseMessage",
            Self::CreateItem => "CreateItemResponseMessage",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many properties the server returns per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaseShape {
    #[default]
    Default,
    AllProperties,
}

impl BaseShape {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::AllProperties => "AllProperties",
        }
    }
}

/// Which end of the folder an indexed page is counted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BasePoint {
    #[default]
    Beginning,
    End,
}

impl BasePoint {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginning => "Beginning",
            Self::End => "End",
        }
    }
}

/// A node the transport may deliver either bare or as a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }

    #[must_use]
    pub fn into_first(self) -> Option<T> {
        match self {
            Self::Many(items) => items.into_iter().next(),
            Self::One(item) => Some(item),
        }
    }
}

pub(crate) fn find_item(parent: &XmlFragment, options: &ListOptions) -> Result<XmlFragment> {
    let max_entries = options.max_entries.to_string();
    let offset = options.offset.to_string();
    fragment(|w| {
        open(w, "m:FindItem", &[("Traversal", "Shallow")])?;
        open(w, "m:ItemShape", &[])?;
        text(w, "t:BaseShape", &[], options.shape().as_str())?;
        close(w, "m:ItemShape")?;
        empty(
            w,
            "m:IndexedPageItemView",
            &[
                ("MaxEntriesReturned", max_entries.as_str()),
                ("Offset", offset.as_str()),
                ("BasePoint", options.base_point.as_str()),
            ],
        )?;
        open(w, "m:ParentFolderIds", &[])?;
        splice(w, parent);
        close(w, "m:ParentFolderIds")?;
        close(w, "m:FindItem")
    })
}

pub(crate) fn find_folder(parent: &XmlFragment) -> Result<XmlFragment> {
    fragment(|w| {
        open(w, "m:FindFolder", &[("Traversal", "Shallow")])?;
        open(w, "m:FolderShape", &[])?;
        text(w, "t:BaseShape", &[], BaseShape::Default.as_str())?;
        close(w, "m:FolderShape")?;
        open(w, "m:ParentFolderIds", &[])?;
        splice(w, parent);
        close(w, "m:ParentFolderIds")?;
        close(w, "m:FindFolder")
    })
}

pub(crate) fn get_item(id: &str, change_key: Option<&str>) -> Result<XmlFragment> {
    fragment(|w| {
        open(w, "m:GetItem", &[])?;
        open(w, "m:ItemShape", &[])?;
        text(w, "t:BaseShape", &[], BaseShape::Default.as_str())?;
        text(w, "t:IncludeMimeContent", &[], "true")?;
        close(w, "m:ItemShape")?;
        open(w, "m:ItemIds", &[])?;
        match change_key {
            Some(key) => empty(w, "t:ItemId", &[("Id", id), ("ChangeKey", key)])?,
            None => empty(w, "t:ItemId", &[("Id", id)])?,
        }
        close(w, "m:ItemIds")?;
        close(w, "m:GetItem")
    })
}

pub(crate) fn create_item(
    saved_folder: &XmlFragment,
    message: &XmlFragment,
) -> Result<XmlFragment> {
    fragment(|w| {
        open(w, "m:CreateItem", &[("MessageDisposition", "SendAndSaveCopy")])?;
        open(w, "m:SavedItemFolderId", &[])?;
        splice(w, saved_folder);
        close(w, "m:SavedItemFolderId")?;
        open(w, "m:Items", &[])?;
        splice(w, message);
        close(w, "m:Items")?;
        close(w, "m:CreateItem")
    })
}

/// Locate the `<Operation>ResponseMessage` node and check its class.
///
/// A `ResponseClass="Error"` becomes [`Error::Response`]; warnings are
/// logged and the message is returned as-is.
pub(crate) fn response_message(operation: Operation, raw: &Value) -> Result<&Value> {
    let key = operation.response_message();
    let node = raw
        .get("ResponseMessages")
        .and_then(|messages| messages.get(key))
        .ok_or_else(|| Error::Decode(format!("{operation} response has no {key}")))?;
    let node = match node {
        Value::Array(messages) => messages
            .first()
            .ok_or_else(|| Error::Decode(format!("{operation} response has an empty {key}")))?,
        other => other,
    };

    let class = node
        .pointer("/attributes/ResponseClass")
        .and_then(Value::as_str)
        .unwrap_or("Success");
    let field = |name: &str| {
        node.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    match class {
        "Error" => Err(Error::Response {
            operation,
            code: field("ResponseCode"),
            message: field("MessageText"),
        }),
        "Warning" => {
            warn!(
                "{} returned a warning: {} {}",
                operation,
                field("ResponseCode"),
                field("MessageText")
            );
            Ok(node)
        }
        _ => Ok(node),
    }
}

/// Decode `node` into `T`, naming `what` in the error.
pub(crate) fn decode_node<'a, T: Deserialize<'a>>(node: &'a Value, what: &str) -> Result<T> {
    T::deserialize(node).map_err(|e| Error::Decode(format!("{what}: {e}")))
}

/// Key holding the document order of a list container's children.
pub const ORDER_KEY: &str = "$order";

/// Elements whose children form an ordered list of mixed kinds.
const LIST_CONTAINERS: [&str; 2] = ["Items", "Folders"];

/// Convert a SOAP response document into the structured value shape
/// the transport hands to this crate.
///
/// Namespace prefixes are dropped, attributes land under
/// `"attributes"`, repeated siblings become arrays and empty elements
/// become `null`. Leaf text is kept exactly as sent; whitespace
/// between child elements is dropped. Inside `Items` and `Folders`,
/// when more than one kind of child occurs, the child names in
/// document order are listed under [`ORDER_KEY`]. For a SOAP envelope,
/// the content of the single operation response element inside `Body`
/// is returned.
///
/// # Errors
///
/// Returns [`Error::Xml`] on malformed XML and [`Error::Decode`] for an
/// empty document or a SOAP fault.
pub fn parse_response(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Node::open(&start)?),
            Event::Empty(start) => {
                let node = Node::open(&start)?;
                attach(&mut stack, &mut root, node);
            }
            Event::Text(content) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&content.unescape()?);
                }
            }
            Event::CData(content) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&content));
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| Error::Decode("unbalanced end tag".into()))?;
                attach(&mut stack, &mut root, node);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let (name, value) = root.ok_or_else(|| Error::Decode("empty response document".into()))?;
    if name != "Envelope" {
        return Ok(value);
    }

    let body = value
        .get("Body")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::Decode("SOAP envelope has no Body".into()))?;
    if let Some(fault) = body.get("Fault") {
        let reason = fault
            .get("faultstring")
            .and_then(Value::as_str)
            .unwrap_or("unknown fault");
        return Err(Error::Decode(format!("SOAP fault: {reason}")));
    }
    Ok(body.values().next().cloned().unwrap_or(Value::Null))
}

/// The children of an `Items` or `Folders` node as `(kind, node)`
/// pairs, in document order when [`ORDER_KEY`] is present and grouped
/// by kind otherwise.
pub(crate) fn ordered_children(container: &Value) -> Vec<(&str, &Value)> {
    let Some(object) = container.as_object() else {
        return Vec::new();
    };

    if let Some(order) = object.get(ORDER_KEY).and_then(Value::as_array) {
        let mut cursors: HashMap<&str, usize> = HashMap::new();
        return order
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|name| {
                let (key, node) = object.get_key_value(name)?;
                let index = cursors.entry(key.as_str()).or_default();
                let child = match node {
                    Value::Array(siblings) => siblings.get(*index),
                    single => (*index == 0).then_some(single),
                }?;
                *index += 1;
                Some((key.as_str(), child))
            })
            .collect();
    }

    object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "attributes" | "$value" | ORDER_KEY))
        .flat_map(|(key, node)| {
            let children: Vec<&Value> = match node {
                Value::Array(siblings) => siblings.iter().collect(),
                single => vec![single],
            };
            children.into_iter().map(move |child| (key.as_str(), child))
        })
        .collect()
}

fn attach(stack: &mut [Node], root: &mut Option<(String, Value)>, node: Node) {
    let (name, value) = node.finish();
    match stack.last_mut() {
        Some(parent) => parent.push_child(name, value),
        None => *root = Some((name, value)),
    }
}

struct Node {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    order: Vec<String>,
    text: String,
}

impl Node {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Map::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            if attribute.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            attributes.insert(key, Value::String(value));
        }
        Ok(Self {
            name,
            attributes,
            children: Map::new(),
            order: Vec::new(),
            text: String::new(),
        })
    }

    fn push_child(&mut self, name: String, value: Value) {
        self.order.push(name.clone());
        match self.children.get_mut(&name) {
            Some(Value::Array(siblings)) => siblings.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }

    fn is_mixed_list(&self) -> bool {
        LIST_CONTAINERS.contains(&self.name.as_str())
            && self.order.iter().any(|kind| *kind != self.order[0])
    }

    fn finish(self) -> (String, Value) {
        // Blank text is only indentation; a leaf's real text stays verbatim.
        let has_text = !self.text.trim().is_empty();
        let value = if !self.children.is_empty() {
            let mixed = self.is_mixed_list();
            let mut object = self.children;
            if mixed {
                let order = self.order.into_iter().map(Value::String).collect();
                object.insert(ORDER_KEY.into(), Value::Array(order));
            }
            if !self.attributes.is_empty() {
                object.insert("attributes".into(), Value::Object(self.attributes));
            }
            Value::Object(object)
        } else if !self.attributes.is_empty() {
            let mut object = Map::new();
            object.insert("attributes".into(), Value::Object(self.attributes));
            if has_text {
                object.insert("$value".into(), Value::String(self.text));
            }
            Value::Object(object)
        } else if has_text {
            Value::String(self.text)
        } else {
            Value::Null
        };
        (self.name, value)
    }
}
