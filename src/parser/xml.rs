//! Conversion of XML documents into JSON maps for dotted-path lookup.
//!
//! The root element is dropped, child elements and attributes become keys,
//! text-only elements become strings. Repeated sibling elements overwrite each
//! other (last wins). Mixed content keeps its text under the empty key.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

/// An element whose end tag has not been read yet.
struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Option<Self> {
        let name = String::from_utf8(start.local_name().as_ref().to_vec()).ok()?;
        let mut children = Map::new();
        for attr in start.attributes() {
            let attr = attr.ok()?;
            let key = String::from_utf8(attr.key.local_name().as_ref().to_vec()).ok()?;
            let value = attr.unescape_value().ok()?.into_owned();
            children.insert(key, Value::String(value));
        }
        Some(Self { name, children, text: String::new() })
    }

    fn close(self) -> (String, Value) {
        let text = self.text.trim().to_string();
        if self.children.is_empty() {
            return (self.name, Value::String(text));
        }
        let mut children = self.children;
        if !text.is_empty() {
            children.insert(String::new(), Value::String(text));
        }
        (self.name, Value::Object(children))
    }
}

/// Parse an XML document into a map of the root element's content.
///
/// # Parameters
///
/// - `xml` - Candidate XML document
///
/// # Returns
///
/// Returns `None` if the input is not a well-formed document with exactly one
/// root element.
pub fn xml_to_map(xml: &str) -> Option<Map<String, Value>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event().ok()? {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return None;
                }
                stack.push(Frame::open(&start)?);
            }
            Event::Empty(start) => {
                if stack.is_empty() && root.is_some() {
                    return None;
                }
                let frame = Frame::open(&start)?;
                attach(&mut stack, &mut root, frame);
            }
            Event::End(_) => {
                let frame = stack.pop()?;
                attach(&mut stack, &mut root, frame);
            }
            Event::Text(text) => {
                let frame = stack.last_mut()?;
                frame.text.push_str(&text.unescape().ok()?);
            }
            Event::CData(data) => {
                let frame = stack.last_mut()?;
                frame.text.push_str(std::str::from_utf8(&data.into_inner()).ok()?);
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if !stack.is_empty() {
        return None;
    }

    match root? {
        Value::Object(map) => Some(map),
        Value::String(text) => {
            let mut map = Map::new();
            if !text.is_empty() {
                map.insert(String::new(), Value::String(text));
            }
            Some(map)
        }
        _ => None,
    }
}

/// Attach a closed element to its parent, or make it the document root.
fn attach(stack: &mut [Frame], root: &mut Option<Value>, frame: Frame) {
    let (name, value) = frame.close();
    match stack.last_mut() {
        Some(parent) => {
            parent.children.insert(name, value);
        }
        None => *root = Some(value),
    }
}
