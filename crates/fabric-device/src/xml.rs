//! Minimal element tree over `quick-xml` for reading device replies.
//!
//! Replies are small, so they are parsed into an owned tree and queried by
//! local element name. Namespaces and attributes are ignored.

use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{DeviceError, DeviceResult};

/// An element with its accumulated text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn named(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Parses `xml` into a document node whose children are the top-level
    /// elements.
    pub fn parse(xml: &str) -> DeviceResult<XmlElement> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack = vec![XmlElement::default()];
        loop {
            let event = reader
                .read_event()
                .map_err(|e| DeviceError::parse("xml reply", e.to_string()))?;
            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    stack.push(XmlElement::named(name));
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlElement::named(name));
                    }
                }
                Event::End(_) => {
                    if stack.len() < 2 {
                        return Err(DeviceError::parse("xml reply", "unbalanced end tag"));
                    }
                    if let (Some(done), Some(parent)) = (stack.pop(), stack.last_mut()) {
                        parent.children.push(done);
                    }
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| DeviceError::parse("xml text", e.to_string()))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Event::CData(c) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if stack.len() != 1 {
            return Err(DeviceError::parse("xml reply", "unclosed element"));
        }
        Ok(stack.pop().unwrap_or_default())
    }

    /// First direct child named `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Direct children named `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first direct child named `name`.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// First descendant named `name`, depth first.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant named `name`, in document order.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut out = Vec::new();
        self.collect(name, &mut out);
        out
    }

    fn collect<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect(name, out);
        }
    }

    /// Text of the first descendant named `name`.
    pub fn find_text(&self, name: &str) -> Option<&str> {
        self.find(name).map(|e| e.text.as_str())
    }

    /// Text of the first descendant named `name`, or an empty string.
    pub fn find_text_or_empty(&self, name: &str) -> String {
        self.find_text(name).unwrap_or_default().to_string()
    }

    /// Descends through a path of direct children.
    pub fn path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }
}

/// Escapes text for inclusion in an XML body.
pub fn escape(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REPLY: &str = r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="1">
  <data>
    <rbridge-id xmlns="urn:brocade.com:mgmt:brocade-rbridge">
      <ip>
        <rtm-config xmlns="urn:brocade.com:mgmt:brocade-rtm">
          <router-id>172.31.254.1</router-id>
        </rtm-config>
      </ip>
    </rbridge-id>
    <interface xmlns="urn:brocade.com:mgmt:brocade-interface">
      <loopback><id>1</id></loopback>
      <loopback><id>2</id></loopback>
    </interface>
  </data>
</rpc-reply>"#;

    #[test]
    fn test_find_descendant() {
        let doc = XmlElement::parse(REPLY).unwrap();
        assert_eq!(doc.find_text("router-id"), Some("172.31.254.1"));
        assert_eq!(doc.find_text("missing"), None);
    }

    #[test]
    fn test_find_all_in_document_order() {
        let doc = XmlElement::parse(REPLY).unwrap();
        let ids: Vec<&str> = doc
            .find_all("loopback")
            .into_iter()
            .filter_map(|l| l.child_text("id"))
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_path_and_empty_elements() {
        let doc = XmlElement::parse("<rpc-reply><ok/></rpc-reply>").unwrap();
        assert!(doc.path(&["rpc-reply", "ok"]).is_some());
        assert!(doc.path(&["rpc-reply", "data"]).is_none());
    }

    #[test]
    fn test_text_is_unescaped() {
        let doc = XmlElement::parse("<a><b>x &amp; y</b></a>").unwrap();
        assert_eq!(doc.find_text("b"), Some("x & y"));
    }

    #[test]
    fn test_malformed_reply() {
        assert!(XmlElement::parse("<a><b></a>").is_err());
        assert!(XmlElement::parse("<a><b>").is_err());
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b&c"), "a&lt;b&amp;c");
        assert_eq!(escape("plain"), "plain");
    }
}
