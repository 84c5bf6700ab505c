//! In-memory model of the server's cruise-config XML.
//!
//! The document is kept as a plain element tree in the spirit of an
//! ElementTree: every element owns its leading `text` and the `tail` that
//! follows its closing tag. Top-level sections keep their document order:
//!
//! ```text
//! <cruise>
//!   <server/>
//!   <repositories/>
//!   <pipelines group="…"/>   (one per group, keyed by the `group` attribute)
//!   <templates/>
//!   <environments/>
//!   <agents/>
//! </cruise>
//! ```
//!
//! Serialisation re-indents a copy of the tree (two spaces per level) so the
//! output is deterministic and `serialize(parse(serialize(d))) == serialize(d)`.

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::CruiseError;

/// Sections swapped out by [`ConfigDocument::replace_sections`] and kept by
/// [`ConfigDocument::subset_for_testing`].
pub const TEST_SECTIONS: [&str; 3] = ["pipelines", "templates", "environments"];

/// Sections that a new pipeline group must precede.
const AFTER_PIPELINE_GROUPS: [&str; 3] = ["templates", "environments", "agents"];

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// One XML element with ordered attributes and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    /// Character data between the start tag and the first child.
    pub text: Option<String>,
    /// Character data between the end tag and the next sibling.
    pub tail: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Builder-style [`Element::set_attr`].
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// First direct child with `tag`.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    pub fn find_mut(&mut self, tag: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|child| child.tag == tag)
    }

    /// All direct children with `tag`, in document order.
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Append `child` and return a handle to it.
    pub fn push_child(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Append an empty child element named `tag`.
    pub fn sub_element(&mut self, tag: impl Into<String>) -> &mut Element {
        self.push_child(Element::new(tag))
    }
}

// ---------------------------------------------------------------------------
// ConfigDocument
// ---------------------------------------------------------------------------

/// The server's configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    root: Element,
}

impl ConfigDocument {
    /// Parse a full cruise-config (or any single-rooted XML document).
    ///
    /// Comments, processing instructions and the XML declaration are not kept.
    pub fn parse(text: &str) -> Result<Self, CruiseError> {
        Ok(Self {
            root: parse_tree(text)?,
        })
    }

    pub fn from_root(root: Element) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Canonical pretty-printed form, without an XML declaration.
    pub fn serialize(&self) -> String {
        render(&self.root)
    }

    /// Only the `pipelines`, `templates` and `environments` sections, so a
    /// test fixture can be captured without server or agent secrets.
    pub fn subset_for_testing(&self) -> String {
        let mut root = self.root.clone();
        root.children
            .retain(|child| TEST_SECTIONS.contains(&child.tag.as_str()));
        render(&root)
    }

    /// First top-level section named `tag`.
    pub fn find_section(&self, tag: &str) -> Option<&Element> {
        self.root.find(tag)
    }

    pub fn find_section_mut(&mut self, tag: &str) -> Option<&mut Element> {
        self.root.find_mut(tag)
    }

    /// Top-level `pipelines` sections, in document order.
    pub fn pipeline_groups(&self) -> impl Iterator<Item = &Element> {
        self.root.find_all("pipelines")
    }

    pub fn pipeline_group_names(&self) -> Vec<&str> {
        self.pipeline_groups()
            .filter_map(|group| group.attr("group"))
            .collect()
    }

    /// Linear scan for the `pipelines` section whose `group` is `name`.
    pub fn find_pipeline_group(&self, name: &str) -> Option<&Element> {
        self.group_index(name).map(|index| &self.root.children[index])
    }

    pub fn find_pipeline_group_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.group_index(name)
            .map(move |index| &mut self.root.children[index])
    }

    /// Return the group called `name`, creating an empty one ahead of
    /// `templates`/`environments`/`agents` when it does not exist yet.
    pub fn ensure_pipeline_group(&mut self, name: &str) -> &mut Element {
        let index = match self.group_index(name) {
            Some(index) => index,
            None => {
                let index = self
                    .root
                    .children
                    .iter()
                    .position(|child| AFTER_PIPELINE_GROUPS.contains(&child.tag.as_str()))
                    .unwrap_or(self.root.children.len());
                self.root
                    .children
                    .insert(index, Element::new("pipelines").with_attr("group", name));
                index
            }
        };
        &mut self.root.children[index]
    }

    /// Replace every top-level section whose tag is in `tags` with the
    /// matching sections of `fragment` (a document whose root holds them).
    ///
    /// The insertion point is the first `agents` section left after the
    /// removal; without one it is just before the last remaining section
    /// (the start of an empty root). Tags are inserted in reverse
    /// order of `tags`, each tag's elements in reverse, all at that one
    /// index, so with [`TEST_SECTIONS`] the result reads
    /// `… pipelines* templates environments agents` with the fragment's
    /// own order kept inside each tag.
    pub fn replace_sections(&mut self, fragment: &str, tags: &[&str]) -> Result<(), CruiseError> {
        let replacement = parse_tree(fragment)?;

        self.root
            .children
            .retain(|child| !tags.contains(&child.tag.as_str()));

        let index = self
            .root
            .children
            .iter()
            .position(|child| child.tag == "agents")
            .unwrap_or(self.root.children.len().saturating_sub(1));

        for tag in tags.iter().rev() {
            let matching: Vec<Element> = replacement.find_all(tag).cloned().collect();
            for element in matching.into_iter().rev() {
                self.root.children.insert(index, element);
            }
        }
        Ok(())
    }

    pub fn rename_pipeline_group(&mut self, old_name: &str, new_name: &str) -> Result<(), CruiseError> {
        let group = self
            .find_pipeline_group_mut(old_name)
            .ok_or_else(|| group_not_found(old_name))?;
        group.set_attr("group", new_name);
        Ok(())
    }

    /// Remove the group called `name` and return it.
    ///
    /// Callers check that the group holds no pipelines first.
    pub fn drop_pipeline_group(&mut self, name: &str) -> Result<Element, CruiseError> {
        let index = self.group_index(name).ok_or_else(|| group_not_found(name))?;
        Ok(self.root.children.remove(index))
    }

    /// Move every `pipeline` child of `source` into `target`.
    ///
    /// A missing `target` is created as a copy of `source` (authorization and
    /// all) placed directly before it. `source` keeps its non-pipeline
    /// children. Returns the number of pipelines moved.
    pub fn move_pipelines_between_groups(
        &mut self,
        source: &str,
        target: &str,
    ) -> Result<usize, CruiseError> {
        let source_index = self.group_index(source).ok_or_else(|| group_not_found(source))?;
        if source == target {
            return Ok(0);
        }

        match self.group_index(target) {
            Some(target_index) => {
                let moved = take_pipelines(&mut self.root.children[source_index]);
                let count = moved.len();
                self.root.children[target_index].children.extend(moved);
                Ok(count)
            }
            None => {
                let mut copy = self.root.children[source_index].clone();
                copy.set_attr("group", target);
                let count = copy.find_all("pipeline").count();
                take_pipelines(&mut self.root.children[source_index]);
                self.root.children.insert(source_index, copy);
                Ok(count)
            }
        }
    }

    /// Reference `pipeline` from the `pipelines` list of `environment`,
    /// creating that list if needed. Returns `false` when the reference was
    /// already there.
    pub fn assign_pipeline_to_environment(
        &mut self,
        environment: &str,
        pipeline: &str,
    ) -> Result<bool, CruiseError> {
        let not_found = || CruiseError::EnvironmentNotFound {
            name: environment.to_string(),
        };
        let environments = self.find_section_mut("environments").ok_or_else(not_found)?;
        let env = environments
            .children
            .iter_mut()
            .find(|child| child.tag == "environment" && child.attr("name") == Some(environment))
            .ok_or_else(not_found)?;

        let pipelines = match env.children.iter().position(|child| child.tag == "pipelines") {
            Some(index) => &mut env.children[index],
            None => env.sub_element("pipelines"),
        };
        if pipelines
            .find_all("pipeline")
            .any(|existing| existing.attr("name") == Some(pipeline))
        {
            return Ok(false);
        }
        pipelines.push_child(Element::new("pipeline").with_attr("name", pipeline));
        Ok(true)
    }

    fn group_index(&self, name: &str) -> Option<usize> {
        self.root
            .children
            .iter()
            .position(|child| child.tag == "pipelines" && child.attr("group") == Some(name))
    }
}

fn group_not_found(name: &str) -> CruiseError {
    CruiseError::GroupNotFound {
        name: name.to_string(),
    }
}

fn take_pipelines(group: &mut Element) -> Vec<Element> {
    let (pipelines, rest): (Vec<Element>, Vec<Element>) = std::mem::take(&mut group.children)
        .into_iter()
        .partition(|child| child.tag == "pipeline");
    group.children = rest;
    pipelines
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_tree(text: &str) -> Result<Element, CruiseError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            CruiseError::Xml(format!("at byte {}: {e}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| CruiseError::Xml("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(raw) => {
                let text = raw
                    .unescape()
                    .map_err(|e| CruiseError::Xml(e.to_string()))?;
                append_text(&mut stack, &text)?;
            }
            Event::CData(data) => {
                append_text(&mut stack, &String::from_utf8_lossy(&data))?;
            }
            Event::Eof => break,
            // Declaration, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(CruiseError::Xml(format!("unclosed element <{}>", open.tag)));
    }
    root.ok_or_else(|| CruiseError::Xml("no root element".to_string()))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, CruiseError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| CruiseError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| CruiseError::Xml(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), CruiseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(CruiseError::Xml("more than one root element".to_string()));
    } else {
        *root = Some(element);
    }
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) -> Result<(), CruiseError> {
    if text.is_empty() {
        return Ok(());
    }
    let Some(parent) = stack.last_mut() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(CruiseError::Xml("text outside the root element".to_string()));
    };
    let slot = match parent.children.last_mut() {
        Some(previous) => &mut previous.tail,
        None => &mut parent.text,
    };
    slot.get_or_insert_with(String::new).push_str(text);
    Ok(())
}

// ---------------------------------------------------------------------------
// Serialisation
// ---------------------------------------------------------------------------

fn render(root: &Element) -> String {
    let mut root = root.clone();
    indent(&mut root, 0);
    let mut out = String::new();
    write_element(&root, &mut out);
    out
}

/// Whitespace-only text and tails become `"\n" + 2*depth spaces`; real
/// character data is left alone. Leaf elements only get a tail.
fn indent(element: &mut Element, level: usize) {
    let newline = format!("\n{}", "  ".repeat(level));
    if element.children.is_empty() {
        if level > 0 && is_blank(&element.tail) {
            element.tail = Some(newline);
        }
        return;
    }

    if is_blank(&element.text) {
        element.text = Some(format!("{newline}  "));
    }
    if is_blank(&element.tail) {
        element.tail = Some(newline.clone());
    }
    for child in &mut element.children {
        indent(child, level + 1);
    }
    if let Some(last) = element.children.last_mut() {
        if is_blank(&last.tail) {
            last.tail = Some(newline);
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attribute(value, out);
        out.push('"');
    }

    let text = element.text.as_deref().filter(|text| !text.is_empty());
    if text.is_some() || !element.children.is_empty() {
        out.push('>');
        if let Some(text) = text {
            escape_text(text, out);
        }
        for child in &element.children {
            write_element(child, out);
        }
        out.push_str("</");
        out.push_str(&element.tag);
        out.push('>');
    } else {
        out.push_str(" />");
    }

    if let Some(tail) = &element.tail {
        escape_text(tail, out);
    }
}

fn escape_text(text: &str, out: &mut String) {
    out.push_str(&partial_escape(text));
}

/// `partial_escape` plus quotes and the whitespace characters attribute
/// normalisation would otherwise fold into spaces. Apostrophes stay literal.
fn escape_attribute(value: &str, out: &mut String) {
    for c in partial_escape(value).chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#09;"),
            _ => out.push(c),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_minimal() {
        let doc = ConfigDocument::parse("<?xml version=\"1.0\"?>\n<info>abc</info>").unwrap();
        assert_eq!(doc.root().tag, "info");
        assert_eq!(doc.root().text.as_deref(), Some("abc"));
        assert_eq!(doc.serialize(), "<info>abc</info>");
    }

    #[test]
    fn malformed_xml_is_rejected() {
        for text in ["<cruise>", "<a></b>", "<a/><b/>", "", "junk<a/>"] {
            let err = ConfigDocument::parse(text).expect_err(text);
            assert!(matches!(err, CruiseError::Xml(_)), "{text}: {err}");
        }
    }

    #[test]
    fn escapes_text_and_attributes() {
        let doc = ConfigDocument::parse(r#"<a x="1 &amp; &quot;2&quot;">&lt;b&gt;</a>"#).unwrap();
        assert_eq!(doc.root().attr("x"), Some("1 & \"2\""));
        assert_eq!(doc.serialize(), r#"<a x="1 &amp; &quot;2&quot;">&lt;b&gt;</a>"#);
    }

    #[test]
    fn attribute_whitespace_and_apostrophes() {
        let root = Element::new("exec")
            .with_attr("args", "it's\ta\r\nb <c>")
            .with_text("x's & y");
        let doc = ConfigDocument::from_root(root);
        assert_eq!(
            doc.serialize(),
            "<exec args=\"it's&#09;a&#13;&#10;b &lt;c&gt;\">x's &amp; y</exec>"
        );
        let reparsed = ConfigDocument::parse(&doc.serialize()).unwrap();
        assert_eq!(reparsed.root().attr("args"), Some("it's\ta\r\nb <c>"));
    }

    #[test]
    fn cdata_becomes_text() {
        let doc = ConfigDocument::parse("<a><![CDATA[x < y]]></a>").unwrap();
        assert_eq!(doc.root().text.as_deref(), Some("x < y"));
    }

    #[test]
    fn mixed_content_is_kept() {
        let doc = ConfigDocument::parse("<a>head<b/>tail</a>").unwrap();
        assert_eq!(doc.root().children[0].tail.as_deref(), Some("tail"));
        assert_eq!(doc.serialize(), "<a>head<b />tail</a>\n");
    }

    #[test]
    fn set_attr_keeps_position() {
        let mut element = Element::new("pipelines")
            .with_attr("group", "a")
            .with_attr("x", "1");
        element.set_attr("group", "b");
        assert_eq!(
            element.attributes,
            vec![("group".to_string(), "b".to_string()), ("x".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn ensure_pipeline_group_inserts_before_templates() {
        let mut doc = ConfigDocument::parse(
            "<cruise><server/><pipelines group=\"a\"/><templates/><agents/></cruise>",
        )
        .unwrap();
        doc.ensure_pipeline_group("b");
        doc.ensure_pipeline_group("a");
        let tags: Vec<String> = doc
            .root()
            .children
            .iter()
            .map(|c| format!("{}{}", c.tag, c.attr("group").map(|g| format!(":{g}")).unwrap_or_default()))
            .collect();
        assert_eq!(tags, ["server", "pipelines:a", "pipelines:b", "templates", "agents"]);
    }

    #[test]
    fn assign_pipeline_to_environment_creates_list_once() {
        let mut doc = ConfigDocument::parse(
            "<cruise><environments><environment name=\"dev\"/></environments></cruise>",
        )
        .unwrap();
        assert!(doc.assign_pipeline_to_environment("dev", "p1").unwrap());
        assert!(!doc.assign_pipeline_to_environment("dev", "p1").unwrap());
        assert_eq!(
            doc.serialize(),
            "<cruise>\n  <environments>\n    <environment name=\"dev\">\n      <pipelines>\n        <pipeline name=\"p1\" />\n      </pipelines>\n    </environment>\n  </environments>\n</cruise>\n"
        );
    }

    #[test]
    fn assign_to_missing_environment_is_a_lookup_error() {
        let mut doc = ConfigDocument::parse("<cruise><environments/></cruise>").unwrap();
        let err = doc.assign_pipeline_to_environment("prod", "p1").unwrap_err();
        assert!(matches!(err, CruiseError::EnvironmentNotFound { name } if name == "prod"));

        let mut bare = ConfigDocument::parse("<cruise/>").unwrap();
        assert!(bare.assign_pipeline_to_environment("prod", "p1").is_err());
    }

    #[test]
    fn rename_and_drop_group() {
        let mut doc =
            ConfigDocument::parse("<cruise><pipelines group=\"a\"/><pipelines group=\"b\"/></cruise>")
                .unwrap();
        doc.rename_pipeline_group("a", "c").unwrap();
        assert_eq!(doc.pipeline_group_names(), ["c", "b"]);
        let dropped = doc.drop_pipeline_group("b").unwrap();
        assert_eq!(dropped.attr("group"), Some("b"));
        assert_eq!(doc.pipeline_group_names(), ["c"]);
        assert!(matches!(
            doc.rename_pipeline_group("zz", "y"),
            Err(CruiseError::GroupNotFound { .. })
        ));
        assert!(doc.drop_pipeline_group("b").is_err());
    }

    #[test]
    fn move_into_existing_group_appends() {
        let mut doc = ConfigDocument::parse(
            "<cruise><pipelines group=\"a\"><authorization/><pipeline name=\"p1\"/></pipelines>\
             <pipelines group=\"b\"><pipeline name=\"p0\"/></pipelines></cruise>",
        )
        .unwrap();
        let moved = doc.move_pipelines_between_groups("a", "b").unwrap();
        assert_eq!(moved, 1);
        let a = doc.find_pipeline_group("a").unwrap();
        assert_eq!(a.children.len(), 1);
        assert_eq!(a.children[0].tag, "authorization");
        let b: Vec<_> = doc
            .find_pipeline_group("b")
            .unwrap()
            .find_all("pipeline")
            .filter_map(|p| p.attr("name"))
            .collect();
        assert_eq!(b, ["p0", "p1"]);
    }
}
