use std::borrow::Cow;
use std::fmt;

use quick_xml::events::{BytesCData, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::error::{EmbedError, Result};

const INDENT: &str = "  ";
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// A parsed XML document that owns its tree.
///
/// Raw bytes of text, attributes, comments, processing instructions and
/// DOCTYPE declarations are kept as they appear in the input. Nothing is
/// resolved against an external DTD: a DOCTYPE is an opaque node and entity
/// references stay unexpanded.
///
/// Whitespace-only text is treated as formatting and re-indented on output,
/// except inside `xml:space="preserve"` scopes, inside SVG `<text>`, and in
/// elements that mix text with markup. Those keep their text verbatim.
#[derive(Debug, Clone)]
pub struct Document {
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(BytesText<'static>),
    CData(BytesCData<'static>),
    Comment(BytesText<'static>),
    ProcessingInstruction(BytesText<'static>),
    DocType(BytesText<'static>),
}

#[derive(Debug, Clone)]
pub struct Element {
    start: BytesStart<'static>,
    namespace: Option<String>,
    children: Vec<Node>,
}

/// Whitespace handling in effect for an element's content.
#[derive(Debug, Clone, Copy, Default)]
struct Space {
    preserve: bool,
    in_text: bool,
}

impl Space {
    fn enter(self, element: &Element) -> Self {
        let preserve = match element.attribute("xml:space").as_deref() {
            Some("preserve") => true,
            Some("default") => false,
            _ => self.preserve,
        };
        Self {
            preserve,
            in_text: self.in_text || element.is("text", SVG_NAMESPACE),
        }
    }

    fn verbatim(self) -> bool {
        self.preserve || self.in_text
    }
}

impl Document {
    pub fn parse(text: &str) -> Result<Self> {
        check_well_formed(text)?;

        let mut reader = NsReader::from_str(text);
        let mut builder = TreeBuilder::default();

        loop {
            let position = reader.buffer_position();
            let (resolved, event) = reader
                .read_resolved_event()
                .map_err(|err| EmbedError::from_xml(position, err))?;
            match event {
                Event::Start(start) => {
                    let namespace = resolve_namespace(resolved, position)?;
                    let element = Element::from_start(start.into_owned(), namespace, position)?;
                    builder.open.push(element);
                }
                Event::Empty(start) => {
                    let namespace = resolve_namespace(resolved, position)?;
                    let element = Element::from_start(start.into_owned(), namespace, position)?;
                    builder.attach(Node::Element(element), position)?;
                }
                Event::End(end) => {
                    let Some(element) = builder.open.pop() else {
                        return Err(EmbedError::malformed(
                            position,
                            format!(
                                "unexpected end tag </{}>",
                                String::from_utf8_lossy(end.name().as_ref())
                            ),
                        ));
                    };
                    builder.attach(Node::Element(element), position)?;
                }
                Event::Text(content) => {
                    builder.attach(Node::Text(content.into_owned()), position)?
                }
                Event::CData(data) => builder.attach(Node::CData(data.into_owned()), position)?,
                Event::Comment(comment) => {
                    builder.attach(Node::Comment(comment.into_owned()), position)?
                }
                Event::PI(pi) => {
                    builder.attach(Node::ProcessingInstruction(pi.into_owned()), position)?
                }
                Event::DocType(doctype) => {
                    builder.attach(Node::DocType(doctype.into_owned()), position)?
                }
                // Output is always UTF-8 text, so a fresh declaration is written instead.
                Event::Decl(_) => {}
                Event::Eof => return builder.finish(text.len()),
            }
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn prolog(&self) -> &[Node] {
        &self.prolog
    }

    /// Serializes with two-space indentation, one element per line, and a
    /// leading `<?xml version="1.0" encoding="UTF-8"?>` declaration.
    pub fn to_pretty_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        for node in &self.prolog {
            out.push('\n');
            write_node(&mut out, node, 0, Space::default(), false);
        }
        out.push('\n');
        write_element(&mut out, &self.root, 0, Space::default(), false);
        for node in &self.epilog {
            out.push('\n');
            write_node(&mut out, node, 0, Space::default(), false);
        }
        out.push('\n');
        out
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_pretty_string())
    }
}

impl Element {
    /// Creates an element with the qualified `name` that belongs to `namespace`.
    ///
    /// The caller is responsible for `name`'s prefix (or an `xmlns`
    /// attribute) actually binding it to `namespace` at the insertion point.
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            start: BytesStart::new(name.into()),
            namespace: namespace.map(str::to_string),
            children: Vec::new(),
        }
    }

    fn from_start(
        start: BytesStart<'static>,
        namespace: Option<String>,
        position: usize,
    ) -> Result<Self> {
        for attr in start.attributes() {
            attr.map_err(|err| EmbedError::malformed(position, err.to_string()))?;
        }
        Ok(Self {
            start,
            namespace,
            children: Vec::new(),
        })
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.start.name().into_inner())
    }

    pub fn local_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.start.local_name().into_inner())
    }

    pub fn prefix(&self) -> Option<Cow<'_, str>> {
        self.start
            .name()
            .prefix()
            .map(|prefix| String::from_utf8_lossy(prefix.into_inner()))
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn is(&self, local_name: &str, namespace: &str) -> bool {
        self.namespace() == Some(namespace)
            && self.start.local_name().as_ref() == local_name.as_bytes()
    }

    /// Returns the unescaped value of the attribute with the qualified name `key`.
    pub fn attribute(&self, key: &str) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|attr| attr.key.as_ref() == key.as_bytes())
            .and_then(|attr| attr.unescape_value().ok().map(Cow::into_owned))
    }

    pub fn push_attribute(&mut self, key: &str, value: &str) {
        self.start.push_attribute((key, value));
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn find_child(&self, local_name: &str, namespace: &str) -> Option<&Element> {
        self.child_elements()
            .find(|element| element.is(local_name, namespace))
    }

    /// Index into [`Element::children`] of the first matching child element.
    pub fn position_of(&self, local_name: &str, namespace: &str) -> Option<usize> {
        self.children.iter().position(|node| {
            matches!(node, Node::Element(element) if element.is(local_name, namespace))
        })
    }

    pub fn find_child_mut(&mut self, local_name: &str, namespace: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(element) if element.is(local_name, namespace) => Some(element),
            _ => None,
        })
    }

    /// Returns the first matching child element, inserting `create()` as the
    /// very first child when none exists.
    pub fn child_or_insert_first(
        &mut self,
        local_name: &str,
        namespace: &str,
        create: impl FnOnce(&Element) -> Element,
    ) -> &mut Element {
        let index = match self.position_of(local_name, namespace) {
            Some(index) => index,
            None => {
                let element = create(self);
                self.insert_child(0, Node::Element(element));
                0
            }
        };
        match &mut self.children[index] {
            Node::Element(element) => element,
            _ => unreachable!("position_of only reports element children"),
        }
    }

    /// Inserts `node` at `index`, clamped to the current number of children.
    pub fn insert_child(&mut self, index: usize, node: Node) {
        let index = index.min(self.children.len());
        self.children.insert(index, node);
    }

    pub fn push_child(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Visits this element and every descendant element in document order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element)) {
        visit(self);
        for child in self.child_elements() {
            child.walk(visit);
        }
    }

    fn has_character_data(&self) -> bool {
        self.children
            .iter()
            .any(|node| matches!(node, Node::Text(_) | Node::CData(_)))
    }

    /// Drops whitespace-only text that only formats the markup.
    ///
    /// Text is kept in verbatim scopes, in elements that also hold
    /// non-whitespace text, and anywhere below such an element.
    fn drop_formatting_whitespace(&mut self, parent: Space, inside_mixed: bool) {
        let space = parent.enter(self);
        let mixed = inside_mixed
            || space.verbatim()
            || self
                .children
                .iter()
                .any(|node| matches!(node, Node::Text(text) if !is_blank(text)));
        if !mixed {
            self.children
                .retain(|node| !matches!(node, Node::Text(text) if is_blank(text)));
        }
        for child in &mut self.children {
            if let Node::Element(element) = child {
                element.drop_formatting_whitespace(space, mixed);
            }
        }
    }
}

/// Rejects input that is not well-formed XML before the tree is built.
///
/// roxmltree checks character data, attribute values and references that the
/// streaming reader passes through. It has no resolver for external DTDs, so
/// a DOCTYPE that points at a URL is parsed without any I/O.
fn check_well_formed(text: &str) -> Result<()> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    match roxmltree::Document::parse_with_options(text, options) {
        Ok(_) => Ok(()),
        Err(err) => Err(EmbedError::malformed(
            byte_offset(text, err.pos()),
            err.to_string(),
        )),
    }
}

fn byte_offset(text: &str, pos: roxmltree::TextPos) -> usize {
    let line_start: usize = text
        .split_inclusive('\n')
        .take(pos.row.saturating_sub(1) as usize)
        .map(str::len)
        .sum();
    let column: usize = text[line_start..]
        .chars()
        .take(pos.col.saturating_sub(1) as usize)
        .map(char::len_utf8)
        .sum();
    line_start + column
}

fn is_blank(text: &[u8]) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

#[derive(Default)]
struct TreeBuilder {
    prolog: Vec<Node>,
    root: Option<Element>,
    epilog: Vec<Node>,
    open: Vec<Element>,
}

impl TreeBuilder {
    fn attach(&mut self, node: Node, position: usize) -> Result<()> {
        if let Some(parent) = self.open.last_mut() {
            if matches!(node, Node::DocType(_)) {
                return Err(EmbedError::malformed(position, "DOCTYPE inside an element"));
            }
            parent.children.push(node);
            return Ok(());
        }
        match node {
            Node::Element(element) => {
                if self.root.is_some() {
                    return Err(EmbedError::malformed(position, "more than one root element"));
                }
                self.root = Some(element);
            }
            Node::Text(text) if is_blank(&text) => {}
            Node::Text(_) | Node::CData(_) => {
                return Err(EmbedError::malformed(
                    position,
                    "character data outside the root element",
                ));
            }
            Node::DocType(_) if self.root.is_some() => {
                return Err(EmbedError::malformed(position, "DOCTYPE after the root element"));
            }
            misc if self.root.is_some() => self.epilog.push(misc),
            misc => self.prolog.push(misc),
        }
        Ok(())
    }

    fn finish(self, position: usize) -> Result<Document> {
        if let Some(element) = self.open.last() {
            return Err(EmbedError::malformed(
                position,
                format!("unclosed element <{}>", element.name()),
            ));
        }
        let mut root = self
            .root
            .ok_or_else(|| EmbedError::malformed(position, "no root element"))?;
        root.drop_formatting_whitespace(Space::default(), false);
        Ok(Document {
            prolog: self.prolog,
            root,
            epilog: self.epilog,
        })
    }
}

fn resolve_namespace(resolved: ResolveResult<'_>, position: usize) -> Result<Option<String>> {
    match resolved {
        ResolveResult::Bound(namespace) => Ok(Some(
            String::from_utf8_lossy(namespace.into_inner()).into_owned(),
        )),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(EmbedError::malformed(
            position,
            format!(
                "undeclared namespace prefix `{}`",
                String::from_utf8_lossy(&prefix)
            ),
        )),
    }
}

fn push_raw(out: &mut String, raw: &[u8]) {
    out.push_str(&String::from_utf8_lossy(raw));
}

fn push_indent(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_element(
    out: &mut String,
    element: &Element,
    depth: usize,
    parent: Space,
    inline: bool,
) {
    out.push('<');
    push_raw(out, &element.start);
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    let space = parent.enter(element);
    // Text-bearing content is written exactly as stored.
    let inline = inline || space.verbatim() || element.has_character_data();
    for child in &element.children {
        if !inline {
            push_indent(out, depth + 1);
        }
        write_node(out, child, depth + 1, space, inline);
    }
    if !inline {
        push_indent(out, depth);
    }

    out.push_str("</");
    push_raw(out, element.start.name().as_ref());
    out.push('>');
}

fn write_node(out: &mut String, node: &Node, depth: usize, space: Space, inline: bool) {
    match node {
        Node::Element(element) => write_element(out, element, depth, space, inline),
        Node::Text(text) => push_raw(out, text),
        Node::CData(data) => {
            out.push_str("<![CDATA[");
            push_raw(out, data);
            out.push_str("]]>");
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            push_raw(out, comment);
            out.push_str("-->");
        }
        Node::ProcessingInstruction(pi) => {
            out.push_str("<?");
            push_raw(out, pi);
            out.push_str("?>");
        }
        Node::DocType(doctype) => {
            out.push_str("<!DOCTYPE ");
            push_raw(out, doctype);
            out.push('>');
        }
    }
}
