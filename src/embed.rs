use quick_xml::events::BytesCData;

pub use crate::document::SVG_NAMESPACE;
use crate::document::{Document, Element, Node};
use crate::error::Result;
use crate::font::{FontEntry, build_stylesheet};

const DEFS: &str = "defs";
const STYLE: &str = "style";

/// Embeds fonts into SVG documents as `@font-face` rules with data URIs.
///
/// Each call parses the input afresh, appends one `<style type="text/css">`
/// to the root's SVG `<defs>` (creating that `<defs>` as the first child when
/// missing) and serializes the result. Nothing is shared between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgFontEmbedder;

impl SvgFontEmbedder {
    pub fn new() -> Self {
        Self
    }

    pub fn embed(&self, svg: &str, fonts: &[FontEntry]) -> Result<String> {
        let mut document = Document::parse(svg)?;
        if fonts.is_empty() {
            log::warn!("no fonts supplied, embedding an empty stylesheet");
        }

        let created = document.root().find_child(DEFS, SVG_NAMESPACE).is_none();
        let defs = ensure_defs(document.root_mut());
        let style = style_element(defs, fonts);
        defs.push_child(Node::Element(style));

        log::debug!(
            "embedded {} font(s), {} payload bytes, defs {}",
            fonts.len(),
            fonts.iter().map(|font| font.data.len()).sum::<usize>(),
            if created { "created" } else { "reused" }
        );
        Ok(document.to_pretty_string())
    }
}

pub fn embed_fonts(svg: &str, fonts: &[FontEntry]) -> Result<String> {
    SvgFontEmbedder::new().embed(svg, fonts)
}

/// Returns the root's direct `<defs>` child in the SVG namespace, inserting a
/// new one at position 0 if there is none.
pub fn ensure_defs(root: &mut Element) -> &mut Element {
    root.child_or_insert_first(DEFS, SVG_NAMESPACE, |root| svg_child(root, DEFS))
}

fn style_element(defs: &Element, fonts: &[FontEntry]) -> Element {
    let mut style = svg_child(defs, STYLE);
    style.push_attribute("type", "text/css");
    style.push_child(Node::CData(BytesCData::new(build_stylesheet(fonts))));
    style
}

/// Builds an SVG element to be placed directly under `parent`.
///
/// Reuses the parent's prefix when the parent is itself an SVG element, since
/// that prefix is then bound to the SVG namespace. Otherwise the new element
/// declares the SVG namespace as its default.
fn svg_child(parent: &Element, local_name: &str) -> Element {
    if parent.namespace() == Some(SVG_NAMESPACE) {
        let name = match parent.prefix() {
            Some(prefix) => format!("{prefix}:{local_name}"),
            None => local_name.to_string(),
        };
        return Element::new(name, Some(SVG_NAMESPACE));
    }
    let mut element = Element::new(local_name, Some(SVG_NAMESPACE));
    element.push_attribute("xmlns", SVG_NAMESPACE);
    element
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roboto() -> FontEntry {
        FontEntry::new("Roboto", vec![0x01, 0x02, 0x03])
    }

    #[test]
    fn creates_defs_in_empty_svg() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"></svg>"#;
        let out = embed_fonts(svg, &[roboto()]).unwrap();
        let expected = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<svg xmlns=\"http://www.w3.org/2000/svg\">\n",
            "  <defs>\n",
            "    <style type=\"text/css\"><![CDATA[@font-face {\n",
            "    font-family:'Roboto';\n",
            "    src:url('data:application/font-woff2;charset=utf-8;base64,AQID') ",
            "format(\"woff2\");\n",
            "    font-weight:normal;\n",
            "    font-style:normal;\n",
            "}]]></style>\n",
            "  </defs>\n",
            "</svg>\n",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn appends_to_existing_defs() {
        let svg = concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg">"#,
            r#"<rect/><defs><linearGradient id="g"/></defs></svg>"#,
        );
        let mut doc = Document::parse(&embed_fonts(svg, &[roboto()]).unwrap()).unwrap();
        let root = doc.root_mut();
        let names: Vec<_> = root.child_elements().map(|e| e.name().into_owned()).collect();
        assert_eq!(names, ["rect", "defs"]);
        let defs = ensure_defs(root);
        let names: Vec<_> = defs.child_elements().map(|e| e.name().into_owned()).collect();
        assert_eq!(names, ["linearGradient", "style"]);
    }

    #[test]
    fn prefixed_root_gets_prefixed_children() {
        let svg = r#"<s:svg xmlns:s="http://www.w3.org/2000/svg"><s:g/></s:svg>"#;
        let out = embed_fonts(svg, &[roboto()]).unwrap();
        assert!(out.contains("<s:defs>"));
        assert!(out.contains("<s:style type=\"text/css\">"));
        let doc = Document::parse(&out).unwrap();
        let defs = doc.root().find_child("defs", SVG_NAMESPACE).unwrap();
        assert!(defs.find_child("style", SVG_NAMESPACE).is_some());
    }

    #[test]
    fn root_outside_svg_namespace_gets_declaring_defs() {
        let out = embed_fonts("<svg><defs/></svg>", &[roboto()]).unwrap();
        let doc = Document::parse(&out).unwrap();
        let first = doc.root().child_elements().next().unwrap();
        assert!(first.is("defs", SVG_NAMESPACE));
        assert_eq!(first.attribute("xmlns").as_deref(), Some(SVG_NAMESPACE));
        assert!(first.find_child("style", SVG_NAMESPACE).is_some());
        // the original, namespace-less defs is left alone
        assert_eq!(doc.root().child_elements().count(), 2);
    }

    #[test]
    fn empty_font_list_yields_empty_style() {
        let out = embed_fonts(r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#, &[]).unwrap();
        assert!(out.contains("<style type=\"text/css\"><![CDATA[]]></style>"));
    }

    #[test]
    fn second_call_stacks_another_style() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#;
        let once = embed_fonts(svg, &[roboto()]).unwrap();
        let twice = embed_fonts(&once, &[roboto()]).unwrap();
        let doc = Document::parse(&twice).unwrap();
        let defs = doc.root().find_child("defs", SVG_NAMESPACE).unwrap();
        let styles = defs.child_elements().filter(|e| e.is("style", SVG_NAMESPACE));
        assert_eq!(styles.count(), 2);
        assert_eq!(doc.root().child_elements().count(), 1);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(embed_fonts("<svg><unclosed>", &[roboto()]).is_err());
    }
}
