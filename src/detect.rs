use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::Document;
use crate::error::Result;

static STYLE_FONT_FAMILY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|;)\s*font-family\s*:\s*([^;]+)").unwrap());

const GENERIC_FAMILIES: [&str; 13] = [
    "serif",
    "sans-serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
    "ui-serif",
    "ui-sans-serif",
    "ui-monospace",
    "ui-rounded",
    "math",
    "emoji",
    "fangsong",
];

/// Font families the document asks for, in first-seen order.
///
/// Looks at `font-family` attributes and `font-family:` declarations inside
/// `style` attributes. Generic families and CSS-wide keywords are skipped.
pub fn referenced_font_families(svg: &str) -> Result<Vec<String>> {
    let document = Document::parse(svg)?;
    let mut families: Vec<String> = Vec::new();
    document.root().walk(&mut |element| {
        if let Some(value) = element.attribute("font-family") {
            push_families(&value, &mut families);
        }
        if let Some(style) = element.attribute("style") {
            for caps in STYLE_FONT_FAMILY_RE.captures_iter(&style) {
                push_families(&caps[1], &mut families);
            }
        }
    });
    Ok(families)
}

fn push_families(list: &str, families: &mut Vec<String>) {
    for part in list.split(',') {
        let name = part.trim().trim_matches('"').trim_matches('\'').trim();
        if name.is_empty() || is_generic(name) {
            continue;
        }
        if !families.iter().any(|known| known.eq_ignore_ascii_case(name)) {
            families.push(name.to_string());
        }
    }
}

fn is_generic(name: &str) -> bool {
    GENERIC_FAMILIES
        .iter()
        .chain(["inherit", "initial", "unset", "revert"].iter())
        .any(|generic| generic.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_attribute_and_style_families() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" font-family="Roboto, sans-serif">
  <text style="fill:red; font-family: 'Open Sans', Arial">a</text>
  <text font-family="&quot;Roboto&quot;">b</text>
  <g><text style="font-family:Lato">c</text></g>
</svg>"#;
        let families = referenced_font_families(svg).unwrap();
        assert_eq!(families, ["Roboto", "Open Sans", "Arial", "Lato"]);
    }

    #[test]
    fn ignores_generic_families_and_keywords() {
        let svg = concat!(
            r#"<svg font-family="monospace">"#,
            r#"<text style="font-family: inherit">x</text></svg>"#,
        );
        assert!(referenced_font_families(svg).unwrap().is_empty());
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(referenced_font_families("<svg>").is_err());
    }
}
