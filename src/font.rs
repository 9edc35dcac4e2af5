use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

pub const FONT_MIME_TYPE: &str = "application/font-woff2";
pub const FONT_FORMAT_HINT: &str = "woff2";

/// A font to embed: the CSS family name and the raw bytes of one woff2 file.
///
/// Neither field is validated. The name is emitted verbatim inside single
/// quotes and the bytes are treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl FontEntry {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn data_uri(&self) -> String {
        format!(
            "data:{FONT_MIME_TYPE};charset=utf-8;base64,{}",
            STANDARD.encode(&self.data)
        )
    }

    pub fn font_face_rule(&self) -> String {
        format!(
            concat!(
                "@font-face {{\n",
                "    font-family:'{}';\n",
                "    src:url('{}') format(\"{}\");\n",
                "    font-weight:normal;\n",
                "    font-style:normal;\n",
                "}}",
            ),
            self.name,
            self.data_uri(),
            FONT_FORMAT_HINT
        )
    }
}

/// Concatenates one `@font-face` rule per font, in order, with no separator.
pub fn build_stylesheet(fonts: &[FontEntry]) -> String {
    let mut css = String::new();
    for font in fonts {
        css.push_str(&font.font_face_rule());
    }
    css
}
