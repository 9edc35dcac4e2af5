#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod detect;
pub mod document;
pub mod embed;
pub mod error;
pub mod font;

#[cfg(feature = "cli")]
pub use cli::run;
pub use detect::referenced_font_families;
pub use embed::{SVG_NAMESPACE, SvgFontEmbedder, embed_fonts};
pub use error::EmbedError;
pub use font::{FontEntry, build_stylesheet};
