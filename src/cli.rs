use crate::config::{FontSource, load_config};
use crate::detect::referenced_font_families;
use crate::embed::SvgFontEmbedder;
use crate::font::FontEntry;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "sfe", version, about = "Embed woff2 fonts into SVG files as data URIs")]
pub struct Args {
    /// Input SVG file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON file listing fonts to embed
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Font to embed as FAMILY=PATH (repeatable, applied after config fonts)
    #[arg(short = 'f', long = "font", value_parser = parse_font_arg)]
    pub fonts: Vec<FontSource>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let sources: Vec<FontSource> = config.fonts.into_iter().chain(args.fonts).collect();
    let fonts = sources
        .iter()
        .map(FontSource::load)
        .collect::<Result<Vec<FontEntry>>>()?;

    let svg = read_input(args.input.as_deref())?;
    warn_unsupplied_families(&svg, &fonts);

    let output = SvgFontEmbedder::new()
        .embed(&svg, &fonts)
        .context("failed to embed fonts")?;
    write_output(&output, args.output.as_deref())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(svg.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn warn_unsupplied_families(svg: &str, fonts: &[FontEntry]) {
    // A malformed document is reported by the embedder itself.
    let Ok(referenced) = referenced_font_families(svg) else {
        return;
    };
    for family in missing_families(&referenced, fonts) {
        log::warn!("font family '{family}' is referenced but no font file was supplied");
    }
}

fn missing_families<'a>(referenced: &'a [String], fonts: &[FontEntry]) -> Vec<&'a str> {
    referenced
        .iter()
        .filter(|family| !fonts.iter().any(|font| font.name.eq_ignore_ascii_case(family)))
        .map(String::as_str)
        .collect()
}

fn parse_font_arg(raw: &str) -> std::result::Result<FontSource, String> {
    let (family, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FAMILY=PATH, got '{raw}'"))?;
    let family = family.trim();
    let path = path.trim();
    if family.is_empty() {
        return Err(format!("missing font family in '{raw}'"));
    }
    if path.is_empty() {
        return Err(format!("missing font path in '{raw}'"));
    }
    Ok(FontSource::new(family, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_font_argument() {
        let source = parse_font_arg("Open Sans=fonts/OpenSans.woff2").unwrap();
        assert_eq!(source, FontSource::new("Open Sans", "fonts/OpenSans.woff2"));
    }

    #[test]
    fn rejects_incomplete_font_arguments() {
        assert!(parse_font_arg("Roboto").is_err());
        assert!(parse_font_arg("=Roboto.woff2").is_err());
        assert!(parse_font_arg("Roboto=").is_err());
    }

    #[test]
    fn font_flags_keep_command_line_order() {
        let args = Args::try_parse_from(["sfe", "-f", "B=b.woff2", "--font", "A=a.woff2"]).unwrap();
        let families: Vec<_> = args.fonts.iter().map(|f| f.family.as_str()).collect();
        assert_eq!(families, ["B", "A"]);
    }

    #[test]
    fn reports_families_without_fonts() {
        let referenced = vec!["Roboto".to_string(), "Lato".to_string()];
        let fonts = [FontEntry::new("roboto", vec![1])];
        assert_eq!(missing_families(&referenced, &fonts), ["Lato"]);
    }

    #[test]
    fn writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.svg");
        write_output("<svg/>\n", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<svg/>\n");
        assert_eq!(read_input(Some(&path)).unwrap(), "<svg/>\n");
    }
}
