//! # SVG Projection Options

use stp_core::PreviewSize;

/// Fixed isometric-style direction every thumbnail is projected along.
pub const PROJECTION_DIR: [f64; 3] = [1.0, -1.0, 0.5];

/// Margin, in pixels, left of and above the fitted drawing.
pub const THUMBNAIL_MARGIN: u32 = 30;

/// Parameters of a 2D projection.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgOptions {
    pub width: u32,
    pub height: u32,
    pub margin_left: u32,
    pub margin_top: u32,
    pub projection_dir: [f64; 3],
    pub show_axes: bool,
    pub show_hidden: bool,
    /// Camera focus distance; `None` fits the model to the canvas.
    pub focus: Option<f64>,
}

impl SvgOptions {
    /// The fixed thumbnail projection at `size`.
    pub fn thumbnail(size: PreviewSize) -> Self {
        Self {
            width: size.width(),
            height: size.height(),
            margin_left: THUMBNAIL_MARGIN,
            margin_top: THUMBNAIL_MARGIN,
            projection_dir: PROJECTION_DIR,
            show_axes: false,
            show_hidden: false,
            focus: None,
        }
    }
}

/// Make sure the root `<svg>` element declares `viewBox="0 0 {w} {h}"`.
///
/// Documents whose root element already has a `viewBox` are returned
/// unchanged, as are documents with no recognizable root element.
pub fn ensure_view_box(svg: &str, width: u32, height: u32) -> String {
    let Some(start) = find_root(svg) else {
        return svg.to_string();
    };
    let tag_end = svg[start..]
        .find('>')
        .map(|i| start + i)
        .unwrap_or(svg.len());
    if svg[start..tag_end].contains("viewBox") {
        return svg.to_string();
    }

    let insert_at = start + "<svg".len();
    let mut out = String::with_capacity(svg.len() + 32);
    out.push_str(&svg[..insert_at]);
    out.push_str(&format!(r#" viewBox="0 0 {width} {height}""#));
    out.push_str(&svg[insert_at..]);
    out
}

/// Byte offset of the first `<svg` element tag: `<svg` followed by
/// whitespace, `>` or `/`.
///
/// Comments, processing instructions, CDATA sections and `<!DOCTYPE ...>`
/// declarations are skipped whole, so an `<svg` inside them never counts.
fn find_root(svg: &str) -> Option<usize> {
    let mut at = 0;
    while let Some(i) = svg[at..].find('<') {
        at += i;
        let rest = &svg[at..];
        let skip_to = if rest.starts_with("<!--") {
            section_end(rest, "-->")
        } else if rest.starts_with("<![CDATA[") {
            section_end(rest, "]]>")
        } else if rest.starts_with("<?") {
            section_end(rest, "?>")
        } else if rest.starts_with("<!") {
            declaration_end(rest)
        } else {
            if let Some(after) = rest.strip_prefix("<svg") {
                match after.chars().next() {
                    Some(c) if c.is_ascii_whitespace() || c == '>' || c == '/' => return Some(at),
                    _ => {}
                }
            }
            Some(1)
        };
        at += skip_to?;
    }
    None
}

/// Length of `rest` up to and including the first `terminator`.
fn section_end(rest: &str, terminator: &str) -> Option<usize> {
    rest.find(terminator).map(|i| i + terminator.len())
}

/// Length of a `<!...>` declaration, including a bracketed internal subset.
fn declaration_end(rest: &str) -> Option<usize> {
    let close = rest.find('>')?;
    match rest[..close].find('[') {
        Some(open) => {
            let subset_end = open + rest[open..].find(']')?;
            section_end(&rest[subset_end..], ">").map(|n| subset_end + n)
        }
        None => Some(close + 1),
    }
}
