//! HTML tracking rewriter
//!
//! Transforms banner/signature HTML so that links and images route through the
//! tracking endpoints before the HTML is embedded into an outbound email or a
//! dashboard preview. This is deliberately a tolerant tag-level scanner, not a
//! DOM parser: banner HTML written for email clients is frequently malformed,
//! and the pipeline that embeds it must never fail. The rewriter returns a
//! best-effort transformation for any input and cannot error.
//!
//! Rewritten output starts with a sentinel comment; re-applying the rewriter to
//! already-rewritten HTML returns the input unchanged. Without that guard a
//! banner re-wrapped for each new recipient would accumulate nested anchors and
//! duplicate pixels, corrupting click attribution.

use std::fmt::Write as _;

/// Sentinel prepended to rewritten HTML. Presence anywhere in the input makes
/// the rewriter a no-op.
pub const TRACKED_MARKER: &str = "<!--beacon:tracked-->";

/// Builds click/view tracking URLs from the public base URL of the tracking
/// server.
#[derive(Debug, Clone)]
pub struct TrackingLinks {
    base: String,
}

impl TrackingLinks {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn click_url(&self, banner_id: i64, recipient: Option<&str>) -> String {
        self.endpoint_url("click", banner_id, recipient)
    }

    pub fn view_url(&self, banner_id: i64, recipient: Option<&str>) -> String {
        self.endpoint_url("view", banner_id, recipient)
    }

    fn endpoint_url(&self, endpoint: &str, banner_id: i64, recipient: Option<&str>) -> String {
        let mut url = format!("{}/track/{}?banner_id={}", self.base, endpoint, banner_id);
        if let Some(email) = recipient {
            url.push_str("&email=");
            url.push_str(&urlencoding::encode(email));
        }
        url
    }
}

/// Rewrite banner HTML for tracking.
///
/// Every `<img>` that is not nested inside an anchor is wrapped in an anchor
/// pointing at the click endpoint. Every existing anchor keeps its content and
/// styling but has its `href` swapped for the click endpoint, with the original
/// destination preserved in `data-original-href`. When `include_pixel` is set a
/// single 1x1 view pixel is appended, hidden by off-screen positioning (some
/// mail clients strip `display:none` images, which would lose the view event).
pub fn rewrite_banner_html(
    html: &str,
    banner_id: i64,
    recipient: Option<&str>,
    include_pixel: bool,
    links: &TrackingLinks,
) -> String {
    if html.contains(TRACKED_MARKER) {
        return html.to_string();
    }

    let click = links.click_url(banner_id, recipient);

    let mut out = String::with_capacity(html.len() + 256);
    out.push_str(TRACKED_MARKER);

    // Unmatched `<a>` opens seen so far in document order. Images at depth zero
    // get wrapped; images already inside an anchor are left alone so we never
    // produce nested interactive elements.
    let mut anchor_depth: usize = 0;
    let mut pos = 0;

    while let Some(rel) = html[pos..].find('<') {
        let lt = pos + rel;
        out.push_str(&html[pos..lt]);

        if html[lt..].starts_with("<!--") {
            match html[lt..].find("-->") {
                Some(end) => {
                    out.push_str(&html[lt..lt + end + 3]);
                    pos = lt + end + 3;
                }
                None => {
                    // Unterminated comment: copy the remainder verbatim.
                    out.push_str(&html[lt..]);
                    pos = html.len();
                }
            }
            continue;
        }

        match scan_tag(&html[lt..]) {
            Some(tag) => {
                let tag_src = &html[lt..lt + tag.len];
                if tag.name.eq_ignore_ascii_case("a") {
                    if tag.is_closing {
                        anchor_depth = anchor_depth.saturating_sub(1);
                        out.push_str(tag_src);
                    } else {
                        anchor_depth += 1;
                        out.push_str(&retarget_anchor(tag_src, &click));
                    }
                } else if tag.name.eq_ignore_ascii_case("img")
                    && !tag.is_closing
                    && anchor_depth == 0
                {
                    let _ = write!(out, "<a href=\"{}\">", click);
                    out.push_str(tag_src);
                    out.push_str("</a>");
                } else {
                    out.push_str(tag_src);
                }
                pos = lt + tag.len;
            }
            None => {
                // A `<` that does not start a parseable tag (stray comparison
                // sign, truncated tag). Emit it and keep scanning.
                out.push('<');
                pos = lt + 1;
            }
        }
    }
    out.push_str(&html[pos..]);

    if include_pixel {
        let _ = write!(
            out,
            "<img src=\"{}\" width=\"1\" height=\"1\" alt=\"\" \
             style=\"position:absolute;left:-9999px;top:-9999px;border:0;\" />",
            links.view_url(banner_id, recipient)
        );
    }

    out
}

struct Tag<'a> {
    name: &'a str,
    is_closing: bool,
    len: usize,
}

/// Parse one tag starting at `<`. Returns `None` for anything that is not a
/// complete tag with a name and a closing `>` (quotes inside attribute values
/// may contain `>` and are respected).
fn scan_tag(src: &str) -> Option<Tag<'_>> {
    let bytes = src.as_bytes();
    let mut i = 1;

    let is_closing = bytes.get(1) == Some(&b'/');
    if is_closing {
        i = 2;
    }

    let name_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let name = &src[name_start..i];

    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let c = bytes[i];
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                b'"' | b'\'' => quote = Some(c),
                b'>' => {
                    return Some(Tag {
                        name,
                        is_closing,
                        len: i + 1,
                    })
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Swap an anchor's `href` for the click endpoint, keeping the original
/// destination in `data-original-href`. Anchors without an `href` (or with an
/// unparseable one) are passed through untouched.
fn retarget_anchor(tag_src: &str, click: &str) -> String {
    let Some(attr) = find_attribute(tag_src, "href") else {
        return tag_src.to_string();
    };

    let close_len = if tag_src.ends_with("/>") { 2 } else { 1 };
    let mut rebuilt = String::with_capacity(tag_src.len() + click.len() + attr.value.len() + 32);
    rebuilt.push_str(&tag_src[..attr.value_start]);
    rebuilt.push_str(click);
    rebuilt.push_str(&tag_src[attr.value_end..tag_src.len() - close_len]);
    rebuilt.push_str(" data-original-href=\"");
    rebuilt.push_str(&attr.value.replace('"', "&quot;"));
    rebuilt.push('"');
    rebuilt.push_str(&tag_src[tag_src.len() - close_len..]);
    rebuilt
}

struct AttrValue<'a> {
    value: &'a str,
    /// Byte range of the value within the tag source, quotes excluded.
    value_start: usize,
    value_end: usize,
}

fn find_attribute<'a>(tag_src: &'a str, name: &str) -> Option<AttrValue<'a>> {
    let lower = tag_src.to_ascii_lowercase();
    let bytes = tag_src.as_bytes();
    let mut search_from = 0;

    while let Some(rel) = lower[search_from..].find(name) {
        let at = search_from + rel;
        search_from = at + name.len();

        // Must be a standalone attribute name followed by `=`, not a substring
        // of another attribute or value.
        let preceded_by_space = at > 0 && bytes[at - 1].is_ascii_whitespace();
        let mut i = at + name.len();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if !preceded_by_space || i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }

        if bytes[i] == b'"' || bytes[i] == b'\'' {
            let quote = bytes[i] as char;
            let value_start = i + 1;
            let value_end = tag_src[value_start..].find(quote)? + value_start;
            return Some(AttrValue {
                value: &tag_src[value_start..value_end],
                value_start,
                value_end,
            });
        }

        let value_start = i;
        let mut value_end = i;
        while value_end < bytes.len()
            && !bytes[value_end].is_ascii_whitespace()
            && bytes[value_end] != b'>'
        {
            value_end += 1;
        }
        return Some(AttrValue {
            value: &tag_src[value_start..value_end],
            value_start,
            value_end,
        });
    }

    None
}
