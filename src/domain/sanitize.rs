//! User-supplied text sanitization.
//!
//! Review comments and feedback messages accept a small set of inline
//! formatting tags; everything else (titles, captions, names) is stripped to
//! plain text.

use std::collections::HashSet;

use ammonia::Builder;
use once_cell::sync::Lazy;

static RICH_TEXT: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder
        .tags(HashSet::from([
            "b", "i", "u", "em", "strong", "p", "br", "ul", "ol", "li",
        ]))
        .generic_attributes(HashSet::new())
        .link_rel(None);
    builder
});

static PLAIN_TEXT: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder.tags(HashSet::new()).generic_attributes(HashSet::new());
    builder
});

/// Clean body text, keeping the basic formatting tags listed above.
pub fn sanitize_rich_text(value: &str) -> String {
    RICH_TEXT.clean(value).to_string()
}

/// Strip all markup, returning plain text.
pub fn strip_html(value: &str) -> String {
    PLAIN_TEXT.clean(value).to_string()
}
