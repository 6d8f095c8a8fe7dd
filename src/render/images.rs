//! Image reconciliation: point Markdown image references at embedded data.
//!
//! The vendor returns page Markdown like `![img-0.jpeg](img-0.jpeg)` plus a
//! list of images carrying base64 payloads. Two identifier schemes are seen
//! in practice:
//!
//! * **Id**: the link target equals an image's `id` exactly.
//! * **Index**: the link target contains `img-<n>.jpeg` and `n` is the
//!   position of the image in the page's list.
//!
//! [`ImageMatch::Auto`] tries the id first and falls back to the index.
//! References that resolve to nothing, or to an image without a payload,
//! are left exactly as they were.

use crate::output::ImageRef;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::trace;

/// How an image reference is matched to an [`ImageRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageMatch {
    /// Exact `ImageRef::id` match.
    Id,
    /// Positional: `img-<n>.jpeg` selects `images[n]`.
    Index,
    /// Id first, then positional. (default)
    #[default]
    Auto,
}

static RE_IMAGE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[(.*?)\]\((.*?)\)").unwrap());

static RE_POSITIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"img-(\d+)\.(?:jpeg|jpg|png)").unwrap());

/// Rewrite every resolvable `![alt](ref)` in `markdown` to `![alt](payload)`.
///
/// Single pass; unmatched references pass through unchanged.
pub fn reconcile_images(markdown: &str, images: &[ImageRef], strategy: ImageMatch) -> String {
    if images.is_empty() {
        return markdown.to_string();
    }

    RE_IMAGE_REF
        .replace_all(markdown, |caps: &regex::Captures<'_>| {
            let alt = &caps[1];
            let target = &caps[2];
            match find_image(target, images, strategy).and_then(image_src) {
                Some(src) => format!("![{alt}]({src})"),
                None => {
                    trace!("Unmatched image reference '{}'", target);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Find the image a reference points at.
pub fn find_image<'i>(target: &str, images: &'i [ImageRef], strategy: ImageMatch) -> Option<&'i ImageRef> {
    match strategy {
        ImageMatch::Id => by_id(target, images),
        ImageMatch::Index => by_index(target, images),
        ImageMatch::Auto => by_id(target, images).or_else(|| by_index(target, images)),
    }
}

fn by_id<'i>(target: &str, images: &'i [ImageRef]) -> Option<&'i ImageRef> {
    images.iter().find(|img| img.id == target)
}

fn by_index<'i>(target: &str, images: &'i [ImageRef]) -> Option<&'i ImageRef> {
    let caps = RE_POSITIONAL.captures(target)?;
    let index: usize = caps[1].parse().ok()?;
    images.get(index)
}

/// The link target for an image: its payload as a `data:` URL.
///
/// Payloads that already are `data:` URLs are used verbatim; bare base64 is
/// wrapped with a MIME type guessed from the image id (JPEG if unknown).
/// Images without a payload have no source.
pub fn image_src(image: &ImageRef) -> Option<Cow<'_, str>> {
    let payload = image.image_base64.as_deref()?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload.starts_with("data:") {
        return Some(Cow::Borrowed(payload));
    }
    let mime = mime_guess::from_path(&image.id)
        .first_raw()
        .filter(|m| m.starts_with("image/"))
        .unwrap_or("image/jpeg");
    Some(Cow::Owned(format!("data:{mime};base64,{payload}")))
}
