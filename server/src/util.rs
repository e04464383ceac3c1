// util.rs
use url::Url;

pub type ImageKey = String;

/// Turns a client supplied image name into a mapping key. Every `.` becomes
/// `_`, so "cat.png" and "cat_png" share a key.
pub fn sanitize_image_name(image_name: &str) -> ImageKey {
    image_name.replace('.', "_")
}

/// Renders a store url for logging with any password masked.
pub fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    if redacted.password().is_some() {
        let _ = redacted.set_password(Some("****"));
    }
    redacted.to_string()
}
