use ammonia;

/// Clean comment text using the ammonia library.
///
/// Whitelist-based sanitization: safe inline tags survive, anything that
/// could carry a Stored XSS payload (<script>, <iframe>, event handler
/// attributes) is stripped before the text ever reaches the store.
/// Rendering is the frontend's concern; this is the write-side fail-safe.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
