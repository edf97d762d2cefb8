//! Result URL construction

use crate::registry::DOCUMENTS_PATH;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::Path;

/// Marker Dash embeds in stored paths for table-of-contents metadata
const ENTRY_MARKER: &str = "<dash_entry_";

/// Only spaces are escaped; stored paths are otherwise already URL-safe.
const SPACE: &AsciiSet = &CONTROLS.add(b' ');

/// Build the URL for a result row.
///
/// Paths that are already absolute web URLs are returned unchanged. Anything
/// else is resolved against the docset's documents tree as a `file://` URL.
pub fn result_url(docset_dir: &Path, file_path: &str, anchor: Option<&str>) -> String {
    let path = match anchor {
        Some(anchor) => format!("{}#{}", file_path, anchor),
        None => file_path.to_string(),
    };

    if is_web_url(&path) {
        return path;
    }

    let local = docset_dir.join(DOCUMENTS_PATH).join(strip_entry_markers(&path));
    let encoded = utf8_percent_encode(&local.to_string_lossy(), SPACE).to_string();
    format!("file://{}", encoded)
}

fn is_web_url(path: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        path.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Remove everything from the first `<dash_entry_` marker through the last `>`.
fn strip_entry_markers(path: &str) -> String {
    let Some(start) = path.find(ENTRY_MARKER) else {
        return path.to_string();
    };
    match path.rfind('>') {
        Some(end) if end > start => format!("{}{}", &path[..start], &path[end + 1..]),
        _ => path.to_string(),
    }
}
