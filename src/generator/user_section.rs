//! The user-editable block of the app-configuration header.

/// Opening sentinel line.
pub const BEGIN_MARKER: &str = "// [BEGIN_USER_CODE_SECTION]";

/// Closing sentinel line.
pub const END_MARKER: &str = "// [END_USER_CODE_SECTION]";

const BEGIN_TAG: &str = "[BEGIN_USER_CODE_SECTION]";
const END_TAG: &str = "[END_USER_CODE_SECTION]";

/// Placeholder written when an existing header has no user block.
pub const DEFAULT_USER_CONTENT: &str =
    "\n// (You can add your own code in this section, and exportkit will not overwrite it)\n\n";

/// Pull the user block out of an existing header.
///
/// Lines between the markers are returned verbatim, each followed by a
/// newline. A missing closing marker takes everything up to the end of the
/// file. `None` when there is no opening marker at all.
pub fn extract(existing: &str) -> Option<String> {
    let mut lines = existing.lines();
    lines.by_ref().find(|line| line.contains(BEGIN_TAG))?;

    let mut content = String::new();
    for line in lines.take_while(|line| !line.contains(END_TAG)) {
        content.push_str(line);
        content.push('\n');
    }
    Some(content)
}

/// The user block to write: the preserved one, or the placeholder.
pub fn load_or_default(existing: Option<&str>) -> String {
    existing
        .and_then(extract)
        .unwrap_or_else(|| DEFAULT_USER_CONTENT.to_string())
}
