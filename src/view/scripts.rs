//! Page-side scripts evaluated in the embedded view.
//!
//! Every script starts with a `/*phai:<name>*/` tag so a log line (or a scripted
//! view in tests) can tell which query is running without parsing JavaScript.

/// Page-side table holding per-session state, keyed by session marker.
pub const SIDE_TABLE: &str = "__phai";

const TAG_PREFIX: &str = "/*phai:";

/// Name of a tagged script, e.g. `locate_panel`.
pub fn tag_of(script: &str) -> Option<&str> {
    let rest = script.trim_start().strip_prefix(TAG_PREFIX)?;
    let end = rest.find("*/")?;
    Some(&rest[..end])
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub fn location_href() -> String {
    format!("{}location*/window.location.href", TAG_PREFIX)
}

pub fn user_agent() -> String {
    format!("{}user_agent*/navigator.userAgent", TAG_PREFIX)
}

/// Create the session slot in the side table unless it already exists.
/// Evaluates to `true` when the slot was created.
pub fn init_marker(marker: &str, session_id: &str) -> String {
    format!(
        r#"{prefix}init_marker*/(() => {{
    const table = window.{table} || (window.{table} = {{}});
    const key = {key};
    if (!table[key]) {{
        table[key] = {{ initialized: true, timestamp: Date.now(), session: {session} }};
        return true;
    }}
    return false;
}})()"#,
        prefix = TAG_PREFIX,
        table = SIDE_TABLE,
        key = js_string(marker),
        session = js_string(session_id),
    )
}

/// Evaluates to `{x, y}` when the focused element sits in a panel holding exactly
/// one definition list, otherwise `null`. With `update` the anchor is also stored
/// in the session slot.
pub fn locate_panel(marker: &str, update: bool) -> String {
    format!(
        r#"{prefix}locate_panel*/(() => {{
    const active = document.activeElement;
    const panel = active ? active.closest(':has(dl)') : null;
    if (!panel || panel.querySelectorAll('dl').length !== 1) {{
        return null;
    }}
    const rect = panel.getBoundingClientRect();
    const anchor = {{ x: rect.left + rect.width / 2, y: rect.top + 5 }};
    if ({update}) {{
        const table = window.{table} || (window.{table} = {{}});
        const key = {key};
        const slot = table[key] || (table[key] = {{}});
        slot.infoPanel = {{ node: panel, coordinates: anchor }};
    }}
    return anchor;
}})()"#,
        prefix = TAG_PREFIX,
        table = SIDE_TABLE,
        key = js_string(marker),
        update = update,
    )
}

/// Evaluates to the focused link's href when it opens a detail view, else `null`.
pub fn focused_detail_link(link_pattern: &str) -> String {
    format!(
        r#"{prefix}focused_detail_link*/(() => {{
    const el = document.activeElement;
    if (el && el.tagName === 'A' && el.href && el.href.includes({pattern})) {{
        return el.href;
    }}
    return null;
}})()"#,
        prefix = TAG_PREFIX,
        pattern = js_string(link_pattern),
    )
}

/// Raw snapshot of the focused detail panel. Labels and sizes are resolved on the
/// Rust side; the page only reports what it sees.
pub fn extract_snapshot(link_pattern: &str) -> String {
    format!(
        r#"{prefix}extract*/(() => {{
    const snapshot = {{ panelFound: false, photoId: null, dataNode: null, groups: [], mapUrl: null }};
    const active = document.activeElement;
    const panel = active ? active.closest(':has(dl)') : null;
    if (!panel) {{
        return snapshot;
    }}
    snapshot.panelFound = true;

    const marker = {pattern};
    const path = window.location.pathname;
    const at = path.indexOf(marker);
    if (at >= 0) {{
        const photoId = path.slice(at + marker.length).split('/')[0];
        if (photoId) {{
            snapshot.photoId = photoId;
            const node = document.querySelector('[data-p*="' + photoId + '"][data-width][data-height][data-url]');
            if (node) {{
                snapshot.dataNode = {{
                    width: node.getAttribute('data-width'),
                    height: node.getAttribute('data-height'),
                    url: node.getAttribute('data-url'),
                }};
            }}
        }}
    }}

    panel.querySelectorAll('dl dd').forEach((dd) => {{
        const entries = [];
        Array.from(dd.children).forEach((child, i) => {{
            if (child.children.length > 0) {{
                Array.from(child.children).forEach((grandchild, j) => {{
                    entries.push({{
                        ariaLabel: grandchild.getAttribute('aria-label'),
                        child: i,
                        grandchild: j,
                        text: grandchild.innerText || '',
                    }});
                }});
            }} else {{
                entries.push({{
                    ariaLabel: child.getAttribute('aria-label'),
                    child: i,
                    grandchild: null,
                    text: child.innerText || '',
                }});
            }}
        }});
        snapshot.groups.push(entries);
    }});

    const locationNode = panel.querySelector('[data-mapurl]');
    if (locationNode) {{
        snapshot.mapUrl = locationNode.getAttribute('data-mapurl');
    }}
    return snapshot;
}})()"#,
        prefix = TAG_PREFIX,
        pattern = js_string(link_pattern),
    )
}

/// All thumbnail data nodes on the current page with the link that opens them.
pub fn thumbnails() -> String {
    format!(
        r#"{prefix}thumbnails*/(() => Array.from(
    document.querySelectorAll('[data-width][data-height][data-url]')
).map((node, index) => {{
    const link = node.closest('a[href]') || node.querySelector('a[href]');
    return {{
        index,
        href: link ? link.getAttribute('href') : null,
        width: node.getAttribute('data-width'),
        height: node.getAttribute('data-height'),
        url: node.getAttribute('data-url'),
    }};
}}))()"#,
        prefix = TAG_PREFIX,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_script_is_tagged() {
        assert_eq!(tag_of(&location_href()), Some("location"));
        assert_eq!(tag_of(&user_agent()), Some("user_agent"));
        assert_eq!(tag_of(&init_marker("phai_x", "s")), Some("init_marker"));
        assert_eq!(tag_of(&locate_panel("phai_x", true)), Some("locate_panel"));
        assert_eq!(
            tag_of(&focused_detail_link("/photo/")),
            Some("focused_detail_link")
        );
        assert_eq!(tag_of(&extract_snapshot("/photo/")), Some("extract"));
        assert_eq!(tag_of(&thumbnails()), Some("thumbnails"));
        assert_eq!(tag_of("document.title"), None);
    }

    #[test]
    fn test_marker_is_quoted() {
        let script = init_marker("phai_a\"b", "sid");
        assert!(script.contains(r#""phai_a\"b""#));
        assert!(script.contains("window.__phai"));
    }

    #[test]
    fn test_locate_update_flag_is_inlined() {
        assert!(locate_panel("k", true).contains("if (true)"));
        assert!(locate_panel("k", false).contains("if (false)"));
    }
}
