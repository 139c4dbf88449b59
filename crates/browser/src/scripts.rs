//! JavaScript snippets evaluated in the page by [`BrowserSession`](crate::BrowserSession).
//!
//! Every argument is embedded as a JSON literal, never by string splicing.

use serde::Serialize;

use crate::types::{FieldSpec, Locator, ScrollEdge};

/// Defines `locate(locator)` and the helpers it needs. Prepended to every
/// script that addresses an element.
const LOCATE_JS: &str = r#"
    const isVisible = (el) => {
        const rect = el.getBoundingClientRect();
        const style = getComputedStyle(el);
        return rect.width > 0 && rect.height > 0
            && style.visibility !== 'hidden'
            && style.display !== 'none'
            && parseFloat(style.opacity) > 0;
    };
    const textOf = (el) => (el.innerText || el.textContent || el.value || '')
        .trim().replace(/\s+/g, ' ');
    const roleOf = (el) => {
        if (el.getAttribute('role')) return el.getAttribute('role');
        const tag = el.tagName.toLowerCase();
        const map = {
            'a': el.hasAttribute('href') ? 'link' : null,
            'button': 'button',
            'input': el.type === 'checkbox' ? 'checkbox'
                   : el.type === 'radio' ? 'radio'
                   : el.type === 'submit' || el.type === 'button' ? 'button'
                   : el.type === 'search' ? 'searchbox'
                   : 'textbox',
            'select': 'combobox',
            'textarea': 'textbox',
            'h1': 'heading', 'h2': 'heading', 'h3': 'heading',
            'nav': 'navigation',
            'img': 'img'
        };
        return map[tag] || null;
    };
    const nameOf = (el) => (el.getAttribute('aria-label')
        || el.getAttribute('title')
        || el.getAttribute('placeholder')
        || textOf(el)).toLowerCase();
    const locate = (loc) => {
        if (loc.by === 'css') return document.querySelector(loc.selector);
        if (loc.by === 'text') {
            const needle = loc.text.toLowerCase();
            let best = null;
            for (const el of document.body.querySelectorAll('*')) {
                const t = textOf(el);
                if (!t.toLowerCase().includes(needle) || !isVisible(el)) continue;
                if (!best || t.length <= textOf(best).length) best = el;
            }
            return best;
        }
        const want = loc.role.toLowerCase();
        const name = loc.name ? loc.name.toLowerCase() : null;
        for (const el of document.querySelectorAll('*')) {
            if ((roleOf(el) || '').toLowerCase() !== want) continue;
            if (name && !nameOf(el).includes(name)) continue;
            return el;
        }
        return null;
    };
"#;

fn literal<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// `{found, visible, disabled, x, y}` where `x`/`y` is the element centre
/// after scrolling it into view.
pub fn probe(locator: &Locator) -> String {
    format!(
        r#"(() => {{
    {LOCATE_JS}
    const el = locate({loc});
    if (!el) return {{ found: false }};
    el.scrollIntoView({{ block: 'center', inline: 'center' }});
    const r = el.getBoundingClientRect();
    return {{
        found: true,
        visible: isVisible(el),
        disabled: !!el.disabled || el.getAttribute('aria-disabled') === 'true',
        x: r.x + r.width / 2,
        y: r.y + r.height / 2
    }};
}})()"#,
        loc = literal(locator)
    )
}

/// Focuses the element, optionally clearing its value. Returns whether it was found.
pub fn focus(locator: &Locator, clear: bool) -> String {
    format!(
        r#"(() => {{
    {LOCATE_JS}
    const el = locate({loc});
    if (!el) return false;
    el.focus();
    if ({clear} && 'value' in el) {{
        el.value = '';
        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    }}
    return true;
}})()"#,
        loc = literal(locator)
    )
}

pub fn scroll_into_view(locator: &Locator) -> String {
    format!(
        r#"(() => {{
    {LOCATE_JS}
    const el = locate({loc});
    if (!el) return false;
    el.scrollIntoView({{ behavior: 'smooth', block: 'center' }});
    return true;
}})()"#,
        loc = literal(locator)
    )
}

/// `{attached, visible}` for the first element matching a CSS selector.
pub fn selector_state(selector: &str) -> String {
    format!(
        r#"(() => {{
    {LOCATE_JS}
    const el = document.querySelector({sel});
    return {{ attached: !!el, visible: !!el && isVisible(el) }};
}})()"#,
        sel = literal(selector)
    )
}

pub fn query_all(selector: &str, limit: usize) -> String {
    format!(
        r#"(() => {{
    {LOCATE_JS}
    return Array.from(document.querySelectorAll({sel})).slice(0, {limit}).map((el) => {{
        const attributes = {{}};
        for (const a of el.attributes) attributes[a.name] = a.value;
        const anchor = el.matches('a[href]') ? el : el.querySelector('a[href]');
        return {{
            text: textOf(el),
            attributes,
            link: anchor ? anchor.href : null,
            visible: isVisible(el),
            disabled: !!el.disabled
        }};
    }});
}})()"#,
        sel = literal(selector)
    )
}

pub fn count(selector: &str) -> String {
    format!(
        "document.querySelectorAll({}).length",
        literal(selector)
    )
}

pub fn query_fields(container: &str, fields: &[FieldSpec], limit: usize) -> String {
    format!(
        r#"(() => {{
    const fields = {fields};
    return Array.from(document.querySelectorAll({sel})).slice(0, {limit}).map((root) => {{
        const record = {{}};
        for (const f of fields) {{
            const el = root.querySelector(f.selector);
            if (!el) {{ record[f.name] = null; continue; }}
            record[f.name] = f.attribute
                ? el.getAttribute(f.attribute)
                : (el.innerText || el.textContent || '').trim();
        }}
        return record;
    }});
}})()"#,
        fields = literal(fields),
        sel = literal(container)
    )
}

pub fn scroll_by(dx: i64, dy: i64, smooth: bool) -> String {
    let behavior = if smooth { "smooth" } else { "auto" };
    format!("window.scrollBy({{ left: {dx}, top: {dy}, behavior: '{behavior}' }}); true")
}

pub fn scroll_to(edge: ScrollEdge, smooth: bool) -> String {
    let behavior = if smooth { "smooth" } else { "auto" };
    let top = match edge {
        ScrollEdge::Top => "0",
        ScrollEdge::Bottom => "document.body.scrollHeight",
    };
    format!("window.scrollTo({{ top: {top}, behavior: '{behavior}' }}); true")
}

/// Bounding rect of the first match, in page coordinates.
pub fn element_rect(selector: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({sel});
    if (!el) return null;
    const r = el.getBoundingClientRect();
    return {{ x: r.x + window.scrollX, y: r.y + window.scrollY, width: r.width, height: r.height }};
}})()"#,
        sel = literal(selector)
    )
}

pub const READY_STATE: &str = "document.readyState";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_embedded_as_json_strings() {
        let js = count(r#"a[title="x"]"#);
        assert_eq!(js, r#"document.querySelectorAll("a[title=\"x\"]").length"#);
    }

    #[test]
    fn locator_is_embedded_as_tagged_object() {
        let js = probe(&Locator::role("button", Some("Next".into())));
        assert!(js.contains(r#"locate({"by":"role","role":"button","name":"Next"})"#));
    }

    #[test]
    fn field_specs_are_embedded() {
        let js = query_fields(
            ".card",
            &[FieldSpec {
                name: "price".into(),
                selector: ".price".into(),
                attribute: None,
            }],
            200,
        );
        assert!(js.contains(r#""name":"price""#));
        assert!(js.contains(".slice(0, 200)"));
    }

    #[test]
    fn scroll_behaviour() {
        assert!(scroll_by(0, 500, true).contains("behavior: 'smooth'"));
        assert!(scroll_to(ScrollEdge::Bottom, false).contains("document.body.scrollHeight"));
    }
}
