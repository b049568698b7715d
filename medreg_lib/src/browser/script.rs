//! JavaScript evaluated inside a page or frame by DOM-driving backends.
//!
//! Every script is a self-contained expression returning JSON-compatible data.
//! Elements found by [`find`] are tagged with a `data-medreg-handle` attribute
//! so later actions can address them without holding remote object ids.

use serde_json::Value;

use crate::selector::Matcher;

pub const HANDLE_ATTRIBUTE: &str = "data-medreg-handle";

/// Cap on anchors returned by [`anchors`]; result pages rarely need more.
pub const MAX_ANCHORS: usize = 400;

const HELPERS: &str = r#"
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
  const visible = (el) => !!(el && (el.offsetWidth || el.offsetHeight || el.getClientRects().length));
"#;

fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn candidates(matcher: &Matcher) -> String {
    match matcher {
        Matcher::Css(selector) => format!(
            "Array.from(document.querySelectorAll({}))",
            js_string(selector)
        ),
        Matcher::ButtonText(text) => format!(
            "Array.from(document.querySelectorAll('button, [role=button], input[type=submit], input[type=button]'))\
             .filter((el) => norm(el.innerText || el.value).includes(norm({})))",
            js_string(text)
        ),
        Matcher::LinkText(text) => format!(
            "Array.from(document.querySelectorAll('a'))\
             .filter((el) => norm(el.innerText).includes(norm({})))",
            js_string(text)
        ),
        Matcher::Placeholder(text) => format!(
            "Array.from(document.querySelectorAll('input[placeholder], textarea[placeholder]'))\
             .filter((el) => norm(el.getAttribute('placeholder')).includes(norm({})))",
            js_string(text)
        ),
        Matcher::FirstInput => {
            "Array.from(document.querySelectorAll('input:not([type=hidden])')).slice(0, 1)".to_string()
        }
    }
}

/// Looks for the first visible element matching `matcher`, tags it with
/// `token` and returns `true`; returns `false` when nothing visible matches or
/// the selector is invalid.
pub fn find(matcher: &Matcher, token: &str) -> String {
    format!(
        r#"(() => {{{helpers}
  let found;
  try {{ found = {candidates}.find(visible); }} catch (e) {{ return false; }}
  if (!found) return false;
  found.setAttribute('{attr}', {token});
  return true;
}})()"#,
        helpers = HELPERS,
        candidates = candidates(matcher),
        attr = HANDLE_ATTRIBUTE,
        token = js_string(token),
    )
}

fn with_element(token: &str, body: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector('[{attr}=' + JSON.stringify({token}) + ']');
  if (!el) return false;
  {body}
  return true;
}})()"#,
        attr = HANDLE_ATTRIBUTE,
        token = js_string(token),
        body = body,
    )
}

/// Focuses the element and clears its value, notifying framework listeners.
pub fn focus_and_clear(token: &str) -> String {
    with_element(
        token,
        "el.focus(); el.value = ''; el.dispatchEvent(new Event('input', { bubbles: true }));",
    )
}

/// Sets the value directly. Used when native text insertion is unavailable.
pub fn set_value(token: &str, text: &str) -> String {
    with_element(
        token,
        &format!(
            "el.value = {}; el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }}));",
            js_string(text)
        ),
    )
}

pub fn focus(token: &str) -> String {
    with_element(token, "el.focus();")
}

pub fn click(token: &str) -> String {
    with_element(token, "el.scrollIntoView({ block: 'center' }); el.click();")
}

/// Submits the element's enclosing form, if any.
pub fn submit_form(token: &str) -> String {
    with_element(
        token,
        "if (!el.form) return false; \
         if (el.form.requestSubmit) { el.form.requestSubmit(); } else { el.form.submit(); }",
    )
}

/// `[{text, href}]` for every anchor with an `href`, in document order.
pub fn anchors() -> String {
    format!(
        r#"Array.from(document.querySelectorAll('a[href]')).slice(0, {max}).map((a) => ({{
  text: (a.innerText || a.textContent || '').replace(/\s+/g, ' ').trim(),
  href: a.getAttribute('href') || ''
}}))"#,
        max = MAX_ANCHORS
    )
}

pub fn location() -> &'static str {
    "document.location.href"
}
