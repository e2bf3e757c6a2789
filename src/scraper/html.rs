//! The single place HTML parsing happens.
//!
//! Everything the scraping algorithms need from untrusted markup comes
//! through this narrow interface, so the parsing technique can be swapped
//! without touching them.

use crate::models::{DetectedForm, FormMethod};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// An anchor from a dashboard page, href resolved to absolute form.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub href: String,
    pub text: String,
}

/// First `<form>` containing a password-type input, or `None`.
///
/// Field extraction rules: action resolved absolute against `base_url`
/// (empty action submits back to the base), method defaults to POST,
/// password field name defaults to `"password"`, username field is the first
/// plain text-like input (default `"username"`), hidden inputs are carried
/// verbatim. The first matching form wins; scoring belongs to page
/// selection, not form selection.
pub fn find_login_form(html: &str, base_url: &str) -> Option<DetectedForm> {
    let doc = Html::parse_document(html);
    let form_sel = Selector::parse("form").ok()?;
    let input_sel = Selector::parse("input").ok()?;

    for form in doc.select(&form_sel) {
        let inputs: Vec<ElementRef> = form.select(&input_sel).collect();
        let Some(pw) = inputs.iter().find(|i| input_type(i) == "password") else {
            continue;
        };

        let action_attr = form.value().attr("action").unwrap_or("").trim();
        let action = if action_attr.is_empty() {
            base_url.to_string()
        } else {
            resolve(base_url, action_attr)
        };

        let method = match form.value().attr("method") {
            Some(m) if m.trim().eq_ignore_ascii_case("get") => FormMethod::Get,
            _ => FormMethod::Post,
        };

        let password_field = pw
            .value()
            .attr("name")
            .filter(|n| !n.is_empty())
            .unwrap_or("password")
            .to_string();

        let username_field = inputs
            .iter()
            .find(|i| is_username_candidate(i))
            .and_then(|i| i.value().attr("name"))
            .filter(|n| !n.is_empty())
            .unwrap_or("username")
            .to_string();

        let hidden_fields = inputs
            .iter()
            .filter(|i| input_type(i) == "hidden")
            .filter_map(|i| {
                let name = i.value().attr("name")?;
                if name.is_empty() {
                    return None;
                }
                Some((
                    name.to_string(),
                    i.value().attr("value").unwrap_or("").to_string(),
                ))
            })
            .collect();

        return Some(DetectedForm {
            action,
            method,
            username_field,
            password_field,
            hidden_fields,
        });
    }

    None
}

/// All anchors with a usable href, resolved absolute.
pub fn extract_links(html: &str, base_url: &str) -> Vec<Link> {
    let doc = Html::parse_document(html);
    let Ok(a_sel) = Selector::parse("a") else {
        return vec![];
    };

    let mut links = Vec::new();
    for a in doc.select(&a_sel) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
        {
            continue;
        }
        links.push(Link {
            href: resolve(base_url, href),
            text: a.text().collect::<String>().trim().to_string(),
        });
    }
    links
}

/// Whether any password-type input is present — used to decide if a login
/// actually took effect on ERPs that re-render instead of redirecting.
pub fn has_password_field(html: &str) -> bool {
    let doc = Html::parse_document(html);
    let Ok(input_sel) = Selector::parse("input") else {
        return false;
    };
    doc.select(&input_sel).any(|i| input_type(&i) == "password")
}

/// Value of the first input named (or id'd) `name` — the known ERP family
/// carries the student's display name in a hidden dashboard input.
pub fn input_value(html: &str, name: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let input_sel = Selector::parse("input").ok()?;
    doc.select(&input_sel)
        .find(|i| {
            i.value().attr("name") == Some(name) || i.value().attr("id") == Some(name)
        })
        .and_then(|i| i.value().attr("value"))
        .map(|v| v.to_string())
}

fn input_type(el: &ElementRef) -> String {
    el.value()
        .attr("type")
        .unwrap_or("text")
        .trim()
        .to_ascii_lowercase()
}

fn is_username_candidate(el: &ElementRef) -> bool {
    !matches!(
        input_type(el).as_str(),
        "hidden" | "password" | "submit" | "button" | "checkbox" | "radio"
    )
}

fn resolve(base_url: &str, href: &str) -> String {
    match Url::parse(base_url).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://erp.example.edu";

    #[test]
    fn test_picks_form_with_password_regardless_of_position() {
        let html = r#"
            <form action="/search" method="get"><input type="text" name="q"/></form>
            <form action="/auth/check" method="post">
                <input type="hidden" name="_csrf" value="tok123"/>
                <input type="text" name="user_id"/>
                <input type="password" name="pass_word"/>
            </form>
        "#;
        let form = find_login_form(html, BASE).unwrap();
        assert_eq!(form.action, "https://erp.example.edu/auth/check");
        assert_eq!(form.method, FormMethod::Post);
        assert_eq!(form.username_field, "user_id");
        assert_eq!(form.password_field, "pass_word");
        assert_eq!(form.hidden_fields, vec![("_csrf".to_string(), "tok123".to_string())]);
    }

    #[test]
    fn test_no_password_form_yields_none() {
        let html = r#"<form><input type="text" name="q"/></form>"#;
        assert!(find_login_form(html, BASE).is_none());
    }

    #[test]
    fn test_defaults_applied() {
        // No action, no method, unnamed inputs.
        let html = r#"<form><input type="text"/><input type="password"/></form>"#;
        let form = find_login_form(html, BASE).unwrap();
        assert_eq!(form.action, BASE);
        assert_eq!(form.method, FormMethod::Post);
        assert_eq!(form.username_field, "username");
        assert_eq!(form.password_field, "password");
        assert!(form.hidden_fields.is_empty());
    }

    #[test]
    fn test_username_skips_decorative_inputs() {
        let html = r#"
            <form>
                <input type="hidden" name="vs" value="1"/>
                <input type="checkbox" name="remember"/>
                <input name="roll_no"/>
                <input type="password" name="pwd"/>
            </form>
        "#;
        let form = find_login_form(html, BASE).unwrap();
        assert_eq!(form.username_field, "roll_no");
    }

    #[test]
    fn test_extract_links_resolves_and_filters() {
        let html = r##"
            <a href="/attendance.htm">Attendance</a>
            <a href="https://other.example.com/x">Elsewhere</a>
            <a href="#top">Top</a>
            <a href="javascript:void(0)">Menu</a>
        "##;
        let links = extract_links(html, BASE);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].href, "https://erp.example.edu/attendance.htm");
        assert_eq!(links[0].text, "Attendance");
    }

    #[test]
    fn test_input_value_by_name_or_id() {
        let html = r#"<input type="hidden" id="studentName" value="RAVI  KUMAR"/>"#;
        assert_eq!(input_value(html, "studentName").as_deref(), Some("RAVI  KUMAR"));
        assert_eq!(input_value(html, "missing"), None);
    }
}
