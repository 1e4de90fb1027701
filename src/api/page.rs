//! Server-rendered HTML for the rules page and the sign-in page.
//!
//! The rules page is a view of the user's [`RuleForm`]; edits go through the
//! JSON form API and the page reloads afterwards.

use std::fmt::Write;

use crate::domain::{FieldTarget, RuleField, UserIdentity};
use crate::form::{MessageKind, RuleForm};

/// Escape text for use in HTML content and quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

const SCRIPT: &str = r#"
const call = (method, url, body) => fetch(url, {
  method,
  headers: { "Content-Type": "application/json" },
  body: body === undefined ? undefined : JSON.stringify(body),
}).then(() => location.reload());
document.querySelectorAll("[data-target]").forEach((el) => {
  el.addEventListener("change", () =>
    call("PUT", "/api/form/fields", { target: JSON.parse(el.dataset.target), value: el.value }));
});
document.querySelectorAll("[data-remove]").forEach((el) => {
  el.addEventListener("click", () => call("DELETE", "/api/form/rules/" + el.dataset.remove));
});
document.getElementById("add-rule").addEventListener("click", () => call("POST", "/api/form/rules"));
document.getElementById("rules-form").addEventListener("submit", (ev) => {
  ev.preventDefault();
  document.getElementById("submit").disabled = true;
  call("POST", "/api/form/submit");
});
const refresh = () => fetch("/api/auth/session", { method: "POST" });
window.addEventListener("focus", refresh);
setInterval(refresh, REFRESH_MS);
"#;

fn target_attr(target: FieldTarget) -> String {
    // serde_json cannot fail on this enum
    escape(&serde_json::to_string(&target).unwrap_or_default())
}

fn field_error(out: &mut String, error: Option<&str>) {
    if let Some(error) = error {
        let _ = write!(out, r#"<p class="field-error">{}</p>"#, escape(error));
    }
}

fn rule_input(out: &mut String, form: &RuleForm, index: usize, field: RuleField) {
    let entry = &form.rules()[index];
    let (label, placeholder) = match field {
        RuleField::Name => ("Name", "e.g., email_format_check"),
        RuleField::ErrorMessage => ("Error Message", "e.g., Invalid email format"),
        RuleField::Query => ("Query", "e.g., email LIKE '%@%.%'"),
    };
    let target = target_attr(FieldTarget::Rule { index, field });
    let value = escape(entry.rule.field(field));

    let _ = write!(out, r#"<label>{} <span class="required">*</span>"#, label);
    if field == RuleField::Query {
        let _ = write!(
            out,
            r#"<textarea rows="3" placeholder="{}" data-target="{}">{}</textarea>"#,
            escape(placeholder),
            target,
            value
        );
    } else {
        let _ = write!(
            out,
            r#"<input placeholder="{}" data-target="{}" value="{}">"#,
            escape(placeholder),
            target,
            value
        );
    }
    out.push_str("</label>");
    field_error(out, entry.errors.get(&field).copied());
}

/// Render the protected rules page.
pub fn render_rules_page(user: &UserIdentity, form: &RuleForm, refresh_secs: u64) -> String {
    let mut out = String::with_capacity(4096);
    let display_name = user.name.as_deref().unwrap_or(&user.email);

    out.push_str(r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>Create Validation Rules</title></head><body>"#);
    let _ = write!(
        out,
        r#"<header><span>{}</span><form method="post" action="/api/auth/signout"><button>Sign out</button></form></header>"#,
        escape(display_name)
    );
    out.push_str("<main><h1>Create Validation Rules</h1>");
    out.push_str("<p>Add rules for event validation. Each rule requires a name, error message, and query.</p>");
    out.push_str(r#"<form id="rules-form">"#);

    let _ = write!(
        out,
        r#"<label>Event Type <span class="required">*</span><input placeholder="e.g., user_registration, payment_processing" data-target="{}" value="{}"></label>"#,
        target_attr(FieldTarget::EventType),
        escape(form.event_type())
    );
    field_error(&mut out, form.event_type_error());

    out.push_str(r#"<section><h2>Rules <span class="required">*</span></h2><button type="button" id="add-rule">Add Rule</button>"#);
    for (index, entry) in form.rules().iter().enumerate() {
        let _ = write!(
            out,
            r#"<fieldset data-id="{}"><legend>Rule {}</legend>"#,
            entry.id,
            index + 1
        );
        if form.len() > 1 {
            let _ = write!(
                out,
                r#"<button type="button" data-remove="{}">Remove</button>"#,
                index
            );
        }
        for field in RuleField::ALL {
            rule_input(&mut out, form, index, field);
        }
        out.push_str("</fieldset>");
    }
    out.push_str("</section>");

    if form.is_submitting() {
        out.push_str(r#"<button type="submit" id="submit" disabled>Submitting...</button>"#);
    } else {
        out.push_str(r#"<button type="submit" id="submit">Create Rules</button>"#);
    }

    if let Some(msg) = form.message() {
        let class = match msg.kind {
            MessageKind::Success => "message success",
            MessageKind::Error => "message error",
        };
        let _ = write!(
            out,
            r#"<div class="{}" role="status">{}</div>"#,
            class,
            escape(&msg.message)
        );
    }

    out.push_str("</form></main><script>");
    out.push_str(&SCRIPT.replace("REFRESH_MS", &refresh_secs.saturating_mul(1000).to_string()));
    out.push_str("</script></body></html>");
    out
}

/// Render the sign-in page, with a notice for a failed attempt.
pub fn render_signin(error: Option<&str>) -> String {
    let notice = error.map(|code| match code {
        "CredentialsSignin" => "Sign in failed. Check the details you provided are correct.",
        "LoginUnavailable" => "The login service is unavailable. Please try again.",
        _ => "Unable to sign in.",
    });

    let mut out = String::with_capacity(1024);
    out.push_str(r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>Sign in</title></head><body><main><h1>Sign in</h1>"#);
    if let Some(notice) = notice {
        let _ = write!(out, r#"<p class="message error" role="alert">{}</p>"#, escape(notice));
    }
    out.push_str(
        r#"<form method="post" action="/api/auth/callback/credentials">
<label>Email <input type="email" name="email" placeholder="john.doe@example.com" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Sign in</button>
</form></main></body></html>"#,
    );
    out
}
