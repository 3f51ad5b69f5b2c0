//! Server-rendered HTML views.
//!
//! Plain `format!` templates, escaped at every interpolation point. The
//! views never see tokens or secrets, only resource payloads and display
//! messages.

use serde_json::Value;

const SHARED_STYLES: &str = r#"
body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; margin: 2rem auto; max-width: 960px; color: #1f2933; }
nav a { margin-right: 0.75rem; }
table { border-collapse: collapse; width: 100%; margin-top: 1rem; }
th, td { border: 1px solid #cbd2d9; padding: 0.4rem 0.6rem; text-align: left; }
th { background: #f5f7fa; }
.error { background: #fde8e8; border: 1px solid #f8b4b4; padding: 0.75rem 1rem; border-radius: 4px; }
.notice { background: #e1effe; border: 1px solid #a4cafe; padding: 0.75rem 1rem; border-radius: 4px; }
form label { display: block; margin-top: 0.75rem; }
form input { padding: 0.3rem; width: 20rem; }
button { margin-top: 1rem; padding: 0.4rem 1rem; }
"#;

/// Escapes text for interpolation into HTML content or attribute values.
#[must_use]
pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} - LedgerLink</title>\n<style>{SHARED_STYLES}</style>\n</head>\n\
         <body>\n<h1>{title}</h1>\n{body}\n<p><a href=\"/\">Home</a></p>\n</body>\n</html>",
        title = html_escape(title),
    )
}

/// Renders one JSON field as display text. Strings render unquoted;
/// everything else falls back to its JSON form.
fn field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Home page with the navigation index and an optional error banner.
#[must_use]
pub fn render_home(error: Option<&str>) -> String {
    let banner = match error {
        Some(message) => format!("<div class=\"error\">{}</div>", html_escape(message)),
        None => String::new(),
    };
    let nav = [
        ("/organisations", "Organisations"),
        ("/accounts", "Accounts"),
        ("/contacts", "Contacts"),
        ("/invoices", "Invoices"),
        ("/creditnotes", "Credit Notes"),
        ("/repeatinginvoices", "Repeating Invoices"),
        ("/items", "Items"),
        ("/payments", "Payments"),
        ("/banktransactions", "Bank Transactions"),
        ("/banktransfers", "Bank Transfers"),
        ("/journals", "Journals"),
        ("/manualjournals", "Manual Journals"),
        ("/taxrates", "Tax Rates"),
        ("/currencies", "Currencies"),
        ("/trackingcategories", "Tracking Categories"),
        ("/brandingthemes", "Branding Themes"),
        ("/invoicereminders", "Invoice Reminders"),
        ("/users", "Users"),
        ("/reports?r=1", "Reports"),
        ("/createinvoice", "Create Invoice"),
    ]
    .iter()
    .map(|(href, label)| format!("<li><a href=\"{href}\">{label}</a></li>"))
    .collect::<Vec<_>>()
    .join("\n");
    layout(
        "LedgerLink",
        &format!(
            "{banner}\n<p>Browse your accounting data. The first protected page you open \
             starts the provider authorization flow.</p>\n<ul>\n{nav}\n</ul>"
        ),
    )
}

/// Renders a resource collection as a table with the given columns.
#[must_use]
pub fn render_table(title: &str, columns: &[(&str, &str)], rows: &[Value]) -> String {
    if rows.is_empty() {
        return layout(title, "<div class=\"notice\">No records returned.</div>");
    }
    let header = columns
        .iter()
        .map(|(_, label)| format!("<th>{}</th>", html_escape(label)))
        .collect::<Vec<_>>()
        .join("");
    let body = rows
        .iter()
        .map(|row| {
            let cells = columns
                .iter()
                .map(|(key, _)| format!("<td>{}</td>", html_escape(&field(row, key))))
                .collect::<Vec<_>>()
                .join("");
            format!("<tr>{cells}</tr>")
        })
        .collect::<Vec<_>>()
        .join("\n");
    layout(
        title,
        &format!(
            "<p>{count} record(s)</p>\n<table>\n<tr>{header}</tr>\n{body}\n</table>",
            count = rows.len(),
        ),
    )
}

/// Standalone error page, used when a message arrives via the error
/// redirect.
#[must_use]
pub fn render_error_page(message: &str) -> String {
    layout(
        "Something went wrong",
        &format!("<div class=\"error\">{}</div>", html_escape(message)),
    )
}

/// Renders a report payload: a titled set of rows, where each row may
/// carry nested rows with cells.
#[must_use]
pub fn render_report(report: &Value) -> String {
    let title = match report.get("ReportName") {
        Some(Value::String(name)) => name.clone(),
        _ => "Report".to_string(),
    };
    let mut sections = String::new();
    if let Some(Value::Array(titles)) = report.get("ReportTitles") {
        let subtitle = titles
            .iter()
            .filter_map(Value::as_str)
            .map(html_escape)
            .collect::<Vec<_>>()
            .join(" | ");
        sections.push_str(&format!("<p>{subtitle}</p>\n"));
    }
    if let Some(Value::Array(rows)) = report.get("Rows") {
        sections.push_str("<table>\n");
        for row in rows {
            render_report_row(row, &mut sections);
        }
        sections.push_str("</table>");
    } else {
        sections.push_str("<div class=\"notice\">The report returned no rows.</div>");
    }
    layout(&title, &sections)
}

fn render_report_row(row: &Value, out: &mut String) {
    if let Some(Value::String(section_title)) = row.get("Title") {
        out.push_str(&format!(
            "<tr><th colspan=\"8\">{}</th></tr>\n",
            html_escape(section_title)
        ));
    }
    if let Some(Value::Array(cells)) = row.get("Cells") {
        let rendered = cells
            .iter()
            .map(|cell| format!("<td>{}</td>", html_escape(&field(cell, "Value"))))
            .collect::<Vec<_>>()
            .join("");
        out.push_str(&format!("<tr>{rendered}</tr>\n"));
    }
    if let Some(Value::Array(nested)) = row.get("Rows") {
        for inner in nested {
            render_report_row(inner, out);
        }
    }
}

/// Lists an entity's attachments with download links.
#[must_use]
pub fn render_attachments(entity_type: &str, entity_id: &str, items: &[Value]) -> String {
    if items.is_empty() {
        return layout("Attachments", "<div class=\"notice\">No Attachments Found</div>");
    }
    let rows = items
        .iter()
        .map(|item| {
            let file_name = field(item, "FileName");
            let href = format!(
                "/download?entityType={}&entityID={}&fileId={}",
                url_encode(entity_type),
                url_encode(entity_id),
                url_encode(&file_name)
            );
            format!(
                "<tr><td><a href=\"{href}\">{name}</a></td><td>{mime}</td><td>{size}</td></tr>",
                name = html_escape(&file_name),
                mime = html_escape(&field(item, "MimeType")),
                size = html_escape(&field(item, "ContentLength")),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    layout(
        "Attachments",
        &format!(
            "<table>\n<tr><th>File</th><th>Type</th><th>Size</th></tr>\n{rows}\n</table>"
        ),
    )
}

/// Draft invoice entry form.
#[must_use]
pub fn render_invoice_form() -> String {
    layout(
        "Create Invoice",
        "<form method=\"post\" action=\"/createinvoice\">\n\
         <label>Type <input name=\"invoice_type\" value=\"ACCREC\"></label>\n\
         <label>Contact name <input name=\"contact\" value=\"Ljm Ross\"></label>\n\
         <label>Description <input name=\"description\" value=\"Consulting services\"></label>\n\
         <label>Quantity <input name=\"quantity\" value=\"1\"></label>\n\
         <label>Unit amount <input name=\"amount\" value=\"100.00\"></label>\n\
         <button type=\"submit\">Create draft invoice</button>\n\
         </form>",
    )
}

/// Outcome page after a successful draft-invoice creation.
#[must_use]
pub fn render_invoice_created(invoice: &Value) -> String {
    layout(
        "Invoice created",
        &format!(
            "<div class=\"notice\">Draft invoice <strong>{number}</strong> created \
             (total {total}).</div>\n<p><a href=\"/invoices\">View invoices</a></p>",
            number = html_escape(&field(invoice, "InvoiceNumber")),
            total = html_escape(&field(invoice, "Total")),
        ),
    )
}

/// Outcome page for a creation the provider refused.
#[must_use]
pub fn render_invoice_failed(message: &str) -> String {
    layout(
        "Invoice not created",
        &format!(
            "<div class=\"error\">{}</div>\n<p><a href=\"/createinvoice\">Try again</a></p>",
            html_escape(message)
        ),
    )
}

fn url_encode(input: &str) -> String {
    url::form_urlencoded::byte_serialize(input.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn html_escaping_covers_markup_characters() {
        assert_eq!(
            html_escape("<script>\"a\" & 'b'</script>"),
            "&lt;script&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn table_renders_rows_and_escapes_values() {
        let rows = vec![json!({"Name": "Acme <Ltd>", "Status": "ACTIVE"})];
        let html = render_table("Contacts", &[("Name", "Name"), ("Status", "Status")], &rows);
        assert!(html.contains("Acme &lt;Ltd&gt;"));
        assert!(html.contains("<th>Status</th>"));
        assert!(html.contains("1 record(s)"));
    }

    #[test]
    fn empty_collection_gets_a_notice() {
        let html = render_table("Contacts", &[("Name", "Name")], &[]);
        assert!(html.contains("No records returned"));
    }

    #[test]
    fn home_shows_error_banner_when_present() {
        assert!(!render_home(None).contains("class=\"error\""));
        let html = render_home(Some("provider is unreachable"));
        assert!(html.contains("class=\"error\""));
        assert!(html.contains("provider is unreachable"));
    }

    #[test]
    fn report_renders_nested_rows() {
        let report = json!({
            "ReportName": "Balance Sheet",
            "ReportTitles": ["Balance Sheet", "Demo Company"],
            "Rows": [
                {"Title": "Assets", "Rows": [
                    {"Cells": [{"Value": "Bank"}, {"Value": "100.00"}]}
                ]}
            ]
        });
        let html = render_report(&report);
        assert!(html.contains("Balance Sheet"));
        assert!(html.contains("Assets"));
        assert!(html.contains("100.00"));
    }

    #[test]
    fn attachment_links_encode_query_parameters() {
        let items = vec![json!({"FileName": "year end.pdf", "MimeType": "application/pdf"})];
        let html = render_attachments("Invoices", "inv-1", &items);
        assert!(html.contains("fileId=year+end.pdf"));
        assert!(html.contains("entityType=Invoices"));
    }
}
