//! HTTP routes and handlers.
//!
//! Every protected page follows the same shape: resolve the browser
//! session, hand an operation to the authorized dispatcher, attach the
//! cookie jar to whatever comes back. Handlers never touch tokens.

use axum::extract::{Query, State};
use axum::http::{Uri, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;
use time::{Duration, OffsetDateTime};

use crate::dispatch;
use crate::session_cookie;
use crate::state::AppState;
use crate::views;

/// One browsable provider collection.
struct Resource {
    /// Local route path.
    path: &'static str,
    /// Provider endpoint name (also the response array key).
    endpoint: &'static str,
    /// Page title.
    title: &'static str,
    /// Whether the endpoint pages its results.
    paged: bool,
    /// Columns to render: (response field, display label).
    columns: &'static [(&'static str, &'static str)],
}

static RESOURCES: &[Resource] = &[
    Resource {
        path: "/organisations",
        endpoint: "Organisations",
        title: "Organisations",
        paged: false,
        columns: &[
            ("Name", "Name"),
            ("LegalName", "Legal name"),
            ("OrganisationType", "Type"),
            ("CountryCode", "Country"),
        ],
    },
    Resource {
        path: "/accounts",
        endpoint: "Accounts",
        title: "Accounts",
        paged: false,
        columns: &[
            ("Code", "Code"),
            ("Name", "Name"),
            ("Type", "Type"),
            ("Status", "Status"),
        ],
    },
    Resource {
        path: "/contacts",
        endpoint: "Contacts",
        title: "Contacts",
        paged: true,
        columns: &[
            ("Name", "Name"),
            ("ContactStatus", "Status"),
            ("EmailAddress", "Email"),
        ],
    },
    Resource {
        path: "/invoices",
        endpoint: "Invoices",
        title: "Invoices",
        paged: false,
        columns: &[
            ("InvoiceNumber", "Number"),
            ("Type", "Type"),
            ("Status", "Status"),
            ("Total", "Total"),
            ("AmountDue", "Amount due"),
        ],
    },
    Resource {
        path: "/creditnotes",
        endpoint: "CreditNotes",
        title: "Credit Notes",
        paged: false,
        columns: &[
            ("CreditNoteNumber", "Number"),
            ("Type", "Type"),
            ("Status", "Status"),
            ("Total", "Total"),
        ],
    },
    Resource {
        path: "/repeatinginvoices",
        endpoint: "RepeatingInvoices",
        title: "Repeating Invoices",
        paged: false,
        columns: &[("Type", "Type"), ("Status", "Status"), ("Total", "Total")],
    },
    Resource {
        path: "/items",
        endpoint: "Items",
        title: "Items",
        paged: false,
        columns: &[("Code", "Code"), ("Name", "Name"), ("Description", "Description")],
    },
    Resource {
        path: "/payments",
        endpoint: "Payments",
        title: "Payments",
        paged: false,
        columns: &[
            ("Date", "Date"),
            ("Amount", "Amount"),
            ("PaymentType", "Type"),
            ("Status", "Status"),
        ],
    },
    Resource {
        path: "/banktransactions",
        endpoint: "BankTransactions",
        title: "Bank Transactions",
        paged: true,
        columns: &[
            ("Type", "Type"),
            ("Status", "Status"),
            ("Total", "Total"),
            ("Date", "Date"),
        ],
    },
    Resource {
        path: "/banktransfers",
        endpoint: "BankTransfers",
        title: "Bank Transfers",
        paged: true,
        columns: &[("Amount", "Amount"), ("Date", "Date")],
    },
    Resource {
        path: "/journals",
        endpoint: "Journals",
        title: "Journals",
        paged: true,
        columns: &[
            ("JournalNumber", "Number"),
            ("JournalDate", "Date"),
            ("Reference", "Reference"),
        ],
    },
    Resource {
        path: "/manualjournals",
        endpoint: "ManualJournals",
        title: "Manual Journals",
        paged: true,
        columns: &[("Narration", "Narration"), ("Status", "Status"), ("Date", "Date")],
    },
    Resource {
        path: "/taxrates",
        endpoint: "TaxRates",
        title: "Tax Rates",
        paged: false,
        columns: &[
            ("Name", "Name"),
            ("TaxType", "Type"),
            ("EffectiveRate", "Effective rate"),
            ("Status", "Status"),
        ],
    },
    Resource {
        path: "/currencies",
        endpoint: "Currencies",
        title: "Currencies",
        paged: false,
        columns: &[("Code", "Code"), ("Description", "Description")],
    },
    Resource {
        path: "/trackingcategories",
        endpoint: "TrackingCategories",
        title: "Tracking Categories",
        paged: false,
        columns: &[("Name", "Name"), ("Status", "Status")],
    },
    Resource {
        path: "/brandingthemes",
        endpoint: "BrandingThemes",
        title: "Branding Themes",
        paged: false,
        columns: &[("Name", "Name"), ("SortOrder", "Sort order")],
    },
    Resource {
        path: "/invoicereminders",
        endpoint: "InvoiceReminders/Settings",
        title: "Invoice Reminders",
        paged: false,
        columns: &[("Enabled", "Enabled")],
    },
    Resource {
        path: "/users",
        endpoint: "Users",
        title: "Users",
        paged: false,
        columns: &[
            ("FirstName", "First name"),
            ("LastName", "Last name"),
            ("EmailAddress", "Email"),
            ("IsSubscriber", "Subscriber"),
        ],
    },
];

/// Builds the application router.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(home))
        .route("/error", get(error_page))
        .route("/access", get(access_callback))
        .route("/reports", get(reports))
        .route("/attachments", get(attachments))
        .route("/download", get(download))
        .route("/createinvoice", get(create_invoice_form).post(create_invoice));
    for resource in RESOURCES {
        router = router.route(resource.path, get(resource_page));
    }
    router.with_state(state)
}

async fn home() -> Html<String> {
    Html(views::render_home(None))
}

#[derive(Deserialize)]
struct ErrorParams {
    error: Option<String>,
}

async fn error_page(Query(params): Query<ErrorParams>) -> Html<String> {
    Html(views::render_error_page(
        params.error.as_deref().unwrap_or("Unknown error"),
    ))
}

#[derive(Deserialize)]
struct CallbackParams {
    oauth_token: Option<String>,
    oauth_verifier: Option<String>,
}

/// Provider callback: matches the returned token against the pending one,
/// exchanges the verifier, then redirects to the originally requested page.
///
/// A token mismatch fails before any provider call is made.
async fn access_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let (session_id, jar) = session_cookie::resolve(&state, jar).await;

    let Some(verifier) = params.oauth_verifier.as_deref() else {
        // The user declined on the provider's authorize page.
        return (
            jar,
            Html(views::render_home(Some(
                "Authorization was not completed; no verifier was returned.",
            ))),
        )
            .into_response();
    };
    let Some(callback_token) = params.oauth_token.as_deref() else {
        return (
            jar,
            Html(views::render_home(Some(
                "The provider callback did not carry a token.",
            ))),
        )
            .into_response();
    };

    let pending = match state.sessions.match_pending(session_id, callback_token).await {
        Ok(pending) => pending,
        Err(e) => {
            tracing::warn!(session = %session_id, "callback token did not match pending authorization");
            return (jar, dispatch::error_redirect(&e.to_string())).into_response();
        }
    };

    match state.authorizer.exchange_verifier(&pending, verifier).await {
        Ok(access) => {
            if let Err(e) = state
                .sessions
                .complete_authorization(session_id, callback_token, access)
                .await
            {
                return (jar, dispatch::error_redirect(&e.to_string())).into_response();
            }
            let target = state
                .sessions
                .take_return_to(session_id)
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| "/".to_string());
            (jar, Redirect::to(&target)).into_response()
        }
        Err(e) => (jar, dispatch::recover(&state, session_id, "/", e).await).into_response(),
    }
}

/// Generic collection page; the route path selects the resource entry.
async fn resource_page(State(state): State<AppState>, jar: CookieJar, uri: Uri) -> Response {
    let (session_id, jar) = session_cookie::resolve(&state, jar).await;
    let Some(resource) = RESOURCES.iter().find(|r| r.path == uri.path()) else {
        return (jar, dispatch::error_redirect("unknown resource")).into_response();
    };
    let response = dispatch::with_authorized_client(&state, session_id, resource.path, |handle| async move {
        let items = if resource.paged {
            handle.collection_paged(resource.endpoint).await?
        } else {
            handle.collection(resource.endpoint).await?
        };
        Ok(Html(views::render_table(resource.title, resource.columns, &items)).into_response())
    })
    .await;
    (jar, response).into_response()
}

#[derive(Deserialize)]
struct ReportParams {
    r: Option<String>,
}

fn report_name(selector: &str) -> Option<&'static str> {
    match selector {
        "1" => Some("BalanceSheet"),
        "2" => Some("TrialBalance"),
        "3" => Some("ProfitAndLoss"),
        "4" => Some("BankStatement"),
        "5" => Some("BudgetSummary"),
        "6" => Some("ExecutiveSummary"),
        "7" => Some("BankSummary"),
        "8" => Some("AgedReceivablesByContact"),
        "9" => Some("AgedPayablesByContact"),
        "10" => Some("TenNinetyNine"),
        _ => None,
    }
}

/// Runs a numbered report. The bank-statement and aged reports need an
/// entity id, resolved from the first matching account or contact.
async fn reports(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<ReportParams>,
) -> Response {
    let (session_id, jar) = session_cookie::resolve(&state, jar).await;
    let selector = params.r.as_deref().unwrap_or("");
    let Some(name) = report_name(selector) else {
        return (jar, Html(views::render_home(Some("Report not found")))).into_response();
    };
    let intended = format!("/reports?r={selector}");
    let response = dispatch::with_authorized_client(&state, session_id, &intended, |handle| async move {
        let mut query: Vec<(String, String)> = Vec::new();
        match name {
            "BankStatement" => {
                let accounts = handle.collection("Accounts").await?;
                let Some(account_id) = accounts
                    .iter()
                    .find(|a| a["Type"] == "BANK")
                    .and_then(|a| a["AccountID"].as_str())
                else {
                    return Ok(Html(views::render_error_page(
                        "No bank account available for the Bank Statement report.",
                    ))
                    .into_response());
                };
                query.push(("bankAccountID".to_string(), account_id.to_string()));
            }
            "AgedReceivablesByContact" | "AgedPayablesByContact" => {
                let contacts = handle.collection("Contacts").await?;
                let Some(contact_id) = contacts.first().and_then(|c| c["ContactID"].as_str())
                else {
                    return Ok(Html(views::render_error_page(
                        "No contact available for the aged report.",
                    ))
                    .into_response());
                };
                query.push(("contactID".to_string(), contact_id.to_string()));
            }
            _ => {}
        }
        let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let report = handle.report(name, &query).await?;
        Ok(Html(views::render_report(&report)).into_response())
    })
    .await;
    (jar, response).into_response()
}

#[derive(Deserialize)]
struct AttachmentParams {
    #[serde(rename = "entityType")]
    entity_type: Option<String>,
    #[serde(rename = "entityID")]
    entity_id: Option<String>,
    #[serde(rename = "fileId")]
    file_id: Option<String>,
}

async fn attachments(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<AttachmentParams>,
) -> Response {
    let (session_id, jar) = session_cookie::resolve(&state, jar).await;
    let (Some(entity_type), Some(entity_id)) = (params.entity_type, params.entity_id) else {
        return (jar, Html(views::render_attachments("", "", &[]))).into_response();
    };
    let intended = format!(
        "/attachments?entityType={entity_type}&entityID={entity_id}"
    );
    let response = dispatch::with_authorized_client(&state, session_id, &intended, |handle| async move {
        let items = handle.attachments(&entity_type, &entity_id).await?;
        Ok(Html(views::render_attachments(&entity_type, &entity_id, &items)).into_response())
    })
    .await;
    (jar, response).into_response()
}

/// Streams one attachment's content back with the provider-reported type.
async fn download(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<AttachmentParams>,
) -> Response {
    let (session_id, jar) = session_cookie::resolve(&state, jar).await;
    let (Some(entity_type), Some(entity_id), Some(file_id)) =
        (params.entity_type, params.entity_id, params.file_id)
    else {
        return (jar, Html(views::render_attachments("", "", &[]))).into_response();
    };
    let response = dispatch::with_authorized_client(&state, session_id, "/attachments", |handle| async move {
        let (bytes, content_type) = handle
            .attachment_content(&entity_type, &entity_id, &file_id)
            .await?;
        let disposition = format!("attachment; filename=\"{}\"", file_id.replace('"', ""));
        Ok((
            [
                (
                    header::CONTENT_TYPE,
                    content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
                ),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            bytes,
        )
            .into_response())
    })
    .await;
    (jar, response).into_response()
}

async fn create_invoice_form() -> Html<String> {
    Html(views::render_invoice_form())
}

#[derive(Deserialize)]
struct InvoiceForm {
    invoice_type: String,
    contact: String,
    description: String,
    quantity: String,
    amount: String,
}

/// Creates a draft invoice from the submitted form.
///
/// Provider refusals other than a token rejection render on the outcome
/// page; a rejection goes through normal recovery so the user re-authorizes
/// and can retry.
async fn create_invoice(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<InvoiceForm>,
) -> Response {
    let (session_id, jar) = session_cookie::resolve(&state, jar).await;

    let (Ok(quantity), Ok(amount)) = (form.quantity.parse::<f64>(), form.amount.parse::<f64>())
    else {
        return (
            jar,
            Html(views::render_invoice_failed("Quantity and unit amount must be numeric.")),
        )
            .into_response();
    };

    let due = OffsetDateTime::now_utc().date() + Duration::days(30);
    let due_date = format!("{:04}-{:02}-{:02}", due.year(), u8::from(due.month()), due.day());
    let draft = json!({
        "Type": form.invoice_type,
        "Contact": { "Name": form.contact },
        "DueDate": due_date,
        "Status": "DRAFT",
        "LineItems": [{
            "Description": form.description,
            "Quantity": quantity,
            "UnitAmount": amount,
            "AccountCode": "400",
        }],
    });

    let response = dispatch::with_authorized_client(&state, session_id, "/createinvoice", |handle| async move {
        match handle.create_invoice(&draft).await {
            Ok(created) => Ok(Html(views::render_invoice_created(&created)).into_response()),
            Err(e) if e.is_token_rejected() => Err(e),
            Err(e) => Ok(Html(views::render_invoice_failed(&e.to_string())).into_response()),
        }
    })
    .await;
    (jar, response).into_response()
}
