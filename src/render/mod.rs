//! HTML rendering. Templates end in `.html`, so minijinja escapes every interpolated
//! value; cell text is formatted here and handed to templates as plain strings.

mod format;

pub use format::{cell, value_text, Cell, PLACEHOLDER};

use crate::config::{Catalog, FormField, InputKind, TableDescriptor};
use crate::error::AppError;
use crate::schema;
use crate::service::{CannedQuery, Dashboard, QueryResult};
use crate::session::{Page, Theme};
use crate::store::Row;
use minijinja::{context, Environment};
use serde::Serialize;
use std::sync::OnceLock;

const TEMPLATES: &[(&str, &str)] = &[
    ("shell.html", include_str!("templates/shell.html")),
    ("nav.html", include_str!("templates/nav.html")),
    ("list.html", include_str!("templates/list.html")),
    ("form.html", include_str!("templates/form.html")),
    ("confirm_delete.html", include_str!("templates/confirm_delete.html")),
    ("dashboard.html", include_str!("templates/dashboard.html")),
    ("queries.html", include_str!("templates/queries.html")),
    ("query_result.html", include_str!("templates/query_result.html")),
    ("triggers.html", include_str!("templates/triggers.html")),
    ("transactions.html", include_str!("templates/transactions.html")),
    ("demo_result.html", include_str!("templates/demo_result.html")),
    ("notice.html", include_str!("templates/notice.html")),
    ("error.html", include_str!("templates/error.html")),
];

/// Clears the modal container from any response.
pub const CLOSE_MODAL: &str = r#"<div id="modal" hx-swap-oob="innerHTML"></div>"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeKind {
    /// Bootstrap-style alert class suffix.
    fn alert(self) -> &'static str {
        match self {
            NoticeKind::Success => "success",
            NoticeKind::Info => "info",
            NoticeKind::Warning => "warning",
            NoticeKind::Error => "danger",
        }
    }
}

#[derive(Serialize)]
struct NavItem<'a> {
    slug: &'a str,
    title: &'a str,
    icon: &'a str,
}

#[derive(Serialize)]
struct RowView {
    id: String,
    cells: Vec<Cell>,
}

#[derive(Serialize)]
struct OptionView<'a> {
    value: &'a str,
    label: &'a str,
    selected: bool,
}

#[derive(Serialize)]
struct FieldView<'a> {
    name: &'a str,
    label: &'a str,
    input: &'static str,
    step: Option<&'static str>,
    required: bool,
    placeholder: Option<&'a str>,
    value: String,
    options: Vec<OptionView<'a>>,
}

/// Where a form submits.
#[derive(Clone, Copy, Debug)]
pub enum FormTarget<'a> {
    Create,
    Edit { id: &'a str },
}

pub struct Renderer {
    env: Environment<'static>,
}

static RENDERER: OnceLock<Renderer> = OnceLock::new();

/// Process-wide renderer.
pub fn renderer() -> &'static Renderer {
    RENDERER.get_or_init(Renderer::new)
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn table_icon(table: &str) -> &'static str {
    match table {
        "patients" => "fa-user-injured",
        "doctors" => "fa-user-md",
        "departments" => "fa-building",
        "appointments" => "fa-calendar-check",
        "medicines" => "fa-pills",
        "vendors" => "fa-truck",
        "supplies" => "fa-boxes",
        "prescriptions" => "fa-prescription",
        "bills" => "fa-file-invoice-dollar",
        _ => "fa-table",
    }
}

fn field_view<'a>(field: &'a FormField, values: Option<&Row>, create: bool) -> FieldView<'a> {
    let value = values
        .and_then(|row| row.get(&field.name))
        .and_then(value_text)
        .or_else(|| if create { field.default.clone() } else { None })
        .unwrap_or_default();
    let (input, step) = match &field.kind {
        InputKind::Text => ("text", None),
        InputKind::TextArea => ("textarea", None),
        InputKind::Integer => ("number", Some("1")),
        InputKind::Decimal => ("number", Some("0.01")),
        InputKind::Date => ("date", None),
        InputKind::Time => ("time", None),
        InputKind::Select(_) => ("select", None),
    };
    let options = match &field.kind {
        InputKind::Select(opts) => opts
            .iter()
            .map(|o| OptionView {
                value: &o.value,
                label: &o.label,
                selected: o.value == value,
            })
            .collect(),
        _ => Vec::new(),
    };
    FieldView {
        name: &field.name,
        label: &field.label,
        input,
        step,
        required: field.required && create,
        placeholder: field.placeholder.as_deref(),
        value,
        options,
    }
}

impl Renderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            if let Err(e) = env.add_template(name, source) {
                tracing::error!(template = %name, error = %e, "template failed to load");
            }
        }
        Renderer { env }
    }

    fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, AppError> {
        Ok(self.env.get_template(name)?.render(ctx)?)
    }

    fn nav_items(catalog: &Catalog) -> Vec<NavItem<'_>> {
        let mut items = vec![NavItem {
            slug: "dashboard",
            title: "Dashboard",
            icon: "fa-chart-pie",
        }];
        items.extend(catalog.tables.iter().map(|t| NavItem {
            slug: &t.page,
            title: &t.title,
            icon: table_icon(&t.name),
        }));
        items.extend([
            NavItem {
                slug: "queries",
                title: "SQL Queries",
                icon: "fa-code",
            },
            NavItem {
                slug: "triggers",
                title: "Triggers",
                icon: "fa-bolt",
            },
            NavItem {
                slug: "transactions",
                title: "Transactions",
                icon: "fa-exchange-alt",
            },
        ]);
        items
    }

    /// Sidebar navigation; `oob` renders it as an out-of-band swap for page fragments.
    pub fn nav(&self, catalog: &Catalog, active: &Page, oob: bool) -> Result<String, AppError> {
        self.render(
            "nav.html",
            context! { items => Self::nav_items(catalog), active => active.slug(), oob => oob },
        )
    }

    /// Full page: sidebar, theme attribute, session header and the initial content.
    pub fn shell(
        &self,
        catalog: &Catalog,
        active: &Page,
        theme: Theme,
        session_id: &str,
        content: &str,
    ) -> Result<String, AppError> {
        let nav = self.nav(catalog, active, false)?;
        let headers = serde_json::json!({ "X-Session-ID": session_id }).to_string();
        self.render(
            "shell.html",
            context! {
                theme => theme.as_str(),
                next_theme => theme.toggled().as_str(),
                hx_headers => headers,
                nav => minijinja::Value::from_safe_string(nav),
                content => minijinja::Value::from_safe_string(content.to_string()),
            },
        )
    }

    /// Table page: title with count, add button, one row per record plus actions.
    pub fn list(
        &self,
        descriptor: &TableDescriptor,
        rows: &[Row],
        alert: Option<(NoticeKind, &str)>,
    ) -> Result<String, AppError> {
        let views: Vec<RowView> = rows
            .iter()
            .map(|row| RowView {
                id: row
                    .get(&descriptor.primary_key)
                    .and_then(value_text)
                    .unwrap_or_default(),
                cells: descriptor.columns.iter().map(|c| cell(c, row.get(&c.key))).collect(),
            })
            .collect();
        let labels: Vec<&str> = descriptor.columns.iter().map(|c| c.label.as_str()).collect();
        self.render(
            "list.html",
            context! {
                table => &descriptor.name,
                title => &descriptor.title,
                singular => &descriptor.singular,
                labels => labels,
                rows => views,
                count => rows.len(),
                colspan => descriptor.columns.len() + 1,
                alert_kind => alert.map(|(k, _)| k.alert()),
                alert => alert.map(|(_, m)| m),
            },
        )
    }

    /// Add or edit form. `values` pre-fill inputs by name; null values are skipped.
    pub fn form(
        &self,
        descriptor: &TableDescriptor,
        target: FormTarget<'_>,
        values: Option<&Row>,
        error: Option<&str>,
    ) -> Result<String, AppError> {
        let create = matches!(target, FormTarget::Create);
        let fields: Vec<FieldView> = descriptor
            .form
            .iter()
            .map(|f| field_view(f, values, create))
            .collect();
        let (heading, id) = match target {
            FormTarget::Create => (format!("Add {}", descriptor.singular), None),
            FormTarget::Edit { id } => (format!("Edit {} #{}", descriptor.singular, id), Some(id)),
        };
        self.render(
            "form.html",
            context! {
                heading => heading,
                table => &descriptor.name,
                id => id,
                fields => fields,
                error => error,
            },
        )
    }

    pub fn confirm_delete(&self, descriptor: &TableDescriptor, id: &str) -> Result<String, AppError> {
        self.render(
            "confirm_delete.html",
            context! {
                singular => &descriptor.singular,
                table => &descriptor.name,
                id => id,
            },
        )
    }

    pub fn dashboard(&self, catalog: &Catalog, data: &Dashboard) -> Result<String, AppError> {
        let medicines = catalog.table("medicines");
        let low_stock: Vec<Vec<Cell>> = match medicines {
            Some(d) => data
                .low_stock
                .iter()
                .map(|row| {
                    d.columns
                        .iter()
                        .filter(|c| c.key == "medicine_name" || c.key == "stock_quantity")
                        .map(|c| cell(c, row.get(&c.key)))
                        .collect()
                })
                .collect(),
            None => Vec::new(),
        };
        let today: Vec<[String; 3]> = data
            .today
            .iter()
            .map(|row| {
                ["timeslot", "patient_name", "doctor_name"]
                    .map(|k| row.get(k).and_then(value_text).unwrap_or_else(|| PLACEHOLDER.to_string()))
            })
            .collect();
        self.render(
            "dashboard.html",
            context! {
                patients => data.patients,
                doctors => data.doctors,
                appointments => data.appointments,
                medicines => data.medicines,
                revenue => format::rupees(data.revenue),
                low_stock => low_stock,
                today => today,
            },
        )
    }

    pub fn queries_page(&self, queries: &[CannedQuery]) -> Result<String, AppError> {
        #[derive(Serialize)]
        struct QueryView<'a> {
            index: usize,
            name: &'a str,
            description: &'a str,
            sql: String,
        }
        let views: Vec<QueryView> = queries
            .iter()
            .enumerate()
            .map(|(index, q)| QueryView {
                index,
                name: &q.name,
                description: q.description,
                sql: q.sql(),
            })
            .collect();
        self.render("queries.html", context! { schema_sql => schema::SCHEMA_SQL, queries => views })
    }

    /// Result of one canned query, or the store's error.
    pub fn query_result(&self, result: Result<&QueryResult, &str>) -> Result<String, AppError> {
        match result {
            Ok(r) => {
                let rows: Vec<Vec<String>> = r
                    .rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|v| value_text(v).unwrap_or_else(|| PLACEHOLDER.to_string()))
                            .collect()
                    })
                    .collect();
                self.render(
                    "query_result.html",
                    context! {
                        headers => &r.headers,
                        rows => rows,
                        total => r.total,
                        truncated => r.truncated,
                        error => None::<&str>,
                    },
                )
            }
            Err(msg) => self.render("query_result.html", context! { error => msg }),
        }
    }

    pub fn triggers_page(&self) -> Result<String, AppError> {
        self.render(
            "triggers.html",
            context! { stock_sql => schema::STOCK_TRIGGER_SQL, bill_sql => schema::BILL_TRIGGER_SQL },
        )
    }

    pub fn transactions_page(&self) -> Result<String, AppError> {
        self.render(
            "transactions.html",
            context! {
                flow_sql => schema::APPOINTMENT_FLOW_SQL,
                rollback_sql => schema::ROLLBACK_SQL,
                restock_sql => schema::RESTOCK_SQL,
                full_sql => schema::FULL_TRANSACTION_SQL,
            },
        )
    }

    pub fn demo_result(&self, kind: NoticeKind, title: &str, lines: &[String]) -> Result<String, AppError> {
        self.render(
            "demo_result.html",
            context! { kind => kind.alert(), title => title, lines => lines },
        )
    }

    /// Toast appended to the notification area out of band.
    pub fn notice(&self, kind: NoticeKind, message: &str) -> Result<String, AppError> {
        self.render("notice.html", context! { kind => kind, message => message })
    }

    pub fn error(&self, code: &str, message: &str) -> Result<String, AppError> {
        self.render("error.html", context! { code => code, message => message })
    }
}

/// Error block plus an error toast. Falls back to a fixed block if rendering fails.
pub fn error_fragment(code: &str, message: &str) -> String {
    let r = renderer();
    match (r.error(code, message), r.notice(NoticeKind::Error, message)) {
        (Ok(block), Ok(toast)) => block + &toast,
        (Ok(block), Err(_)) => block,
        _ => r#"<div class="empty-state"><h3>Something went wrong</h3></div>"#.to_string(),
    }
}
