//! Command-line interface
//!
//! - `expense-tui` / `expense-tui tui` - interactive terminal UI
//! - `expense-tui categories` - print the category list
//! - `expense-tui expenses` - print one page of expenses grouped by date
//! - `expense-tui export` - write matching expenses to CSV
//! - `expense-tui token` - manage the stored API token

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use expense_tui::api::auth::DevFallback;
use expense_tui::api::transport::ReqwestTransport;
use expense_tui::api::{ApiClient, AuthAttachment, CategoryService, ExpenseService};
use expense_tui::config::Settings;
use expense_tui::error::ApiError;
use expense_tui::export::write_expenses_csv;
use expense_tui::models::category::Category;
use expense_tui::models::criteria::{AllCategoryCriteria, ExpenseCriteria, Sort};
use expense_tui::models::expense::Expense;
use expense_tui::storage::{MemoryTokenStore, SqliteTokenStore, TokenStore};
use expense_tui::ui::grouping::{group_by_date, total};
use expense_tui::ui::month::MonthCursor;

pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    /// The backend rejected the request or could not be reached.
    pub const API_ERROR: i32 = 2;
    pub const UNAUTHORIZED: i32 = 3;
}

/// Prefix of environment variables that seed the session token store.
pub const SESSION_ENV_PREFIX: &str = "EXPENSE_TUI";

/// Expense tracker client for a REST backend.
///
/// Defaults to the terminal UI when no subcommand is given.
#[derive(Parser, Debug)]
#[command(name = "expense-tui")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Backend root URL, e.g. http://localhost:8080
    #[arg(long = "api-url", global = true, env = "EXPENSE_TUI_API_URL")]
    pub api_url: Option<String>,

    /// Development token used when no stored token exists
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to this file
    #[arg(long = "log-file", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the interactive terminal UI (default command)
    Tui,

    /// Print all categories
    Categories(CategoriesArgs),

    /// Print one page of expenses grouped by date
    Expenses(ExpensesArgs),

    /// Write all matching expenses to a CSV file
    Export(ExportArgs),

    /// Manage the API token kept in local storage
    #[command(subcommand)]
    Token(TokenCommand),
}

#[derive(Args, Debug)]
pub struct CategoriesArgs {
    /// Only categories whose name contains this text
    #[arg(long)]
    pub name: Option<String>,

    /// Sort as `field,direction`
    #[arg(long, default_value = "name,asc")]
    pub sort: Sort,
}

#[derive(Args, Debug, Clone)]
pub struct ExpenseFilter {
    /// Month as YYYY-MM (defaults to the current month)
    #[arg(long)]
    pub month: Option<String>,

    /// Only expenses whose name contains this text
    #[arg(long)]
    pub name: Option<String>,

    /// Restrict to a category id; repeatable
    #[arg(long = "category")]
    pub categories: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ExpensesArgs {
    #[command(flatten)]
    pub filter: ExpenseFilter,

    /// Zero-based page number
    #[arg(long, default_value = "0")]
    pub page: u32,

    /// Sort as `field,direction` (defaults to the configured expense sort)
    #[arg(long)]
    pub sort: Option<Sort>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub filter: ExpenseFilter,

    /// Output file, `-` for stdout
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Store a token for later requests
    Set { value: String },
    /// Remove every stored token
    Clear,
}

/// Everything the commands need, built from settings and flags.
pub struct AppContext {
    pub settings: Settings,
    pub local_store: Arc<dyn TokenStore>,
    pub category_service: Arc<CategoryService>,
    pub expense_service: Arc<ExpenseService>,
}

impl AppContext {
    pub fn build(cli: &Cli) -> Result<Self> {
        let mut settings = Settings::load(cli.config.as_deref())?;
        if let Some(url) = &cli.api_url {
            settings.api_base_url = url.clone();
        }

        let local_store: Arc<dyn TokenStore> = match Settings::data_dir() {
            Some(dir) => {
                let path = dir.join("storage.db");
                Arc::new(
                    SqliteTokenStore::open(&path)
                        .with_context(|| format!("Failed to open token store at {}", path.display()))?,
                )
            }
            None => {
                tracing::warn!("No data directory available, tokens will not be persisted");
                Arc::new(SqliteTokenStore::in_memory()?)
            }
        };
        let session_store = Arc::new(MemoryTokenStore::from_env(SESSION_ENV_PREFIX, &settings.token_keys));

        let dev_fallback = (!settings.production).then(|| DevFallback {
            configured: settings.auth_token.clone(),
            launch: cli.token.clone(),
        });
        let auth = AuthAttachment::new(local_store.clone(), session_store)
            .with_keys(settings.token_keys.clone())
            .with_dev_fallback(dev_fallback);

        let transport = ReqwestTransport::new(&settings.api_base_url, settings.request_timeout())?;
        tracing::debug!("Using backend at {}", transport.base_url());
        let client = Arc::new(ApiClient::new(Arc::new(transport)).with_auth(auth));

        Ok(Self {
            settings,
            local_store,
            category_service: Arc::new(CategoryService::new(client.clone())),
            expense_service: Arc::new(ExpenseService::new(client)),
        })
    }

    fn expense_criteria(&self, filter: &ExpenseFilter) -> Result<ExpenseCriteria> {
        let month = match &filter.month {
            Some(raw) => MonthCursor::parse(raw).with_context(|| format!("Invalid month '{raw}', expected YYYY-MM"))?,
            None => MonthCursor::current(),
        };
        Ok(ExpenseCriteria {
            page: 0,
            size: self.settings.page_size,
            sort: self.settings.expense_sort()?,
            category_ids: filter.categories.clone(),
            name: filter.name.clone().filter(|n| !n.trim().is_empty()),
            year_month: Some(month.year_month()),
        })
    }
}

pub async fn run_categories(ctx: &AppContext, args: CategoriesArgs) -> Result<()> {
    let criteria = AllCategoryCriteria { sort: Some(args.sort), name: args.name };
    let categories = ctx.category_service.list_all(&criteria).await?;
    print!("{}", format_categories(&categories));
    Ok(())
}

pub async fn run_expenses(ctx: &AppContext, args: ExpensesArgs) -> Result<()> {
    let mut criteria = ctx.expense_criteria(&args.filter)?;
    criteria.page = args.page;
    if let Some(sort) = args.sort {
        criteria.sort = sort;
    }
    let page = ctx.expense_service.get_expenses(&criteria).await?;
    print!("{}", format_expenses(&page.content));
    println!(
        "Page {} of {} ({} expenses)",
        page.number + 1,
        page.total_pages.max(1),
        page.total_elements
    );
    Ok(())
}

pub async fn run_export(ctx: &AppContext, args: ExportArgs) -> Result<()> {
    let criteria = ctx.expense_criteria(&args.filter)?;
    let expenses = ctx.expense_service.fetch_all(&criteria).await?;

    let count = if args.output.as_os_str() == "-" {
        write_expenses_csv(std::io::stdout().lock(), &expenses)?
    } else {
        let file = std::fs::File::create(&args.output)
            .with_context(|| format!("Failed to create {}", args.output.display()))?;
        let count = write_expenses_csv(file, &expenses)?;
        eprintln!("Exported {} expenses to {}", count, args.output.display());
        count
    };
    tracing::info!("Exported {} expenses", count);
    Ok(())
}

pub fn run_token(ctx: &AppContext, command: TokenCommand) -> Result<()> {
    match command {
        TokenCommand::Set { value } => {
            let value = value.trim();
            if value.is_empty() {
                anyhow::bail!("Token must not be empty");
            }
            ctx.local_store.set("token", value)?;
            println!("Token stored");
        }
        TokenCommand::Clear => {
            for key in &ctx.settings.token_keys {
                ctx.local_store.remove(key)?;
            }
            println!("Stored tokens cleared");
        }
    }
    Ok(())
}

pub fn format_categories(categories: &[Category]) -> String {
    if categories.is_empty() {
        return "No categories found\n".to_string();
    }
    let mut out = String::new();
    for category in categories {
        let id = category.id.as_deref().unwrap_or("-");
        let _ = writeln!(out, "{:>6}  {}", id, category.name);
    }
    out
}

pub fn format_expenses(expenses: &[Expense]) -> String {
    if expenses.is_empty() {
        return "No expenses found\n".to_string();
    }
    let mut out = String::new();
    for group in group_by_date(expenses) {
        let _ = writeln!(out, "{}  {:.2}", group.date.format("%a %Y-%m-%d"), group.total);
        for expense in group.expenses {
            let _ = writeln!(
                out,
                "  {:<30} {:>10.2}  {}",
                expense.name,
                expense.amount,
                expense.category_name()
            );
        }
    }
    let _ = writeln!(out, "Total {:.2}", total(expenses));
    out
}

/// Map an error to a process exit code.
pub fn categorize_error(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<ApiError>() {
        Some(api) if api.is_unauthorized() => exit_codes::UNAUTHORIZED,
        Some(_) => exit_codes::API_ERROR,
        None => exit_codes::UNEXPECTED_FAILURE,
    }
}
