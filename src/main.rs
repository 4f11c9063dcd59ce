use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;

use expense_tui::config::Settings;
use expense_tui::logging;
use expense_tui::models::criteria::{CategoryCriteria, ExpenseCriteria};
use expense_tui::ui::app::{App, AppMessage};
use expense_tui::ui::render;

mod cli;

use cli::{AppContext, Cli, Commands, exit_codes};

const TICK_RATE: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();
    let is_tui = matches!(cli.command, None | Some(Commands::Tui));

    // The terminal UI owns the screen, so it always logs to a file.
    let log_file: Option<PathBuf> = cli.log_file.clone().or_else(|| {
        is_tui
            .then(Settings::data_dir)
            .flatten()
            .map(|dir| dir.join("expense-tui.log"))
    });
    if let Err(e) = logging::init(cli.verbose, log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    let ctx = match AppContext::build(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    let result = match cli.command {
        None | Some(Commands::Tui) => run_tui(&ctx).await,
        Some(Commands::Categories(args)) => cli::run_categories(&ctx, args).await,
        Some(Commands::Expenses(args)) => cli::run_expenses(&ctx, args).await,
        Some(Commands::Export(args)) => cli::run_export(&ctx, args).await,
        Some(Commands::Token(command)) => cli::run_token(&ctx, command),
    };

    match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            cli::categorize_error(&e)
        }
    }
}

async fn run_tui(ctx: &AppContext) -> Result<()> {
    let settings = &ctx.settings;
    let category_criteria = CategoryCriteria {
        size: settings.page_size,
        sort: settings.category_sort()?,
        ..CategoryCriteria::default()
    };
    let expense_criteria = ExpenseCriteria {
        size: settings.page_size,
        sort: settings.expense_sort()?,
        ..ExpenseCriteria::default()
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let mut app = App::new(
        ctx.category_service.clone(),
        ctx.expense_service.clone(),
        category_criteria,
        expense_criteria,
        settings.search_debounce(),
        tx,
    );

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    tracing::info!("Starting terminal UI against {}", settings.api_base_url);
    app.start();
    let res = run_app(&mut terminal, &mut app, rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut rx: mpsc::UnboundedReceiver<AppMessage>,
) -> Result<()> {
    loop {
        while let Ok(message) = rx.try_recv() {
            app.handle_message(message, Instant::now());
        }
        app.tick(Instant::now());

        terminal.draw(|f| render::draw(f, app))?;

        if app.should_quit {
            return Ok(());
        }

        // Short poll so spawned requests and the search debounce keep moving.
        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key, Instant::now());
                }
            }
        }
    }
}
