use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use crossterm::cursor::SetCursorStyle;
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;

mod app;
mod clipboard;
mod command;
mod config;
mod context;
mod controller;
mod default_config;
mod engine;
mod error;
mod events;
mod session;
mod text_layout;
mod theme;
mod ui;

use app::{App, PathPrompt};
use clipboard::SystemClipboard;
use config::AppConfig;
use controller::Controller;
use error::SubmitError;
use events::AppEvent;
use session::Session;
use theme::Theme;

const LOG_FILE_NAME: &str = "gcc.log";
const LOG_FILTER_ENV: &str = "GCC_LOG";
const SCROLL_STEP: u16 = 1;
const PAGE_STEP: u16 = 5;
const EMPTY_PROMPT_EXIT: u8 = 2;
const INTERRUPTED_EXIT: u8 = 130;

/// Terminal front end for the Gemini command-line tool.
#[derive(Debug, Parser)]
#[command(name = "gemini-control-center", version)]
struct Args {
    /// Program to run instead of the configured tool
    #[arg(long)]
    tool: Option<String>,

    /// Model to select at startup
    #[arg(long)]
    model: Option<String>,

    /// Seconds before a running request is killed
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Config file (defaults to ~/.gemini-control-center/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Theme file
    #[arg(long, default_value = "theme.toml")]
    theme: PathBuf,

    /// Run one prompt without the TUI and print the reply
    #[arg(long)]
    prompt: Option<String>,

    /// Text file to include as context (repeatable)
    #[arg(long = "text-file")]
    text_files: Vec<PathBuf>,

    /// Image to pass to the tool
    #[arg(long)]
    image_file: Option<PathBuf>,

    /// Print the command that would run and exit
    #[arg(long, requires = "prompt")]
    print_command: bool,

    /// Print results as JSON
    #[arg(long, requires = "prompt")]
    json: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing();

    let mut config = AppConfig::load(args.config.as_deref())?;
    apply_overrides(&mut config, &args)?;
    tracing::info!(program = %config.tool.program, "configuration loaded");

    if let Some(prompt) = args.prompt.as_deref() {
        return run_headless(&args, &config, prompt);
    }

    run_tui(&args, config)?;
    Ok(ExitCode::SUCCESS)
}

/// Logs go to a file so they never land on the TUI's screen. Best effort:
/// without a home directory the app runs without logging.
fn init_tracing() {
    let Ok(log_dir) = config::app_dir() else {
        return;
    };
    if std::fs::create_dir_all(&log_dir).is_err() {
        return;
    }
    let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME)) else {
        return;
    };

    use tracing_subscriber::EnvFilter;
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .try_init();
}

fn apply_overrides(config: &mut AppConfig, args: &Args) -> anyhow::Result<()> {
    if let Some(tool) = args.tool.as_deref() {
        let tool = tool.trim();
        if tool.is_empty() {
            anyhow::bail!("--tool must not be empty");
        }
        config.tool.program = tool.to_string();
    }
    if let Some(timeout_secs) = args.timeout_secs {
        if timeout_secs == 0 {
            anyhow::bail!("--timeout-secs must be greater than zero");
        }
        config.tool.timeout_secs = timeout_secs;
    }
    Ok(())
}

fn selected_model(args: &Args, config: &AppConfig) -> String {
    args.model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .or_else(|| {
            config
                .models
                .available
                .iter()
                .map(|model| model.trim())
                .find(|model| !model.is_empty())
        })
        .unwrap_or_default()
        .to_string()
}

fn run_headless(args: &Args, config: &AppConfig, prompt: &str) -> anyhow::Result<ExitCode> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        eprintln!("Not sent: {}.", SubmitError::EmptyPrompt);
        return Ok(ExitCode::from(EMPTY_PROMPT_EXIT));
    }

    let mut session = Session::default();
    for path in &args.text_files {
        session.context.add_text(path.clone());
    }
    if let Some(path) = &args.image_file {
        session.context.add_image(path.clone());
    }
    let model = selected_model(args, config);
    let built = session.build(&config.tool.program, &model, prompt);
    for warning in &built.warnings {
        eprintln!("{warning}");
    }

    if args.print_command {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&built.spec)?);
        } else {
            println!("{}", built.spec.to_shell_string());
        }
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(warning) = config::api_key_warning(&config.tool.api_key_env) {
        eprintln!("Warning: {warning}");
    }
    // The tool runs in its own process group, so Ctrl+C reaches only this
    // process and is forwarded as a cancel.
    interrupt::install();
    let outcome = engine::run_command_cancellable(
        &built.spec,
        config.tool.timeout(),
        &interrupt::REQUESTED,
    );
    tracing::info!(success = outcome.is_success(), "headless request finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let engine::ExecutionOutcome::Success { stdout, stderr } = &outcome {
        if !stderr.is_empty() {
            eprintln!("{stderr}");
        }
        println!("{stdout}");
    } else if let Some(report) = outcome.error_report() {
        eprintln!("{report}");
    }

    Ok(match outcome {
        engine::ExecutionOutcome::Success { .. } => ExitCode::SUCCESS,
        engine::ExecutionOutcome::Cancelled => ExitCode::from(INTERRUPTED_EXIT),
        _ => ExitCode::FAILURE,
    })
}

mod interrupt {
    use std::sync::atomic::AtomicBool;

    /// Set once SIGINT or SIGTERM arrives during a headless run.
    pub static REQUESTED: AtomicBool = AtomicBool::new(false);

    #[cfg(unix)]
    extern "C" fn on_signal(_signal: libc::c_int) {
        REQUESTED.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(unix)]
    pub fn install() {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: the handler only stores to an atomic, which is
        // async-signal-safe.
        unsafe {
            libc::signal(libc::SIGINT, handler);
            libc::signal(libc::SIGTERM, handler);
        }
    }

    #[cfg(not(unix))]
    pub fn install() {}
}

fn run_tui(args: &Args, config: AppConfig) -> io::Result<()> {
    let theme = Theme::load_or_default(&args.theme);
    let mut app = App::new(config.models.available.clone(), &config.tool.program);
    if let Some(model) = args.model.as_deref() {
        app.select_model(model);
    }
    let mut controller = Controller::new(config.tool, Box::new(SystemClipboard::default()));

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste,
        SetCursorStyle::SteadyBar
    )?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    let result = run_app(&mut terminal, app, &mut controller, &theme);
    controller.shutdown();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        SetCursorStyle::DefaultUserShape,
        DisableBracketedPaste,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    controller: &mut Controller,
    theme: &Theme,
) -> io::Result<()> {
    controller.startup(&mut app);

    while app.running {
        controller.poll(&mut app);
        terminal.draw(|frame| ui::render(frame, &app, theme))?;

        let event = events::next_event()?;
        let size = terminal.size()?;
        let screen = Rect::new(0, 0, size.width, size.height);
        handle_event(&mut app, controller, screen, event);
    }

    Ok(())
}

fn handle_event(app: &mut App, controller: &mut Controller, screen: Rect, event: AppEvent) {
    match event {
        AppEvent::Tick => app.on_tick(),
        AppEvent::Quit => app.quit(),
        AppEvent::NextPane => app.next_pane(),
        AppEvent::PrevPane => app.prev_pane(),
        AppEvent::ScrollUp | AppEvent::MouseScrollUp => {
            app.scroll_up(SCROLL_STEP, ui::active_max_scroll(screen, app));
        }
        AppEvent::ScrollDown | AppEvent::MouseScrollDown => {
            app.scroll_down(SCROLL_STEP, ui::active_max_scroll(screen, app));
        }
        AppEvent::PageUp => app.scroll_up(PAGE_STEP, ui::active_max_scroll(screen, app)),
        AppEvent::PageDown => app.scroll_down(PAGE_STEP, ui::active_max_scroll(screen, app)),
        AppEvent::CursorLeft => app.move_cursor_left(),
        AppEvent::CursorRight => app.move_cursor_right(),
        AppEvent::CursorUp => app.move_cursor_up(ui::input_text_width(screen, app)),
        AppEvent::CursorDown => app.move_cursor_down(ui::input_text_width(screen, app)),
        AppEvent::InputChar(c) => app.input_char(c),
        AppEvent::Newline => app.input_char('\n'),
        AppEvent::Paste(text) => app.insert_text(&text),
        AppEvent::Backspace => app.backspace_input(),
        AppEvent::Submit => controller.submit_input(app),
        AppEvent::Cancel => {
            if app.close_path_prompt().is_some() {
                app.set_status("No file selected.");
            }
        }
        AppEvent::NextModel => {
            app.next_model();
            app.set_status(format!("Model: {}", app.model()));
        }
        AppEvent::LoadTextFile => app.open_path_prompt(PathPrompt::Text),
        AppEvent::LoadImageFile => app.open_path_prompt(PathPrompt::Image),
        AppEvent::ClearSession => controller.clear_session(app),
        AppEvent::CopyCommand => controller.copy_last_command(app),
        AppEvent::MouseLeftClick(column, row) => {
            if let Some(pane) = ui::pane_hit_test(screen, app, column, row) {
                app.active_pane = pane;
            }
        }
    }
}
