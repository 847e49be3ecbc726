//! # rasman
//!
//! Command-line console for a Retro AIM Server.
//!
//! One-shot subcommands print a page and exit; `browse` opens an
//! interactive loop over one list, where rows can be pressed and their
//! actions run by number.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use rasman_api::ApiClient;
use rasman_console::controllers::{
    ChatRoomsController, DashboardController, DirectoryController, MessageComposer,
    SessionsController, UserDetailsController, UsersController,
};
use rasman_console::list::{Banner, CrudList, Phase};
use rasman_console::prompt::{AutoConfirm, Prompter, TerminalPrompter};
use rasman_console::settings::SettingsService;
use rasman_console::state::AppState;
use rasman_console::{init_tracing, render};
use rasman_shared::constants::SESSION_REFRESH_INTERVAL;
use rasman_shared::SuspendedStatus;
use rasman_store::Database;

#[derive(Parser)]
#[command(name = "rasman", version, about = "Administer a Retro AIM Server")]
struct Cli {
    /// API base URL, overriding the stored setting for this run
    #[arg(long, env = "RASMAN_API_URL", global = true)]
    api_url: Option<String>,

    /// Settings database (`:memory:` keeps nothing)
    #[arg(long, env = "RASMAN_DB", global = true)]
    db: Option<PathBuf>,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show or change stored settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Server statistics
    Dashboard,
    /// User accounts
    #[command(subcommand)]
    Users(UsersCommand),
    /// Active sessions
    #[command(subcommand)]
    Sessions(SessionsCommand),
    /// Public chat rooms
    #[command(subcommand)]
    Rooms(RoomsCommand),
    /// Keyword directory
    #[command(subcommand)]
    Directory(DirectoryCommand),
    /// Send an instant message from the admin account
    Message {
        to: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Interactive list
    Browse { page: Page },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    SetUrl { url: String },
    SetAdmin { screen_name: String },
}

#[derive(Subcommand)]
enum UsersCommand {
    List,
    Show {
        screen_name: String,
    },
    Create {
        screen_name: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    Delete {
        screen_name: String,
    },
    ResetPassword {
        screen_name: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// active, deleted, expired, suspended or suspended_age
    SetStatus {
        screen_name: String,
        status: String,
    },
}

#[derive(Subcommand)]
enum SessionsCommand {
    List {
        /// Keep reloading until interrupted
        #[arg(long)]
        watch: bool,
        /// Reload interval in seconds
        #[arg(long, default_value_t = SESSION_REFRESH_INTERVAL.as_secs())]
        interval: u64,
    },
}

#[derive(Subcommand)]
enum RoomsCommand {
    List,
    Create { name: String },
    Delete { name: String },
}

#[derive(Subcommand)]
enum DirectoryCommand {
    Categories,
    Keywords {
        /// Category id, 0 for uncategorized
        #[arg(long, default_value_t = 0)]
        category: i64,
        /// Every keyword of every category
        #[arg(long, conflicts_with = "category")]
        all: bool,
    },
    AddCategory {
        name: String,
    },
    DeleteCategory {
        id: i64,
    },
    AddKeyword {
        name: String,
        #[arg(long, default_value_t = 0)]
        category: i64,
    },
    DeleteKeyword {
        id: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Page {
    Users,
    Sessions,
    Rooms,
    Categories,
    Keywords,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    init_tracing();
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 2. Open the settings store and point the API client at it
    // -----------------------------------------------------------------------
    let db = match cli.db.as_deref() {
        Some(path) if path.as_os_str() == ":memory:" => Database::open_in_memory(),
        Some(path) => Database::open_at(path),
        None => Database::new(),
    }
    .context("Failed to open settings database")?;
    debug!(path = ?db.path(), "Settings database open");

    let settings = Arc::new(
        SettingsService::open(db, ApiClient::unconfigured())
            .context("Failed to load settings")?,
    );
    if let Some(url) = &cli.api_url {
        settings.override_api_url(url);
    }

    let prompter: Arc<dyn Prompter> = if cli.yes {
        Arc::new(AutoConfirm::new(TerminalPrompter::new()))
    } else {
        Arc::new(TerminalPrompter::new())
    };
    let state = AppState::new(settings, prompter);
    info!(api_url = %state.settings.current().api_url, "rasman v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 3. Dispatch
    // -----------------------------------------------------------------------
    match cli.command {
        Command::Config(cmd) => config(&state, cmd),
        Command::Dashboard => dashboard(state).await,
        Command::Users(cmd) => users(state, cmd).await,
        Command::Sessions(cmd) => sessions(state, cmd).await,
        Command::Rooms(cmd) => rooms(state, cmd).await,
        Command::Directory(cmd) => directory(state, cmd).await,
        Command::Message { to, text } => message(state, &to, &text.join(" ")).await,
        Command::Browse { page } => browse(state, page).await,
    }
}

/// Print the outcome banner and turn a failed operation into an error exit.
fn report(ok: bool, banner: Option<Banner>) -> anyhow::Result<()> {
    if let Some(banner) = banner {
        println!("{}", render::banner(&banner));
    }
    if ok {
        Ok(())
    } else {
        Err(anyhow!("operation failed"))
    }
}

/// Print a loaded list.  A load failure is an error exit.
fn show<T: Clone + Send + 'static>(list: &CrudList<T>) -> anyhow::Result<()> {
    print!("{}", render::list(&list.view()));
    if list.phase() == Phase::Error {
        bail!("could not load {}", list.title().to_lowercase());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// One-shot commands
// ---------------------------------------------------------------------------

fn config(state: &AppState, cmd: ConfigCommand) -> anyhow::Result<()> {
    let settings = match cmd {
        ConfigCommand::Show => state.settings.current(),
        ConfigCommand::SetUrl { url } => state.settings.set_api_url(&url)?,
        ConfigCommand::SetAdmin { screen_name } => {
            state.settings.set_admin_screen_name(&screen_name)?
        }
    };

    let admin = if settings.admin_screen_name.is_empty() {
        "(not set)"
    } else {
        settings.admin_screen_name.as_str()
    };
    println!("API URL        {}", settings.api_url);
    println!("Admin          {admin}");
    match settings.last_connected {
        Some(at) => println!("Last saved     {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last saved     never"),
    }
    Ok(())
}

async fn dashboard(state: AppState) -> anyhow::Result<()> {
    let dashboard = DashboardController::new(state);
    dashboard.load().await;
    print!("{}", render::dashboard(&dashboard.snapshot()));
    Ok(())
}

async fn users(state: AppState, cmd: UsersCommand) -> anyhow::Result<()> {
    let prompter = state.prompter.clone();
    let users = UsersController::new(state.clone());

    // Loads the account list, then looks one up.
    let find = |screen_name: String| {
        let users = users.clone();
        async move {
            users.mount().await;
            users
                .find(&screen_name)
                .ok_or_else(|| anyhow!("no user named {screen_name}"))
        }
    };

    let ok = match cmd {
        UsersCommand::List => {
            users.mount().await;
            return show(users.list());
        }
        UsersCommand::Show { screen_name } => {
            let details = UserDetailsController::new(state, &screen_name);
            details.load().await;
            let snapshot = details.snapshot();
            print!("{}", render::user_details(&snapshot));
            return report(snapshot.user.is_some(), None);
        }
        UsersCommand::Create {
            screen_name,
            password,
        } => {
            let password = password_or_prompt(prompter.as_ref(), password).await?;
            users.create_user(&screen_name, &password).await
        }
        UsersCommand::Delete { screen_name } => {
            let user = find(screen_name).await?;
            users.delete_user(user).await
        }
        UsersCommand::ResetPassword {
            screen_name,
            password,
        } => {
            let user = find(screen_name).await?;
            let password = password_or_prompt(prompter.as_ref(), password).await?;
            users.reset_password(&user, &password).await
        }
        UsersCommand::SetStatus {
            screen_name,
            status,
        } => {
            let status = SuspendedStatus::parse_choice(&status)?;
            let user = find(screen_name).await?;
            users.update_status(user, status).await
        }
    };
    report(ok, users.list().banner())
}

async fn password_or_prompt(
    prompter: &dyn Prompter,
    password: Option<String>,
) -> anyhow::Result<String> {
    match password {
        Some(password) if !password.is_empty() => Ok(password),
        _ => prompter
            .ask("Password")
            .await
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("a password is required")),
    }
}

async fn sessions(state: AppState, cmd: SessionsCommand) -> anyhow::Result<()> {
    let SessionsCommand::List { watch, interval } = cmd;
    let sessions = SessionsController::new(state);
    sessions.mount().await;
    if !watch {
        return show(sessions.list());
    }

    print!("{}", render::list(&sessions.list().view()));
    let auto = sessions.start_auto_refresh(Duration::from_secs(interval.max(1)));
    loop {
        tokio::select! {
            _ = sessions.list().changed() => {
                if sessions.list().phase() != Phase::Loading {
                    print!("{}", render::list(&sessions.list().view()));
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    auto.stop();
    Ok(())
}

async fn rooms(state: AppState, cmd: RoomsCommand) -> anyhow::Result<()> {
    let rooms = ChatRoomsController::new(state);
    rooms.mount().await;

    let ok = match cmd {
        RoomsCommand::List => return show(rooms.list()),
        RoomsCommand::Create { name } => rooms.create_room(&name).await,
        RoomsCommand::Delete { name } => {
            let room = rooms
                .find(&name)
                .ok_or_else(|| anyhow!("no chat room named {name}"))?;
            rooms.delete_room(room).await
        }
    };
    report(ok, rooms.list().banner())
}

async fn directory(state: AppState, cmd: DirectoryCommand) -> anyhow::Result<()> {
    let api = state.api.clone();
    let directory = DirectoryController::new(state);
    directory.refresh().await;

    let ok = match cmd {
        DirectoryCommand::Categories => return show(directory.categories()),
        DirectoryCommand::Keywords { all: true, .. } => {
            let keywords = api
                .fetch_all_keywords()
                .await
                .ok_or_else(|| anyhow!("could not load keywords"))?;
            let names: std::collections::HashMap<i64, String> =
                directory.switcher().into_iter().collect();
            for keyword in keywords {
                let category = names
                    .get(&keyword.category_id)
                    .map(String::as_str)
                    .unwrap_or("?");
                println!("{:>6}  {:<24} {category}", keyword.id, keyword.name);
            }
            return Ok(());
        }
        DirectoryCommand::Keywords { category, .. } => {
            directory.select_category(category).await;
            return show(directory.keywords());
        }
        DirectoryCommand::AddCategory { name } => directory.create_category(&name).await,
        DirectoryCommand::DeleteCategory { id } => {
            let category = directory
                .categories()
                .find(|c| c.id == id)
                .ok_or_else(|| anyhow!("no category with id {id}"))?;
            directory.delete_category(category).await
        }
        DirectoryCommand::AddKeyword { name, category } => {
            directory.create_keyword(&name, category).await
        }
        DirectoryCommand::DeleteKeyword { id } => {
            let keyword = api
                .fetch_all_keywords()
                .await
                .and_then(|all| all.into_iter().find(|k| k.id == id))
                .ok_or_else(|| anyhow!("no keyword with id {id}"))?;
            directory.delete_keyword(keyword).await
        }
    };
    report(ok, directory.banner())
}

async fn message(state: AppState, to: &str, text: &str) -> anyhow::Result<()> {
    let composer = MessageComposer::new(state, to);
    composer.set_draft(text);
    let sent = composer.send().await;
    print!("{}", render::composer(&composer));
    sent.map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Interactive browsing
// ---------------------------------------------------------------------------

enum Step {
    Continue,
    Pressed,
    Quit,
}

const BROWSE_HELP: &str =
    "number = open row, number + action id = run action, c = create, r = refresh, control id, q = quit";

/// Show the list and run one operator command against it.
async fn browse_step<T: Clone + Send + 'static>(
    list: &CrudList<T>,
    prompter: &dyn Prompter,
) -> Step {
    let view = list.view();
    print!("{}", render::list(&view));

    let Some(input) = prompter.ask("Command (? for help)").await else {
        return Step::Quit;
    };
    let mut words = input.split_whitespace();
    let Some(first) = words.next() else {
        return Step::Continue;
    };

    match first {
        "q" | "quit" => return Step::Quit,
        "?" | "help" => println!("{BROWSE_HELP}"),
        "r" | "refresh" => {
            list.trigger_refresh().await;
        }
        "c" | "create" => {
            if !list.trigger_create().await {
                println!("Nothing to create here.");
            }
        }
        _ => {
            if let Ok(index) = first.parse::<usize>() {
                let Some(row) = index.checked_sub(1).and_then(|i| view.rows().get(i)) else {
                    println!("No row {index}.");
                    return Step::Continue;
                };
                match words.next() {
                    None => {
                        if row.press().await {
                            return Step::Pressed;
                        }
                        println!("Rows here have no detail view.");
                    }
                    Some(action) => match row.action(action) {
                        Some(bound) => {
                            if !bound.press().await {
                                println!("{}", bound.tooltip);
                            }
                        }
                        None => println!("No action '{action}' on this row."),
                    },
                }
            } else if let Some(control) = view.header.iter().find(|h| h.id == first) {
                control.press().await;
            } else {
                println!("{BROWSE_HELP}");
            }
        }
    }
    Step::Continue
}

async fn browse(state: AppState, page: Page) -> anyhow::Result<()> {
    let prompter = state.prompter.clone();
    let prompter = prompter.as_ref();

    match page {
        Page::Users => {
            let users = UsersController::new(state);
            users.mount().await;
            loop {
                match browse_step(users.list(), prompter).await {
                    Step::Quit => break,
                    Step::Pressed => {
                        if let Some(details) = users.opened_details() {
                            print!("{}", render::user_details(&details.snapshot()));
                        }
                    }
                    Step::Continue => {}
                }
            }
        }
        Page::Sessions => {
            let sessions = SessionsController::new(state);
            sessions.mount().await;
            let _auto = sessions.start_auto_refresh(SESSION_REFRESH_INTERVAL);
            loop {
                match browse_step(sessions.list(), prompter).await {
                    Step::Quit => break,
                    Step::Pressed => {
                        if let Some(composer) = sessions.opened_composer() {
                            compose(&composer, prompter).await;
                        }
                    }
                    Step::Continue => {}
                }
            }
        }
        Page::Rooms => {
            let rooms = ChatRoomsController::new(state);
            rooms.mount().await;
            while !matches!(browse_step(rooms.list(), prompter).await, Step::Quit) {}
        }
        Page::Categories => {
            let directory = DirectoryController::new(state);
            directory.mount().await;
            loop {
                match browse_step(directory.categories(), prompter).await {
                    Step::Quit => break,
                    Step::Pressed => {
                        print!("{}", render::list(&directory.keywords().view()));
                    }
                    Step::Continue => {}
                }
            }
        }
        Page::Keywords => {
            let directory = DirectoryController::new(state);
            directory.mount().await;
            let options: Vec<String> = directory
                .switcher()
                .into_iter()
                .map(|(id, name)| format!("{name} ({id})"))
                .collect();
            if let Some(index) = prompter.choose("Category", &options).await {
                if let Some((id, _)) = directory.switcher().get(index) {
                    directory.select_category(*id).await;
                }
            }
            while !matches!(browse_step(directory.keywords(), prompter).await, Step::Quit) {}
        }
    }
    Ok(())
}

/// Send messages to the composer's target until an empty line.
async fn compose(composer: &MessageComposer, prompter: &dyn Prompter) {
    print!("{}", render::composer(composer));
    while let Some(text) = prompter.ask("Message (empty line to finish)").await {
        if text.trim().is_empty() {
            break;
        }
        composer.set_draft(&text);
        let _ = composer.send().await;
        print!("{}", render::composer(composer));
    }
}
