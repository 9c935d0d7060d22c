use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{
    config::load_settings, Area, ClientEvent, LoginForm, NavigationState, SettingsView,
    TerminalClient,
};
use shared::{
    domain::HealthStatus,
    protocol::{CreateUserRequest, UpdateUserRequest},
};
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::{
        broadcast::{self, error::RecvError},
        Mutex,
    },
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{parse, ConsoleCommand, HELP};

#[derive(Parser, Debug)]
struct Args {
    /// Overrides the server url from the settings file and environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long, default_value = "terminal.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config);
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    info!(server_url = %settings.server_url, "terminal starting");

    let client = TerminalClient::connect(settings)?;
    let clock_label = Arc::new(Mutex::new(String::new()));
    let printer = tokio::spawn(print_events(client.subscribe_events(), Arc::clone(&clock_label)));
    let clock = client.spawn_clock();

    println!("not authenticated; type 'help' for commands");
    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse(&line) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(command) => run(&client, command, &clock_label).await,
            Err(message) => println!("{message}"),
        }
    }

    client.logout().await;
    clock.abort();
    printer.abort();
    Ok(())
}

async fn run(client: &TerminalClient, command: ConsoleCommand, clock_label: &Mutex<String>) {
    match command {
        ConsoleCommand::Login { username, password } => {
            let mut form = LoginForm::new();
            form.set_username(username);
            form.set_password(password);
            if let Err(error) = client.submit_login(&mut form).await {
                println!("login failed: {error}");
            }
        }
        ConsoleCommand::Logout => client.logout().await,
        ConsoleCommand::Area(area) => report(client.select_area(area).await),
        ConsoleCommand::Entry(entry) => report(client.activate_entry(entry).await),
        ConsoleCommand::Users => report(client.open_user_management().await),
        ConsoleCommand::Back => client.back().await,
        ConsoleCommand::Status => print_status(client, &clock_label.lock().await).await,
        ConsoleCommand::ListUsers => match client.list_users().await {
            Ok(users) if users.is_empty() => println!("no users"),
            Ok(users) => {
                for user in users {
                    println!(
                        "{:>4}  {:<16} {:<8} {} {}",
                        user.id.0,
                        user.username,
                        user.role.as_deref().unwrap_or("-"),
                        user.given_name.as_deref().unwrap_or_default(),
                        user.family_name.as_deref().unwrap_or_default(),
                    );
                }
            }
            Err(error) => println!("{error}"),
        },
        ConsoleCommand::AddUser {
            username,
            password,
            role,
        } => {
            let request = CreateUserRequest {
                username,
                password,
                role,
                ..Default::default()
            };
            match client.create_user(request).await {
                Ok(user) => println!("created user {} ({})", user.id.0, user.username),
                Err(error) => println!("{error}"),
            }
        }
        ConsoleCommand::SetRole { user_id, role } => {
            let request = UpdateUserRequest {
                role: Some(role),
                ..Default::default()
            };
            match client.update_user(user_id, request).await {
                Ok(user) => println!(
                    "user {} is now {}",
                    user.id.0,
                    user.role.as_deref().unwrap_or("-")
                ),
                Err(error) => println!("{error}"),
            }
        }
        ConsoleCommand::RemoveUser(user_id) => match client.delete_user(user_id).await {
            Ok(()) => println!("removed user {}", user_id.0),
            Err(error) => println!("{error}"),
        },
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => {}
    }
}

fn report<E: std::fmt::Display>(result: Result<(), E>) {
    if let Err(error) = result {
        println!("{error}");
    }
}

async fn print_status(client: &TerminalClient, clock_label: &str) {
    let session = client.session().await;
    let badge = session
        .identity()
        .map(|identity| identity.badge())
        .unwrap_or_else(|| "not authenticated".to_string());
    let health = client.health().await;
    println!("{clock_label}  {badge}");
    println!(
        "server: {}  printer: {}",
        health_label(health.server),
        health_label(health.printer)
    );
    println!("view: {}", navigation_label(client.navigation().await));
}

fn health_label(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Unknown => "unknown",
        HealthStatus::Healthy => "online",
        HealthStatus::Unhealthy => "offline",
    }
}

fn navigation_label(state: NavigationState) -> String {
    match state.area {
        None => "home".to_string(),
        Some(area @ Area::Settings) => match state.settings_view {
            SettingsView::Grid => format!("{} (grid)", area.title()),
            SettingsView::UserManagement => format!("{} / Users", area.title()),
        },
        Some(area) => area.title().to_string(),
    }
}

async fn print_events(
    mut events: broadcast::Receiver<ClientEvent>,
    clock_label: Arc<Mutex<String>>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        match event {
            ClientEvent::ClockTick(label) => *clock_label.lock().await = label,
            ClientEvent::SessionStarted(identity) => println!("signed in: {}", identity.badge()),
            ClientEvent::SessionEnded => println!("signed out"),
            ClientEvent::HealthChanged { service, status } => {
                println!("{service}: {}", health_label(status))
            }
            ClientEvent::NavigationChanged(state) => println!("view: {}", navigation_label(state)),
            ClientEvent::Denied(message) => println!("denied: {message}"),
        }
    }
}
