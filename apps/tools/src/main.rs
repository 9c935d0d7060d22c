use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use shared::{
    domain::{EmitterId, DEFAULT_ROLE},
    protocol::CreateUserRequest,
};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/scontrini.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateEmitter {
        name: String,
        #[arg(long)]
        printer_host: Option<String>,
        #[arg(long)]
        printer_port: Option<u16>,
    },
    CreateUser {
        username: String,
        password: String,
        #[arg(long, default_value = DEFAULT_ROLE)]
        role: String,
        #[arg(long)]
        emitter_id: Option<i64>,
        #[arg(long)]
        given_name: Option<String>,
        #[arg(long)]
        family_name: Option<String>,
    },
    ListUsers {
        #[arg(long)]
        emitter_id: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateEmitter {
            name,
            printer_host,
            printer_port,
        } => {
            let emitter_id = storage
                .create_emitter(&name, printer_host.as_deref(), printer_port)
                .await?;
            println!("created emitter_id={}", emitter_id.0);
        }
        Command::CreateUser {
            username,
            password,
            role,
            emitter_id,
            given_name,
            family_name,
        } => {
            let username = username.trim().to_string();
            if storage.username_exists(&username).await? {
                bail!("username '{username}' already exists");
            }
            let user = storage
                .create_user(&CreateUserRequest {
                    username,
                    password,
                    given_name,
                    family_name,
                    role: Some(role),
                    emitter_id: emitter_id.map(EmitterId),
                    ..Default::default()
                })
                .await?;
            println!("created user_id={} username={}", user.id.0, user.username);
        }
        Command::ListUsers { emitter_id } => {
            for user in storage.list_users(emitter_id.map(EmitterId)).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    user.id.0,
                    user.username,
                    user.role.as_deref().unwrap_or("-"),
                    user.emitter_id.map(|id| id.0.to_string()).unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
