//! Console commands typed by the operator.

use client_core::{Area, SettingsEntry};
use shared::domain::OperatorId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Login { username: String, password: String },
    Logout,
    Area(Area),
    Entry(SettingsEntry),
    Users,
    Back,
    Status,
    ListUsers,
    AddUser {
        username: String,
        password: String,
        role: Option<String>,
    },
    SetRole { user_id: OperatorId, role: String },
    RemoveUser(OperatorId),
    Help,
    Quit,
}

pub const HELP: &str = "\
login <username> <password>   sign in
logout                        sign out
area <receipt|menu1|menu2|settings>
entry <name>                  activate a settings grid entry
users                         open user management (admin)
back                          return to the settings grid
status                        session, health and navigation
list                          list users of your emitter
add <username> <password> [role]
role <id> <role>
remove <id>
quit";

pub fn parse(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        // Password stays empty when omitted so the client reports missing credentials.
        ("login", [username]) => ConsoleCommand::Login {
            username: username.to_string(),
            password: String::new(),
        },
        ("login", [username, password]) => ConsoleCommand::Login {
            username: username.to_string(),
            password: password.to_string(),
        },
        ("logout", []) => ConsoleCommand::Logout,
        ("area", [name]) => ConsoleCommand::Area(parse_area(name)?),
        ("entry", words) if !words.is_empty() => ConsoleCommand::Entry(parse_entry(&words.join(" "))?),
        ("users", []) => ConsoleCommand::Users,
        ("back", []) => ConsoleCommand::Back,
        ("status", []) => ConsoleCommand::Status,
        ("list", []) => ConsoleCommand::ListUsers,
        ("add", [username, password]) => ConsoleCommand::AddUser {
            username: username.to_string(),
            password: password.to_string(),
            role: None,
        },
        ("add", [username, password, role]) => ConsoleCommand::AddUser {
            username: username.to_string(),
            password: password.to_string(),
            role: Some(role.to_string()),
        },
        ("role", [id, role]) => ConsoleCommand::SetRole {
            user_id: parse_user_id(id)?,
            role: role.to_string(),
        },
        ("remove", [id]) => ConsoleCommand::RemoveUser(parse_user_id(id)?),
        ("help", []) => ConsoleCommand::Help,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        _ => return Err(format!("unrecognised command '{}'; type 'help'", line.trim())),
    };
    Ok(command)
}

fn parse_area(name: &str) -> Result<Area, String> {
    match name.to_ascii_lowercase().as_str() {
        "receipt" => Ok(Area::Receipt),
        "menu1" | "menu-a" => Ok(Area::MenuA),
        "menu2" | "menu-b" => Ok(Area::MenuB),
        "settings" => Ok(Area::Settings),
        other => Err(format!("unknown area '{other}'")),
    }
}

fn parse_entry(name: &str) -> Result<SettingsEntry, String> {
    SettingsEntry::ALL
        .into_iter()
        .find(|entry| entry.title().eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("unknown settings entry '{name}'"))
}

fn parse_user_id(raw: &str) -> Result<OperatorId, String> {
    raw.parse::<i64>()
        .map(OperatorId)
        .map_err(|_| format!("invalid user id '{raw}'"))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
