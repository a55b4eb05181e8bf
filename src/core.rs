//! Command dispatch: wires config, local store, auth session, API
//! client and the two controllers behind a small CLI surface.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::api::ApiClient;
use crate::auth::AuthSession;
use crate::chat::ChatSession;
use crate::config::AppConfig;
use crate::forms;
use crate::store::LocalStore;
use crate::tasks::{SortKey, StatusFilter, TaskListController};
use crate::traits::{ChatApi, TaskApi};
use crate::types::{
    ChatStatus, CreateTaskRequest, Priority, Recurrence, Role, Task, UpdateTaskRequest,
};
use crate::utils::truncate_str;

pub async fn run(config: AppConfig, args: &[String]) -> anyhow::Result<()> {
    let store = Arc::new(LocalStore::new(config.state_dir()));
    let auth = Arc::new(AuthSession::new(store.clone(), &config.auth_base_url())?);

    let command = args.first().map(String::as_str).unwrap_or("tasks");
    let rest = args.get(1..).unwrap_or(&[]);
    let parsed = ParsedArgs::parse(rest).map_err(|e| anyhow::anyhow!(e))?;

    match command {
        "login" => {
            let email = parsed.positional(0, "email")?;
            let password = parsed.positional(1, "password")?;
            // Validated client-side only; the dev-mode server ignores it.
            forms::validate_login(email, password).map_err(|e| anyhow::anyhow!(e))?;
            let resp = auth.login(email).await?;
            println!("Logged in as {}", resp.user_id);
        }
        "signup" => {
            let email = parsed.positional(0, "email")?;
            let name = parsed.positional(1, "name")?;
            let password = parsed.positional(2, "password")?;
            let confirm = parsed.positional(3, "confirm password")?;
            forms::validate_signup(name, email, password, confirm)
                .map_err(|e| anyhow::anyhow!(e))?;
            let resp = auth.signup(email, name).await?;
            println!("Signed up and logged in as {}", resp.user_id);
        }
        "logout" => {
            auth.clear_session();
            println!("Logged out.");
        }
        "whoami" => {
            match auth.current_user() {
                Some(user) => match user.name {
                    Some(name) => println!("{} <{}>", name, user.email),
                    None => println!("{}", user.email),
                },
                None => println!("Not logged in."),
            }
            if let Some(id) = auth.unverified_user_id() {
                println!("token claims user_id: {} (unverified)", id);
            }
        }
        "tasks" => {
            let user_id = require_user(&auth)?;
            let api: Arc<dyn TaskApi> = Arc::new(ApiClient::new(&config.api.base_url, auth)?);
            let mut controller = TaskListController::new(api, &user_id);
            controller.load().await?;

            if let Some(search) = parsed.flag("search") {
                controller.set_search(search);
            }
            if let Some(status) = parsed.flag("status") {
                controller.set_status(
                    StatusFilter::from_str(status).map_err(|e| anyhow::anyhow!(e))?,
                );
            }
            if let Some(priority) = parsed.flag("priority") {
                let filter = if priority == "all" {
                    None
                } else {
                    Some(Priority::from_str(priority).map_err(|e| anyhow::anyhow!(e))?)
                };
                controller.set_priority(filter);
            }
            if let Some(sort) = parsed.flag("sort") {
                controller.set_sort(SortKey::from_str(sort).map_err(|e| anyhow::anyhow!(e))?);
            }

            print_tasks(controller.visible());
        }
        "add" => {
            let user_id = require_user(&auth)?;
            let title = parsed.positionals.join(" ");
            let description = parsed.flag("description").map(str::to_string);
            forms::validate_task_form(&title, description.as_deref())
                .map_err(|e| anyhow::anyhow!(e))?;

            let req = CreateTaskRequest {
                title,
                description,
                completed: None,
                priority: parsed
                    .flag("priority")
                    .map(Priority::from_str)
                    .transpose()
                    .map_err(|e| anyhow::anyhow!(e))?,
                tags: parsed.flag("tags").map(forms::parse_tags).filter(|t| !t.is_empty()),
                due_date: parsed
                    .flag("due")
                    .map(parse_due_date)
                    .transpose()
                    .map_err(|e| anyhow::anyhow!(e))?,
                recurrence: parsed
                    .flag("recur")
                    .map(Recurrence::from_str)
                    .transpose()
                    .map_err(|e| anyhow::anyhow!(e))?,
            };

            let api: Arc<dyn TaskApi> = Arc::new(ApiClient::new(&config.api.base_url, auth)?);
            let mut controller = TaskListController::new(api, &user_id);
            let task = controller.create(&req).await?;
            println!("Created task #{}: {}", task.id, task.title);
        }
        "show" => {
            let user_id = require_user(&auth)?;
            let id: i64 = parsed.positional(0, "task id")?.parse()?;
            let api: Arc<dyn TaskApi> = Arc::new(ApiClient::new(&config.api.base_url, auth)?);
            let task = api.get_task(&user_id, id).await?;
            print_tasks(std::slice::from_ref(&task));
            if let Some(recurrence) = task.recurrence {
                println!("     repeats: {}", recurrence);
            }
            println!("     created {}", task.created_at.format("%Y-%m-%d %H:%M"));
            println!("     updated {}", task.updated_at.format("%Y-%m-%d %H:%M"));
        }
        "edit" => {
            let user_id = require_user(&auth)?;
            let id: i64 = parsed.positional(0, "task id")?.parse()?;
            let title = parsed.flag("title").map(str::to_string);
            let description = parsed.flag("description").map(str::to_string);
            forms::validate_task_update(title.as_deref(), description.as_deref())
                .map_err(|e| anyhow::anyhow!(e))?;

            let req = UpdateTaskRequest {
                title,
                description,
                completed: None,
                priority: parsed
                    .flag("priority")
                    .map(Priority::from_str)
                    .transpose()
                    .map_err(|e| anyhow::anyhow!(e))?,
                tags: parsed.flag("tags").map(forms::parse_tags).filter(|t| !t.is_empty()),
                due_date: parsed
                    .flag("due")
                    .map(parse_due_date)
                    .transpose()
                    .map_err(|e| anyhow::anyhow!(e))?,
                recurrence: parsed
                    .flag("recur")
                    .map(Recurrence::from_str)
                    .transpose()
                    .map_err(|e| anyhow::anyhow!(e))?,
            };

            let api: Arc<dyn TaskApi> = Arc::new(ApiClient::new(&config.api.base_url, auth)?);
            let mut controller = TaskListController::new(api, &user_id);
            controller.load().await?;
            let task = controller.update(id, &req).await?;
            println!("Updated task #{}: {}", task.id, task.title);
        }
        "toggle" => {
            let user_id = require_user(&auth)?;
            let id: i64 = parsed.positional(0, "task id")?.parse()?;
            let api: Arc<dyn TaskApi> = Arc::new(ApiClient::new(&config.api.base_url, auth)?);
            let mut controller = TaskListController::new(api, &user_id);
            controller.load().await?;
            let task = controller.toggle_complete(id).await?;
            let state = if task.completed { "completed" } else { "pending" };
            println!("Task #{} is now {}.", task.id, state);
        }
        "rm" => {
            let user_id = require_user(&auth)?;
            let id: i64 = parsed.positional(0, "task id")?.parse()?;
            let api: Arc<dyn TaskApi> = Arc::new(ApiClient::new(&config.api.base_url, auth)?);
            let mut controller = TaskListController::new(api, &user_id);
            controller.load().await?;
            controller.delete(id).await?;
            println!("Deleted task #{}.", id);
        }
        "chat" => {
            let user_id = require_user(&auth)?;
            let message = parsed.positionals.join(" ");
            if message.trim().is_empty() {
                anyhow::bail!("Usage: ticktask chat <message>");
            }

            let api: Arc<dyn ChatApi> = Arc::new(ApiClient::new(&config.api.base_url, auth)?);
            let mut session = ChatSession::new(api, store, &user_id);
            session.activate().await;
            if session.status() == ChatStatus::Error {
                // History being unreachable doesn't block sending.
                if let Some(err) = session.error() {
                    eprintln!("warning: {}", err);
                }
                session.dismiss_error();
            }

            session.send(&message).await?;
            if let Some(reply) = session.messages().iter().rev().find(|m| m.role == Role::Assistant)
            {
                println!("{}", reply.content);
            }
            for call in session.last_tool_calls() {
                println!(
                    "  [{}] {}",
                    call.tool,
                    truncate_str(&call.result.to_string(), 200)
                );
            }
        }
        "history" => {
            let user_id = require_user(&auth)?;
            let api: Arc<dyn ChatApi> = Arc::new(ApiClient::new(&config.api.base_url, auth)?);
            let mut session = ChatSession::new(api, store, &user_id);
            session.activate().await;
            if let Some(err) = session.error() {
                anyhow::bail!("{}", err);
            }
            if session.messages().is_empty() {
                println!("No conversation yet.");
            }
            for message in session.messages() {
                println!(
                    "{} [{}] {}",
                    message.timestamp.format("%Y-%m-%d %H:%M"),
                    message.role,
                    message.content
                );
            }
        }
        other => {
            anyhow::bail!("Unknown command '{}'. Run `ticktask --help` for usage.", other);
        }
    }

    Ok(())
}

fn require_user(auth: &AuthSession) -> anyhow::Result<String> {
    auth.unverified_user_id().ok_or_else(|| {
        anyhow::anyhow!("Not logged in. Run `ticktask login <email> <password>` first.")
    })
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    for task in tasks {
        let marker = if task.completed { "x" } else { " " };
        let due = task
            .due_date
            .map(|d| format!("  due {}", d.format("%Y-%m-%d")))
            .unwrap_or_default();
        let tags = task
            .tags
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| format!("  [{}]", t.join(", ")))
            .unwrap_or_default();
        println!(
            "[{}] #{:<4} {:<6} {}{}{}",
            marker, task.id, task.priority, task.title, due, tags
        );
        if let Some(description) = &task.description {
            println!("     {}", truncate_str(description, 100));
        }
    }
}

/// `--due 2026-09-01` becomes midnight UTC of that day.
fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("invalid due date '{}': {} (expected YYYY-MM-DD)", raw, e))?;
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("invalid due date '{}'", raw))?;
    Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Hand-rolled argument split: `--name value` / `--name=value` flags,
/// everything else positional.
struct ParsedArgs {
    flags: HashMap<String, String>,
    positionals: Vec<String>,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut flags = HashMap::new();
        let mut positionals = Vec::new();
        let mut iter = args.iter().peekable();

        while let Some(arg) = iter.next() {
            if let Some(name) = arg.strip_prefix("--") {
                if let Some((key, value)) = name.split_once('=') {
                    flags.insert(key.to_string(), value.to_string());
                } else {
                    let value = iter
                        .next()
                        .ok_or_else(|| format!("flag --{} expects a value", name))?;
                    flags.insert(name.to_string(), value.clone());
                }
            } else {
                positionals.push(arg.clone());
            }
        }

        Ok(Self { flags, positionals })
    }

    fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    fn positional(&self, index: usize, what: &str) -> anyhow::Result<&str> {
        self.positionals
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| anyhow::anyhow!("missing {} argument", what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn args_split_flags_and_positionals() {
        let parsed =
            ParsedArgs::parse(&argv(&["buy", "milk", "--priority", "high", "--due=2026-09-01"]))
                .unwrap();
        assert_eq!(parsed.positionals, vec!["buy", "milk"]);
        assert_eq!(parsed.flag("priority"), Some("high"));
        assert_eq!(parsed.flag("due"), Some("2026-09-01"));
        assert_eq!(parsed.flag("missing"), None);
    }

    #[test]
    fn dangling_flag_is_an_error() {
        assert!(ParsedArgs::parse(&argv(&["--priority"])).is_err());
    }

    #[test]
    fn due_date_parses_to_midnight_utc() {
        let due = parse_due_date("2026-09-01").unwrap();
        assert_eq!(due.to_rfc3339(), "2026-09-01T00:00:00+00:00");
        assert!(parse_due_date("tomorrow").is_err());
    }
}
