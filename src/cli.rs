use std::error::Error;
use std::io::{self, Write};

use chrono::{Local, NaiveDate};
use clap::{ArgAction, Parser, Subcommand};
use reqwest::StatusCode;

use timecard::auth::cognito::CognitoProvider;
use timecard::auth::dev::DevProvider;
use timecard::auth::provider::IdentityProvider;
use timecard::auth::{Session, SessionHandle};
use timecard::config::{AuthConfig, AuthProviderKind, TimecardConfig};
use timecard::core::report::{group_by_date, month_tasks, monthly_summary};
use timecard::core::task::{Task, TaskPatch, valid_hours};
use timecard::remote::tasks::TaskStoreClient;

#[derive(Parser, Debug)]
#[command(name = "timecard", version, about = "Track your daily work by project and task")]
pub struct Cli {
    /// More log output (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and cache the session.
    Login {
        username: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and drop the cached session.
    Logout,
    /// Show who is signed in.
    Whoami,
    /// Register a new account.
    SignUp {
        username: String,
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Confirm a registration with the emailed code.
    ConfirmSignUp { username: String, code: String },
    /// Request a password reset code.
    ForgotPassword { username: String },
    /// Complete a password reset.
    ConfirmForgotPassword {
        username: String,
        code: String,
        #[arg(long)]
        new_password: Option<String>,
    },
    /// Show all entries, grouped by day.
    List,
    /// Record a time entry.
    Add {
        project: String,
        task: String,
        /// Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value_t = 1.0)]
        hours: f64,
    },
    /// Change fields of an existing entry.
    Edit {
        id: i64,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        hours: Option<f64>,
    },
    /// Remove an entry.
    Delete { id: i64 },
    /// Summary for the current calendar month.
    Report,
}

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = TimecardConfig::load()?;
    let provider = build_provider(&config.auth)?;
    let mut session = Session::new(provider, true);
    session.resolve().await;
    let session = SessionHandle::new(session);
    let client = TaskStoreClient::new(&config.api_url, session.clone())?;

    match cli.command {
        Commands::Login { username, password } => {
            let password = or_prompt(password, "Password")?;
            session.lock().await.sign_in(&username, &password).await?;
            println!("Signed in as {}", username);
        }
        Commands::Logout => {
            session.lock().await.sign_out().await;
            println!("Signed out");
        }
        Commands::Whoami => match session.lock().await.identity() {
            Some(identity) => {
                println!("{}", identity.username);
                if let Some(email) = identity.attributes.get("email") {
                    println!("email: {}", email);
                }
            }
            None => println!("Not signed in"),
        },
        Commands::SignUp {
            username,
            email,
            password,
        } => {
            let password = or_prompt(password, "Password")?;
            session
                .lock()
                .await
                .sign_up(&username, &email, &password)
                .await?;
            println!("Signed up; check {} for a confirmation code", email);
        }
        Commands::ConfirmSignUp { username, code } => {
            session.lock().await.confirm_sign_up(&username, &code).await?;
            println!("Confirmed; you can sign in now");
        }
        Commands::ForgotPassword { username } => {
            session.lock().await.forgot_password(&username).await?;
            println!("Reset code sent");
        }
        Commands::ConfirmForgotPassword {
            username,
            code,
            new_password,
        } => {
            let new_password = or_prompt(new_password, "New password")?;
            session
                .lock()
                .await
                .confirm_forgot_password(&username, &code, &new_password)
                .await?;
            println!("Password changed");
        }
        Commands::List => {
            let tasks = client.list_tasks().await?;
            render_days(&tasks);
        }
        Commands::Add {
            project,
            task,
            date,
            hours,
        } => {
            if !valid_hours(hours) {
                return Err("hours must be positive, in steps of 0.25".into());
            }
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let entry = Task::new(project, task, date, hours);
            client.create_task(&entry).await?;
            // Mutations never patch the local view; re-fetch so what we show
            // is what the server has.
            render_days(&client.list_tasks().await?);
        }
        Commands::Edit {
            id,
            project,
            task,
            date,
            hours,
        } => {
            if let Some(hours) = hours {
                if !valid_hours(hours) {
                    return Err("hours must be positive, in steps of 0.25".into());
                }
            }
            let patch = TaskPatch {
                project,
                task,
                date,
                hours,
            };
            if patch.is_empty() {
                return Err("nothing to change; pass at least one of --project, --task, --date, --hours".into());
            }
            client.update_task(id, &patch).await?;
            render_days(&client.list_tasks().await?);
        }
        Commands::Delete { id } => {
            match client.delete_task(id).await {
                Ok(()) => {}
                // Already gone is as deleted as it gets.
                Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => {
                    log::info!("Task {} was already gone", id);
                }
                Err(e) => return Err(e.into()),
            }
            render_days(&client.list_tasks().await?);
        }
        Commands::Report => {
            let tasks = client.list_tasks().await?;
            render_report(&tasks, Local::now().date_naive());
        }
    }
    Ok(())
}

fn build_provider(auth: &AuthConfig) -> Result<Box<dyn IdentityProvider>, Box<dyn Error>> {
    match auth.provider {
        AuthProviderKind::Cognito => {
            // Config validation guarantees these are present.
            let region = auth.region.as_deref().unwrap_or_default();
            let client_id = auth.client_id.as_deref().unwrap_or_default();
            Ok(Box::new(CognitoProvider::new(region, client_id)?))
        }
        AuthProviderKind::Dev => Ok(Box::new(DevProvider::new())),
    }
}

fn or_prompt(value: Option<String>, label: &str) -> Result<String, io::Error> {
    if let Some(value) = value {
        return Ok(value);
    }
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}

/// Days newest first; entries within a day keep server order.
fn render_days(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks yet. Add your first!");
        return;
    }
    let grouped = group_by_date(tasks);
    for (date, day_tasks) in grouped.iter().rev() {
        println!("{}", date);
        for t in day_tasks {
            println!("  {} — {}  {}h  (id {})", t.project, t.task, fmt_hours(t.hours), t.id);
        }
        println!();
    }
}

fn render_report(tasks: &[Task], today: NaiveDate) {
    let summary = monthly_summary(tasks, today);
    println!("Monthly Report — {}", today.format("%B %Y"));
    println!();
    println!("  Total hours  {:.1}", summary.total_hours);
    println!("  Tasks        {}", summary.task_count);
    println!("  Projects     {}", summary.per_project.len());
    println!();

    println!("Hours by Project");
    for (project, hours) in summary.ranked() {
        println!("  {}  {:.1}h", project, hours);
    }
    println!();

    println!("All Tasks This Month");
    let mut month: Vec<&Task> = month_tasks(tasks, today);
    if month.is_empty() {
        println!("  No tasks for this month yet.");
        return;
    }
    month.sort_by(|a, b| b.date.cmp(&a.date));
    for t in month {
        println!("  {}  {} — {}  {}h", t.date, t.project, t.task, fmt_hours(t.hours));
    }
}

/// Hours the way the entry forms show them: "2h", "1.5h".
fn fmt_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{}", hours as i64)
    } else {
        format!("{}", hours)
    }
}
