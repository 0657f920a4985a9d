// CodeDuel CLI validation tool
// Exercises a running server end to end: room lifecycle, grading, change feed

use clap::{Parser, Subcommand};
use colored::*;
use futures::StreamExt;
use serde_json::json;
use tokio_tungstenite::connect_async;

#[derive(Parser)]
#[command(name = "codeduel-cli")]
#[command(about = "CodeDuel Server CLI Validation Tool", long_about = None)]
struct Cli {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:4000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Create a room as host
    CreateRoom {
        #[arg(short, long)]
        uid: String,

        /// Host display name
        #[arg(short, long)]
        name: Option<String>,

        #[arg(long)]
        room_name: Option<String>,

        #[arg(long, default_value = "dsa")]
        mode: String,

        #[arg(long, default_value = "mixed")]
        difficulty: String,
    },

    /// Join an existing room
    JoinRoom {
        #[arg(short, long)]
        code: String,

        #[arg(short, long)]
        uid: String,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// Start the match (host only)
    Start {
        #[arg(short, long)]
        code: String,

        #[arg(short, long)]
        uid: String,
    },

    /// Leave the room (host leave archives it)
    Leave {
        #[arg(short, long)]
        code: String,

        #[arg(short, long)]
        uid: String,
    },

    /// Run source against a problem's sample cases (no room mutation)
    Run {
        #[arg(short, long)]
        code: String,

        #[arg(short, long)]
        problem: String,

        #[arg(short, long)]
        uid: String,

        #[arg(short, long, default_value = "python")]
        language: String,

        /// Path to the source file
        #[arg(short, long)]
        file: String,
    },

    /// Submit source against the full test set (records solves)
    Submit {
        #[arg(short, long)]
        code: String,

        #[arg(short, long)]
        problem: String,

        #[arg(short, long)]
        uid: String,

        #[arg(short, long, default_value = "python")]
        language: String,

        #[arg(short, long)]
        file: String,
    },

    /// Follow a room's change feed until it closes
    Watch {
        #[arg(short, long)]
        code: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let base = format!("http://{}", cli.server);
    let client = reqwest::Client::new();

    let result = match cli.command {
        Commands::Health => health(&client, &base).await,
        Commands::CreateRoom {
            uid,
            name,
            room_name,
            mode,
            difficulty,
        } => {
            post(
                &client,
                &format!("{base}/api/rooms/create"),
                json!({
                    "room_name": room_name,
                    "mode": mode,
                    "difficulty": difficulty,
                    "user": { "uid": uid, "name": name, "avatar_url": null }
                }),
            )
            .await
        }
        Commands::JoinRoom { code, uid, name } => {
            post(
                &client,
                &format!("{base}/api/rooms/join"),
                json!({
                    "code": code,
                    "user": { "uid": uid, "name": name, "avatar_url": null }
                }),
            )
            .await
        }
        Commands::Start { code, uid } => {
            post(
                &client,
                &format!("{base}/api/rooms/{code}/start"),
                json!({ "user_id": uid }),
            )
            .await
        }
        Commands::Leave { code, uid } => {
            post(
                &client,
                &format!("{base}/api/rooms/{code}/leave"),
                json!({ "user_id": uid }),
            )
            .await
        }
        Commands::Run {
            code,
            problem,
            uid,
            language,
            file,
        } => grade(&client, &base, "run-code", &code, &problem, &uid, &language, &file).await,
        Commands::Submit {
            code,
            problem,
            uid,
            language,
            file,
        } => {
            grade(
                &client, &base, "submit-code", &code, &problem, &uid, &language, &file,
            )
            .await
        }
        Commands::Watch { code } => watch(&cli.server, &code).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn health(client: &reqwest::Client, base: &str) -> Result<(), String> {
    let body: serde_json::Value = client
        .get(format!("{base}/api/health"))
        .send()
        .await
        .map_err(|e| e.to_string())?
        .json()
        .await
        .map_err(|e| e.to_string())?;

    println!("{} {}", "server:".green().bold(), body);
    Ok(())
}

async fn post(client: &reqwest::Client, url: &str, body: serde_json::Value) -> Result<(), String> {
    let response = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    let body: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;

    let tag = if status.is_success() {
        format!("{status}").green().bold()
    } else {
        format!("{status}").red().bold()
    };
    println!("{tag} {}", serde_json::to_string_pretty(&body).unwrap_or_default());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn grade(
    client: &reqwest::Client,
    base: &str,
    endpoint: &str,
    code: &str,
    problem: &str,
    uid: &str,
    language: &str,
    file: &str,
) -> Result<(), String> {
    let source = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| format!("cannot read {file}: {e}"))?;

    post(
        client,
        &format!("{base}/api/judge/{endpoint}"),
        json!({
            "code": code,
            "problem_id": problem,
            "user_id": uid,
            "language": language,
            "source": source,
        }),
    )
    .await
}

async fn watch(server: &str, code: &str) -> Result<(), String> {
    let url = format!("ws://{server}/api/rooms/{code}/watch");
    println!("{} {url}", "connecting:".cyan().bold());

    let (ws, _) = connect_async(&url).await.map_err(|e| e.to_string())?;
    let (_, mut read) = ws.split();

    while let Some(message) = read.next().await {
        match message {
            Ok(msg) if msg.is_text() => {
                println!("{} {}", "update:".yellow().bold(), msg.into_text().unwrap_or_default());
            }
            Ok(msg) if msg.is_close() => {
                println!("{}", "room closed".red().bold());
                break;
            }
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
    Ok(())
}
