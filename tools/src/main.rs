//! desk-runner: headless driver for the complaint desk.
//!
//! Usage:
//!   desk-runner --config data/desk.json
//!   desk-runner --config data/desk.json --db complaints.db --org acme --ipc-mode
//!
//! In IPC mode, one JSON command per stdin line, one JSON response per stdout line.

use anyhow::Result;
use complaint_desk_core::{
    classifier,
    complaint::{Channel, ComplaintIntake},
    config::DeskConfig,
    desk::{ComplaintDesk, ListQuery},
    directory::{ActingUser, Agent},
    error::DeskError,
    store::DeskStore,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Register {
        customer_name: String,
        customer_email: String,
        complaint: String,
        #[serde(default)]
        channel: Option<Channel>,
    },
    /// Filters travel nested under `query`; `type` is taken by the command tag.
    List {
        #[serde(default)]
        query: ListQuery,
    },
    Get {
        complaint_id: String,
    },
    Assign {
        complaint_id: String,
        agent_id: String,
        user: ActingUser,
    },
    Reply {
        complaint_id: String,
        reply: String,
        user: ActingUser,
    },
    Resolve {
        complaint_id: String,
        #[serde(default)]
        comment: Option<String>,
        user: ActingUser,
    },
    Escalate {
        complaint_id: String,
        #[serde(default)]
        reason: Option<String>,
        user: ActingUser,
    },
    Dashboard,
    Escalated {
        user: ActingUser,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");

    let mut config = match flag_value(&args, "--config") {
        Some(path) => DeskConfig::load(path)?,
        None => DeskConfig::default_test(),
    };
    if let Some(db) = flag_value(&args, "--db") {
        config.database_path = db.to_string();
    }
    if let Some(org) = flag_value(&args, "--org") {
        config.org_id = org.to_string();
    }
    config.validate()?;

    if !ipc_mode {
        println!("complaint desk: desk-runner");
        println!("  org:         {}", config.org_id);
        println!("  db:          {}", config.database_path);
        println!("  classifier:  {:?}", config.classifier.provider);
        println!();
    }

    let store = if config.database_path == ":memory:" {
        DeskStore::in_memory()?
    } else {
        DeskStore::open(&config.database_path)?
    };
    store.migrate()?;
    seed_agents(&store, &config)?;

    let classifier = classifier::from_config(&config.classifier)?;
    let desk = ComplaintDesk::from_config(&config, store, classifier);

    if ipc_mode {
        run_ipc_loop(&desk)?;
    } else {
        print_summary(&desk)?;
    }
    Ok(())
}

fn seed_agents(store: &DeskStore, config: &DeskConfig) -> Result<()> {
    for seed in &config.agents {
        store.upsert_agent(&Agent {
            agent_id: seed.agent_id.clone(),
            org_id: config.org_id.clone(),
            name: seed.name.clone(),
            email: seed.email.clone(),
            role: seed.role,
        })?;
    }
    log::info!(
        "org={} directory holds {} staff entries",
        config.org_id,
        store.agent_count(&config.org_id)?
    );
    Ok(())
}

fn run_ipc_loop(desk: &ComplaintDesk) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = json!({
                    "status": 400,
                    "error": { "kind": "validation", "message": format!("Malformed command: {e}") },
                });
                writeln!(stdout, "{err_json}")?;
                stdout.flush()?;
                continue;
            }
        };

        if matches!(cmd, IpcCommand::Quit) {
            break;
        }
        let response = handle_command(desk, cmd);
        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(desk: &ComplaintDesk, cmd: IpcCommand) -> Value {
    match cmd {
        IpcCommand::Register {
            customer_name,
            customer_email,
            complaint,
            channel,
        } => respond(
            201,
            desk.register(ComplaintIntake {
                customer_name,
                customer_email,
                complaint,
                channel,
            }),
        ),
        IpcCommand::List { query } => respond(200, desk.list(&query)),
        IpcCommand::Get { complaint_id } => respond(200, desk.get(&complaint_id)),
        IpcCommand::Assign {
            complaint_id,
            agent_id,
            user,
        } => respond(200, desk.assign(&complaint_id, &agent_id, &user)),
        IpcCommand::Reply {
            complaint_id,
            reply,
            user,
        } => respond(200, desk.add_reply(&complaint_id, &reply, &user)),
        IpcCommand::Resolve {
            complaint_id,
            comment,
            user,
        } => respond(
            200,
            desk.mark_resolved(&complaint_id, comment.as_deref(), &user),
        ),
        IpcCommand::Escalate {
            complaint_id,
            reason,
            user,
        } => respond(200, desk.escalate(&complaint_id, reason.as_deref(), &user)),
        IpcCommand::Dashboard => respond(200, desk.dashboard()),
        IpcCommand::Escalated { user } => respond(200, desk.escalated(&user)),
        IpcCommand::Quit => json!({ "status": 200, "data": null }),
    }
}

fn respond<T: Serialize>(success: u16, result: Result<T, DeskError>) -> Value {
    match result {
        Ok(data) => match serde_json::to_value(data) {
            Ok(data) => json!({ "status": success, "data": data }),
            Err(e) => error_body(&DeskError::from(e)),
        },
        Err(e) => {
            log::debug!("command failed: {e}");
            error_body(&e)
        }
    }
}

fn error_body(e: &DeskError) -> Value {
    let mut body = json!({
        "status": e.status_code(),
        "error": { "kind": e.kind(), "message": e.to_string() },
    });
    if let DeskError::Unpersisted { classification, .. } = e {
        body["classification"] = json!(classification);
    }
    body
}

fn print_summary(desk: &ComplaintDesk) -> Result<()> {
    let stats = desk.dashboard()?;

    println!("=== DESK SUMMARY ===");
    println!("  org:            {}", desk.org_id());
    println!("  total:          {}", stats.counts.total);
    println!("  pending:        {}", stats.counts.pending);
    println!("  in progress:    {}", stats.counts.in_progress);
    println!("  resolved:       {}", stats.counts.resolved);
    println!("  escalated:      {}", stats.counts.escalated);
    println!(
        "  priority:       low {} | medium {} | high {}",
        stats.priority.low, stats.priority.medium, stats.priority.high
    );
    println!(
        "  avg response:   {:.2}h",
        stats.performance.average_response_time
    );

    if !stats.by_type.is_empty() {
        println!();
        println!("=== BY TYPE ===");
        for (kind, count) in &stats.by_type {
            println!("  {kind:<24} {count}");
        }
    }

    println!();
    println!("=== RECENT ===");
    if stats.recent_complaints.is_empty() {
        println!("  (No complaints yet)");
    }
    for view in &stats.recent_complaints {
        let c = &view.complaint;
        println!(
            "  {} | P{} | {} | {}",
            c.complaint_id, c.priority_score, c.status, c.complaint_type
        );
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
