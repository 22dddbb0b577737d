//! Command-line utility for managing the outreach daemon
//!
//! This tool provides operational control over the dispatcher, including:
//! - Roster management (fetch, select, deselect, list)
//! - Run management (start, pause, resume, stop)
//! - Watching run progress
//! - System status and health checks

#![allow(clippy::single_match_else)]

use clap::{Parser, Subcommand};
use outreach_control::{
    ControlClient, DEFAULT_CONTROL_SOCKET, JobCommand, Request, RequestCommand, ResponsePayload,
    RosterCommand, SystemCommand,
    protocol::{RecipientFilters, ResponseData},
};

/// Command-line utility for managing the outreach daemon
#[derive(Parser, Debug)]
#[command(name = "outreachctl")]
#[command(about = "Manage the outreach dispatch daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the control socket
    #[arg(short = 'c', long, default_value = DEFAULT_CONTROL_SOCKET)]
    control_socket: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run management (runtime control via socket)
    Job {
        #[command(subcommand)]
        action: JobAction,
    },
    /// Roster management (runtime control via socket)
    Roster {
        #[command(subcommand)]
        action: RosterAction,
    },
    /// System status and health (runtime control via socket)
    System {
        #[command(subcommand)]
        action: SystemAction,
    },
}

#[derive(Subcommand, Debug)]
enum JobAction {
    /// Start a run over the selected recipients
    Start {
        /// Message template to render for every recipient
        template_id: String,

        /// Locale variant of the template
        #[arg(long)]
        locale: Option<String>,
    },
    /// Pause the active run after the in-flight send settles
    Pause,
    /// Resume a paused run from where it left off
    Resume,
    /// Stop the active run, keeping recorded outcomes
    Stop,
    /// Show run progress
    Status {
        /// Watch mode - continuously update progress
        #[arg(long)]
        watch: bool,

        /// Update interval in seconds (for watch mode)
        #[arg(long, default_value = "2")]
        interval: u64,
    },
}

#[derive(Subcommand, Debug)]
enum RosterAction {
    /// Fetch candidate recipients for a visit-date window
    Fetch {
        /// Inclusive start of the window (YYYY-MM-DD)
        #[arg(long)]
        from: chrono::NaiveDate,

        /// Inclusive end of the window (YYYY-MM-DD)
        #[arg(long)]
        to: chrono::NaiveDate,

        /// Only visits with this doctor
        #[arg(long)]
        doctor: Option<String>,

        /// Only visits for this service
        #[arg(long)]
        service: Option<String>,

        /// Only visits with this specialist
        #[arg(long)]
        specialist: Option<String>,

        /// Keep only the first recipient for each phone number
        #[arg(long)]
        unique_phones: bool,
    },
    /// Include recipients in the next run
    Select {
        /// Recipient ids to select
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Exclude recipients from the next run
    Deselect {
        /// Recipient ids to deselect
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// List the roster with selection and delivery state
    List {
        /// Filter by delivery status (idle, sending, sent, failed)
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SystemAction {
    /// Check if the daemon is responding
    Ping,
    /// Get daemon status and roster statistics
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Job { action } => {
            handle_job_command(&cli.control_socket, action).await?;
        }
        Commands::Roster { action } => {
            handle_roster_command(&cli.control_socket, action).await?;
        }
        Commands::System { action } => {
            handle_system_command(&cli.control_socket, action).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Control Commands (via Unix socket IPC)
// ============================================================================

/// Check control socket connectivity and return client
fn check_control_socket(socket_path: &str) -> anyhow::Result<ControlClient> {
    let client = ControlClient::new(socket_path);

    // Check if socket exists first for better error messages
    if let Err(e) = client.check_socket_exists() {
        anyhow::bail!(
            "Cannot connect to the outreach control socket at {socket_path}.\n\
             Error: {e}\n\
             \n\
             Is the outreach daemon running?\n\
             You can configure the socket path with --control-socket or in outreach.config.ron"
        );
    }

    Ok(client)
}

/// Handle run management commands
async fn handle_job_command(socket_path: &str, action: JobAction) -> anyhow::Result<()> {
    let client = check_control_socket(socket_path)?;

    let command = match action {
        JobAction::Start {
            template_id,
            locale,
        } => JobCommand::Start {
            template_id,
            locale,
        },
        JobAction::Pause => JobCommand::Pause,
        JobAction::Resume => JobCommand::Resume,
        JobAction::Stop => JobCommand::Stop,
        JobAction::Status { watch, interval } => {
            if watch {
                // Watch mode - continuously update
                loop {
                    // Clear screen
                    print!("\x1B[2J\x1B[1;1H");

                    display_job_status(&client).await?;

                    println!("\nPress Ctrl+C to exit");

                    tokio::time::sleep(std::time::Duration::from_secs(interval)).await;
                }
            }

            return display_job_status(&client).await;
        }
    };

    let response = client
        .send_request(Request::new(RequestCommand::Job(command)))
        .await?;

    match response.payload {
        ResponsePayload::Ok => {
            println!("✓ Command completed successfully");
        }
        ResponsePayload::Data(data) => match *data {
            ResponseData::Message(msg) => {
                println!("✓ {msg}");
            }
            other => {
                println!("Unexpected response for job command: {other:?}");
            }
        },
        ResponsePayload::Error(err) => {
            anyhow::bail!("Server error: {err}");
        }
    }

    Ok(())
}

/// Fetch and display run progress
async fn display_job_status(client: &ControlClient) -> anyhow::Result<()> {
    let response = client
        .send_request(Request::new(RequestCommand::Job(JobCommand::Status)))
        .await?;

    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::JobStatus(status) => {
                println!("=== Outreach Run Status ===\n");
                print!("{status}");
            }
            other => {
                println!("Unexpected response for job status: {other:?}");
            }
        },
        ResponsePayload::Ok => {
            println!("✓ Command completed successfully");
        }
        ResponsePayload::Error(err) => {
            anyhow::bail!("Server error: {err}");
        }
    }

    Ok(())
}

/// Handle roster management commands
async fn handle_roster_command(socket_path: &str, action: RosterAction) -> anyhow::Result<()> {
    let client = check_control_socket(socket_path)?;

    let command = match action {
        RosterAction::Fetch {
            from,
            to,
            doctor,
            service,
            specialist,
            unique_phones,
        } => RosterCommand::Fetch {
            filters: RecipientFilters {
                date_from: from,
                date_to: to,
                doctor_id: doctor,
                service_id: service,
                specialist_id: specialist,
                unique_phones_only: unique_phones,
            },
        },
        RosterAction::Select { ids } => RosterCommand::Select { ids },
        RosterAction::Deselect { ids } => RosterCommand::Deselect { ids },
        RosterAction::List { status } => RosterCommand::List {
            status_filter: status,
        },
    };

    let response = client
        .send_request(Request::new(RequestCommand::Roster(command)))
        .await?;

    match response.payload {
        ResponsePayload::Ok => {
            println!("✓ Command completed successfully");
        }
        ResponsePayload::Data(data) => match *data {
            ResponseData::Message(msg) => {
                println!("✓ {msg}");
            }
            ResponseData::RecipientList(rows) => {
                if rows.is_empty() {
                    println!("Roster is empty");
                } else {
                    println!("  {:<10} {:<9} {:<16} {}", "ID", "STATUS", "PHONE", "NAME");
                    println!("{}", "-".repeat(60));

                    for row in &rows {
                        println!("{row}");
                    }

                    println!("\nTotal: {} recipient(s)", rows.len());
                }
            }
            other => {
                println!("Unexpected response for roster command: {other:?}");
            }
        },
        ResponsePayload::Error(err) => {
            anyhow::bail!("Server error: {err}");
        }
    }

    Ok(())
}

/// Handle system management commands
async fn handle_system_command(socket_path: &str, action: SystemAction) -> anyhow::Result<()> {
    let client = check_control_socket(socket_path)?;

    let request = match action {
        SystemAction::Ping => Request::new(RequestCommand::System(SystemCommand::Ping)),
        SystemAction::Status => Request::new(RequestCommand::System(SystemCommand::Status)),
    };

    let response = client.send_request(request).await?;

    match response.payload {
        ResponsePayload::Ok => {
            println!("✓ Pong! The daemon is responding");
        }
        ResponsePayload::Data(data) => match *data {
            ResponseData::SystemStatus(status) => {
                println!("=== Outreach Daemon Status ===\n");
                print!("{status}");
            }
            other => {
                println!("Unexpected response for system command: {other:?}");
            }
        },
        ResponsePayload::Error(err) => {
            anyhow::bail!("Server error: {err}");
        }
    }

    Ok(())
}
