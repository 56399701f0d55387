use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cody_core::DocumentId;
use cody_session::{Session, SessionConfig, SwitchOutcome};
use cody_sync::{HttpBackend, TokenFile};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod display;

#[derive(Parser, Debug)]
#[command(name = "cody")]
#[command(about = "Command-line client for the Cody qualitative annotation server")]
#[command(version)]
struct Args {
    /// Base URL of the Cody server
    #[arg(long, default_value = "http://localhost:5000", env = "CODY_SERVER")]
    server: String,

    /// Where the login token is kept between runs
    #[arg(long, default_value = "cody-token.json", env = "CODY_TOKEN_FILE")]
    token_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the token
    Login { email: String, password: String },
    /// Create an account, then log in
    Register { email: String, password: String },
    /// Check that the server answers
    Ping,
    /// List the documents visible to the logged-in user
    Documents,
    /// Open a document and print its summary
    Open {
        id: DocumentId,
        /// Also request model suggestions after loading
        #[arg(long)]
        suggest: bool,
    },
    /// Evaluate a label's code rule and merge the rule suggestions
    SuggestRules { doc: DocumentId, label: String },
    /// Retrain the model and merge its suggestions
    SuggestModel { doc: DocumentId },
    /// Change the label of one annotation
    Relabel {
        doc: DocumentId,
        annotation: String,
        label: String,
    },
    /// Print a document's codebook
    Labels { doc: DocumentId },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("cody v{}", env!("CARGO_PKG_VERSION"));

    let backend = Arc::new(HttpBackend::new(args.server.clone()));
    let tokens = TokenFile::new(&args.token_file);

    match args.command {
        Command::Login { email, password } => {
            let credentials = backend.login(&email, &password).await?;
            tokens.save(&credentials)?;
            println!("logged in as {email}");
        }
        Command::Register { email, password } => {
            let credentials = backend.register(&email, &password).await?;
            tokens.save(&credentials)?;
            println!("registered and logged in as {email}");
        }
        Command::Ping => {
            let answer = backend.ping().await.context("server did not answer")?;
            println!("{answer}");
        }
        command => {
            let credentials = tokens
                .load()
                .with_context(|| format!("reading {}", tokens.path().display()))?;
            if !credentials.is_valid() {
                bail!("not logged in or token expired, run `cody login` first");
            }
            let config = SessionConfig {
                suggest_after_switch: matches!(command, Command::Open { suggest: true, .. }),
                ..SessionConfig::default()
            };
            let session = Session::new(backend, credentials, config);
            run(&session, command).await?;
        }
    }
    Ok(())
}

async fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Documents => {
            session.refresh_documents().await?;
            session
                .with_workspace(|ws| display::print_documents(ws.documents().iter()))
                .await;
        }
        Command::Open { id, .. } => {
            open(session, id).await?;
            let flags = session.flags().await;
            session
                .with_workspace(|ws| display::print_session_card(ws, &flags))
                .await;
        }
        Command::SuggestRules { doc, label } => {
            open(session, doc).await?;
            let outcome = session.request_rule_suggestions(&label).await?;
            display::print_merge("Rule engine", &outcome);
        }
        Command::SuggestModel { doc } => {
            open(session, doc).await?;
            let outcome = session.request_model_suggestions().await?;
            display::print_merge("Model engine", &outcome);
        }
        Command::Relabel {
            doc,
            annotation,
            label,
        } => {
            open(session, doc).await?;
            session.update_annotation_label(&annotation, &label).await?;
            session.join_background().await;
            println!("{annotation} is now labelled {label}");
        }
        Command::Labels { doc } => {
            open(session, doc).await?;
            session.with_workspace(display::print_labels).await;
        }
        Command::Login { .. } | Command::Register { .. } | Command::Ping => {}
    }
    display::print_flags(&session.flags().await);
    Ok(())
}

async fn open(session: &Session, doc: DocumentId) -> Result<()> {
    match session
        .switch_to(doc)
        .await
        .with_context(|| format!("opening document {doc}"))?
    {
        SwitchOutcome::Switched | SwitchOutcome::AlreadyCurrent => Ok(()),
        SwitchOutcome::Superseded => bail!("document {doc} was replaced while loading"),
    }
}
