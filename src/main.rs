use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use authz_rag::core::config::{AppPaths, ConfigService};
use authz_rag::core::errors::RagError;
use authz_rag::core::logging;
use authz_rag::fga::{document_viewer_model, sample_tuples};
use authz_rag::rag::{Answer, CheckRequest, RagPipeline};
use authz_rag::state::AppState;

const DEMO_QUESTION: &str = "What is the forecast for ZEKO?";
const DEMO_USERS: [&str; 2] = ["juan", "admin"];

// authorization service unreachable or answered inconsistently
const EXIT_AUTHORIZATION_FAILURE: u8 = 3;

#[derive(Parser)]
#[command(name = "authz-rag", version, about = "Question answering over documents the asker may see")]
struct Cli {
    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, env = "AUTHZ_RAG_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a question using only documents USER may view
    Ask {
        #[arg(long)]
        user: String,
        #[arg(default_value = DEMO_QUESTION)]
        question: String,
        /// Print the answer and its sources as JSON
        #[arg(long)]
        json: bool,
        /// Let the model search the documents through a tool before answering
        #[arg(long)]
        agentic: bool,
    },
    /// Ask the sample question as `juan` and as `admin`
    Demo {
        #[arg(long)]
        agentic: bool,
    },
    /// Write the document model and sample relationships to the store
    Init,
    /// Ask the authorization service a single question
    Check {
        #[arg(long)]
        user: String,
        #[arg(long)]
        relation: Option<String>,
        #[arg(long)]
        object: String,
    },
    /// Print the effective configuration with secrets redacted
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths, &cli.log_level);

    match run(cli.command, paths).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            let authorization_failure = err
                .downcast_ref::<RagError>()
                .is_some_and(RagError::is_authorization_failure);
            if authorization_failure {
                ExitCode::from(EXIT_AUTHORIZATION_FAILURE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(command: Command, paths: Arc<AppPaths>) -> anyhow::Result<()> {
    match command {
        Command::Config => print_config(paths),
        Command::Ask {
            user,
            question,
            json,
            agentic,
        } => {
            let state = AppState::initialize(paths)?;
            let pipeline = state.build_pipeline().await?;
            let answer = ask(&pipeline, &user, &question, agentic)
                .await
                .with_context(|| format!("could not answer for user {}", user))?;
            print_answer(&answer, json)
        }
        Command::Demo { agentic } => {
            let state = AppState::initialize(paths)?;
            let pipeline = state.build_pipeline().await?;
            for user in DEMO_USERS {
                println!("== {} asks: {}", user, DEMO_QUESTION);
                let answer = ask(&pipeline, user, DEMO_QUESTION, agentic)
                    .await
                    .with_context(|| format!("could not answer for user {}", user))?;
                print_answer(&answer, false)?;
                println!();
            }
            Ok(())
        }
        Command::Init => {
            let state = AppState::initialize(paths)?;
            let retrieval = &state.settings.retrieval;
            let model_id = state
                .fga
                .write_authorization_model(&document_viewer_model(retrieval))
                .await
                .context("failed to write authorization model")?;

            let client = state.fga.as_ref().clone().with_authorization_model_id(model_id.clone());
            client
                .write_tuples(&sample_tuples(retrieval))
                .await
                .context("failed to write relationship tuples")?;

            println!("FGA_MODEL_ID={}", model_id);
            Ok(())
        }
        Command::Check {
            user,
            relation,
            object,
        } => {
            let state = AppState::initialize(paths)?;
            let retrieval = &state.settings.retrieval;
            let request = CheckRequest::new(
                qualify(&retrieval.user_type, &user),
                relation.unwrap_or_else(|| retrieval.relation.clone()),
                qualify(&retrieval.object_type, &object),
            );
            let allowed = state.fga.check(&request).await?;
            println!(
                "{} {} {}: {}",
                request.user,
                request.relation,
                request.object,
                if allowed { "allowed" } else { "denied" }
            );
            Ok(())
        }
    }
}

/// `juan` -> `user:juan`; already-typed ids pass through.
async fn ask(
    pipeline: &RagPipeline,
    user: &str,
    question: &str,
    agentic: bool,
) -> Result<Answer, RagError> {
    if agentic {
        pipeline.ask_agentic(user, question).await
    } else {
        pipeline.ask(user, question).await
    }
}

fn qualify(object_type: &str, id: &str) -> String {
    if id.contains(':') {
        id.to_string()
    } else {
        format!("{}:{}", object_type, id)
    }
}

fn print_answer(answer: &Answer, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(answer)?);
        return Ok(());
    }
    println!("{}", answer.text);
    if answer.sources.is_empty() {
        println!("(no documents were available to this user)");
    } else {
        println!("Sources: {}", answer.sources.join(", "));
    }
    Ok(())
}

fn print_config(paths: Arc<AppPaths>) -> anyhow::Result<()> {
    let config = ConfigService::new(paths);
    let raw = config.load_raw();
    let redacted = config.redact_sensitive_values(&raw);
    println!("# {}", config.config_path().display());
    println!("{}", serde_yaml::to_string(&redacted)?);
    Ok(())
}
