use clap::{Parser, Subcommand};
use rag_pipeline::lambda::{self, Function};
use rag_pipeline::{api, Services, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "RAG ingestion pipeline handlers")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Track object create/delete notifications in the metadata table
    MetadataTracker,
    /// Stamp pending records with the batch evaluation verdict
    EvaluationGate,
    /// Mirror passed objects from the QA bucket to production
    Promote,
    /// Approve or reject the pipeline's manual approval action
    Approval,
    /// Start a knowledge-base ingestion job
    StartIngestion,
    /// Report the status of an ingestion job
    IngestionStatus,
    /// Split intermediate ingestion batches into word chunks
    Chunker,
    /// Run the local HTTP gateway
    Serve {
        /// Use in-memory backends instead of AWS
        #[arg(long)]
        local: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time();

    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    let function = match cli.cmd {
        Cmd::Serve { local } => {
            let services = if local {
                tracing::info!("Serving with in-memory backends");
                Services::in_memory(settings)
            } else {
                Services::from_aws(settings).await
            };
            api::run(services).await?;
            return Ok(());
        }
        Cmd::MetadataTracker => Function::MetadataTracker,
        Cmd::EvaluationGate => Function::EvaluationGate,
        Cmd::Promote => Function::Promote,
        Cmd::Approval => Function::Approval,
        Cmd::StartIngestion => Function::StartIngestion,
        Cmd::IngestionStatus => Function::IngestionStatus,
        Cmd::Chunker => Function::Chunker,
    };

    let services = Services::from_aws(settings).await;
    lambda::run(function, services).await
}
