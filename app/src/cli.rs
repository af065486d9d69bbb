use std::path::PathBuf;

use async_trait::async_trait;
use clap::Subcommand;
use docqa_core::api::Document;
use docqa_core::ask::AskView;
use docqa_core::manage::{
    confirmation_prompt, AlwaysConfirm, ConfirmDeletion, DeleteOutcome, ManagerView, StatsPanel,
};
use docqa_core::{ApiIndex, Config, Session, Settings, UploadReceipt};
use serde::Serialize;

use crate::commands::{self, StatsReport};
use crate::error::{CommandError, CommandResult};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a PDF (10 MB max)
    Upload { path: PathBuf },
    /// Ask a question about an uploaded document
    Ask {
        /// Document id, as shown by `list`
        #[arg(short, long)]
        document: Option<i64>,
        /// Use keyword matching instead of semantic search
        #[arg(long)]
        no_semantic: bool,
        question: String,
    },
    /// List uploaded documents with collection statistics
    List,
    /// Show collection statistics, or chunk statistics for one document
    Stats {
        #[arg(short, long)]
        document: Option<i64>,
    },
    /// Delete a document
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Check that the service is reachable
    Test,
    /// List the routes the service advertises
    Endpoints,
}

/// Global flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub api_base: Option<String>,
    pub json: bool,
}

/// Prompts on the terminal before deleting. The prompt runs on the blocking pool.
struct PromptConfirm;

#[async_trait]
impl ConfirmDeletion for PromptConfirm {
    async fn confirm(&self, document: &Document) -> bool {
        let prompt = confirmation_prompt(document);
        let answer = tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(confirmed)) => confirmed,
            Ok(Err(e)) => {
                tracing::warn!("Confirmation prompt failed: {}", e);
                false
            }
            Err(e) => {
                tracing::error!("Confirmation prompt task failed: {}", e);
                false
            }
        }
    }
}

/// Settings from disk, then `DOCQA_API_BASE`, then `--api-base`.
pub fn resolve_settings(options: &Options) -> Settings {
    let config = Config::load_or_default();
    Settings::load(&config.settings_file)
        .with_env_overrides()
        .with_api_base(options.api_base.as_deref())
}

/// Run one command to completion and return the process exit code.
pub fn run(options: Options, command: Command) -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    rt.block_on(async {
        let settings = resolve_settings(&options);
        tracing::debug!(api_base = %settings.api_base, "Resolved settings");
        let session = Session::new(settings);

        let token = session.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, abandoning request");
                token.cancel();
            }
        });

        match dispatch(&session, &options, command).await {
            Ok(()) => 0,
            Err(e) => {
                report_error(&options, &e);
                e.exit_code()
            }
        }
    })
}

async fn dispatch(session: &Session, options: &Options, command: Command) -> CommandResult<()> {
    match command {
        Command::Upload { path } => {
            let receipt = commands::upload_document(session, &path).await?;
            emit(options, &receipt, render_receipt)?;
            if !options.json {
                let delay = session.indexing_notice_delay();
                if let Some(notice) = receipt.indexing_notice(delay).await {
                    println!("{}", notice);
                }
            }
        }
        Command::Ask {
            document,
            no_semantic,
            question,
        } => {
            let semantic = no_semantic.then_some(false);
            let view = commands::ask_question(session, document, &question, semantic).await?;
            emit(options, &view, render_answer)?;
        }
        Command::List => {
            let view = commands::list_documents(session).await?;
            emit(options, &view, render_manager)?;
        }
        Command::Stats { document } => {
            let report = commands::get_stats(session, document).await?;
            emit(options, &report, render_stats)?;
        }
        Command::Delete { id, yes } => {
            let confirm: &dyn ConfirmDeletion = if yes {
                &AlwaysConfirm
            } else {
                &PromptConfirm
            };
            let outcome = commands::delete_document(session, id, confirm).await?;
            emit(options, &outcome, |o| render_delete(id, o))?;
        }
        Command::Test => {
            let body = commands::test_connection(session).await;
            emit(options, &body, |b| {
                serde_json::to_string_pretty(b).unwrap_or_else(|_| b.to_string())
            })?;
        }
        Command::Endpoints => {
            let index = commands::list_endpoints(session).await?;
            emit(options, &index, render_endpoints)?;
        }
    }
    Ok(())
}

fn emit<T: Serialize>(
    options: &Options,
    value: &T,
    text: impl Fn(&T) -> String,
) -> CommandResult<()> {
    if options.json {
        let out = serde_json::to_string_pretty(value)
            .map_err(|e| CommandError::internal(e.to_string()))?;
        println!("{}", out);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}

fn report_error(options: &Options, err: &CommandError) {
    if options.json {
        match serde_json::to_string_pretty(err) {
            Ok(out) => println!("{}", out),
            Err(_) => eprintln!("Error: {}", err),
        }
    } else {
        eprintln!("Error: {}", err);
    }
}

pub fn render_receipt(receipt: &UploadReceipt) -> String {
    format!(
        "{}\n  id:    {}\n  title: {}",
        receipt.message, receipt.document.id, receipt.document.title
    )
}

pub fn render_answer(view: &AskView) -> String {
    let Some(answer) = &view.answer else {
        return view.error.clone().unwrap_or_default();
    };

    let mut out = String::new();
    if let Some(title) = &answer.document_title {
        out.push_str(&format!("Document: {}\n", title));
    }
    out.push_str(&answer.answer);
    out.push('\n');

    let mut footer = Vec::new();
    if let Some(time) = &answer.processing_time {
        footer.push(format!("Processed in {}", time));
    }
    if answer.semantic_search_used {
        footer.push("semantic search".to_string());
    }
    if !footer.is_empty() {
        out.push_str(&format!("\n({})\n", footer.join(", ")));
    }

    if !answer.sources.is_empty() {
        out.push_str("\nSources:\n");
        for (i, source) in answer.sources.iter().enumerate() {
            out.push_str(&format!(
                "  {}. [{}] {}\n",
                i + 1,
                source.similarity,
                source.text_preview
            ));
        }
    }
    out.trim_end().to_string()
}

pub fn render_manager(view: &ManagerView) -> String {
    let mut out = String::new();
    if view.documents.is_empty() {
        out.push_str("No documents uploaded yet.\n");
    }
    for row in &view.documents {
        out.push_str(&format!(
            "{:>5}  {:<40}  {:<19}  {}\n",
            row.id,
            row.title,
            row.uploaded,
            row.size.as_deref().unwrap_or("-")
        ));
    }
    if let Some(stats) = &view.stats {
        out.push('\n');
        out.push_str(&render_panel(stats));
    }
    out.trim_end().to_string()
}

fn render_panel(stats: &StatsPanel) -> String {
    let mut out = format!(
        "Documents: {}  Chunks: {}  Avg chunks/doc: {}\n",
        stats.total_documents, stats.total_chunks, stats.average_chunks
    );
    for doc in &stats.per_document {
        out.push_str(&format!("  {:<40}  {} chunks\n", doc.title, doc.chunk_count));
    }
    out
}

pub fn render_stats(report: &StatsReport) -> String {
    match report {
        StatsReport::Registry(panel) => render_panel(panel).trim_end().to_string(),
        StatsReport::Document(stats) => format!(
            "Document {}: {} chunks",
            stats.document_id, stats.total_chunks
        ),
    }
}

fn render_delete(id: i64, outcome: &DeleteOutcome) -> String {
    match outcome {
        DeleteOutcome::Deleted => format!("Deleted document {}", id),
        DeleteOutcome::Declined => "Deletion cancelled".to_string(),
        DeleteOutcome::AlreadyDeleting => format!("Document {} is already being deleted", id),
    }
}

fn render_endpoints(index: &ApiIndex) -> String {
    let mut out = String::from("Endpoints:\n");
    for (name, route) in &index.endpoints {
        out.push_str(&format!("  {:<16} {}\n", name, route));
    }
    if !index.features.is_empty() {
        out.push_str("Features:\n");
        for (name, enabled) in &index.features {
            let mark = if *enabled { "on" } else { "off" };
            out.push_str(&format!("  {:<16} {}\n", name, mark));
        }
    }
    out.trim_end().to_string()
}
