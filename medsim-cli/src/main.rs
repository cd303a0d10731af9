use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medsim_model::{
    ConversationState, Criterion, Evaluation, GenerationConfig, Mode, OllamaGenerator, Tutor,
};
use medsim_rag::{
    EmbeddingProvider, Indexer, JsonlDocumentSource, LocalVectorStore, OllamaEmbeddingProvider,
    RagConfig, RetrievalResult, Retriever, SequentialRecordIds, VectorStore,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "medsim")]
#[command(version)]
#[command(about = "Virtual patient and study assistant over indexed case reports", long_about = None)]
struct Cli {
    /// Index directory (overrides MEDSIM_INDEX_DIR).
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Collection name (overrides MEDSIM_COLLECTION).
    #[arg(long, global = true)]
    collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and store case reports from a JSON lines file.
    Index {
        /// File with one `{"id", "text"}` or `{"PMC_id", "context"}` object per line.
        #[arg(long)]
        input: PathBuf,
        /// Index at most this many documents.
        #[arg(long)]
        limit: Option<usize>,
        /// Drop the collection before indexing.
        #[arg(long)]
        reset: bool,
        /// Use reproducible `{id}-{row}-{chunk}` record ids. Rows already
        /// indexed then fail as duplicates instead of being added again.
        #[arg(long)]
        sequential_ids: bool,
    },
    /// Answer a question from the indexed reports, with citations.
    Ask {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
        /// Only search this case.
        #[arg(long)]
        source: Option<String>,
        /// Also grade the question on the interview rubric.
        #[arg(long)]
        evaluate: bool,
    },
    /// Interview a virtual patient built from a random case.
    Patient {
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Print the id of a random indexed case.
    Sample,
    /// Print the effective configuration.
    Config,
}

struct App {
    rag: RagConfig,
    generation: GenerationConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

/// Environment configuration with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<(RagConfig, GenerationConfig)> {
    let mut rag = RagConfig::from_env().context("invalid retrieval configuration")?;
    if let Some(dir) = &cli.index_dir {
        rag.persist_dir = dir.clone();
    }
    if let Some(name) = &cli.collection {
        rag.collection = name.clone();
    }
    let generation = GenerationConfig::from_env().context("invalid generation configuration")?;
    Ok((rag, generation))
}

impl App {
    async fn open(cli: &Cli) -> Result<Self> {
        let (rag, generation) = load_config(cli)?;
        let embedder = Arc::new(OllamaEmbeddingProvider::from_config(&rag)?);
        let store = Arc::new(LocalVectorStore::open(&rag.persist_dir).await?);
        Ok(Self { rag, generation, embedder, store })
    }

    fn retriever(&self) -> Result<Arc<Retriever>> {
        let retriever = Retriever::builder()
            .config(self.rag.clone())
            .embedding_provider(self.embedder.clone())
            .vector_store(self.store.clone())
            .build()?;
        Ok(Arc::new(retriever))
    }

    fn tutor(&self, top_k: Option<usize>) -> Result<Tutor> {
        let generator = Arc::new(OllamaGenerator::new(self.generation.clone())?);
        let tutor = Tutor::new(self.retriever()?, generator, &self.generation);
        Ok(match top_k {
            Some(k) => tutor.with_top_k(k),
            None => tutor,
        })
    }
}

async fn index_command(
    app: &App,
    input: PathBuf,
    limit: Option<usize>,
    reset: bool,
    sequential_ids: bool,
) -> Result<()> {
    let mut builder = Indexer::builder()
        .config(app.rag.clone())
        .embedding_provider(app.embedder.clone())
        .vector_store(app.store.clone());
    if sequential_ids {
        info!("using sequential record ids");
        builder = builder.record_ids(Arc::new(SequentialRecordIds));
    }
    let indexer = builder.build()?;

    if reset {
        indexer.reset().await?;
    }

    let mut documents = JsonlDocumentSource::open(&input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    if let Some(n) = limit {
        documents = documents.limit(n);
    }

    let report = indexer.index(documents).await.context(
        "indexing stopped; batches written before the failure are kept \
         (use --reset to rebuild)",
    )?;

    let path = std::fs::canonicalize(&app.rag.persist_dir).unwrap_or_else(|_| app.rag.persist_dir.clone());
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "report": report,
            "collection": indexer.collection(),
            "index_path": path,
        }))?
    );
    Ok(())
}

async fn ask_command(
    app: &App,
    question: &str,
    top_k: Option<usize>,
    source: Option<&str>,
    evaluate: bool,
) -> Result<()> {
    let tutor = app.tutor(top_k)?;

    let answer = tutor.answer(question, source).await?;
    println!("{}\n", answer.text.trim());
    print_sources(&answer.contexts);

    if evaluate {
        let evaluation = tutor.evaluate(question, &answer.contexts).await?;
        print_evaluation(&evaluation);
    }
    Ok(())
}

async fn patient_command(app: &App, top_k: Option<usize>) -> Result<()> {
    let tutor = app.tutor(top_k)?;
    let mut editor = DefaultEditor::new()?;

    println!("Virtual patient. Type /new for a new patient, /quit to leave.\n");
    let mut state = seat_patient(&tutor, ConversationState::new(Mode::Patient)).await?;

    loop {
        let line = match editor.readline("clinician> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        editor.add_history_entry(input)?;

        match input {
            "/quit" | "/exit" => break,
            "/new" => state = seat_patient(&tutor, ConversationState::new(Mode::Patient)).await?,
            _ => match tutor.handle_turn(state.clone(), input).await {
                Ok(next) => {
                    state = next;
                    if let Some(turn) = state.last_reply() {
                        println!("patient> {}\n", turn.content.trim());
                        if let Some(evaluation) = &turn.evaluation {
                            print_evaluation(evaluation);
                        }
                    }
                }
                // The session survives a failed turn.
                Err(e) => eprintln!("error: {e}"),
            },
        }
    }
    Ok(())
}

async fn seat_patient(tutor: &Tutor, state: ConversationState) -> Result<ConversationState> {
    let state = tutor.start_patient(state).await?;
    if let Some(patient) = &state.patient {
        let case = patient.source_id.as_deref().unwrap_or("none");
        println!("[case {case}]\n{}\n", patient.persona);
    }
    if let Some(turn) = state.last_reply() {
        println!("patient> {}\n", turn.content.trim());
    }
    Ok(state)
}

fn print_sources(contexts: &[RetrievalResult]) {
    if contexts.is_empty() {
        println!("(no sources found)");
        return;
    }
    println!("Sources:");
    for c in contexts {
        println!("- [{}] chunk {}, score {:.3}", c.source_id, c.chunk_index, c.score);
    }
}

fn print_evaluation(evaluation: &Evaluation) {
    let overall = evaluation.overall();
    println!("\nOverall score: {overall:.1}/5 · {}", evaluation.band());
    if let Some(brief) = evaluation.brief() {
        println!("  {brief}");
    }
    if !evaluation.phase_guess.is_empty() {
        println!("  Phase: {}", evaluation.phase_guess);
    }
    if !evaluation.risk_flags.is_empty() {
        println!("  Flags: {}", evaluation.risk_flags.join(", "));
    }
    for criterion in Criterion::ALL {
        if let Some(score) = evaluation.score(criterion) {
            println!("  {}: {score}/5", criterion.label());
        }
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Config = cli.command {
        let (rag, generation) = load_config(&cli)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "retrieval": rag,
                "generation": generation,
            }))?
        );
        return Ok(());
    }

    let app = App::open(&cli).await?;
    match cli.command {
        Commands::Index { input, limit, reset, sequential_ids } => {
            index_command(&app, input, limit, reset, sequential_ids).await
        }
        Commands::Ask { question, top_k, source, evaluate } => {
            ask_command(&app, &question, top_k, source.as_deref(), evaluate).await
        }
        Commands::Patient { top_k } => patient_command(&app, top_k).await,
        Commands::Sample => {
            if let Some(id) = app.retriever()?.sample_source_id().await {
                println!("{id}");
            }
            Ok(())
        }
        Commands::Config => Ok(()),
    }
}
