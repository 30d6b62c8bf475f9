use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tdflow_backend::{BackendClient, BackendConfig, FunctionSearch, PipelineBackend};
use tdflow_notebook::{NotebookBridge, NotebookConfig, code_for_node};
use tdflow_session::{
    JsonFileStore, KeyValueStore, PipelineEditor, PreviewOutcome, SelectedFile, SessionConfig,
    SessionEvent, SessionEventSink,
};
use tdflow_spec::{Params, import_text, merge_specs, parse_spec, prepare_spec, serialize_spec};
use tracing_subscriber::EnvFilter;

const DEFAULT_STATE_FILE: &str = ".tdflow/state.json";

#[derive(Parser, Debug)]
#[command(name = "tdflow")]
#[command(about = "Edit pandas pipeline documents and mirror them into a Jupyter notebook")]
struct Cli {
    /// Local state file holding the token and the queued pipeline.
    #[arg(long, global = true, default_value = DEFAULT_STATE_FILE)]
    state_file: PathBuf,
    /// Print session events to stderr as JSON lines.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    events: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Normalize(DocArgs),
    Graph(GraphArgs),
    Check(CheckArgs),
    Merge(MergeArgs),
    Import(ImportArgs),
    Add(AddArgs),
    Remove(RemoveArgs),
    ShowNode(ShowNodeArgs),
    EditNode(EditNodeArgs),
    Codegen(CodegenArgs),
    Push(DocArgs),
    Pull(DocArgs),
    Watch(WatchArgs),
    Preview(PreviewArgs),
    Generate(GenerateArgs),
    Search(SearchArgs),
    Save(SaveArgs),
    Pipelines,
    Whoami,
    Login(LoginArgs),
    Logout,
    Queue(QueueArgs),
    Open(OpenArgs),
    Select(SelectArgs),
}

#[derive(clap::Args, Debug)]
struct DocArgs {
    #[arg(long)]
    file: PathBuf,
    /// Write the result back to the file instead of printing it.
    #[arg(long, action = ArgAction::SetTrue)]
    write: bool,
}

#[derive(clap::Args, Debug)]
struct GraphArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct MergeArgs {
    #[command(flatten)]
    doc: DocArgs,
    #[arg(long)]
    incoming: PathBuf,
}

#[derive(clap::Args, Debug)]
struct ImportArgs {
    #[command(flatten)]
    doc: DocArgs,
    /// Text holding a pipeline block, e.g. a saved chat answer.
    #[arg(long)]
    text_file: PathBuf,
}

#[derive(clap::Args, Debug)]
struct AddArgs {
    #[command(flatten)]
    doc: DocArgs,
    #[arg(long)]
    function: String,
    /// `key=value`; values are read as JSON, else as plain strings.
    #[arg(long = "param")]
    params: Vec<String>,
    #[arg(long)]
    data_file: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue)]
    notebook: bool,
}

#[derive(clap::Args, Debug)]
struct RemoveArgs {
    #[command(flatten)]
    doc: DocArgs,
    #[arg(long = "node", required = true)]
    nodes: Vec<String>,
    #[arg(long, action = ArgAction::SetTrue)]
    notebook: bool,
}

#[derive(clap::Args, Debug)]
struct ShowNodeArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    node: String,
}

#[derive(clap::Args, Debug)]
struct EditNodeArgs {
    #[command(flatten)]
    doc: DocArgs,
    #[arg(long)]
    node: String,
    /// One-node document, as printed by `show-node`.
    #[arg(long)]
    yaml_file: PathBuf,
    #[arg(long, action = ArgAction::SetTrue)]
    notebook: bool,
}

#[derive(clap::Args, Debug)]
struct CodegenArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    node: Option<String>,
}

#[derive(clap::Args, Debug)]
struct WatchArgs {
    #[command(flatten)]
    doc: DocArgs,
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Stop after this many applied notebook changes.
    #[arg(long)]
    max_updates: Option<usize>,
}

#[derive(clap::Args, Debug)]
struct PreviewArgs {
    #[arg(long)]
    file: PathBuf,
    /// Node to preview; the last node when omitted.
    #[arg(long)]
    node: Option<String>,
    #[arg(long)]
    data_file: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    doc: DocArgs,
    #[arg(long)]
    prompt: String,
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    #[arg(long)]
    query: String,
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[derive(clap::Args, Debug)]
struct SaveArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    name: String,
}

#[derive(clap::Args, Debug)]
struct LoginArgs {
    #[arg(long)]
    token: String,
}

#[derive(clap::Args, Debug)]
struct QueueArgs {
    #[arg(long)]
    file: PathBuf,
}

#[derive(clap::Args, Debug)]
struct OpenArgs {
    /// Where to write the queued pipeline; printed when omitted.
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct SelectArgs {
    /// Data file used by later `add` and `preview` runs without `--data-file`.
    #[arg(long, required_unless_present = "clear")]
    file: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "file")]
    clear: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let ctx = Context {
        state_file: cli.state_file,
        events: cli.events,
    };
    let result = match cli.command {
        Commands::Normalize(args) => normalize_command(&ctx, args),
        Commands::Graph(args) => graph_command(args),
        Commands::Check(args) => check_command(args),
        Commands::Merge(args) => merge_command(args),
        Commands::Import(args) => import_command(args),
        Commands::Add(args) => add_command(&ctx, args).await,
        Commands::Remove(args) => remove_command(&ctx, args).await,
        Commands::ShowNode(args) => show_node_command(args),
        Commands::EditNode(args) => edit_node_command(&ctx, args).await,
        Commands::Codegen(args) => codegen_command(args),
        Commands::Push(args) => push_command(&ctx, args).await,
        Commands::Pull(args) => pull_command(&ctx, args).await,
        Commands::Watch(args) => watch_command(&ctx, args).await,
        Commands::Preview(args) => preview_command(&ctx, args).await,
        Commands::Generate(args) => generate_command(&ctx, args).await,
        Commands::Search(args) => search_command(&ctx, args).await,
        Commands::Save(args) => save_command(&ctx, args).await,
        Commands::Pipelines => pipelines_command(&ctx).await,
        Commands::Whoami => whoami_command(&ctx).await,
        Commands::Login(args) => login_command(&ctx, args),
        Commands::Logout => logout_command(&ctx),
        Commands::Queue(args) => queue_command(&ctx, args),
        Commands::Open(args) => open_command(&ctx, args),
        Commands::Select(args) => select_command(&ctx, args),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

struct Context {
    state_file: PathBuf,
    events: bool,
}

impl Context {
    fn store(&self) -> Result<JsonFileStore, String> {
        JsonFileStore::open(&self.state_file).map_err(|e| e.to_string())
    }

    fn backend(&self) -> Result<BackendClient, String> {
        Ok(BackendClient::from_config(&self.backend_config()?))
    }

    fn backend_config(&self) -> Result<BackendConfig, String> {
        let config = BackendConfig::from_env();
        if config.token.is_some() {
            return Ok(config);
        }
        let token = self.store()?.token().map_err(|e| e.to_string())?;
        Ok(config.with_token(Some(token)))
    }

    fn editor(&self, path: &Path, with_notebook: bool) -> Result<PipelineEditor, String> {
        let text = read_file(path)?;
        let mut editor = PipelineEditor::new(SessionConfig::from_env()).with_events(self.sink());
        if with_notebook {
            editor = editor.with_notebook(NotebookBridge::from_config(&NotebookConfig::from_env()));
        }
        editor.set_yaml_text(&text);
        Ok(editor)
    }

    fn sink(&self) -> SessionEventSink {
        if !self.events {
            return SessionEventSink::default();
        }
        SessionEventSink::with_observer(Arc::new(|event: &SessionEvent| {
            match serde_json::to_string(event) {
                Ok(line) => eprintln!("{line}"),
                Err(_) => eprintln!("{event:?}"),
            }
        }))
    }
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("failed reading '{}': {e}", path.display()))
}

fn emit_document(args: &DocArgs, yaml: &str) -> Result<(), String> {
    if args.write {
        std::fs::write(&args.file, yaml)
            .map_err(|e| format!("failed writing '{}': {e}", args.file.display()))
    } else {
        print!("{yaml}");
        Ok(())
    }
}

/// Selects `--data-file` when given, else the file remembered by `select`,
/// looked up next to the pipeline document.
fn select_data_file(
    ctx: &Context,
    editor: &PipelineEditor,
    path: Option<&Path>,
    document: &Path,
) -> Result<(), String> {
    if let Some(path) = path {
        editor.files().set(Some(read_data_file(path)?));
        return Ok(());
    }
    let restored = ctx.store().and_then(|store| {
        editor
            .restore_selected_file(&store, &data_file_candidates(document))
            .map_err(|e| e.to_string())
    });
    match restored {
        Ok(Some(name)) => tracing::debug!(%name, "using remembered data file"),
        Ok(None) => {}
        Err(error) => tracing::warn!(%error, "remembered data file unavailable"),
    }
    Ok(())
}

fn read_data_file(path: &Path) -> Result<SelectedFile, String> {
    SelectedFile::read(path).map_err(|e| format!("failed reading '{}': {e}", path.display()))
}

fn data_file_candidates(document: &Path) -> Vec<SelectedFile> {
    let dir = document
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path != document)
        .filter_map(|path| SelectedFile::read(&path).ok())
        .collect()
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn normalize_command(ctx: &Context, args: DocArgs) -> Result<ExitCode, String> {
    let editor = ctx.editor(&args.file, false)?;
    emit_document(&args, editor.yaml_text())?;
    Ok(ExitCode::SUCCESS)
}

fn graph_command(args: GraphArgs) -> Result<ExitCode, String> {
    let mut editor = PipelineEditor::default();
    editor.set_yaml_text(&read_file(&args.file)?);
    let graph = editor.graph();
    if args.json {
        let json = serde_json::to_string_pretty(graph).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        for node in &graph.nodes {
            println!(
                "node {} [{}] at ({}, {})",
                node.id, node.label, node.position.x, node.position.y
            );
        }
        for edge in &graph.edges {
            println!("edge {} -> {}", edge.source, edge.target);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn check_command(args: CheckArgs) -> Result<ExitCode, String> {
    let (_, diagnostics) =
        prepare_spec(&read_file(&args.file)?, &[], &[]).map_err(|e| e.to_string())?;
    if args.json {
        let json = serde_json::to_string_pretty(&diagnostics).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        for diagnostic in &diagnostics {
            println!("{:?} {}", diagnostic.severity, diagnostic.summary());
            if let Some(fix) = &diagnostic.fix {
                println!("  fix: {fix}");
            }
        }
    }
    let failed = diagnostics.iter().any(|d| d.is_error());
    Ok(if failed { ExitCode::from(2) } else { ExitCode::SUCCESS })
}

fn merge_command(args: MergeArgs) -> Result<ExitCode, String> {
    let current = parse_spec(&read_file(&args.doc.file)?);
    let incoming = parse_spec(&read_file(&args.incoming)?);
    let outcome = merge_specs(&current, &incoming);
    for (from, to) in &outcome.renames {
        eprintln!("renamed {from} -> {to}");
    }
    for skipped in &outcome.skipped {
        eprintln!("skipped identical {skipped}");
    }
    emit_document(&args.doc, &serialize_spec(&outcome.spec))?;
    Ok(ExitCode::SUCCESS)
}

fn import_command(args: ImportArgs) -> Result<ExitCode, String> {
    let current = parse_spec(&read_file(&args.doc.file)?);
    let Some(outcome) = import_text(&current, &read_file(&args.text_file)?) else {
        return Err("no pipeline block found".to_string());
    };
    eprintln!("added: {}", outcome.added.join(", "));
    emit_document(&args.doc, &serialize_spec(&outcome.spec))?;
    Ok(ExitCode::SUCCESS)
}

async fn add_command(ctx: &Context, args: AddArgs) -> Result<ExitCode, String> {
    let mut editor = ctx.editor(&args.doc.file, args.notebook)?;
    select_data_file(ctx, &editor, args.data_file.as_deref(), &args.doc.file)?;
    let mut params = Params::new();
    for raw in &args.params {
        let (key, value) = parse_param(raw)?;
        params.insert(key, value);
    }
    let node_id = editor.add_function_node(&args.function, params).await;
    eprintln!("added {node_id}");
    emit_document(&args.doc, editor.yaml_text())?;
    Ok(ExitCode::SUCCESS)
}

async fn remove_command(ctx: &Context, args: RemoveArgs) -> Result<ExitCode, String> {
    let mut editor = ctx.editor(&args.doc.file, args.notebook)?;
    let removed = editor.remove_nodes(&args.nodes).await;
    if removed.is_empty() {
        return Err("none of the given nodes exist".to_string());
    }
    eprintln!("removed {}", removed.join(", "));
    emit_document(&args.doc, editor.yaml_text())?;
    Ok(ExitCode::SUCCESS)
}

fn show_node_command(args: ShowNodeArgs) -> Result<ExitCode, String> {
    let mut editor = PipelineEditor::default();
    editor.set_yaml_text(&read_file(&args.file)?);
    let text = editor
        .node_yaml(&args.node)
        .ok_or_else(|| format!("unknown node: {}", args.node))?;
    print!("{text}");
    Ok(ExitCode::SUCCESS)
}

async fn edit_node_command(ctx: &Context, args: EditNodeArgs) -> Result<ExitCode, String> {
    let mut editor = ctx.editor(&args.doc.file, args.notebook)?;
    editor
        .edit_node_yaml(&args.node, &read_file(&args.yaml_file)?)
        .await
        .map_err(|e| e.to_string())?;
    emit_document(&args.doc, editor.yaml_text())?;
    Ok(ExitCode::SUCCESS)
}

fn codegen_command(args: CodegenArgs) -> Result<ExitCode, String> {
    let mut editor = PipelineEditor::default();
    editor.set_yaml_text(&read_file(&args.file)?);
    let spec = editor.spec();
    match args.node.as_deref() {
        Some(node_id) => {
            let entry = spec
                .get(node_id)
                .ok_or_else(|| format!("unknown node: {node_id}"))?;
            print!("{}", code_for_node(node_id, entry));
        }
        None => {
            for (node_id, entry) in &spec.nodes {
                println!("{}", code_for_node(node_id, entry));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn push_command(ctx: &Context, args: DocArgs) -> Result<ExitCode, String> {
    let editor = ctx.editor(&args.file, true)?;
    let pushed = editor.push_all_to_notebook().await.map_err(|e| e.to_string())?;
    println!("pushed {pushed} node(s)");
    Ok(ExitCode::SUCCESS)
}

async fn pull_command(ctx: &Context, args: DocArgs) -> Result<ExitCode, String> {
    let mut editor = ctx.editor(&args.file, true)?;
    let changed = editor.pull_from_notebook().await.map_err(|e| e.to_string())?;
    if !changed {
        eprintln!("notebook matches the document");
    }
    emit_document(&args, editor.yaml_text())?;
    Ok(ExitCode::SUCCESS)
}

async fn watch_command(ctx: &Context, args: WatchArgs) -> Result<ExitCode, String> {
    let notebook_config = NotebookConfig::from_env();
    let interval = Duration::from_millis(args.interval_ms.unwrap_or(notebook_config.poll_interval_ms));
    let mut editor = ctx.editor(&args.doc.file, true)?;
    let (watch, mut cells_rx) = editor
        .watch_notebook(interval)
        .ok_or_else(|| "no notebook attached".to_string())?;
    tracing::info!(path = %notebook_config.path, ?interval, "watching notebook");

    let mut applied = 0usize;
    loop {
        tokio::select! {
            cells = cells_rx.recv() => {
                let Some(cells) = cells else { break };
                if editor.apply_external_cells(&cells) {
                    applied += 1;
                    emit_document(&args.doc, editor.yaml_text())?;
                    if args.max_updates.is_some_and(|max| applied >= max) {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    watch.shutdown().await;
    eprintln!("applied {applied} notebook change(s)");
    Ok(ExitCode::SUCCESS)
}

async fn preview_command(ctx: &Context, args: PreviewArgs) -> Result<ExitCode, String> {
    let editor = ctx.editor(&args.file, false)?;
    select_data_file(ctx, &editor, args.data_file.as_deref(), &args.file)?;
    let client = ctx.backend()?;
    let outcome = match args.node.as_deref() {
        Some(node_id) => editor.preview(node_id, &client, &client).await,
        None => editor.run_pipeline(&client, &client).await,
    }
    .map_err(|e| e.user_message())?;

    match outcome {
        PreviewOutcome::Table(table) => {
            println!("{}", table.columns.join("\t"));
            for row in &table.rows {
                let cells: Vec<String> = row
                    .iter()
                    .map(|value| match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                println!("{}", cells.join("\t"));
            }
            Ok(ExitCode::SUCCESS)
        }
        PreviewOutcome::NeedsReceiver(target) => {
            eprintln!(
                "node {} needs an input; parameters of {}:",
                target.node_id, target.function.name
            );
            for param in &target.function.params {
                eprintln!(
                    "  {}{}",
                    param.name,
                    if param.required { " (required)" } else { "" }
                );
            }
            Ok(ExitCode::from(2))
        }
    }
}

async fn generate_command(ctx: &Context, args: GenerateArgs) -> Result<ExitCode, String> {
    let mut editor = ctx.editor(&args.doc.file, false)?;
    let client = ctx.backend()?;
    let outcome = editor
        .generate_from_prompt(&args.prompt, &client)
        .await
        .map_err(|e| e.user_message())?;
    eprintln!("added: {}", outcome.added.join(", "));
    emit_document(&args.doc, editor.yaml_text())?;
    Ok(ExitCode::SUCCESS)
}

async fn search_command(ctx: &Context, args: SearchArgs) -> Result<ExitCode, String> {
    let config = ctx.backend_config()?;
    let search = FunctionSearch::from_config(Arc::new(BackendClient::from_config(&config)), &config);
    let Some(result) = search.search(&args.query).await else {
        return Ok(ExitCode::SUCCESS);
    };
    let functions = result.map_err(|e| e.user_message())?;
    for function in functions.iter().take(args.limit) {
        let summary = function
            .doc
            .as_deref()
            .and_then(|doc| doc.lines().find(|line| !line.trim().is_empty()))
            .unwrap_or_default()
            .trim();
        println!("{}\t{}", function.name, summary);
    }
    Ok(ExitCode::SUCCESS)
}

async fn save_command(ctx: &Context, args: SaveArgs) -> Result<ExitCode, String> {
    let editor = ctx.editor(&args.file, false)?;
    let saved = editor
        .save_pipeline(&args.name, &ctx.backend()?)
        .await
        .map_err(|e| e.user_message())?;
    println!("saved {} ({})", saved.name, saved.id);
    Ok(ExitCode::SUCCESS)
}

async fn pipelines_command(ctx: &Context) -> Result<ExitCode, String> {
    let pipelines = ctx
        .backend()?
        .list_pipelines()
        .await
        .map_err(|e| e.user_message())?;
    for pipeline in pipelines {
        println!(
            "{}\t{}\t{}",
            pipeline.id,
            pipeline.name,
            pipeline.updated_at.as_deref().unwrap_or("-")
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn whoami_command(ctx: &Context) -> Result<ExitCode, String> {
    let user = ctx.backend()?.me().await.map_err(|e| e.user_message())?;
    println!("{} ({})", user.email, user.role);
    Ok(ExitCode::SUCCESS)
}

fn login_command(ctx: &Context, args: LoginArgs) -> Result<ExitCode, String> {
    let token = args.token.trim();
    if token.is_empty() {
        return Err("token must not be empty".to_string());
    }
    ctx.store()?.set_token(token).map_err(|e| e.to_string())?;
    Ok(ExitCode::SUCCESS)
}

fn logout_command(ctx: &Context) -> Result<ExitCode, String> {
    ctx.store()?.clear_token().map_err(|e| e.to_string())?;
    Ok(ExitCode::SUCCESS)
}

fn queue_command(ctx: &Context, args: QueueArgs) -> Result<ExitCode, String> {
    let yaml = read_file(&args.file)?;
    ctx.store()?
        .set_open_pipeline(&yaml)
        .map_err(|e| e.to_string())?;
    Ok(ExitCode::SUCCESS)
}

fn open_command(ctx: &Context, args: OpenArgs) -> Result<ExitCode, String> {
    let store = ctx.store()?;
    let mut editor = PipelineEditor::new(SessionConfig::from_env()).with_events(ctx.sink());
    if !editor.load_open_pipeline(&store).map_err(|e| e.to_string())? {
        eprintln!("no pipeline queued");
        return Ok(ExitCode::from(2));
    }
    match args.file {
        Some(path) => std::fs::write(&path, editor.yaml_text())
            .map_err(|e| format!("failed writing '{}': {e}", path.display()))?,
        None => print!("{}", editor.yaml_text()),
    }
    Ok(ExitCode::SUCCESS)
}

fn select_command(ctx: &Context, args: SelectArgs) -> Result<ExitCode, String> {
    let store = ctx.store()?;
    match (args.file, args.clear) {
        (Some(path), false) => {
            let file = read_data_file(&path)?;
            let name = file.name.clone();
            PipelineEditor::default()
                .select_file(file, &store)
                .map_err(|e| e.to_string())?;
            eprintln!("selected {name}");
        }
        _ => store
            .set_selected_file_name(None)
            .map_err(|e| e.to_string())?,
    }
    Ok(ExitCode::SUCCESS)
}
