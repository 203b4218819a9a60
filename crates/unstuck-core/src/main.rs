//! unstuck - Kubernetes stuck-deletion remediation
//!
//! The main entry point for unstuck, handling:
//! - Diagnosis of Terminating namespaces, CRDs, and generic resources
//! - Escalating remediation plans (L0 informational to L4 force finalize)
//! - Sequential plan execution with confirmation and verification
//! - Schema, shell completion, and version output

use std::fs::File;
use std::io::{self, BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use unstuck_common::error::StructuredError;
use unstuck_common::{DiagnosisReport, Error, OutputFormat, Plan, Result, SCHEMA_VERSION};
use unstuck_config::{load_config, ConfigOverrides, UnstuckConfig, ValidationError};
use unstuck_core::action::{
    Applier, ApplierConfig, AutoConfirm, ClusterExecutor, Confirmer, Deadline, StdinConfirmer,
};
use unstuck_core::detect::{diagnose, TargetSpec};
use unstuck_core::exit_codes::ExitCode;
use unstuck_core::kube::kubectl::KubectlClient;
use unstuck_core::log_event;
use unstuck_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use unstuck_core::output::{apply_banner, Printer};
use unstuck_core::plan::{Planner, PlannerConfig};
use unstuck_core::schema::{
    available_schemas, format_schema, generate_all_schemas, generate_schema, SchemaFormat,
};

/// Diagnose and remediate Kubernetes objects stuck in Terminating
#[derive(Parser)]
#[command(name = "unstuck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the kubeconfig file
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,

    /// Output format (default: text on a terminal, json otherwise)
    #[arg(long, short = 'o', global = true, value_enum)]
    output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Overall deadline for the command (seconds)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Explain why a target is stuck in Terminating
    Diagnose(DiagnoseArgs),

    /// Generate a remediation plan without changing anything
    Plan(PlanArgs),

    /// Generate and execute a remediation plan
    Apply(ApplyArgs),

    /// Print JSON schemas for the output types
    Schema(SchemaArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Print version information
    Version,
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct TargetArgs {
    /// Target type: namespace (ns), crd, or any resource type (pod, deploy, ...)
    target_type: Option<String>,

    /// Target name
    name: Option<String>,

    /// Namespace of a namespaced resource
    #[arg(short = 'n', long)]
    namespace: Option<String>,
}

impl TargetArgs {
    fn spec(&self) -> Result<TargetSpec> {
        let target_type = self
            .target_type
            .clone()
            .ok_or_else(|| Error::InvalidInput("target type is required".to_string()))?;
        Ok(TargetSpec::new(target_type, self.name.clone().unwrap_or_default())
            .in_namespace(self.namespace.clone()))
    }
}

#[derive(Args, Debug)]
struct DiagnoseArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Also look for admission webhooks that may block remediation
    #[arg(long)]
    check_webhooks: bool,
}

#[derive(Args, Debug)]
struct PlanningArgs {
    /// Highest escalation level to plan (0-4)
    #[arg(long)]
    max_escalation: Option<u8>,

    /// Permit level 3 and 4 actions
    #[arg(long)]
    allow_force: bool,

    /// Plan from a saved DiagnosisReport (JSON) instead of querying the cluster
    #[arg(long, value_name = "FILE")]
    from_report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PlanArgs {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    planning: PlanningArgs,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    planning: PlanningArgs,

    /// Show what would run without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Skip confirmation prompts for force actions
    #[arg(short = 'y', long)]
    yes: bool,

    /// Keep going after a failed action
    #[arg(long)]
    continue_on_error: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Type to print (see --list)
    type_name: Option<String>,

    /// List available types
    #[arg(long)]
    list: bool,

    /// Print every schema as one JSON object
    #[arg(long)]
    all: bool,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,
}

#[derive(Args, Debug)]
struct CompletionsArgs {
    shell: Shell,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version print to stdout and succeed.
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            let _ = err.print();
            std::process::exit(code.as_i32());
        }
    };

    let exit_code = match &cli.command {
        Commands::Diagnose(args) => {
            run_with_session(&cli.global, ConfigOverrides::default(), |s| {
                run_diagnose(s, args)
            })
        }
        Commands::Plan(args) => {
            let overrides = planning_overrides(&args.planning);
            run_with_session(&cli.global, overrides, |s| run_plan(s, args))
        }
        Commands::Apply(args) => {
            let overrides = ConfigOverrides {
                dry_run: args.dry_run.then_some(true),
                auto_confirm: args.yes.then_some(true),
                continue_on_error: args.continue_on_error.then_some(true),
                ..planning_overrides(&args.planning)
            };
            run_with_session(&cli.global, overrides, |s| run_apply(s, args))
        }
        Commands::Schema(args) => run_schema(&cli.global, args),
        Commands::Completions(args) => {
            clap_complete::generate(args.shell, &mut Cli::command(), "unstuck", &mut io::stdout());
            ExitCode::Clean
        }
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Session setup
// ============================================================================

/// Everything a cluster-facing command needs, built once per invocation.
struct Session {
    config: UnstuckConfig,
    printer: Printer,
    client: KubectlClient,
    deadline: Deadline,
    ctx: LogContext,
}

fn planning_overrides(args: &PlanningArgs) -> ConfigOverrides {
    ConfigOverrides {
        max_escalation: args.max_escalation,
        allow_force: args.allow_force.then_some(true),
        ..ConfigOverrides::default()
    }
}

fn config_error(err: ValidationError) -> Error {
    Error::Config(err.to_string())
}

fn output_format(global: &GlobalOpts) -> OutputFormat {
    global
        .output
        .unwrap_or_else(|| OutputFormat::auto_detect(io::stdout().is_terminal()))
}

/// Load config, start logging, then run `f`, mapping its error to an exit code.
fn run_with_session<F>(global: &GlobalOpts, mut overrides: ConfigOverrides, f: F) -> ExitCode
where
    F: FnOnce(&Session) -> Result<ExitCode>,
{
    overrides.kubeconfig = global.kubeconfig.clone();
    overrides.context = global.context.clone();
    overrides.overall_timeout = global.timeout;
    if global.verbose > 0 {
        overrides.verbose_audit = Some(true);
    }

    let loaded = load_config(global.config.as_deref());
    let (file_level, file_format) = match &loaded {
        Ok(l) => (l.config.logging.level.clone(), l.config.logging.format.clone()),
        Err(_) => (None, None),
    };
    let cli_level = global
        .log_level
        .or_else(|| LogLevel::from_verbosity(global.verbose, global.quiet));
    init_logging(&LogConfig::resolve(
        file_level.as_deref(),
        file_format.as_deref(),
        cli_level,
        global.log_format,
    )
    .with_timestamps(global.verbose > 1));

    let format = output_format(global);
    let session = match start_session(global, loaded.map_err(config_error), &overrides, format) {
        Ok(session) => session,
        Err(err) => return report_error(format, &LogContext::default(), &err),
    };

    log_event!(
        session.ctx,
        INFO,
        event_names::RUN_STARTED,
        Stage::Init,
        "unstuck started",
        version = env!("CARGO_PKG_VERSION")
    );
    let exit_code = match f(&session) {
        Ok(code) => code,
        Err(err) => report_error(format, &session.ctx, &err),
    };
    log_event!(
        session.ctx,
        INFO,
        event_names::RUN_FINISHED,
        Stage::Report,
        "unstuck finished",
        exit_code = exit_code.as_i32()
    );
    exit_code
}

fn start_session(
    global: &GlobalOpts,
    loaded: Result<unstuck_config::LoadedConfig>,
    overrides: &ConfigOverrides,
    format: OutputFormat,
) -> Result<Session> {
    let loaded = loaded?;
    let source = loaded.path.source;
    let (config, snapshot) = loaded.finalize(overrides).map_err(config_error)?;

    let deadline = Deadline::from_secs(config.cluster.overall_timeout);
    let client = KubectlClient::from_settings(&config.cluster, deadline);
    let ctx = LogContext::new(generate_run_id(), client.cluster_label());

    match &snapshot.path {
        Some(path) => log_event!(
            ctx,
            INFO,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "Loaded configuration",
            source = source.to_string().as_str(),
            path = path.as_str(),
            config_id = snapshot.short_id()
        ),
        None => log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "No config file found, using defaults"
        ),
    }
    if config.apply.verbose_audit {
        if let Ok(json) = snapshot.to_json() {
            log_event!(
                ctx,
                DEBUG,
                event_names::CONFIG_LOADED,
                Stage::Init,
                "Effective configuration",
                snapshot = json.as_str()
            );
        }
    }

    Ok(Session {
        config,
        printer: Printer::new(format, global.verbose > 0),
        client,
        deadline,
        ctx,
    })
}

/// Print `err` and pick the exit code for it.
fn report_error(format: OutputFormat, ctx: &LogContext, err: &Error) -> ExitCode {
    let exit_code = ExitCode::for_error(err);
    log_event!(
        ctx,
        DEBUG,
        event_names::INTERNAL_ERROR,
        Stage::Report,
        "Command failed",
        code = err.code(),
        exit_code = exit_code.as_i32()
    );

    let structured = StructuredError::from(err);
    if format.is_structured() {
        println!("{}", structured.to_json_pretty());
    } else {
        eprintln!("error: {}: {}", err.headline(), structured.message);
        eprintln!("hint: {}", structured.remediation);
    }
    exit_code
}

// ============================================================================
// Command implementations
// ============================================================================

fn read_report(path: &Path) -> Result<DiagnosisReport> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Diagnose the target, or load a saved report when `--from-report` is given.
fn obtain_report(
    session: &Session,
    target: &TargetArgs,
    from_report: Option<&Path>,
) -> Result<DiagnosisReport> {
    match from_report {
        Some(path) => {
            if target.target_type.is_some() {
                log_event!(
                    session.ctx,
                    WARN,
                    event_names::DIAGNOSE_STARTED,
                    Stage::Diagnose,
                    "Ignoring target arguments in favor of --from-report"
                );
            }
            read_report(path)
        }
        None => diagnose(&session.client, &target.spec()?, false, &session.ctx),
    }
}

fn build_plan(session: &Session, report: &DiagnosisReport) -> Result<Plan> {
    let plan = Planner::new(PlannerConfig::from_settings(&session.config.plan)?).plan(report)?;

    let ctx = session.ctx.clone().with_resource(plan.target.key());
    log_event!(
        ctx,
        INFO,
        event_names::PLAN_GENERATED,
        Stage::Plan,
        "Generated plan",
        actions = plan.len(),
        risk = plan.risk_level.as_str(),
        max_escalation = plan.max_escalation.as_u8()
    );
    Ok(plan)
}

fn run_diagnose(session: &Session, args: &DiagnoseArgs) -> Result<ExitCode> {
    let spec = args.target.spec()?;
    let report = diagnose(&session.client, &spec, args.check_webhooks, &session.ctx)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    session.printer.print_diagnosis(&mut out, &report)?;
    if args.check_webhooks
        && !session.printer.format().is_structured()
        && !report.webhook_issues.is_empty()
        && session.config.apply.verbose_audit
    {
        session.printer.print_webhooks(&mut out, &report.webhook_issues)?;
    }
    Ok(ExitCode::Clean)
}

fn run_plan(session: &Session, args: &PlanArgs) -> Result<ExitCode> {
    let report = obtain_report(session, &args.target, args.planning.from_report.as_deref())?;
    let plan = build_plan(session, &report)?;

    let stdout = io::stdout();
    session.printer.print_plan(&mut stdout.lock(), &report, &plan)?;
    Ok(ExitCode::Clean)
}

fn run_apply(session: &Session, args: &ApplyArgs) -> Result<ExitCode> {
    let report = obtain_report(session, &args.target, args.planning.from_report.as_deref())?;
    let plan = build_plan(session, &report)?;
    let text = !session.printer.format().is_structured();

    if text {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", apply_banner(&plan))?;
        writeln!(out)?;
        if plan.is_empty() {
            return Ok(ExitCode::Clean);
        }
    }

    let mut auto = AutoConfirm;
    let mut prompt = StdinConfirmer::stdio();
    let confirmer: &mut dyn Confirmer = if session.config.apply.auto_confirm {
        &mut auto
    } else {
        &mut prompt
    };

    // Progress lines would corrupt a structured payload on stdout.
    let mut progress: Box<dyn Write> = if text {
        Box::new(io::stdout())
    } else {
        Box::new(io::stderr())
    };

    let executor = ClusterExecutor::new(&session.client);
    let result = Applier::new(
        &executor,
        confirmer,
        &mut *progress,
        ApplierConfig::from(&session.config.apply),
    )
    .with_deadline(session.deadline)
    .with_context(session.ctx.clone().with_resource(plan.target.key()))
    .apply(&plan);
    drop(progress);

    let stdout = io::stdout();
    session.printer.print_apply_result(&mut stdout.lock(), &result)?;
    Ok(ExitCode::from_apply(result.exit_code))
}

fn run_schema(global: &GlobalOpts, args: &SchemaArgs) -> ExitCode {
    let format = if args.compact {
        SchemaFormat::JsonCompact
    } else {
        SchemaFormat::Json
    };

    if args.all {
        let all = generate_all_schemas();
        return match serde_json::to_value(all)
            .and_then(|value| format_schema(&value, format))
        {
            Ok(text) => {
                println!("{}", text);
                ExitCode::Clean
            }
            Err(e) => report_error(OutputFormat::Text, &LogContext::default(), &e.into()),
        };
    }

    match (&args.type_name, args.list) {
        (Some(name), false) => match generate_schema(name) {
            Some(schema) => match format_schema(&schema, format) {
                Ok(text) => {
                    println!("{}", text);
                    ExitCode::Clean
                }
                Err(e) => report_error(OutputFormat::Text, &LogContext::default(), &e.into()),
            },
            None => {
                let err = Error::InvalidInput(format!(
                    "unknown schema type {:?}; run 'unstuck schema --list'",
                    name
                ));
                report_error(OutputFormat::Text, &LogContext::default(), &err)
            }
        },
        _ => {
            print_schema_list(global);
            ExitCode::Clean
        }
    }
}

fn print_schema_list(global: &GlobalOpts) {
    let schemas = available_schemas();
    if matches!(global.output, Some(OutputFormat::Json)) {
        let list: Vec<_> = schemas
            .iter()
            .map(|(name, description)| serde_json::json!({"name": name, "description": description}))
            .collect();
        println!("{}", serde_json::Value::Array(list));
        return;
    }
    println!("Available schemas:");
    for (name, description) in schemas {
        println!("  {:<18} {}", name, description);
    }
}

fn print_version(global: &GlobalOpts) {
    match global.output {
        Some(OutputFormat::Json) | Some(OutputFormat::Yaml) => {
            let version_info = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "unstuck_version": env!("CARGO_PKG_VERSION"),
                "rust_version": env!("CARGO_PKG_RUST_VERSION"),
            });
            println!("{:#}", version_info);
        }
        _ => {
            println!("unstuck {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", SCHEMA_VERSION);
        }
    }
}
