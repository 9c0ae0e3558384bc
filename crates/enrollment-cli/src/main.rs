mod wizard;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use enrollment_backend::{
    AuthClient, AuthFlow, AuthOutcome, BackendConfig, Dashboard, Notice, RestPersistence,
    SessionStore, SubmissionAdapter, SubmitOutcome, load_dashboard, sign_out,
};
use enrollment_spec::{
    Advance, Field, RecordPatch, Step, SubmitBlocked, ValidationReport, Wizard,
    build_render_payload, insert_schema, record_schema, step_spec, validate_record,
};
use serde_json::Value;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use wizard::{
    RenderMode, Reply, Verbosity, WizardPresenter, parse_reply, prompt_bool, prompt_line,
    prompt_non_empty, read_line,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const DEFAULT_SESSION_FILE: &str = ".enroll-session.json";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Text-based student enrollment wizard",
    long_about = "Walks through the four enrollment steps, validates answers, and submits applications to the hosted backend"
)]
struct Cli {
    /// Backend config JSON; defaults to the ENROLLMENT_* environment variables.
    #[arg(long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Show verbose output (debug logs, statuses, field ids).
    #[arg(long, global = true, alias = "debug")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SchemaTarget {
    Record,
    Insert,
}

#[derive(Subcommand)]
enum Command {
    /// Fill in an enrollment application step by step.
    Wizard {
        /// Optional JSON file with answers to prefill.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Render output mode for each step.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
        /// Print the insert payload instead of submitting it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate an answers file against every step.
    Validate {
        /// Path to the answers JSON file.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Print the JSON Schema for answers files or the stored row.
    Schema {
        #[arg(long, value_enum, default_value_t = SchemaTarget::Record)]
        target: SchemaTarget,
    },
    /// Sign in with email and password.
    SignIn {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account; a confirmation email is sent.
    SignUp {
        #[arg(long)]
        email: String,
        /// Prompted for (twice) when omitted.
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Sign out everywhere.
    SignOut,
    /// Show the signed-in user.
    Whoami,
    /// List your applications, newest first.
    Applications {
        /// Emit the dashboard as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.config.as_deref();
    match cli.command {
        Command::Wizard {
            answers,
            format,
            dry_run,
        } => run_wizard(config, answers, cli.verbose, format, dry_run).await,
        Command::Validate { answers } => run_validate(&answers),
        Command::Schema { target } => run_schema(target),
        Command::SignIn { email, password } => run_sign_in(config, &email, password).await,
        Command::SignUp {
            email,
            password,
            confirm_password,
        } => run_sign_up(config, &email, password, confirm_password).await,
        Command::SignOut => run_sign_out(config).await,
        Command::Whoami => run_whoami(config).await,
        Command::Applications { json } => run_applications(config, json).await,
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

struct Backend {
    config: BackendConfig,
    auth: AuthClient,
}

impl Backend {
    fn connect(config_path: Option<&Path>) -> CliResult<Self> {
        let config = match config_path {
            Some(path) => BackendConfig::from_file(path)?,
            None => BackendConfig::from_env()?,
        };
        let session_path = config
            .session_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));
        debug!(session = %session_path.display(), "opening session store");
        let store = SessionStore::open(session_path)?;
        let auth = AuthClient::new(config.clone(), store)?;
        Ok(Self { config, auth })
    }

    fn persistence(&self) -> RestPersistence {
        RestPersistence::new(self.config.clone()).with_access_token(self.auth.access_token())
    }
}

fn load_answers(path: &Path) -> CliResult<RecordPatch> {
    let contents = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&contents)?;
    Ok(RecordPatch::from_json(&value)?)
}

enum StepFlow {
    Advance,
    Back,
}

async fn run_wizard(
    config_path: Option<&Path>,
    answers_path: Option<PathBuf>,
    verbose: bool,
    format: RenderMode,
    dry_run: bool,
) -> CliResult<()> {
    let mut wizard = Wizard::new();
    if let Some(path) = answers_path {
        wizard.patch(load_answers(&path)?)?;
    }
    let presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), format);
    println!("Type 'next' to move on, 'back' to return to the previous step, 'exit' to quit.");

    loop {
        let payload = build_render_payload(&wizard);
        presenter.show_step(&payload)?;

        if wizard.step() == Step::Confirmation {
            if wizard.submission_blocker() == Some(SubmitBlocked::ConsentMissing) {
                println!("Parental consent is required. Type 'consent' to provide it.");
            }
            let command = prompt_line("submit, consent, back or exit", Some("submit"))?;
            match command.to_lowercase().as_str() {
                "submit" => {
                    let done = if dry_run {
                        submit_dry_run(&mut wizard, &presenter)?
                    } else {
                        submit_to_backend(config_path, &mut wizard, &presenter).await?
                    };
                    if done {
                        return Ok(());
                    }
                }
                "consent" => {
                    let given = prompt_bool("I give parental consent for this enrollment", true)?;
                    wizard.patch(RecordPatch::new().flag(Field::ParentalConsentGiven, given))?;
                }
                "back" => {
                    wizard.retreat();
                }
                "exit" => return Err("wizard aborted by user".into()),
                other => println!("Unknown command '{}'.", other),
            }
            continue;
        }

        if let StepFlow::Back = collect_step(&mut wizard, &presenter)? {
            wizard.retreat();
            continue;
        }
        match wizard.advance() {
            Advance::Blocked => presenter.show_errors(wizard.errors()),
            Advance::Moved(step) => debug!(?step, "advanced"),
            Advance::Capped => {}
        }
    }
}

/// Prompts for every active field of the current step.
fn collect_step(wizard: &mut Wizard, presenter: &WizardPresenter) -> CliResult<StepFlow> {
    let spec = step_spec(wizard.step());
    for field_spec in &spec.fields {
        if !field_spec.is_active(wizard.record()) {
            continue;
        }
        loop {
            presenter.show_prompt(field_spec, &wizard.record().get(field_spec.field));
            print!("> ");
            let raw = read_line()?;
            match parse_reply(field_spec, &raw) {
                Ok(Reply::Keep) => break,
                Ok(Reply::Value(value)) => {
                    let mut patch = RecordPatch::new();
                    patch.insert(field_spec.field, value);
                    wizard.patch(patch)?;
                    break;
                }
                Ok(Reply::Next) => return Ok(StepFlow::Advance),
                Ok(Reply::Back) => return Ok(StepFlow::Back),
                Ok(Reply::Exit) => return Err("wizard aborted by user".into()),
                Err(err) => presenter.show_parse_error(&err),
            }
        }
    }
    Ok(StepFlow::Advance)
}

fn submit_dry_run(wizard: &mut Wizard, presenter: &WizardPresenter) -> CliResult<bool> {
    match wizard.prepare_submission("dry-run") {
        Ok(insert) => {
            println!("{}", serde_json::to_string_pretty(&insert)?);
            wizard.reset();
            Ok(true)
        }
        Err(blocked) => {
            presenter.show_notice(&Notice::error("Submission Blocked", blocked.to_string()));
            Ok(false)
        }
    }
}

async fn submit_to_backend(
    config_path: Option<&Path>,
    wizard: &mut Wizard,
    presenter: &WizardPresenter,
) -> CliResult<bool> {
    let backend = Backend::connect(config_path)?;
    let user = match backend.auth.current_user().await {
        Ok(user) => user,
        Err(err) => {
            warn!(error = %err, "could not check the signed-in user");
            None
        }
    };
    let adapter = SubmissionAdapter::with_table(backend.persistence(), backend.config.table.clone());
    let outcome = adapter.submit(wizard, user.as_ref()).await;
    presenter.show_notice(outcome.notice());

    match outcome {
        SubmitOutcome::Submitted { route, .. } => {
            println!("Redirecting to {route}");
            Ok(true)
        }
        SubmitOutcome::AuthenticationRequired(_) => {
            if prompt_bool("Sign in now?", true)? {
                let email = prompt_non_empty("Email")?;
                let password = prompt_non_empty("Password")?;
                let mut flow = AuthFlow::new();
                let outcome = flow.sign_in(&backend.auth, &email, &password).await;
                presenter.show_notice(&outcome.notice);
            }
            Ok(false)
        }
        SubmitOutcome::Blocked(_) | SubmitOutcome::Failed(_) => Ok(false),
    }
}

fn run_validate(answers_path: &Path) -> CliResult<()> {
    let mut wizard = Wizard::new();
    wizard.patch(load_answers(answers_path)?)?;
    let report = validate_record(wizard.record());
    println!(
        "Validation result: {}",
        if report.valid { "valid" } else { "invalid" }
    );
    describe_validation(&report);

    if report.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(report: &ValidationReport) {
    if !report.errors.is_empty() {
        println!("Errors:");
        for error in &report.errors {
            println!("  {} - {}", error.field, error.message);
        }
    }
    if !report.consent_satisfied {
        println!("Parental consent is required but has not been given.");
    }
}

fn run_schema(target: SchemaTarget) -> CliResult<()> {
    let schema = match target {
        SchemaTarget::Record => record_schema(),
        SchemaTarget::Insert => insert_schema(),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn report_auth(outcome: AuthOutcome) -> CliResult<()> {
    if outcome.notice.is_error() {
        return Err(outcome.notice.to_string().into());
    }
    println!("{}", outcome.notice);
    if let Some(route) = outcome.route {
        println!("Redirecting to {route}");
    }
    Ok(())
}

async fn run_sign_in(
    config_path: Option<&Path>,
    email: &str,
    password: Option<String>,
) -> CliResult<()> {
    let backend = Backend::connect(config_path)?;
    let password = match password {
        Some(password) => password,
        None => prompt_non_empty("Password")?,
    };
    let mut flow = AuthFlow::new();
    let outcome = flow.sign_in(&backend.auth, email, &password).await;
    report_auth(outcome)
}

async fn run_sign_up(
    config_path: Option<&Path>,
    email: &str,
    password: Option<String>,
    confirm_password: Option<String>,
) -> CliResult<()> {
    let backend = Backend::connect(config_path)?;
    let password = match password {
        Some(password) => password,
        None => prompt_non_empty("Password")?,
    };
    let confirm_password = match confirm_password {
        Some(confirm) => confirm,
        None => prompt_non_empty("Confirm Password")?,
    };
    let mut flow = AuthFlow::new();
    let outcome = flow
        .sign_up(&backend.auth, email, &password, &confirm_password)
        .await;
    report_auth(outcome)
}

async fn run_sign_out(config_path: Option<&Path>) -> CliResult<()> {
    let backend = Backend::connect(config_path)?;
    let notice = sign_out(&backend.auth).await;
    if notice.is_error() {
        return Err(notice.to_string().into());
    }
    println!("{notice}");
    Ok(())
}

async fn run_whoami(config_path: Option<&Path>) -> CliResult<()> {
    let backend = Backend::connect(config_path)?;
    match backend.auth.current_user().await? {
        Some(user) => println!(
            "Signed in as {} ({})",
            user.email.as_deref().unwrap_or("<no email>"),
            user.id
        ),
        None => println!("Not signed in. Run `enroll sign-in` to continue."),
    }
    Ok(())
}

async fn run_applications(config_path: Option<&Path>, json: bool) -> CliResult<()> {
    let backend = Backend::connect(config_path)?;
    let Some(user) = backend.auth.current_user().await? else {
        return Err("not signed in; run `enroll sign-in` first".into());
    };
    let dashboard = load_dashboard(&backend.persistence(), &backend.config.table, &user).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        print_dashboard(&dashboard);
    }
    Ok(())
}

fn print_dashboard(dashboard: &Dashboard) {
    println!(
        "Applications: {}  Pending: {}  Approved: {}",
        dashboard.total, dashboard.pending, dashboard.approved
    );
    if dashboard.is_empty() {
        println!("No applications yet");
        println!("Start your first enrollment to see applications here.");
        return;
    }
    println!("Recent applications:");
    for row in dashboard.recent() {
        println!(
            "  {} {} ({}) - {} - submitted {}",
            row.student_first_name,
            row.student_last_name,
            row.student_grade,
            row.application_status.as_str(),
            row.created_at.format("%B %-d, %Y")
        );
    }
}
