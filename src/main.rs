use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use ttypace::config::{self, ConfigFile};
use ttypace::keybindings::{self, Keybindings};
use ttypace::input::{KeySource, StdinKeys};
use ttypace::keytree::KeyTree;
use ttypace::monitor;
use ttypace::terminal::{self, RawModeGuard};
use ttypace::pty::ShellCommand;
use ttypace::template::TemplateContext;
use ttypace::{AutoPilotMode, InputMode, Outcome, Session, SessionConfig, SessionError, SessionScript};

#[derive(Parser, Debug)]
#[command(
    name = "ttypace",
    about = "Play a shell script into a live terminal session at a human pace",
    version
)]
struct Args {
    /// Script to play
    #[arg(value_name = "SESSION_FILE", required_unless_present_any = ["list_bindings", "query", "show_keys"])]
    session_file: Option<PathBuf>,

    /// Shell to start (default: $SHELL, then sh)
    #[arg(long)]
    shell: Option<String>,

    /// Answer status queries on this UDP port
    #[arg(long, value_name = "PORT")]
    monitor_port: Option<u16>,

    /// Command typed into the shell before the script starts
    #[arg(long = "setup-command", value_name = "COMMAND")]
    setup_commands: Vec<String>,

    /// Command typed into the shell after the script ends
    #[arg(long = "cleanup-command", value_name = "COMMAND")]
    cleanup_commands: Vec<String>,

    /// Program run before the session starts; failure aborts
    #[arg(long = "setup-script", value_name = "PROGRAM")]
    setup_scripts: Vec<String>,

    /// Program run after the session ends
    #[arg(long = "cleanup-script", value_name = "PROGRAM")]
    cleanup_scripts: Vec<String>,

    /// Template variable for the script
    #[arg(short = 'v', long = "context-variable", value_name = "NAME=VALUE")]
    context: Vec<String>,

    /// Key binding override, e.g. 106=Command_NextLine
    #[arg(short = 'b', long = "bind", value_name = "CODE=ACTION")]
    bindings: Vec<String>,

    /// Extra configuration file, searched before the default locations
    #[arg(long = "config-file", value_name = "PATH")]
    config_files: Vec<PathBuf>,

    /// Random pauses between keystrokes in Auto mode
    #[arg(long)]
    simulate_typing: bool,

    /// Start in Auto mode
    #[arg(
        long,
        value_enum,
        value_name = "PILOT",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "full"
    )]
    auto: Option<Pilot>,

    /// Where to write the log
    #[arg(long, value_name = "PATH", default_value = "ttypace.log")]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    debug: bool,

    /// Print the effective key bindings and exit
    #[arg(long)]
    list_bindings: bool,

    /// Print one status snapshot from a running session and exit
    #[arg(long, value_name = "PORT")]
    query: Option<u16>,

    /// Print the codes of each key pressed until Ctrl-C, for use in bindings
    #[arg(long)]
    show_keys: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Pilot {
    Semi,
    Full,
}

impl From<Pilot> for AutoPilotMode {
    fn from(pilot: Pilot) -> Self {
        match pilot {
            Pilot::Semi => AutoPilotMode::Semi,
            Pilot::Full => AutoPilotMode::Full,
        }
    }
}

fn main() {
    let args = Args::parse();
    let code = match run(args) {
        Ok(outcome) => {
            if let Outcome::Failure(err) = &outcome {
                tracing::error!("{err}");
                eprintln!("ttypace: {err}");
            }
            outcome.exit_code()
        }
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("ttypace: {err:#}");
            if err.chain().any(|cause| cause.is::<SessionError>()) {
                2
            } else {
                3
            }
        }
    };
    std::process::exit(code);
}

fn run(args: Args) -> Result<Outcome> {
    init_logging(&args)?;

    if let Some(port) = args.query {
        let status = monitor::query(("127.0.0.1", port), Duration::from_secs(2))
            .with_context(|| format!("no answer from monitor port {port}"))?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(Outcome::NormalExit);
    }

    if args.show_keys {
        show_keys()?;
        return Ok(Outcome::NormalExit);
    }

    let file_config = config::discover(&args.config_files).context("Failed to read configuration")?;
    let bindings = resolve_bindings(&file_config, &args.bindings);

    if args.list_bindings {
        print_bindings(&bindings);
        return Ok(Outcome::NormalExit);
    }

    let Some(session_file) = args.session_file.clone() else {
        bail!(SessionError::Script("no session file given".to_string()));
    };
    let context = resolve_context(&file_config, &args.context)?;

    // fail on a bad script before anything touches the terminal
    let mut script = SessionScript::with_context(context.clone());
    script
        .load(&session_file)
        .with_context(|| format!("Failed to load session file: {}", session_file.display()))?;
    tracing::debug!("loaded {} lines from {}", script.len(), session_file.display());

    let session_config = session_config(&args, file_config.clone(), context, bindings);

    let setup_scripts = [args.setup_scripts.as_slice(), file_config.setup_scripts.as_slice()].concat();
    let cleanup_scripts = [args.cleanup_scripts.as_slice(), file_config.cleanup_scripts.as_slice()].concat();

    run_scripts("setup", &setup_scripts).context("Setup script failed")?;
    let outcome = play(session_config, script);
    if let Err(err) = run_scripts("cleanup", &cleanup_scripts) {
        tracing::warn!("{err:#}");
        eprintln!("ttypace: {err:#}");
    }
    Ok(outcome)
}

fn play(config: SessionConfig, script: SessionScript) -> Outcome {
    let mut session = match Session::new(config) {
        Ok(session) => session,
        Err(err) => return Outcome::Failure(err),
    };
    if let Err(err) = session.attach_script(script) {
        return Outcome::Failure(err);
    }
    let outcome = session.run();
    session.shutdown();
    tracing::debug!("session ended: {outcome:?}");
    outcome
}

fn init_logging(args: &Args) -> Result<()> {
    let file = File::create(&args.log_file)
        .with_context(|| format!("Failed to create log file: {}", args.log_file.display()))?;
    let level = if args.debug { "debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")?;
    Ok(())
}

/// Defaults, then the config file table, then `-b` overrides. Bad entries are
/// reported and skipped.
fn resolve_bindings(file_config: &ConfigFile, overrides: &[String]) -> Keybindings {
    let mut bindings = Keybindings::default();
    let mut errors = file_config.apply_keybindings(&mut bindings);
    for assignment in overrides {
        let result = keybindings::parse_assignment(assignment)
            .and_then(|(code, name)| bindings.add_named(code, &name));
        if let Err(err) = result {
            errors.push(err);
        }
    }
    for err in errors {
        tracing::warn!("{err}");
        eprintln!("ttypace: {err}");
    }
    bindings
}

fn print_bindings(bindings: &Keybindings) {
    for (code, action) in bindings.entries() {
        println!("{:<34} {} ({code})", action.name(), keybindings::describe_key(code));
    }
}

fn show_keys() -> Result<()> {
    terminal::capture()?;
    let _raw_mode = RawModeGuard::enter()?;
    let mut keys = StdinKeys::new(KeyTree::with_default_sequences());
    let mut stdout = io::stdout();

    write!(stdout, "Press keys to see their codes. Ctrl-C ends.\r\n")?;
    stdout.flush()?;
    while let Some(key) = keys.read_key()? {
        write!(stdout, "{}\r\n", keybindings::describe_sequence(&key))?;
        stdout.flush()?;
        if key == b"\x03" {
            break;
        }
    }
    Ok(())
}

fn resolve_context(file_config: &ConfigFile, assignments: &[String]) -> Result<TemplateContext> {
    let mut context: TemplateContext = file_config.context.clone();
    for assignment in assignments {
        let Some((name, value)) = assignment.split_once('=') else {
            bail!(SessionError::Config(format!(
                "expected NAME=VALUE, got: {assignment}"
            )));
        };
        context.insert(name.trim().to_string(), value.to_string());
    }
    Ok(context)
}

fn session_config(
    args: &Args,
    file_config: ConfigFile,
    context: TemplateContext,
    bindings: Keybindings,
) -> SessionConfig {
    let mut typing = file_config.typing_config();
    if args.simulate_typing {
        typing.enabled = true;
    }
    let auto_pilot = args
        .auto
        .map(AutoPilotMode::from)
        .unwrap_or_else(|| file_config.auto_pilot_mode());
    let initial_mode = if args.auto.is_some() {
        InputMode::Auto
    } else {
        InputMode::Insert
    };

    SessionConfig {
        shell: ShellCommand::resolve(args.shell.as_deref().or(file_config.shell.as_deref())),
        script_path: args.session_file.clone(),
        context,
        bindings,
        monitor_port: args.monitor_port.or(file_config.monitor_port),
        setup_commands: [args.setup_commands.clone(), file_config.setup_commands].concat(),
        cleanup_commands: [args.cleanup_commands.clone(), file_config.cleanup_commands].concat(),
        auto_pilot,
        initial_mode,
        typing,
        output_dir: file_config.output_dir.unwrap_or_else(|| PathBuf::from(".")),
    }
}

fn run_scripts(phase: &str, scripts: &[String]) -> Result<()> {
    for script in scripts {
        tracing::debug!("running {phase} script: {script}");
        let status = Command::new("sh")
            .arg("-c")
            .arg(script)
            .status()
            .with_context(|| format!("Failed to start {phase} script: {script}"))?;
        if !status.success() {
            bail!(SessionError::Process(format!(
                "{phase} script `{script}` exited with {status}"
            )));
        }
    }
    Ok(())
}
