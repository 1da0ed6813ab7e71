use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use time::Duration;

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(SocketAddr, byb::config::AppConfig),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    match &cli.command {
        Some(Command::Init(args)) => return RunOutcome::Exit(run_init(args)),
        Some(Command::AuthKey) => return RunOutcome::Exit(run_auth_key()),
        Some(Command::Token(args)) => return RunOutcome::Exit(run_token(&cli, args)),
        None => {}
    }

    let store = match cli.store.as_ref() {
        Some(store) => store.clone(),
        None => {
            eprintln!("error: --store is required unless using a subcommand");
            return RunOutcome::Exit(2);
        }
    };

    let auth = match resolve_auth_config(&cli) {
        Ok(auth) => auth,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };
    let dispatch = match resolve_dispatch_config(&cli) {
        Ok(dispatch) => dispatch,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };
    let eva = match resolve_eva_config(&cli) {
        Ok(eva) => eva,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };

    RunOutcome::Serve(
        cli.listen,
        byb::config::AppConfig {
            store,
            app_name: cli.app_name,
            vapid_private_key: cli.vapid_private_key,
            vapid_public_key: cli.vapid_public_key,
            vapid_subject: cli.vapid_subject,
            auth,
            dispatch,
            eva,
        },
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "byb",
    version,
    about = "Personal wellbeing companion server: focus timer, reminders, web push"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long)]
    store: Option<PathBuf>,
    #[arg(long, default_value = "BYB")]
    app_name: String,
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
    #[arg(long, env = "BYB_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "BYB_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "BYB_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    #[arg(long, env = "BYB_AUTH_KEY")]
    auth_key: Option<String>,
    #[arg(long, env = "BYB_AUTH_TOKEN_TTL")]
    auth_token_ttl: Option<String>,
    #[arg(long, default_value = "60s", env = "BYB_DISPATCH_INTERVAL")]
    dispatch_interval: String,
    #[arg(long, default_value_t = 100, env = "BYB_DISPATCH_BATCH")]
    dispatch_batch: usize,
    #[arg(long, default_value = "24h", env = "BYB_DISPATCH_RETRY_WINDOW")]
    dispatch_retry_window: String,
    #[arg(long, env = "BYB_EVA_API_URL")]
    eva_api_url: Option<String>,
    #[arg(long, env = "BYB_EVA_API_KEY")]
    eva_api_key: Option<String>,
    #[arg(long, default_value = "gpt-4o-mini", env = "BYB_EVA_MODEL")]
    eva_model: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate VAPID credentials for web push.
    Init(InitArgs),
    /// Generate a random API token signing key.
    AuthKey,
    /// Mint a signed bearer token for a user.
    Token(TokenArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug)]
struct TokenArgs {
    #[arg(long)]
    user: String,
}

fn run_init(args: &InitArgs) -> i32 {
    let credentials = match byb::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("failed to generate VAPID credentials: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject.as_ref() {
        Some(subject) => (subject.clone(), false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("BYB_VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("BYB_VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("BYB_VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace BYB_VAPID_SUBJECT with a contact URI you control.");
    }
    println!();
    println!(
        "--vapid-private-key \"{}\" --vapid-public-key \"{}\" --vapid-subject \"{subject}\"",
        credentials.private_key, credentials.public_key
    );
    0
}

fn run_auth_key() -> i32 {
    let secret = match byb::auth::generate_auth_key() {
        Ok(secret) => secret,
        Err(err) => {
            eprintln!("failed to generate auth key: {err}");
            return 1;
        }
    };
    println!("{secret}");
    0
}

fn run_token(cli: &Cli, args: &TokenArgs) -> i32 {
    let Some(key) = cli.auth_key.as_deref() else {
        eprintln!("error: --auth-key is required to mint a token");
        return 2;
    };
    let token_ttl = match cli.auth_token_ttl.as_deref() {
        Some(raw) => match parse_duration_flag(raw, "auth token ttl") {
            Ok(token_ttl) => token_ttl,
            Err(err) => {
                eprintln!("error: {err}");
                return 2;
            }
        },
        None => default_auth_token_ttl(),
    };
    let auth = match byb::auth::AuthState::from_parts(key, &cli.app_name, token_ttl) {
        Ok(auth) => auth,
        Err(err) => {
            eprintln!("invalid auth configuration: {err}");
            return 2;
        }
    };
    match auth.issue_token(&args.user) {
        Ok(token) => {
            println!("{token}");
            0
        }
        Err(err) => {
            eprintln!("failed to issue token: {err}");
            1
        }
    }
}

fn resolve_auth_config(cli: &Cli) -> Result<Option<byb::config::AuthConfig>, String> {
    let has_any = cli.auth_key.is_some() || cli.auth_token_ttl.is_some();
    if !has_any {
        return Ok(None);
    }

    let auth_key = cli
        .auth_key
        .as_ref()
        .ok_or("auth is configured but --auth-key is missing")?
        .trim();
    if auth_key.is_empty() {
        return Err("auth key cannot be empty".to_string());
    }

    let token_ttl = match cli.auth_token_ttl.as_deref() {
        Some(raw) => parse_duration_flag(raw, "auth token ttl")?,
        None => default_auth_token_ttl(),
    };

    Ok(Some(byb::config::AuthConfig {
        key: auth_key.to_string(),
        token_ttl,
    }))
}

fn resolve_dispatch_config(cli: &Cli) -> Result<byb::config::DispatchConfig, String> {
    let interval = parse_duration_flag(&cli.dispatch_interval, "dispatch interval")?;
    let retry_window = parse_duration_flag(&cli.dispatch_retry_window, "dispatch retry window")?;
    if cli.dispatch_batch == 0 {
        return Err("dispatch batch must be greater than 0".to_string());
    }

    Ok(byb::config::DispatchConfig {
        interval: std::time::Duration::from_secs(interval.whole_seconds() as u64),
        batch_size: cli.dispatch_batch,
        retry_window,
    })
}

fn resolve_eva_config(cli: &Cli) -> Result<Option<byb::config::EvaConfig>, String> {
    match (cli.eva_api_url.as_deref(), cli.eva_api_key.as_deref()) {
        (None, None) => Ok(None),
        (Some(api_url), Some(api_key)) => {
            if api_url.trim().is_empty() || api_key.trim().is_empty() {
                return Err("eva api url and key cannot be empty".to_string());
            }
            Ok(Some(byb::config::EvaConfig {
                api_url: api_url.trim().to_string(),
                api_key: api_key.trim().to_string(),
                model: cli.eva_model.clone(),
            }))
        }
        (Some(_), None) => Err("eva is configured but --eva-api-key is missing".to_string()),
        (None, Some(_)) => Err("eva is configured but --eva-api-url is missing".to_string()),
    }
}

fn default_auth_token_ttl() -> Duration {
    Duration::days(14)
}

fn parse_duration_flag(raw: &str, what: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid {what} '{value}'; expected <number>[s|m|h|d]"))?;

    if amount <= 0 {
        return Err(format!("{what} must be greater than 0"));
    }

    match unit {
        's' => Ok(Duration::seconds(amount)),
        'm' => Ok(Duration::minutes(amount)),
        'h' => Ok(Duration::hours(amount)),
        'd' => Ok(Duration::days(amount)),
        _ => Err(format!(
            "invalid {what} '{value}'; expected <number>[s|m|h|d]"
        )),
    }
}
