use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

use appforge_provision::bridge::{select_team_id, AppMetadata, CredentialBridge, Credentials};
use appforge_provision::reply::Reply;
use appforge_provision::toolchain::Toolchain;
use appforge_provision::{error_msg, prompts, settings, success, warn};

// ============================================================================
// ERROR HANDLING STRATEGY
// ============================================================================
//
// This binary distinguishes between CRITICAL and DECORATIVE I/O operations:
//
// CRITICAL I/O - Errors propagated with `?` operator:
//   • Settings reads/writes, toolchain subprocess calls, user input
//
// DECORATIVE I/O - Errors ignored with `let _ =`:
//   • Terminal coloring: buffer.set_color(), writeln!(), bufwtr.print()
//
// If stdout/stderr is closed or redirected to a broken pipe, status output
// degrades silently instead of crashing the provisioning flow.
// ============================================================================

/// Environment variable consulted for the account secret before prompting.
const PASSWORD_VAR: &str = "APPFORGE_APPLE_PASSWORD";

/// Settings key caching the selected team across runs.
const TEAM_ID_KEY: &str = "teamId";

#[derive(Parser)]
#[command(name = "appforge-provision")]
#[command(version, about = "Manage Apple signing credentials via the bundled provisioning toolchain")]
struct Cli {
    /// Show current settings and toolchain status
    #[arg(long)]
    show: bool,

    /// Validate credentials and select a team
    #[arg(long, conflicts_with = "show")]
    validate: bool,

    /// Register the app on the developer portal
    #[arg(long, conflicts_with_all = ["show", "validate"], requires_all = ["bundle_id", "app_name"])]
    create_app: bool,

    /// Verify the app identifier exists for the team
    #[arg(long, conflicts_with_all = ["show", "validate", "create_app"], requires_all = ["bundle_id", "app_name"])]
    verify_app: bool,

    /// Fetch a provisioning profile for the bundle
    #[arg(long, conflicts_with_all = ["show", "validate", "create_app", "verify_app"], requires = "bundle_id")]
    fetch_profile: bool,

    /// Fetch push certificates for the bundle
    #[arg(long, conflicts_with_all = ["show", "validate", "create_app", "verify_app", "fetch_profile"], requires = "bundle_id")]
    fetch_push_cert: bool,

    /// Fetch a distribution certificate for the team
    #[arg(long, conflicts_with_all = ["show", "validate", "create_app", "verify_app", "fetch_profile", "fetch_push_cert"])]
    fetch_cert: bool,

    /// Apple account identifier (email)
    #[arg(long)]
    apple_id: Option<String>,

    /// Team ID to operate under (skips lookup and selection)
    #[arg(long)]
    team_id: Option<String>,

    /// Bundle identifier of the app
    #[arg(long)]
    bundle_id: Option<String>,

    /// Display name of the app
    #[arg(long)]
    app_name: Option<String>,

    /// Toolchain directory (defaults to $APPFORGE_TOOLCHAIN_DIR or the
    /// per-user install location)
    #[arg(long)]
    toolchain_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show {
        return show_status().await;
    }

    let toolchain = match &cli.toolchain_dir {
        Some(dir) => Toolchain::from_root(dir),
        None => Toolchain::locate()?,
    };

    let creds = gather_credentials(cli.apple_id.clone())?;
    let mut bridge = CredentialBridge::new(toolchain);

    let outcome = run_operation(&cli, &mut bridge, &creds).await;

    // Scratch cleanup must happen regardless of how the operation went.
    if let Err(e) = bridge.clean_up().await {
        warn!("Could not remove staged toolchain scripts: {e}");
    }

    outcome
}

async fn run_operation(cli: &Cli, bridge: &mut CredentialBridge, creds: &Credentials) -> Result<()> {
    if cli.validate {
        let team_id = resolve_team_interactively(bridge, creds).await?;
        persist_team_choice(&team_id).await;
        success!("Credentials are valid; operating as team {team_id}");
        return Ok(());
    }

    if cli.create_app || cli.verify_app {
        let metadata = AppMetadata {
            bundle_identifier: required(cli.bundle_id.clone(), "--bundle-id")?,
            app_name: required(cli.app_name.clone(), "--app-name")?,
        };
        let team_id = resolve_team(cli, bridge, creds).await?;
        let reply = if cli.create_app {
            bridge.create_app(creds, &metadata, &team_id).await?
        } else {
            bridge.verify_app_id(creds, &metadata, &team_id).await?
        };
        return report_reply(reply);
    }

    if cli.fetch_profile || cli.fetch_push_cert {
        let bundle_id = required(cli.bundle_id.clone(), "--bundle-id")?;
        let team_id = resolve_team(cli, bridge, creds).await?;
        let reply = if cli.fetch_profile {
            bridge
                .fetch_provisioning_profile(creds, &bundle_id, &team_id)
                .await?
        } else {
            bridge.fetch_push_cert(creds, &bundle_id, &team_id).await?
        };
        return report_reply(reply);
    }

    if cli.fetch_cert {
        let team_id = resolve_team(cli, bridge, creds).await?;
        let reply = bridge.fetch_cert(creds, &team_id).await?;
        return report_reply(reply);
    }

    // Default: validate, matching the most common first-run flow.
    let team_id = resolve_team_interactively(bridge, creds).await?;
    persist_team_choice(&team_id).await;
    success!("Credentials are valid; operating as team {team_id}");
    Ok(())
}

/// Team to operate under: explicit flag, then the cached settings key, then
/// a fresh validation with interactive selection.
async fn resolve_team(cli: &Cli, bridge: &mut CredentialBridge, creds: &Credentials) -> Result<String> {
    if let Some(team_id) = &cli.team_id {
        return Ok(team_id.clone());
    }

    if let Ok(doc) = settings::open() {
        if let Some(serde_json::Value::String(team_id)) = doc.get(TEAM_ID_KEY).await {
            println!("Using cached team ID {team_id} (from {})", doc.path().display());
            return Ok(team_id);
        }
    }

    let team_id = resolve_team_interactively(bridge, creds).await?;
    persist_team_choice(&team_id).await;
    Ok(team_id)
}

async fn resolve_team_interactively(
    bridge: &mut CredentialBridge,
    creds: &Credentials,
) -> Result<String> {
    let teams = bridge.validate_credentials(creds).await?;
    if teams.len() == 1 {
        println!(
            "Only 1 team associated with your account, using team ID: {}",
            teams[0].team_id
        );
    }
    let team_id = select_team_id(&teams, prompts::prompt_team_choice)?;
    Ok(team_id)
}

/// Best-effort cache of the selected team; losing it only costs a re-prompt.
async fn persist_team_choice(team_id: &str) {
    let Ok(doc) = settings::open() else { return };
    if let Err(e) = doc
        .set(TEAM_ID_KEY, serde_json::Value::String(team_id.to_string()))
        .await
    {
        warn!("Could not save team choice to settings: {e}");
    }
}

fn gather_credentials(apple_id: Option<String>) -> Result<Credentials> {
    let account_id = match apple_id {
        Some(id) => id,
        None => {
            print!("Apple ID: ");
            std::io::stdout().flush()?;
            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;
            let input = input.trim().to_string();
            if input.is_empty() {
                anyhow::bail!("an Apple ID is required (pass --apple-id)");
            }
            input
        }
    };

    let secret = match std::env::var(PASSWORD_VAR) {
        Ok(secret) if !secret.is_empty() => secret,
        _ => prompts::prompt_secret(&account_id)?,
    };

    Ok(Credentials { account_id, secret })
}

fn required(value: Option<String>, flag: &str) -> Result<String> {
    value.ok_or_else(|| anyhow::anyhow!("{flag} is required for this operation"))
}

fn report_reply(reply: Reply) -> Result<()> {
    match reply {
        Reply::Success(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            success!("Toolchain operation completed");
            Ok(())
        }
        Reply::Failure { reason, raw_dump } => {
            error_msg!("{reason}");
            eprintln!("   Raw toolchain reply: {raw_dump}");
            Err(appforge_provision::ProvisionError::ReplyFailure { reason, raw_dump }.into())
        }
    }
}

async fn show_status() -> Result<()> {
    let bufwtr = BufferWriter::stdout(ColorChoice::Auto);
    let mut buffer = bufwtr.buffer();
    let _ = writeln!(&mut buffer, "📋 AppForge Provisioning Status\n");

    match settings::settings_path() {
        Ok(path) => {
            if path.exists() {
                let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                let _ = writeln!(&mut buffer, "✅ Settings: {}", path.display());
                let _ = buffer.reset();

                let doc = settings::SettingsDocument::at(&path);
                let map = doc.read().await;
                if map.is_empty() {
                    let _ = writeln!(&mut buffer, "   (empty document)");
                } else {
                    for (key, value) in &map {
                        let _ = writeln!(&mut buffer, "   {key} = {value}");
                    }
                }
            } else {
                let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
                let _ = writeln!(&mut buffer, "⚠️  Settings: not created yet");
                let _ = buffer.reset();
                let _ = writeln!(&mut buffer, "   Will be written to {}", path.display());
            }
        }
        Err(e) => {
            let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
            let _ = writeln!(&mut buffer, "❌ Settings: {e}");
            let _ = buffer.reset();
        }
    }

    match Toolchain::locate() {
        Ok(toolchain) => {
            let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
            let _ = writeln!(&mut buffer, "\n✅ Toolchain: {}", toolchain.root().display());
            let _ = buffer.reset();
        }
        Err(e) => {
            let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
            let _ = writeln!(&mut buffer, "\n❌ Toolchain: {e}");
            let _ = buffer.reset();
            let _ = writeln!(
                &mut buffer,
                "   Set APPFORGE_TOOLCHAIN_DIR or pass --toolchain-dir"
            );
        }
    }

    let _ = bufwtr.print(&buffer);
    Ok(())
}
