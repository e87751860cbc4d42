//! `InfraVault` CLI: command-line client for the `InfraVault` inventory.
//!
//! Lists servers, providers and settings with secrets redacted, reveals
//! secrets on demand through the session-key envelope flow, and updates
//! single secrets through the keep/clear/replace merge rule.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use infravault_client::draft::SecretDraft;
use infravault_client::{
    Client, ClientConfig, ProviderForm, ProviderView, RevealedField, RevealedFields, ServerForm,
    ServerView, SettingsSecret, SettingsView,
};

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

/// Shown for a stored secret the server did not send.
const REDACTED: &str = "•••••••• (stored)";

// ── CLI structure ────────────────────────────────────────────────────

/// `InfraVault`: infrastructure inventory with on-demand secret reveal.
#[derive(Parser)]
#[command(
    name = "infravault",
    version,
    about = "InfraVault CLI: list servers and providers, reveal and update their secrets",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         INFRAVAULT_ADDR    Server address (default: http://127.0.0.1:8300)\n  \
         INFRAVAULT_TOKEN   Bearer token\n  \
         INFRAVAULT_SECRET  Value for set-secret when --value is omitted\n\n\
         {DIM}Examples:{RESET}\n  \
         infravault servers list\n  \
         infravault servers reveal 6f1c2d3e-...\n  \
         infravault servers set-secret 6f1c2d3e-... ssh-password --value 'NewPass2'\n  \
         infravault settings reveal smtp"
    ),
)]
struct Cli {
    /// `InfraVault` server address.
    #[arg(long, env = "INFRAVAULT_ADDR", default_value = "http://127.0.0.1:8300")]
    addr: String,

    /// Bearer token.
    #[arg(long, env = "INFRAVAULT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Print raw JSON instead of formatted output.
    #[arg(long, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Server records.
    Servers {
        #[command(subcommand)]
        action: ServerCommands,
    },
    /// Provider accounts.
    Providers {
        #[command(subcommand)]
        action: ProviderCommands,
    },
    /// Per-user settings.
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },
    /// Revoke the token and destroy the session key.
    Logout,
}

#[derive(Subcommand)]
enum ServerCommands {
    /// List servers (secrets redacted).
    List,
    /// Show one server (secrets redacted).
    Show { id: Uuid },
    /// Decrypt and print every secret of a server.
    Reveal { id: Uuid },
    /// Replace or clear one secret, keeping the others.
    SetSecret {
        id: Uuid,
        field: ServerSecret,
        #[command(flatten)]
        value: SecretValue,
    },
    /// Delete a server.
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum ProviderCommands {
    /// List providers (secrets redacted).
    List,
    /// Show one provider (secrets redacted).
    Show { id: Uuid },
    /// Decrypt and print the provider password.
    Reveal { id: Uuid },
    /// Replace or clear the provider password.
    SetSecret {
        id: Uuid,
        #[command(flatten)]
        value: SecretValue,
    },
    /// Delete a provider.
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show settings (secrets redacted).
    Show,
    /// Decrypt and print one settings secret.
    Reveal { secret: SettingsField },
    /// Replace or clear one settings secret.
    SetSecret {
        secret: SettingsField,
        #[command(flatten)]
        value: SecretValue,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ServerSecret {
    Password,
    SshPassword,
    ProviderPassword,
}

impl ServerSecret {
    const fn wire(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::SshPassword => "sshPassword",
            Self::ProviderPassword => "providerPassword",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SettingsField {
    /// WHOIS API key.
    Whois,
    /// Bark push key.
    Bark,
    /// SMTP password.
    Smtp,
}

impl SettingsField {
    const fn secret(self) -> SettingsSecret {
        match self {
            Self::Whois => SettingsSecret::WhoisKey,
            Self::Bark => SettingsSecret::BarkKey,
            Self::Smtp => SettingsSecret::SmtpPassword,
        }
    }

    fn patch(self, value: String) -> Value {
        match self {
            Self::Whois => json!({ "whois": { "apiKey": value } }),
            Self::Bark => json!({ "notifications": { "bark": { "key": value } } }),
            Self::Smtp => json!({ "notifications": { "smtp": { "password": value } } }),
        }
    }
}

#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct SecretValue {
    /// New secret value. Prefer INFRAVAULT_SECRET to keep it out of shell history.
    #[arg(long, env = "INFRAVAULT_SECRET", hide_env_values = true)]
    value: Option<String>,
    /// Remove the stored secret.
    #[arg(long)]
    clear: bool,
}

impl SecretValue {
    /// The payload for `field`: the new value, or `""` to clear.
    fn payload(self, field: &'static str) -> Result<String> {
        let mut draft = SecretDraft::new(field, true);
        if self.clear {
            draft.edit("");
        } else {
            let Some(value) = self.value else {
                bail!("pass --value, set INFRAVAULT_SECRET, or use --clear");
            };
            draft.edit(value);
        }
        Ok(draft.payload()?)
    }
}

// ── Pretty output helpers ────────────────────────────────────────────

fn header(icon: &str, title: &str) {
    println!("{BOLD}{CYAN}{icon} {title}{RESET}");
    println!("{DIM}─────────────────────────────────────────{RESET}");
}

fn kv_line(key: &str, value: &str) {
    println!("  {DIM}{key:<20}{RESET} {WHITE}{value}{RESET}");
}

fn opt_line(key: &str, value: Option<&str>) {
    if let Some(v) = value {
        kv_line(key, v);
    }
}

/// Plaintext if the server sent it, a marker if it only flagged presence.
fn secret_line(key: &str, value: Option<&str>, present: bool) {
    match (value, present) {
        (Some(v), _) => kv_line(key, v),
        (None, true) => kv_line(key, REDACTED),
        (None, false) => kv_line(key, "-"),
    }
}

fn success(msg: &str) {
    println!("{GREEN}{BOLD}✓{RESET} {msg}");
}

fn warning(msg: &str) {
    println!("{YELLOW}{BOLD}⚠{RESET} {YELLOW}{msg}{RESET}");
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to format JSON: {e}"),
    }
}

fn print_server(s: &ServerView) {
    header("🖥", &format!("Server: {}", s.name));
    kv_line("ID", &s.id.to_string());
    kv_line("Host", &s.host);
    opt_line("Panel URL", s.panel_url.as_deref());
    opt_line("Panel user", s.panel_username.as_deref());
    secret_line("Password", s.password.as_deref(), s.has_password);
    if let Some(port) = s.ssh_port {
        kv_line("SSH port", &port.to_string());
    }
    opt_line("SSH user", s.ssh_username.as_deref());
    secret_line("SSH password", s.ssh_password.as_deref(), s.has_ssh_password);
    if let Some(provider) = s.provider_id {
        kv_line("Provider", &provider.to_string());
    }
    opt_line("Provider user", s.provider_username.as_deref());
    secret_line(
        "Provider password",
        s.provider_password.as_deref(),
        s.has_provider_password,
    );
    opt_line("Notes", s.notes.as_deref());
    kv_line("Updated", &s.updated_at.to_rfc3339());
    println!();
}

fn print_server_list(servers: &[ServerView]) {
    header("📂", "Servers");
    if servers.is_empty() {
        println!("  {DIM}(empty){RESET}");
    }
    for s in servers {
        println!("  {CYAN}├─{RESET} {BOLD}{}{RESET} {DIM}{} · {}{RESET}", s.name, s.host, s.id);
    }
    println!();
}

fn print_provider(p: &ProviderView) {
    header("🏢", &format!("Provider: {}", p.name));
    kv_line("ID", &p.id.to_string());
    opt_line("URL", p.url.as_deref());
    opt_line("Username", p.username.as_deref());
    secret_line("Password", p.password.as_deref(), p.has_password);
    kv_line("Updated", &p.updated_at.to_rfc3339());
    println!();
}

fn print_provider_list(providers: &[ProviderView]) {
    header("📂", "Providers");
    if providers.is_empty() {
        println!("  {DIM}(empty){RESET}");
    }
    for p in providers {
        println!("  {CYAN}├─{RESET} {BOLD}{}{RESET} {DIM}{}{RESET}", p.name, p.id);
    }
    println!();
}

fn print_settings(s: &SettingsView) {
    header("⚙", "Settings");
    opt_line("WHOIS API URL", s.whois.api_url.as_deref());
    secret_line(
        "WHOIS API key",
        s.whois.api_key.as_deref(),
        s.has_whois_api_key,
    );

    let bark = &s.notifications.bark;
    kv_line("Bark", if bark.enabled { "enabled" } else { "disabled" });
    opt_line("Bark server", bark.server_url.as_deref());
    secret_line("Bark key", bark.key.as_deref(), bark.has_key);

    let smtp = &s.notifications.smtp;
    kv_line("SMTP", if smtp.enabled { "enabled" } else { "disabled" });
    opt_line("SMTP host", smtp.host.as_deref());
    if let Some(port) = smtp.port {
        kv_line("SMTP port", &port.to_string());
    }
    opt_line("SMTP user", smtp.username.as_deref());
    secret_line("SMTP password", smtp.password.as_deref(), smtp.has_password);
    println!();
}

fn print_revealed(title: &str, fields: &RevealedFields) {
    header("🔓", title);
    for (field, value) in fields {
        print_revealed_field(field, value);
    }
    println!();
}

fn print_revealed_field(field: &str, value: &RevealedField) {
    match value {
        RevealedField::Failed(reason) => {
            println!("  {DIM}{field:<20}{RESET} {RED}{reason}{RESET}");
        }
        other => kv_line(field, other.display()),
    }
}

/// JSON for revealed fields: plaintext, or `null` when absent or failed.
fn revealed_json(fields: &RevealedFields) -> Value {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), v.value().map_or(Value::Null, Value::from)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

// ── Command dispatch ─────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = Client::new(ClientConfig {
        token: cli.token.unwrap_or_default(),
        base_url: cli.addr,
        ..ClientConfig::default()
    })
    .context("failed to create client")?;
    let json = cli.json;

    match cli.command {
        Commands::Servers { action } => cmd_servers(&client, action, json).await,
        Commands::Providers { action } => cmd_providers(&client, action, json).await,
        Commands::Settings { action } => cmd_settings(&client, action, json).await,
        Commands::Logout => {
            client.logout().await?;
            success("Logged out; session key destroyed");
            Ok(())
        }
    }
}

async fn cmd_servers(client: &Client, action: ServerCommands, json: bool) -> Result<()> {
    match action {
        ServerCommands::List => {
            let servers = client.list_servers().await?;
            if json {
                print_json(&servers);
            } else {
                print_server_list(&servers);
            }
        }
        ServerCommands::Show { id } => {
            let server = client.get_server(id).await?;
            if json {
                print_json(&server);
            } else {
                print_server(&server);
            }
        }
        ServerCommands::Reveal { id } => {
            let fields = client.reveal_server(id).await?;
            if json {
                print_json(&revealed_json(&fields));
            } else {
                print_revealed(&format!("Server secrets: {id}"), &fields);
            }
        }
        ServerCommands::SetSecret { id, field, value } => {
            let payload = value.payload(field.wire())?;
            let mut form = ServerForm::default();
            match field {
                ServerSecret::Password => form.password = Some(payload),
                ServerSecret::SshPassword => form.ssh_password = Some(payload),
                ServerSecret::ProviderPassword => form.provider_password = Some(payload),
            }
            let server = client.update_server(id, &form).await?;
            success(&format!("Updated {} on {}", field.wire(), server.name));
        }
        ServerCommands::Delete { id } => {
            client.delete_server(id).await?;
            success(&format!("Deleted server {id}"));
        }
    }
    Ok(())
}

async fn cmd_providers(client: &Client, action: ProviderCommands, json: bool) -> Result<()> {
    match action {
        ProviderCommands::List => {
            let providers = client.list_providers().await?;
            if json {
                print_json(&providers);
            } else {
                print_provider_list(&providers);
            }
        }
        ProviderCommands::Show { id } => {
            let provider = client.get_provider(id).await?;
            if json {
                print_json(&provider);
            } else {
                print_provider(&provider);
            }
        }
        ProviderCommands::Reveal { id } => {
            let fields = client.reveal_provider(id).await?;
            if json {
                print_json(&revealed_json(&fields));
            } else {
                print_revealed(&format!("Provider secrets: {id}"), &fields);
            }
        }
        ProviderCommands::SetSecret { id, value } => {
            let form = ProviderForm {
                password: Some(value.payload("password")?),
                ..ProviderForm::default()
            };
            let provider = client.update_provider(id, &form).await?;
            success(&format!("Updated password on {}", provider.name));
        }
        ProviderCommands::Delete { id } => {
            client.delete_provider(id).await?;
            success(&format!("Deleted provider {id}"));
        }
    }
    Ok(())
}

async fn cmd_settings(client: &Client, action: SettingsCommands, json: bool) -> Result<()> {
    match action {
        SettingsCommands::Show => {
            let settings = client.get_settings().await?;
            if json {
                print_json(&settings);
            } else {
                print_settings(&settings);
            }
        }
        SettingsCommands::Reveal { secret } => {
            let value = client.reveal_settings(secret.secret()).await?;
            if json {
                print_json(&value.value());
            } else {
                header("🔓", "Settings secret");
                print_revealed_field(secret.secret().field(), &value);
                println!();
            }
        }
        SettingsCommands::SetSecret { secret, value } => {
            let payload = value.payload(secret.secret().field())?;
            let settings = client.update_settings(&secret.patch(payload)).await?;
            let present = match secret {
                SettingsField::Whois => settings.has_whois_api_key,
                SettingsField::Bark => settings.notifications.bark.has_key,
                SettingsField::Smtp => settings.notifications.smtp.has_password,
            };
            if present {
                success("Settings secret updated");
            } else {
                warning("Settings secret cleared");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clear_sends_empty_string() {
        let value = SecretValue {
            value: None,
            clear: true,
        };
        assert_eq!(value.payload("password").unwrap(), "");
    }

    #[test]
    fn sentinel_value_is_refused() {
        let value = SecretValue {
            value: Some("__KEEP__".to_owned()),
            clear: false,
        };
        assert!(value.payload("password").is_err());
    }

    #[test]
    fn settings_patch_targets_one_field() {
        let patch = SettingsField::Smtp.patch("pw".to_owned());
        assert_eq!(patch["notifications"]["smtp"]["password"], "pw");
        assert!(patch.get("whois").is_none());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
