use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use qutefill_core::config::{self, FillConfig, Settings, SettingsOverrides};
use qutefill_core::picker::ShellPicker;
use qutefill_core::qute::{self, CommandChannel};
use qutefill_core::resolve;
use qutefill_core::store::Rbw;
use qutefill_core::unlock::TerminalUnlock;

pub const URL_ENV: &str = "QUTE_URL";

#[derive(Debug, Parser)]
#[command(
    name = "qutefill",
    version,
    about = "Fill login credentials from rbw into qutebrowser"
)]
struct Cli {
    #[arg(value_name = "URL", help = "Target URL; defaults to $QUTE_URL")]
    url: Option<String>,
    #[arg(short = 'f', long, value_name = "NAME", help = "Restrict lookups to a folder")]
    folder: Option<String>,
    #[arg(long, value_name = "COMMAND", help = "Picker command line, run via sh -c")]
    picker: Option<String>,
    #[arg(long, value_name = "PROGRAM", help = "Terminal used for the unlock prompt")]
    terminal: Option<String>,
    #[arg(long, value_name = "PROGRAM", help = "Credential store CLI")]
    store: Option<String>,
    #[arg(long, value_name = "ENCODING", help = "Encoding for store and picker output")]
    io_encoding: Option<String>,
    #[arg(long, help = "Do not enter insert mode after filling")]
    no_insert_mode: bool,
    #[arg(long, conflicts_with = "password_only", help = "Fill only the username")]
    username_only: bool,
    #[arg(long, help = "Fill only the password")]
    password_only: bool,
    #[arg(long, value_name = "PATH", help = "Config file path")]
    config: Option<PathBuf>,
    #[arg(long, help = "Print resolved settings to stderr")]
    diagnostics: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("qutefill: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let url = cli.url.clone().or_else(|| config::env_value(URL_ENV));
    let Some(url) = url else {
        Cli::command().print_help()?;
        println!();
        return Ok(ExitCode::FAILURE);
    };

    let config_path = config::resolve_config_path(cli.config.as_deref());
    let file_config = match &config_path {
        Some(path) => config::load_config(path)?,
        None => FillConfig::default(),
    };
    let overrides = SettingsOverrides {
        url: Some(url),
        folder: cli.folder,
        picker: cli.picker,
        terminal: cli.terminal,
        store: cli.store,
        io_encoding: cli.io_encoding,
        no_insert_mode: cli.no_insert_mode,
        username_only: cli.username_only,
        password_only: cli.password_only,
    };
    let settings = Settings::resolve(&overrides, &file_config)?;
    if cli.diagnostics {
        eprintln!("[diagnostics]\n{}", settings.diagnostics());
    }

    let mut channel = CommandChannel::from_env()?;
    let store = Rbw::new(settings.store.as_str());
    let picker = ShellPicker::new(settings.picker.as_str());
    let gate = TerminalUnlock::new(settings.store.as_str(), settings.terminal.as_str());

    let outcome = resolve::run(&store, &picker, &gate, &settings);
    let code = qute::emit_outcome(&mut channel, &outcome, &settings)?;
    Ok(if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
