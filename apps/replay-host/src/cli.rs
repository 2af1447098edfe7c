use clap::{Args, Parser, Subcommand};
use replay_proto::{Mode, SessionParams};

#[derive(Parser, Debug)]
#[command(name = "replay-host")]
#[command(about = "Hosts one replay frame session over stdin/stdout JSON lines")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mount a frame session and drive it until stdin closes
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Account that owns the collection
    #[arg(long)]
    pub user: String,

    /// Collection id
    #[arg(long)]
    pub coll: String,

    /// Recording id, when capturing into one
    #[arg(long)]
    pub rec: Option<String>,

    /// Frame mode (record, patch, extract, replay, replay-coll, ...)
    #[arg(long, default_value = "replay")]
    pub mode: Mode,

    /// Page the frame starts on
    #[arg(long)]
    pub url: String,

    /// Requested archive timestamp
    #[arg(long)]
    pub ts: Option<String>,

    /// Account used for cookie fallback writes (defaults to --user)
    #[arg(long)]
    pub auth_user: Option<String>,
}

impl RunArgs {
    pub fn session_params(&self) -> SessionParams {
        SessionParams {
            user: self.user.clone(),
            coll: self.coll.clone(),
            rec: self.rec.clone(),
            ts: self.ts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_arguments() {
        let cli = Cli::try_parse_from([
            "replay-host",
            "run",
            "--user",
            "alice",
            "--coll",
            "web",
            "--mode",
            "record",
            "--url",
            "http://example.com/",
            "--rec",
            "r1",
        ])
        .expect("valid arguments");
        let Commands::Run(args) = cli.command;
        assert_eq!(args.mode, Mode::Record);
        assert_eq!(args.session_params().rec.as_deref(), Some("r1"));
        assert_eq!(args.auth_user, None);
    }

    #[test]
    fn mode_defaults_to_replay() {
        let cli = Cli::try_parse_from([
            "replay-host",
            "run",
            "--user",
            "u",
            "--coll",
            "c",
            "--url",
            "http://example.com/",
        ])
        .expect("valid arguments");
        let Commands::Run(args) = cli.command;
        assert_eq!(args.mode, Mode::Replay);
    }
}
