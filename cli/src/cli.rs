use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use taskboard_attachments_api::Priority;

use crate::config::ConfigOverrides;
use crate::config::Mode;

#[derive(Debug, Parser)]
#[command(
    name = "taskboard",
    version,
    about = "Manage the image attachments of a task"
)]
pub struct Cli {
    #[clap(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Default, Args)]
pub struct ConnectionArgs {
    /// Base URL of the storage and record service.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Owner id used to prefix uploaded blobs.
    #[arg(long = "owner", global = true)]
    pub owner_id: Option<String>,

    /// Talk to real services or to in-memory mocks.
    #[arg(long, value_enum, global = true)]
    pub mode: Option<Mode>,
}

impl From<&ConnectionArgs> for ConfigOverrides {
    fn from(args: &ConnectionArgs) -> Self {
        Self {
            base_url: args.base_url.clone(),
            owner_id: args.owner_id.clone(),
            mode: args.mode,
            ..Self::default()
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a task and the public locator of each attachment.
    Show(ShowArgs),
    /// Stage attachment changes for a task and save them.
    Edit(EditArgs),
    /// Delete blobs left unreferenced by a failed save.
    Cleanup(CleanupArgs),
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub task_id: String,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    pub task_id: String,

    /// Image file to attach. Repeatable; files are appended in order.
    #[arg(long = "add", value_name = "PATH")]
    pub add: Vec<PathBuf>,

    /// Ref of an attachment to remove. Repeatable.
    #[arg(long = "remove", value_name = "REF")]
    pub remove: Vec<String>,

    /// Move an attachment: `REF=INDEX`, or `#N=INDEX` for the N-th `--add`ed file.
    /// Indexes are 0-based and clamped. Repeatable; applied in order.
    #[arg(long = "move", value_name = "KEY=INDEX", value_parser = parse_move_arg)]
    pub moves: Vec<MoveArg>,

    /// New task title.
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, value_enum)]
    pub priority: Option<PriorityArg>,

    /// Print the plan without uploading, deleting, or saving anything.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct CleanupArgs {
    #[arg(required = true, value_name = "REF")]
    pub refs: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveKey {
    /// 1-based position among the `--add` arguments.
    Added(usize),
    Ref(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveArg {
    pub key: MoveKey,
    pub index: usize,
}

pub fn parse_move_arg(raw: &str) -> Result<MoveArg, String> {
    let (key, index) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected KEY=INDEX, got `{raw}`"))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid index in `{raw}`: {e}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in `{raw}`"));
    }
    let key = match key.strip_prefix('#') {
        Some(n) => match n.parse::<usize>() {
            Ok(n) if n >= 1 => MoveKey::Added(n),
            _ => return Err(format!("`#N` must be a positive number, got `{key}`")),
        },
        None => MoveKey::Ref(key.to_string()),
    };
    Ok(MoveArg { key, index })
}
