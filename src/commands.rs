// Static command registry for the interactive shell.
//
// Each entry maps a command name to a `Command` variant together with its
// usage and help text. Parsing a prompt line only resolves the name and
// checks the argument count; running the command is up to `ui`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TokenLogin,
    ListIdeas,
    CreateBusiness,
    DeleteIdea,
    GenerateBusinessPlan,
    NewBusinessIdea,
    DeployApp,
    UploadSecrets,
    PendingJobs,
    InviteToRepo,
    McpConfig,
    Help,
    Exit,
}

pub struct CommandSpec {
    pub name: &'static str,
    pub command: Command,
    /// Placeholders shown in usage, e.g. `<token>`.
    pub params: &'static [&'static str],
    pub help: &'static str,
}

impl CommandSpec {
    pub fn usage(&self) -> String {
        std::iter::once(self.name)
            .chain(self.params.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "token_login",
        command: Command::TokenLogin,
        params: &["<token>"],
        help: "Set token for API usage manually",
    },
    CommandSpec {
        name: "list_ideas",
        command: Command::ListIdeas,
        params: &[],
        help: "List your Businesses",
    },
    CommandSpec {
        name: "create_business",
        command: Command::CreateBusiness,
        params: &["<name...>"],
        help: "Create new Idea",
    },
    CommandSpec {
        name: "delete_idea",
        command: Command::DeleteIdea,
        params: &[],
        help: "Delete Idea and deployed services",
    },
    CommandSpec {
        name: "generate_business_plan",
        command: Command::GenerateBusinessPlan,
        params: &[],
        help: "Begin generation of Business Plan for an Idea",
    },
    CommandSpec {
        name: "new_business_idea",
        command: Command::NewBusinessIdea,
        params: &[],
        help: "Generate a new idea from a market segment, then its business plan",
    },
    CommandSpec {
        name: "deploy_app",
        command: Command::DeployApp,
        params: &[],
        help: "Deploy latest landing page for Business Idea",
    },
    CommandSpec {
        name: "upload_secrets",
        command: Command::UploadSecrets,
        params: &[],
        help: "Upload secret variables for your app",
    },
    CommandSpec {
        name: "pending_jobs",
        command: Command::PendingJobs,
        params: &[],
        help: "Check on the status of any Jobs that are currently in progress",
    },
    CommandSpec {
        name: "invite_to_repo",
        command: Command::InviteToRepo,
        params: &[],
        help: "Invite user to the business GitHub repository",
    },
    CommandSpec {
        name: "mcp_config",
        command: Command::McpConfig,
        params: &[],
        help: "Print MCP client configuration for Claude Desktop and Cursor",
    },
    CommandSpec {
        name: "help",
        command: Command::Help,
        params: &[],
        help: "List commands",
    },
    CommandSpec {
        name: "exit",
        command: Command::Exit,
        params: &[],
        help: "Exit the CLI",
    },
    CommandSpec {
        name: "quit",
        command: Command::Exit,
        params: &[],
        help: "Exit the CLI",
    },
];

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// A parsed prompt line.
#[derive(Debug, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub args: Vec<String>,
}

impl Invocation {
    /// All arguments joined back together, for free-text parameters.
    pub fn rest(&self) -> String {
        self.args.join(" ")
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    Unknown(String),
    MissingArgs { usage: String, help: &'static str, needed: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "No command given"),
            ParseError::Unknown(name) => write!(f, "Unknown command: {name}"),
            ParseError::MissingArgs { usage, help, needed } => write!(
                f,
                "Error: Not enough arguments. Need at least {needed}\nUsage: {usage}\n{help}"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

pub fn parse(line: &str) -> Result<Invocation, ParseError> {
    let mut words = line.split_whitespace();
    let name = words.next().ok_or(ParseError::Empty)?;
    let spec = lookup(name).ok_or_else(|| ParseError::Unknown(name.to_string()))?;
    let args: Vec<String> = words.map(str::to_string).collect();
    if args.len() < spec.params.len() {
        return Err(ParseError::MissingArgs {
            usage: spec.usage(),
            help: spec.help,
            needed: spec.params.len(),
        });
    }
    Ok(Invocation {
        command: spec.command,
        args,
    })
}

/// Help listing, sorted by name.
pub fn help_text() -> String {
    let mut specs: Vec<&CommandSpec> = COMMANDS.iter().collect();
    specs.sort_by_key(|spec| spec.name);
    let mut out = String::from("\nAvailable commands:\n");
    for spec in specs {
        out.push_str(&format!("  {}\n    {}\n\n", spec.usage(), spec.help));
    }
    out
}
