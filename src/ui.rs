// UI layer: the interactive prompt loop and the commands it dispatches.
//
// Input is collected with `dialoguer`; short API calls show an `indicatif`
// spinner. Anything that starts a server-side job hands the job to the
// console poller, which the user can skip with Ctrl+C.

use crate::api::{ApiClient, ApiError};
use crate::commands::{self, Command, Invocation, ParseError};
use crate::console;
use crate::mcp;
use crate::poller::WaitOutcome;
use crate::schema::{Business, Collaborator, Collaborators, Job, JobStatus, VercelSecrets};
use crate::settings::Settings;
use crate::token::CredentialStore;
use crate::wizard::{BusinessPlanGeneration, IdeaGeneration};
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{error, info};

const BANNER: &str = r#"
                         _       _
  /\  /\___  _ __  _   _| | __ _| |__  ___
 / /_/ / _ \| '_ \| | | | |/ _` | '_ \/ __|
/ __  / (_) | | | | |_| | | (_| | |_) \__ \
\/ /_/ \___/|_| |_|\__,_|_|\__,_|_.__/|___/
"#;
const INTRO: &str = "Welcome to the Honulabs CLI. Type 'help' for help, 'exit' to quit.";
const NOT_LOGGED_IN_HEADER: &str = " -- User is not logged in \u{1F611} --";
const LOGGED_IN_HEADER: &str = " -- User is logged in \u{1F642} --";
pub(crate) const SKIP_HINT: &str = "Awaiting completion. Skip wait with Ctrl+C.";

/// Spinner for short blocking calls. Callers clear it once the call returns.
pub(crate) fn busy(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Interactive session state: configuration, token cache and API client.
pub struct Shell {
    settings: Settings,
    store: CredentialStore,
    api: ApiClient,
}

impl Shell {
    pub fn new(settings: Settings) -> Result<Self> {
        let store = CredentialStore::new(settings.token_path());
        let mut api = ApiClient::new(&settings.api_url, settings.request_timeout())?;
        if let Some(token) = store.load() {
            api.set_token(&token);
        }
        Ok(Shell { settings, store, api })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Await a freshly submitted job on the console.
    pub(crate) fn wait_for(&self, job: Job) -> Result<WaitOutcome> {
        info!(job_id = %job.job_id, job_type = %job.job_type, "awaiting job");
        let outcome = console::watch_job(&self.api, job, self.settings.poll_interval())?;
        Ok(outcome)
    }

    /// Read-eval loop. Returns when the user exits or input is closed.
    pub fn run(&mut self) -> Result<()> {
        println!("{BANNER}");
        println!("{INTRO}");
        self.print_login_header();

        loop {
            println!();
            let line = match Input::<String>::new()
                .with_prompt("\u{1F422} ")
                .allow_empty(true)
                .interact_text()
            {
                Ok(line) => line,
                // Ctrl+C or a closed stdin ends the session.
                Err(_) => break,
            };

            let invocation = match commands::parse(&line) {
                Ok(invocation) => invocation,
                Err(ParseError::Empty) => continue,
                Err(e) => {
                    println!("{e}");
                    continue;
                }
            };
            if invocation.command == Command::Exit {
                break;
            }
            if let Err(e) = self.dispatch(&invocation) {
                error!(command = ?invocation.command, error = %e, "command failed");
                println!("Error: {e:#}");
                if token_rejected(&e) {
                    println!("Your token was rejected, please log in again with `token_login <token>`.");
                }
            }
        }
        Ok(())
    }

    fn print_login_header(&self) {
        if self.api.has_token() && self.api.check_token() {
            println!("{LOGGED_IN_HEADER}");
        } else {
            println!("{NOT_LOGGED_IN_HEADER}");
        }
    }

    fn dispatch(&mut self, invocation: &Invocation) -> Result<()> {
        match invocation.command {
            Command::TokenLogin => self.token_login(&invocation.args[0]),
            Command::ListIdeas => self.list_ideas(),
            Command::CreateBusiness => self.create_business(&invocation.rest()),
            Command::DeleteIdea => self.delete_idea(),
            Command::GenerateBusinessPlan => self.generate_business_plan(),
            Command::NewBusinessIdea => self.new_business_idea(),
            Command::DeployApp => self.deploy_app(),
            Command::UploadSecrets => self.upload_secrets(),
            Command::PendingJobs => self.pending_jobs(),
            Command::InviteToRepo => self.invite_to_repo(),
            Command::McpConfig => self.mcp_config(),
            Command::Help => {
                println!("{}", commands::help_text());
                Ok(())
            }
            Command::Exit => Ok(()),
        }
    }

    fn token_login(&mut self, token: &str) -> Result<()> {
        let candidate = self.api.with_token(token);
        let spinner = busy("Checking Token");
        let valid = candidate.check_token();
        spinner.finish_and_clear();
        if !valid {
            println!("Token was invalid, please try again");
            return Ok(());
        }
        self.store.save(token)?;
        info!(path = %self.store.path().display(), "logged in with new token");
        self.api = candidate;
        println!("{LOGGED_IN_HEADER}");
        Ok(())
    }

    fn list_ideas(&self) -> Result<()> {
        let spinner = busy("Fetching Ideas");
        let businesses = self.api.list_businesses();
        spinner.finish_and_clear();
        let businesses = businesses.context("Could not retrieve businesses")?;
        if businesses.is_empty() {
            println!("You have no ideas yet! Please use `create_business` to make one!");
            return Ok(());
        }
        let width = businesses
            .iter()
            .map(|b| b.business_id.len())
            .max()
            .unwrap_or(2)
            .max(2);
        println!("{:<width$}  name", "id");
        for business in &businesses {
            println!("{:<width$}  {}", business.business_id, business.name);
        }
        Ok(())
    }

    fn create_business(&self, name: &str) -> Result<()> {
        let spinner = busy("Creating Idea");
        let created = self.api.create_business(name);
        spinner.finish_and_clear();
        let business = created.context("Could not create business")?;
        println!("Idea record \"{}\" created!", business.name);
        Ok(())
    }

    /// Numbered selection of the user's businesses. `None` when there are
    /// none or the user backs out.
    pub(crate) fn pick_business(&self) -> Result<Option<Business>> {
        let mut businesses = self
            .api
            .list_businesses()
            .context("Could not retrieve businesses")?;
        if businesses.is_empty() {
            println!("You have no projects yet! Please use `create_business` to create a new one!");
            return Ok(None);
        }
        let names: Vec<&str> = businesses.iter().map(|b| b.name.as_str()).collect();
        println!("Please select the idea to interact with, or press Esc to cancel.");
        let choice = Select::new().items(&names).default(0).interact_opt()?;
        Ok(choice.map(|index| businesses.swap_remove(index)))
    }

    /// Submit a job for a picked business and wait on it.
    fn run_job<F>(&self, started: &str, submit: F) -> Result<()>
    where
        F: FnOnce(&ApiClient, &str) -> Result<Job, ApiError>,
    {
        let Some(business) = self.pick_business()? else {
            return Ok(());
        };
        let job = submit(&self.api, &business.business_id)?;
        println!("{started} {SKIP_HINT}");
        self.wait_for(job)?;
        Ok(())
    }

    fn delete_idea(&self) -> Result<()> {
        self.run_job("Deletion job started successfully.", |api, id| {
            api.delete_business(id)
        })
    }

    fn deploy_app(&self) -> Result<()> {
        self.run_job("Deployment job started successfully.", |api, id| {
            api.deploy_landing_page(id)
        })
    }

    fn generate_business_plan(&self) -> Result<()> {
        let Some(business) = self.pick_business()? else {
            return Ok(());
        };
        BusinessPlanGeneration::new(self, &business.business_id).run(None)
    }

    fn new_business_idea(&self) -> Result<()> {
        let Some(business) = self.pick_business()? else {
            return Ok(());
        };
        let Some(idea) = IdeaGeneration::new(self, &business.business_id).run()? else {
            return Ok(());
        };
        BusinessPlanGeneration::new(self, &business.business_id).run(Some(&idea))
    }

    fn upload_secrets(&self) -> Result<()> {
        let Some(business) = self.pick_business()? else {
            return Ok(());
        };

        println!("Input secret names and values. Leaving any input blank will continue to the upload portion.");
        let mut secrets = VercelSecrets::default();
        loop {
            let name = prompt_optional("Secret Name")?;
            let Some(name) = name else { break };
            let Some(value) = prompt_optional("Secret Value")? else {
                break;
            };
            secrets.secrets.insert(name, value);
        }

        if secrets.secrets.is_empty() {
            println!("Not uploading any secrets!");
            return Ok(());
        }

        println!();
        for (name, value) in &secrets.secrets {
            println!("  {name} = {value}");
        }
        println!();
        println!("Please double check that all variables are correct.");
        if !Confirm::new()
            .with_prompt("Upload these variables?")
            .default(false)
            .interact()?
        {
            println!("Exiting");
            return Ok(());
        }

        let job = self.api.deploy_secrets(&business.business_id, &secrets)?;
        println!("Secret upload job started successfully. {SKIP_HINT}");
        self.wait_for(job)?;
        Ok(())
    }

    fn invite_to_repo(&self) -> Result<()> {
        let Some(business) = self.pick_business()? else {
            return Ok(());
        };

        println!("Input the username you want to invite. When you are done press enter.\n");
        let mut collaborators = Vec::new();
        while let Some(username) = prompt_optional("username")? {
            collaborators.push(Collaborator { username });
        }
        if collaborators.is_empty() {
            println!("Not inviting anyone!");
            return Ok(());
        }

        let job = self
            .api
            .invite_collaborators(&business.business_id, &Collaborators { collaborators })?;
        println!("Invitation job started successfully. {SKIP_HINT}");
        self.wait_for(job)?;
        Ok(())
    }

    fn pending_jobs(&self) -> Result<()> {
        let Some(business) = self.pick_business()? else {
            return Ok(());
        };
        let mut jobs = self
            .api
            .get_jobs(&business.business_id, JobStatus::InProgress)?;
        if jobs.is_empty() {
            println!("No pending jobs!");
            return Ok(());
        }

        let rows: Vec<String> = jobs.iter().map(describe_job).collect();
        println!("Select a job to wait for it to complete, or press Esc to return to the menu.");
        let Some(index) = Select::new().items(&rows).default(0).interact_opt()? else {
            return Ok(());
        };
        let job = jobs.swap_remove(index);
        println!("{SKIP_HINT}");
        self.wait_for(job)?;
        Ok(())
    }

    fn mcp_config(&self) -> Result<()> {
        let Some(token) = self.api.token() else {
            println!("You need to log in first, use `token_login <token>`.");
            return Ok(());
        };
        let url = &self.settings.mcp_server_url;
        println!("Claude Desktop:");
        println!("{}", serde_json::to_string_pretty(&mcp::claude_desktop_config(url, token))?);
        println!();
        println!("Cursor:");
        println!("{}", serde_json::to_string_pretty(&mcp::cursor_config(url, token))?);
        Ok(())
    }
}

/// Whether a command failed because the API refused the stored token.
fn token_rejected(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ApiError>())
        .any(ApiError::is_unauthorized)
}

/// One-line summary of a job for selection lists.
pub(crate) fn describe_job(job: &Job) -> String {
    format!(
        "{}  {}  started {}  {}",
        job.job_id,
        job.job_type,
        job.started_at.format("%Y-%m-%d %H:%M:%S"),
        job.message.as_deref().unwrap_or("None!")
    )
}

/// Text prompt where a blank answer means "done".
pub(crate) fn prompt_optional(prompt: &str) -> Result<Option<String>> {
    let answer = Input::<String>::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    let answer = answer.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}
