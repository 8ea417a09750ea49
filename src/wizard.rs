// Multi-step generation flows. Each step submits a job, waits on it and
// feeds its result into the next step. A step that fails, is skipped with
// Ctrl+C, or is cancelled by the user ends the whole flow.

use crate::poller::WaitOutcome;
use crate::schema::{
    BusinessNamesDomains, BusinessPlan, BusinessPlanRequirementsCreate,
    FullBusinessDetailsCreate, IdeaSuggestion, Job, MarketSegment, Suggestions,
};
use crate::ui::{prompt_optional, Shell, SKIP_HINT};
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Pull the typed result out of a successful job.
fn job_result<T: DeserializeOwned>(job: &Job) -> Result<T> {
    job.result_as()
        .with_context(|| format!("Job {} finished without a result", job.job_id))?
        .with_context(|| format!("Unexpected result for job {}", job.job_id))
}

/// Waits on `job` and returns it only when it succeeded.
fn finish(shell: &Shell, job: Job) -> Result<Option<Job>> {
    let outcome = shell.wait_for(job)?;
    if let WaitOutcome::Abandoned { .. } = outcome {
        println!("Returning to menu. When the job is completed you may re-run this command.");
    }
    Ok(outcome.succeeded())
}

fn idea_label(idea: &IdeaSuggestion) -> String {
    let feasibility = match &idea.feasibility_rank {
        serde_json::Value::String(rank) => rank.clone(),
        serde_json::Value::Null => "?".to_string(),
        other => other.to_string(),
    };
    format!(
        "{} [feasibility {}]\n    Challenge: {}\n    {}",
        idea.saas_venture_title, feasibility, idea.challenge, idea.saas_venture_description
    )
}

fn segment_label(segment: &MarketSegment) -> String {
    format!(
        "{} / {} / {}",
        segment.core_market, segment.sub_category, segment.niche
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// What the user picked from a list of generated ideas.
#[derive(Debug, PartialEq, Eq)]
enum IdeaChoice {
    Pick(usize),
    Regenerate,
    Cancel,
}

/// The extra "regenerate" entry sits after the ideas.
fn idea_choice(selection: Option<usize>, ideas: usize) -> IdeaChoice {
    match selection {
        Some(index) if index < ideas => IdeaChoice::Pick(index),
        Some(_) => IdeaChoice::Regenerate,
        None => IdeaChoice::Cancel,
    }
}

/// Market segmentation followed by idea generation for a business.
pub struct IdeaGeneration<'a> {
    shell: &'a Shell,
    business_id: &'a str,
}

impl<'a> IdeaGeneration<'a> {
    pub fn new(shell: &'a Shell, business_id: &'a str) -> Self {
        IdeaGeneration { shell, business_id }
    }

    /// The chosen idea, or `None` if the flow stopped early.
    pub fn run(&self) -> Result<Option<IdeaSuggestion>> {
        let Some((geography, segment)) = self.market_segmentation()? else {
            return Ok(None);
        };
        loop {
            let job = self
                .shell
                .api()
                .generate_ideas(self.business_id, &geography, &segment)?;
            println!("Idea generation started successfully. {SKIP_HINT}");
            let Some(job) = finish(self.shell, job)? else {
                return Ok(None);
            };
            let mut ideas = job_result::<Suggestions<IdeaSuggestion>>(&job)?.ideas;

            let mut items: Vec<String> = ideas.iter().map(idea_label).collect();
            items.push("Generate new ideas".to_string());
            println!("Please select one of the ideas, or press Esc to cancel.");
            let selection = Select::new().items(&items).default(0).interact_opt()?;
            match idea_choice(selection, ideas.len()) {
                IdeaChoice::Pick(index) => return Ok(Some(ideas.swap_remove(index))),
                IdeaChoice::Regenerate => debug!("regenerating ideas for the same segment"),
                IdeaChoice::Cancel => return Ok(None),
            }
        }
    }

    fn market_segmentation(&self) -> Result<Option<(String, MarketSegment)>> {
        let Some(industry) = prompt_optional("What industry segment would you like to focus on?")?
        else {
            return Ok(None);
        };
        let Some(geography) = prompt_optional("What geography would you like to focus on?")? else {
            return Ok(None);
        };
        println!(
            "You are about to generate ideas for {} / {}",
            capitalize(&industry),
            capitalize(&geography)
        );
        if !Confirm::new()
            .with_prompt("Do you want to continue?")
            .default(true)
            .interact()?
        {
            return Ok(None);
        }

        let job = self
            .shell
            .api()
            .generate_market_segment(self.business_id, &geography, &industry)?;
        println!("Market segmentation started successfully. {SKIP_HINT}");
        let Some(job) = finish(self.shell, job)? else {
            return Ok(None);
        };
        let mut segments = job_result::<Suggestions<MarketSegment>>(&job)?.ideas;
        if segments.is_empty() {
            println!("No market segments were suggested, please try again.");
            return Ok(None);
        }

        let items: Vec<String> = segments.iter().map(segment_label).collect();
        println!("Please select the market segment you want to use, or press Esc to cancel.");
        let Some(index) = Select::new().items(&items).default(0).interact_opt()? else {
            return Ok(None);
        };
        Ok(Some((geography, segments.swap_remove(index))))
    }
}

/// Requirements, business plan, naming and business details, in order.
pub struct BusinessPlanGeneration<'a> {
    shell: &'a Shell,
    business_id: &'a str,
}

impl<'a> BusinessPlanGeneration<'a> {
    pub fn new(shell: &'a Shell, business_id: &'a str) -> Self {
        BusinessPlanGeneration { shell, business_id }
    }

    pub fn run(&self, seed: Option<&IdeaSuggestion>) -> Result<()> {
        println!("Step 1, Requirements Generation.");
        let Some(requirements) = self.collect_requirements(seed)? else {
            println!("Please re-run the command to start again");
            return Ok(());
        };
        let api = self.shell.api();

        let job = api.generate_business_requirements(self.business_id, &requirements)?;
        println!("Requirements Generation started successfully. {SKIP_HINT}");
        if finish(self.shell, job)?.is_none() {
            return Ok(());
        }

        println!("Step 2, Business Plan Generation.");
        let job = api.generate_business_plan(self.business_id)?;
        println!("Business Plan Generation started successfully. {SKIP_HINT}");
        let Some(job) = finish(self.shell, job)? else {
            return Ok(());
        };
        let plan: BusinessPlan = job_result(&job)?;
        println!();
        println!(
            "{}",
            plan.business_plan_concise
                .as_deref()
                .unwrap_or(&plan.business_plan)
        );
        println!();

        println!("Step 3, Business Naming.");
        let job = api.generate_business_names(self.business_id)?;
        println!("Business Naming started successfully. {SKIP_HINT}");
        let Some(job) = finish(self.shell, job)? else {
            return Ok(());
        };
        let names: BusinessNamesDomains = job_result(&job)?;
        let Some(business_name) = pick_name(&names)? else {
            return Ok(());
        };

        println!("Step 4, Business Details.");
        let details = FullBusinessDetailsCreate {
            business_name,
            base_business_plan: plan,
        };
        let job = api.create_business_details(self.business_id, &details)?;
        println!("Business Details started successfully. {SKIP_HINT}");
        if finish(self.shell, job)?.is_some() {
            println!("Your business \"{}\" is ready to deploy with `deploy_app`.", details.business_name);
        }
        Ok(())
    }

    fn collect_requirements(
        &self,
        seed: Option<&IdeaSuggestion>,
    ) -> Result<Option<BusinessPlanRequirementsCreate>> {
        println!("Please answer the following prompts.");
        println!();

        let mut idea_prompt = Input::<String>::new();
        idea_prompt.with_prompt(BusinessPlanRequirementsCreate::IDEA_PROMPT);
        if let Some(seed) = seed {
            idea_prompt.with_initial_text(format!(
                "{}: {}",
                seed.saas_venture_title, seed.saas_venture_description
            ));
        }
        let idea = idea_prompt.interact_text()?;

        let ask = |prompt: &str| -> Result<String> {
            let answer = Input::<String>::new().with_prompt(prompt).interact_text()?;
            Ok(answer.trim().to_string())
        };
        let requirements = BusinessPlanRequirementsCreate {
            idea: idea.trim().to_string(),
            inspiration: ask(BusinessPlanRequirementsCreate::INSPIRATION_PROMPT)?,
            long_term_goals: ask(BusinessPlanRequirementsCreate::GOALS_PROMPT)?,
            brand_interpretation: ask(BusinessPlanRequirementsCreate::BRAND_PROMPT)?,
            risk_assessment: ask(BusinessPlanRequirementsCreate::RISK_PROMPT)?,
        };

        println!();
        println!("{}", requirements.idea);
        println!();
        println!("{}", requirements.q_n_a());
        println!();
        let proceed = Confirm::new().with_prompt("Is this okay?").interact()?;
        Ok(proceed.then_some(requirements))
    }
}

fn pick_name(names: &BusinessNamesDomains) -> Result<Option<String>> {
    let options = &names.business_names_with_domains;
    if options.is_empty() {
        println!("No business names were suggested.");
        return Ok(None);
    }
    let items: Vec<String> = options
        .iter()
        .map(|option| {
            format!(
                "{} ({})",
                option.business_name,
                option.domain_name_options.join(", ")
            )
        })
        .collect();
    println!("Please select a name for your business, or press Esc to cancel.");
    let choice = Select::new().items(&items).default(0).interact_opt()?;
    Ok(choice.map(|index| options[index].business_name.clone()))
}
