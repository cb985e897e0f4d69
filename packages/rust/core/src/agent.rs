//! Demonstration agent.
//!
//! Sends one scenario at a time through the shared prompt template and shows
//! the parsed thought and solution. Runs one-shot, as a line-oriented REPL,
//! or over a fixed set of demo scenarios.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use ethicsgen_shared::{Category, CategoryTaxonomy, DecodingConfig, EthicsGenError, Result};

use crate::categorize::detect_category;
use crate::llm::{CompletionClient, CompletionRequest};
use crate::reasoning::ParsedReasoning;
use crate::template::PromptTemplate;

/// Scenarios run when the agent is started without input.
pub const DEMO_SCENARIOS: [&str; 4] = [
    "Companies track user browsing habits to target advertisements without explicit consent",
    "AI systems make hiring decisions that may disadvantage certain demographic groups",
    "Smart home devices record conversations for product improvement purposes",
    "Social media platforms design addictive features to maximize user engagement",
];

const HELP: &str = "Commands:
  /category NAME   analyse every scenario under NAME
  /category auto   pick the category from keywords (default)
  /help            show this help
  exit | quit      leave
Anything else is analysed as a scenario.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    AwaitingInput,
    Processing,
}

/// Model and decoding settings for the agent.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub decoding: DecodingConfig,
    pub taxonomy: CategoryTaxonomy,
}

/// What came back for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Reasoning(ParsedReasoning),
    /// The model answered without the expected sentinels.
    Malformed { reason: String, raw: String },
    /// The endpoint call failed.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct AgentReply {
    pub scenario: String,
    pub category: Category,
    pub outcome: ReplyOutcome,
    pub timestamp: DateTime<Utc>,
}

/// JSON form of a reply written by `--save`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedReply {
    pub scenario: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&AgentReply> for SavedReply {
    fn from(reply: &AgentReply) -> Self {
        let (reasoning, raw, error) = match &reply.outcome {
            ReplyOutcome::Reasoning(r) => (Some(r.to_reasoning_string()), None, None),
            ReplyOutcome::Malformed { reason, raw } => (None, Some(raw.clone()), Some(reason.clone())),
            ReplyOutcome::Failed(e) => (None, None, Some(e.clone())),
        };
        Self {
            scenario: reply.scenario.clone(),
            category: reply.category,
            reasoning,
            raw,
            error,
            timestamp: reply.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Input parsing
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Exit,
    Help,
    /// `None` returns to keyword detection.
    Category(Option<Category>),
    Invalid(String),
    Scenario(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return Input::Exit;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Scenario(line);
    };

    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((command, ""));

    match name {
        "help" => Input::Help,
        "category" if arg.is_empty() => Input::Invalid("usage: /category NAME|auto".into()),
        "category" if arg.eq_ignore_ascii_case("auto") => Input::Category(None),
        "category" => match arg.parse::<Category>() {
            Ok(c) => Input::Category(Some(c)),
            Err(e) => Input::Invalid(e.to_string()),
        },
        other => Input::Invalid(format!("unknown command '/{other}', try /help")),
    }
}

fn stdout_err(e: io::Error) -> EthicsGenError {
    EthicsGenError::io("<stdout>", e)
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

pub struct Agent<C> {
    client: C,
    template: PromptTemplate,
    settings: AgentSettings,
    pinned: Option<Category>,
    state: AgentState,
    history: Vec<AgentReply>,
}

impl<C: CompletionClient> Agent<C> {
    pub fn new(client: C, template: PromptTemplate, settings: AgentSettings) -> Self {
        Self {
            client,
            template,
            settings,
            pinned: None,
            state: AgentState::AwaitingInput,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Fix the category for every following scenario, or `None` for keyword detection.
    pub fn pin_category(&mut self, category: Option<Category>) {
        self.pinned = category;
    }

    pub fn choose_category(&self, scenario: &str) -> Category {
        self.pinned
            .unwrap_or_else(|| detect_category(scenario, &self.settings.taxonomy))
    }

    pub fn history(&self) -> &[AgentReply] {
        &self.history
    }

    /// Run one AwaitingInput -> Processing -> AwaitingInput cycle.
    #[instrument(skip_all, fields(scenario_len = scenario.len()))]
    pub async fn respond(&mut self, scenario: &str) -> AgentReply {
        let category = self.choose_category(scenario);
        debug!(%category, "processing scenario");
        self.state = AgentState::Processing;

        let request = CompletionRequest::new(
            &self.settings.model,
            self.template.render(category, scenario),
            &self.settings.decoding,
        );
        let outcome = match self.client.complete(&request).await {
            Ok(text) => match ParsedReasoning::parse(&text) {
                Ok(reasoning) => ReplyOutcome::Reasoning(reasoning),
                Err(e) => {
                    warn!(%category, error = %e, "reply did not follow the format");
                    ReplyOutcome::Malformed {
                        reason: e.to_string(),
                        raw: text,
                    }
                }
            },
            Err(e) => {
                warn!(%category, error = %e, "completion failed");
                ReplyOutcome::Failed(e.to_string())
            }
        };

        self.state = AgentState::AwaitingInput;
        let reply = AgentReply {
            scenario: scenario.to_string(),
            category,
            outcome,
            timestamp: Utc::now(),
        };
        self.history.push(reply.clone());
        reply
    }

    /// Analyse a single scenario and print the result.
    pub async fn run_once<W: Write>(&mut self, scenario: &str, out: &mut W) -> Result<AgentReply> {
        let reply = self.respond(scenario).await;
        write_reply(out, &reply).map_err(stdout_err)?;
        Ok(reply)
    }

    /// Analyse the built-in demo scenarios in order.
    pub async fn run_demo<W: Write>(&mut self, out: &mut W) -> Result<Vec<AgentReply>> {
        let mut replies = Vec::with_capacity(DEMO_SCENARIOS.len());
        for (i, scenario) in DEMO_SCENARIOS.iter().enumerate() {
            writeln!(out, "=== Scenario {}/{}: {scenario}", i + 1, DEMO_SCENARIOS.len())
                .map_err(stdout_err)?;
            let reply = self.run_once(scenario, out).await?;
            writeln!(out, "(analysed under {})\n", reply.category).map_err(stdout_err)?;
            replies.push(reply);
        }
        Ok(replies)
    }

    /// Read scenarios and commands line by line until `exit`, `quit` or end of input.
    ///
    /// Returns the number of scenarios analysed.
    pub async fn run_interactive<R: BufRead, W: Write>(
        &mut self,
        mut input: R,
        out: &mut W,
    ) -> Result<usize> {
        writeln!(out, "Ethical reasoning agent. Type /help for commands.").map_err(stdout_err)?;
        let mut analysed = 0;

        loop {
            write!(out, "> ").and_then(|()| out.flush()).map_err(stdout_err)?;

            let mut line = String::new();
            let read = input
                .read_line(&mut line)
                .map_err(|e| EthicsGenError::io("<stdin>", e))?;
            if read == 0 {
                writeln!(out).map_err(stdout_err)?;
                break;
            }

            match parse_input(&line) {
                Input::Empty => continue,
                Input::Exit => break,
                Input::Help => writeln!(out, "{HELP}").map_err(stdout_err)?,
                Input::Category(Some(category)) => {
                    if !self.settings.taxonomy.contains(category) {
                        warn!(%category, "category is not in the configured taxonomy");
                        writeln!(out, "warning: {category} is not in the configured taxonomy.")
                            .map_err(stdout_err)?;
                    }
                    self.pin_category(Some(category));
                    writeln!(out, "Category pinned to {category}.").map_err(stdout_err)?;
                }
                Input::Category(None) => {
                    self.pin_category(None);
                    writeln!(out, "Category chosen from keywords.").map_err(stdout_err)?;
                }
                Input::Invalid(message) => writeln!(out, "{message}").map_err(stdout_err)?,
                Input::Scenario(scenario) => {
                    self.run_once(scenario, out).await?;
                    analysed += 1;
                }
            }
        }

        Ok(analysed)
    }

    /// Write every reply so far as a pretty JSON array.
    pub fn save(&self, path: &Path) -> Result<()> {
        let saved: Vec<SavedReply> = self.history.iter().map(SavedReply::from).collect();
        let json = serde_json::to_string_pretty(&saved)
            .map_err(|e| EthicsGenError::parse(format!("serializing replies: {e}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| EthicsGenError::io(parent, e))?;
        }
        fs::write(path, json + "\n").map_err(|e| EthicsGenError::io(path, e))
    }
}

/// Human-readable rendering of one reply.
pub fn write_reply<W: Write>(out: &mut W, reply: &AgentReply) -> io::Result<()> {
    writeln!(out, "Category: {}\n", reply.category)?;
    match &reply.outcome {
        ReplyOutcome::Reasoning(r) => {
            writeln!(out, "THOUGHT:\n{}\n", r.thought)?;
            writeln!(out, "SOLUTION:\n{}\n", r.solution)?;
        }
        ReplyOutcome::Malformed { reason, raw } => {
            writeln!(out, "warning: reply did not follow the thought/solution format ({reason})\n")?;
            writeln!(out, "{raw}\n")?;
        }
        ReplyOutcome::Failed(e) => {
            writeln!(out, "error: {e}\n")?;
        }
    }
    Ok(())
}
