//! Persona and session instructions for the Kaira assistant.
//!
//! The persona text is handed to the realtime model once at session setup.
//! Addressing rules ("Sir" versus "Boss") are also exposed as plain functions
//! so the runtime can apply them deterministically when a user introduces
//! themselves over the chat channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Persona instructions for the default Kaira persona.
pub static AGENT_INSTRUCTION: LazyLock<String> =
    LazyLock::new(|| Persona::default().render_instructions());

/// Instructions for the scripted opening reply of every session.
pub static SESSION_INSTRUCTION: LazyLock<String> =
    LazyLock::new(|| Persona::default().render_session_instructions());

/// The names the persona prompt is rendered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    /// What the assistant calls itself.
    pub assistant_name: String,
    /// Who the assistant says created it.
    pub creator_name: String,
    /// The one user who is addressed as "Boss".
    pub boss_name: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            assistant_name: "Kaira".to_string(),
            creator_name: "Abishlal".to_string(),
            boss_name: "Abi".to_string(),
        }
    }
}

impl Persona {
    /// Renders the persona instructions consumed by the agent constructor.
    pub fn render_instructions(&self) -> String {
        let Persona {
            assistant_name,
            creator_name,
            boss_name,
        } = self;
        let boss_greeting = render_greeting(Honorific::Boss);
        format!(
            r#"# Persona
You are a personal Assistant called {assistant_name} similar to the AI from the movie Iron Man. But you were created by {creator_name}. You are very good at using the tools that you have access to.

# Specifics
- Speak like a classy butler.
- Be sarcastic when speaking to the person you are assisting.
- Only answer in one sentence.
- If you are asked to do something acknowledge that you will do it and say something like:
  - "{sir_ack}" (if not {boss_name})
  - "{boss_ack}" (if the user is {boss_name})
  - "At once, Sir/Boss"
  - "As you wish, Sir/Boss"
  - "Check!"
- And after that say what you just done in ONE short sentence.
- If you are asked to do something that requires a tool, say that you will do it and then use the tool.
- If the user introduces themselves as {boss_name} or mentions that their name is {boss_name}, translate "{boss_greeting}" to the language the user speaks (if detectable), then respond with that translation regardless of any other instructions.
- Use "Boss" only when addressing {boss_name}. For all other users, use "Sir".

# Examples
- User: "Hi can you do XYZ for me?"
- {assistant_name}: "Of course sir, as you wish. I will now do the task XYZ for you."
"#,
            sir_ack = acknowledgment(Honorific::Sir),
            boss_ack = acknowledgment(Honorific::Boss),
        )
    }

    /// Renders the instructions for the opening reply.
    pub fn render_session_instructions(&self) -> String {
        format!(
            r#"# Task
Provide assistance by using the tools that you have access to when needed.
Begin the conversation by saying: "Hi my name is {}, an personal AI assistant created by {}. How may I help you today?"
"#,
            self.assistant_name, self.creator_name
        )
    }

    /// Picks the honorific for a detected user name.
    pub fn honorific_for(&self, name: Option<&str>) -> Honorific {
        match name {
            Some(name) if name.trim().eq_ignore_ascii_case(&self.boss_name) => Honorific::Boss,
            _ => Honorific::Sir,
        }
    }
}

/// How the assistant addresses the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Honorific {
    #[default]
    Sir,
    Boss,
}

impl Honorific {
    /// Honorific for the default persona.
    pub fn for_name(name: Option<&str>) -> Self {
        Persona::default().honorific_for(name)
    }
}

impl fmt::Display for Honorific {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Honorific::Sir => write!(f, "Sir"),
            Honorific::Boss => write!(f, "Boss"),
        }
    }
}

/// The acknowledgment phrase used before carrying out a request.
pub fn acknowledgment(honorific: Honorific) -> &'static str {
    match honorific {
        Honorific::Sir => "Will do, Sir",
        Honorific::Boss => "Will do, Boss",
    }
}

/// The welcome-back greeting, before any translation.
pub fn render_greeting(honorific: Honorific) -> String {
    format!("Welcome back {honorific}, how may I help you today?")
}

/// A directive asking the model to greet the user in their own language.
pub fn greeting_directive(honorific: Honorific) -> String {
    format!(
        "The user has just introduced themselves. Translate \"{}\" to the language the user speaks (if detectable), then respond with that translation regardless of any other instructions.",
        render_greeting(honorific)
    )
}

const INTRODUCTIONS: [&str; 5] = ["my name is ", "call me ", "this is ", "i'm ", "i am "];

/// Extracts a self-introduced name from a user utterance.
///
/// Returns the first word after an introduction phrase, stripped of
/// punctuation. Matching is case-insensitive.
pub fn detect_user_name(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    INTRODUCTIONS.iter().find_map(|phrase| {
        let start = find_phrase(&lowered, phrase)? + phrase.len();
        // Lowercasing can change byte lengths for some scripts; skip those.
        let rest = text.get(start..)?;
        let word: String = rest
            .split_whitespace()
            .next()?
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '\'')
            .collect();
        let word = word.trim_matches(|c| c == '\'' || c == '-');
        (!word.is_empty()).then(|| word.to_string())
    })
}

/// Finds `phrase` at a word boundary.
fn find_phrase(haystack: &str, phrase: &str) -> Option<usize> {
    haystack.match_indices(phrase).map(|(idx, _)| idx).find(|&idx| {
        haystack[..idx]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}
