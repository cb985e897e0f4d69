//! The prompt template shared by the generator and the agent.

use std::borrow::Cow;

use ethicsgen_shared::Category;

const DEFAULT_SYSTEM: &str = "You are an ethical reasoning assistant trained to analyze text passages \
and provide detailed ethical reasoning. For the given text passage, identify ethical considerations \
related to {category} and develop a step-by-step ethical reasoning process. Analyze the implications \
thoroughly and consider multiple perspectives. Structure your reasoning into two main sections with \
the following format:

<|begin_of_thought|>
(Your step-by-step ethical analysis here...)
<|end_of_thought|>

<|begin_of_solution|>
(Your final ethical assessment and recommendation...)
<|end_of_solution|>

Keep your response concise but insightful, focusing on the most important ethical considerations.";

const DEFAULT_USER: &str = "Analyze the following text passage from an ethical perspective, \
focusing especially on considerations related to {category}:

{passage}

Provide ethical reasoning following the format I specified.";

/// System and user prompt after placeholder substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub prompt: String,
}

/// System + user prompt with `{category}` and `{passage}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: String,
    user: String,
    max_passage_chars: usize,
}

impl PromptTemplate {
    /// The built-in ethical-reasoning template.
    pub fn new(max_passage_chars: usize) -> Self {
        Self {
            system: DEFAULT_SYSTEM.to_string(),
            user: DEFAULT_USER.to_string(),
            max_passage_chars,
        }
    }

    /// Fill the placeholders. Long passages are cut in the prompt only.
    pub fn render(&self, category: Category, passage: &str) -> RenderedPrompt {
        let label = category.prompt_label();
        let passage = shorten(passage, self.max_passage_chars);
        RenderedPrompt {
            system: self.system.replace("{category}", label),
            // Category first so a passage containing "{category}" is left alone.
            prompt: self
                .user
                .replace("{category}", label)
                .replace("{passage}", &passage),
        }
    }
}

/// First `max` characters plus `...`, or the passage unchanged.
fn shorten(passage: &str, max: usize) -> Cow<'_, str> {
    match passage.char_indices().nth(max) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &passage[..idx])),
        None => Cow::Borrowed(passage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_placeholders() {
        let template = PromptTemplate::new(1500);
        let rendered = template.render(Category::Privacy, "Companies track browsing habits.");

        assert!(rendered.system.contains("related to privacy"));
        assert!(rendered.system.contains("<|begin_of_thought|>"));
        assert!(rendered.prompt.contains("considerations related to privacy:"));
        assert!(rendered.prompt.contains("\n\nCompanies track browsing habits.\n\n"));
        assert!(!rendered.prompt.contains("{passage}"));
    }

    #[test]
    fn render_uses_readable_label() {
        let rendered = PromptTemplate::new(100).render(Category::GeneralEthics, "x");
        assert!(rendered.prompt.contains("related to general ethics"));
    }

    #[test]
    fn long_passages_are_shortened_in_prompt() {
        let template = PromptTemplate::new(10);
        let rendered = template.render(Category::Harm, &"é".repeat(25));
        assert!(rendered.prompt.contains(&format!("{}...", "é".repeat(10))));
        assert!(!rendered.prompt.contains(&"é".repeat(11)));
    }

    #[test]
    fn passage_placeholders_are_not_expanded() {
        let rendered = PromptTemplate::new(100).render(Category::Fairness, "literal {category}");
        assert!(rendered.prompt.contains("literal {category}"));
    }

    #[test]
    fn rendering_is_pure() {
        let template = PromptTemplate::new(50);
        assert_eq!(
            template.render(Category::Autonomy, "same"),
            template.render(Category::Autonomy, "same")
        );
    }
}
