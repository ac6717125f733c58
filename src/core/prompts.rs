// src/core/prompts.rs — Named prompt templates rendered with minijinja

use minijinja::{Environment, ErrorKind, UndefinedBehavior, Value};

use crate::infra::errors::ChartsmithError;

pub const GENERATOR_SYSTEM: &str = "generator_system";
pub const GENERATOR_USER: &str = "generator_user";
pub const PROMPT_SYSTEM: &str = "prompt_system";
pub const PROMPT_USER: &str = "prompt_user";
pub const PROMPT_FALLBACK: &str = "prompt_fallback";
pub const JUDGE_SYSTEM: &str = "judge_system";
pub const JUDGE_USER: &str = "judge_user";
pub const REVISER_SYSTEM: &str = "reviser_system";
pub const REVISER_USER: &str = "reviser_user";

const TEMPLATES: &[(&str, &str)] = &[
    (
        GENERATOR_SYSTEM,
        "You are a helpful assistant that generates valid Vega-Lite JSON chart specifications \
         from user prompts. Return only the Vega-Lite JSON, no extra text.",
    ),
    (
        GENERATOR_USER,
        "Prompt: {{ prompt }}\nGenerate a valid Vega-Lite JSON chart specification.",
    ),
    (
        PROMPT_SYSTEM,
        "You are a helpful assistant that converts user requests into structured prompts \
         for chart specification generation. The prompt should be clear, concise, and designed \
         to elicit a high-quality Vega-Lite chart spec from an LLM.",
    ),
    (
        PROMPT_USER,
        "User query: {{ query }}\nGenerate a prompt that will instruct an LLM to create a \
         Vega-Lite chart specification for this request.",
    ),
    (
        PROMPT_FALLBACK,
        r#"Create a Vega-Lite chart specification based on the following user request:

User Request: "{{ query }}"

Please generate a complete Vega-Lite JSON specification that:
1. Uses appropriate chart type for the data and analysis
2. Includes proper axis labels and titles
3. Handles the data structure appropriately
4. Uses meaningful colors and styling
5. Is optimized for readability and insight

Return only the JSON specification without any additional text."#,
    ),
    (
        JUDGE_SYSTEM,
        r#"You are a data visualization reviewer. Judge how well a Vega-Lite chart answers the user's request, considering intent match, clarity, insight, aesthetics and data accuracy.
Respond with only a JSON object of the form:
{"score": <number from 0 to 10>, "feedback": "<one paragraph>", "strengths": ["..."], "weaknesses": ["..."]}"#,
    ),
    (
        JUDGE_USER,
        "User request: {{ query }}\n\nChart specification:\n{{ chart }}",
    ),
    (
        REVISER_SYSTEM,
        "You are a helpful assistant that rewrites visualization prompts to address specific \
         issues and improve chart quality. Focus on clarity, specificity, modern color schemes, \
         interactivity (tooltips, selection, hover), and responsive design. Use the reviewer's \
         feedback to guide improvements. Return only the rewritten prompt.",
    ),
    (
        REVISER_USER,
        r#"Original prompt: {{ prompt }}
Issues to address:
- Rule issues: {% if issues %}{{ issues | join(", ") }}{% else %}None{% endif %}
- Reviewer feedback: {{ feedback }}
- Current score: {{ score }}/10
Rewrite the prompt to address these issues and make it more specific, clear and actionable."#,
    ),
];

/// Every prompt sent to a provider is rendered from one of these templates.
pub struct PromptTemplates {
    env: Environment<'static>,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptTemplates {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    /// Render a named template. Missing variables are an error, not blanks.
    pub fn render(&self, name: &str, ctx: Value) -> Result<String, ChartsmithError> {
        let source = TEMPLATES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, s)| *s)
            .ok_or_else(|| {
                minijinja::Error::new(
                    ErrorKind::TemplateNotFound,
                    format!("no prompt template named '{name}'"),
                )
            })?;
        Ok(self.env.render_str(source, ctx)?)
    }
}
