use actionplan_protocol::FewShotExample;

const PREAMBLE: &str = "You are a customer service assistant that outputs structured JSON.";

const INSTRUCTIONS: &str = "\
First, decide which category it belongs to (you can reuse any category from the examples or create a new concise one).
Then, infer:
- category
- reason (1 sentence)
- steps (ordered list of short imperative steps).";

const RESPONSE_SHAPE: &str = r#"{
  "category": "string",
  "reason": "string",
  "steps": ["step 1", "step 2", "step 3"]
}"#;

/// Render the few-shot prompt for one new request.
#[must_use]
pub fn build_prompt(user_text: &str, examples: &[FewShotExample]) -> String {
    let examples_block = examples
        .iter()
        .map(render_example)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{PREAMBLE}\n\n\
         Here are some examples from past conversations and their structured outputs:\n\n\
         {examples_block}\n\n\
         Now here is a NEW user request:\n\n\
         User: {user_text}\n\n\
         {INSTRUCTIONS}\n\n\
         Return JSON ONLY in this format:\n\n\
         {RESPONSE_SHAPE}\n"
    )
}

fn render_example(example: &FewShotExample) -> String {
    // Serializing borrowed strings cannot fail.
    let answer = serde_json::to_string_pretty(&example.answer()).unwrap_or_default();
    format!("User: {}\nAssistant:\n{answer}\n", example.user)
}
