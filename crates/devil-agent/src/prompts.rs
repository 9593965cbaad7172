//! Prompt text for generation, query extraction, and search validation.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever any prompt text changes
//! so logged turns can be matched to the wording that produced them.

use chrono::NaiveDate;

/// Prompt version. Bump on any prompt content change.
pub const PROMPT_VERSION: &str = "1.2.0";

/// General assistant system prompt used outside devil mode.
pub const NORMAL_PREAMBLE: &str = "\
<system>
You are a helpful assistant. Follow instructions precisely. Do NOT invent facts.
</system>

<instructions>
1) Include source links when possible
2) Mark unverified info with \"⚠️ Unverified\"
3) Use search results if provided, verify dates match current date
</instructions>";

/// Adversarial reviewer template. `{skills_list}` and `{skill_content}` are
/// substituted by [`devil_preamble`].
pub const DEVIL_PREAMBLE_TEMPLATE: &str = "\
<system>
You are a professional red-team reviewer (Devil's Advocate mode). Find ALL issues and vulnerabilities strictly.
</system>

<instructions>
Task steps:
1) Analyze user content thoroughly
2) Identify logic flaws, technical issues, potential risks
3) Categorize findings by severity
4) Ask \"Want deeper analysis on any specific issue?\"
</instructions>

<context>
Available skills (L1 metadata):
{skills_list}

Active skill instructions (L2):
{skill_content}
</context>

<output_format>
🔴 **MUST FIX** - Critical/blocking issues
🟡 **SHOULD FIX** - Medium issues
📝 **SUGGESTIONS** - Optimization tips

End with: \"Want deeper analysis on any issue? You can specify attack direction.\"
</output_format>";

/// Shown in place of skill instructions when no skill resolved.
pub const NO_SKILL_LOADED: &str = "No skill loaded";

pub fn devil_preamble(skills_list: &str, skill_content: Option<&str>) -> String {
    DEVIL_PREAMBLE_TEMPLATE
        .replace("{skills_list}", skills_list)
        .replace("{skill_content}", skill_content.unwrap_or(NO_SKILL_LOADED))
}

/// System prompt asking for 1-3 search queries.
pub fn query_extraction_prompt(today: NaiveDate) -> String {
    let today = today.format("%Y-%m-%d");
    format!(
        "Current date: {today}\n\
         Extract 1-3 search keywords. For time-sensitive queries (weather/news/stock/events), MUST include \"{today}\".\n\
         Examples:\n\
         \"What's the weather in Beijing today\" -> [\"Beijing weather {today}\"]\n\
         \"Latest AI news\" -> [\"AI news {today}\"]\n\
         \"Check Tesla stock price\" -> [\"Tesla stock price {today}\"]\n\
         \"What is machine learning\" -> [\"machine learning tutorial\"]\n\
         Respond with JSON: {{\"queries\": [...]}}"
    )
}

/// User prompt asking whether accumulated results are fresh enough.
pub fn validation_prompt(today: NaiveDate, user_input: &str, results_digest: &str) -> String {
    let today = today.format("%Y-%m-%d");
    format!(
        "Current date: {today}\n\
         User asked: {user_input}\n\
         Search results:\n\
         {results_digest}\n\
         \n\
         Check: Do results contain info relevant to TODAY ({today})? If results show old dates, NOT satisfied.\n\
         Respond with JSON: {{\"is_satisfied\": bool, \"reason\": string, \"new_queries\": [...]}}"
    )
}
