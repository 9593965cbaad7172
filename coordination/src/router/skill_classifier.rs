//! Content-type classification for devil-mode skill selection.
//!
//! A pure function over an ordered rule table: the first rule with any
//! keyword present in the lowercased input wins, otherwise the general
//! reviewer is selected.

use serde::{Deserialize, Serialize};

/// The three reviewer skills the classifier can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewSkill {
    /// Source code review.
    CodeChecker,
    /// Logic audit for papers, reports, proposals and designs.
    LogicAuditor,
    /// Fallback for everything else.
    GeneralReviewer,
}

impl ReviewSkill {
    /// Registry name of the skill directory this variant loads.
    pub fn skill_name(&self) -> &'static str {
        match self {
            Self::CodeChecker => "code-checker",
            Self::LogicAuditor => "logic-auditor",
            Self::GeneralReviewer => "general-reviewer",
        }
    }
}

impl std::fmt::Display for ReviewSkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.skill_name())
    }
}

/// A keyword rule: any keyword hit selects `skill`.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    pub keywords: &'static [&'static str],
    pub skill: ReviewSkill,
}

/// Ordered rules; code wins over documents.
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        keywords: &["def ", "class ", "import ", "function", "```"],
        skill: ReviewSkill::CodeChecker,
    },
    ClassificationRule {
        keywords: &[
            "paper",
            "report",
            "proposal",
            "design",
            "analysis",
            "hypothesis",
            "conclusion",
            "thesis",
            "research",
            "study",
        ],
        skill: ReviewSkill::LogicAuditor,
    },
];

/// Fallback when no rule matches.
pub const DEFAULT_SKILL: ReviewSkill = ReviewSkill::GeneralReviewer;

/// Classify with an explicit rule table.
pub fn classify_with(rules: &[ClassificationRule], text: &str) -> ReviewSkill {
    let lower = text.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| lower.contains(kw)))
        .map(|rule| rule.skill)
        .unwrap_or(DEFAULT_SKILL)
}

/// Classify user input with [`CLASSIFICATION_RULES`].
pub fn classify(text: &str) -> ReviewSkill {
    classify_with(CLASSIFICATION_RULES, text)
}
