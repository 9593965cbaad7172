//! Skill Router Module
//!
//! Routes devil-mode input to a reviewer skill by content type.
//!
//! ```text
//! Content              | Skill
//! ---------------------|------------------
//! Source code          | code-checker
//! Papers / reports     | logic-auditor
//! Anything else        | general-reviewer
//! ```

pub mod skill_classifier;

pub use skill_classifier::{
    classify, classify_with, ClassificationRule, ReviewSkill, CLASSIFICATION_RULES, DEFAULT_SKILL,
};
