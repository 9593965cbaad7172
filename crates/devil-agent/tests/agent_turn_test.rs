//! End-to-end chat turns with scripted model, mocked search and on-disk skills.
//!
//! Tests exercise the full orchestrator:
//! - offline turns never search and end with the advisory once
//! - empty extracted queries skip search and context
//! - a date-stamped search-backed turn with references
//! - streaming failures surface as a single error event
//! - devil-mode skill selection and toggles

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::{hits, june_first, search_returning, MockSearch, ScriptedModel};
use coordination::search::OFFLINE_NOTICE;
use coordination::SkillRegistry;
use devil_agent::llm::AdapterError;
use devil_agent::prompts::NORMAL_PREAMBLE;
use devil_agent::{DevilAgent, OutputEvent};
use futures::StreamExt;
use tempfile::tempdir;

async fn collect(agent: &DevilAgent, input: &str) -> Vec<OutputEvent> {
    agent.chat(input).collect().await
}

fn stages(events: &[OutputEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            OutputEvent::Progress(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

fn content(events: &[OutputEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            OutputEvent::Content(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

fn seed_skills(root: &Path) -> SkillRegistry {
    for (name, body) in [
        ("code-checker", "CODE CHECKER INSTRUCTIONS"),
        ("logic-auditor", "LOGIC AUDITOR INSTRUCTIONS"),
        ("general-reviewer", "GENERAL REVIEWER INSTRUCTIONS"),
    ] {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("SKILL.md"),
            format!("---\nname: {name}\ndescription: {name} skill\n---\n{body}\n"),
        )
        .unwrap();
    }
    SkillRegistry::from_dir(root)
}

#[tokio::test]
async fn test_offline_turn_never_searches_and_appends_notice_once() {
    let model = Arc::new(ScriptedModel::new());
    let mut search = MockSearch::new();
    search.expect_search().never();
    let agent = DevilAgent::builder(model.clone(), Arc::new(search))
        .web_search(false)
        .today(june_first())
        .build();

    let events = collect(&agent, "Is my plan sound?").await;

    assert_eq!(stages(&events), vec!["Generating response (offline)..."]);
    assert_eq!(*model.extraction_calls.lock().unwrap(), 0);
    let notices = events
        .iter()
        .filter(|e| **e == OutputEvent::content(OFFLINE_NOTICE))
        .count();
    assert_eq!(notices, 1);
    assert_eq!(events.last(), Some(&OutputEvent::content(OFFLINE_NOTICE)));
    assert_eq!(content(&events), format!("Hello, world{OFFLINE_NOTICE}"));
    assert!(!model.system_prompt(0).contains("<search_results"));
}

#[tokio::test]
async fn test_empty_queries_skip_search_and_context() {
    let model = Arc::new(ScriptedModel::new().with_queries(&[]));
    let mut search = MockSearch::new();
    search.expect_search().never();
    let agent = DevilAgent::builder(model.clone(), Arc::new(search))
        .today(june_first())
        .build();

    let events = collect(&agent, "What is machine learning?").await;

    assert_eq!(stages(&events), vec!["Extracting search queries..."]);
    assert_eq!(model.validation_calls(), 0);
    assert_eq!(content(&events), "Hello, world");
    assert!(!model.system_prompt(0).contains("<search_results"));
}

#[tokio::test]
async fn test_tesla_stock_price_end_to_end() {
    let model = Arc::new(
        ScriptedModel::new()
            .with_queries(&["Tesla stock price 2024-06-01"])
            .with_verdict(true, &[])
            .with_tokens(vec![
                Ok("TSLA is ".into()),
                Ok("".into()),
                Ok("$178 [1](https://news.example.com/1)".into()),
            ]),
    );
    let mut search = MockSearch::new();
    search
        .expect_search()
        .withf(|q, limit| q == "Tesla stock price 2024-06-01" && *limit == 5)
        .times(1)
        .returning(|q, _| Ok(hits(q, 5)));
    let agent = DevilAgent::builder(model.clone(), Arc::new(search))
        .devil_mode(false)
        .today(june_first())
        .build();

    let events = collect(&agent, "Tesla stock price").await;

    assert_eq!(
        stages(&events),
        vec![
            "Extracting search queries...",
            "Searching: Tesla stock price 2024-06-01",
            "Found 1 results, validating...",
            "Generating response...",
        ]
    );

    let system = model.system_prompt(0);
    assert!(system.starts_with(NORMAL_PREAMBLE));
    assert!(system.contains("date=\"2024-06-01\""));
    assert_eq!(system.matches("[Tesla stock price 2024-06-01]\n").count(), 1);
    assert!(system.contains("Today is 2024-06-01."));

    // Empty fragments are dropped; references follow the response.
    let text_events: Vec<_> = events.iter().filter(|e| !e.is_progress()).collect();
    assert_eq!(text_events.len(), 2 + 1 + 5);
    let text = content(&events);
    assert!(text.starts_with("TSLA is $178"));
    assert!(text.contains("\n\n---\n**References:**\n[1]: https://news.example.com/1\n"));
    assert!(text.ends_with("[5]: https://news.example.com/5\n"));
    assert!(!text.contains(OFFLINE_NOTICE));

    let status = agent.status().await;
    assert_eq!(status.history, 2);
}

#[tokio::test]
async fn test_references_capped_at_five() {
    let model = Arc::new(
        ScriptedModel::new()
            .with_queries(&["a", "b"])
            .with_verdict(true, &[]),
    );
    let agent = DevilAgent::builder(model, Arc::new(search_returning(4)))
        .today(june_first())
        .build();

    let events = collect(&agent, "compare a and b").await;

    let text = content(&events);
    assert!(text.contains("[5]: "));
    assert!(!text.contains("[6]: "));
}

#[tokio::test]
async fn test_stream_failure_emits_single_error_event() {
    let model = Arc::new(ScriptedModel::new().with_tokens(vec![
        Ok("partial ".into()),
        Err(AdapterError::Transport("connection reset".into())),
        Ok("never seen".into()),
    ]));
    let agent = DevilAgent::builder(model, Arc::new(search_returning(1)))
        .web_search(false)
        .build();

    let events = collect(&agent, "hello").await;

    let errors: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, OutputEvent::Error(_)))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        events.last(),
        Some(&OutputEvent::Error("transport error: connection reset".into()))
    );
    assert_eq!(
        events.last().unwrap().to_wire(),
        "\n[Error: transport error: connection reset]"
    );
    assert_eq!(content(&events), "partial ");
    // Only the user message was recorded.
    assert_eq!(agent.status().await.history, 1);
}

#[tokio::test]
async fn test_stream_start_failure_emits_error() {
    let model = Arc::new(ScriptedModel::new().with_stream_start_error(AdapterError::Status {
        code: 401,
        body: "bad key".into(),
    }));
    let agent = DevilAgent::builder(model, Arc::new(search_returning(1)))
        .web_search(false)
        .build();

    let events = collect(&agent, "hello").await;

    assert_eq!(
        events.last(),
        Some(&OutputEvent::Error("HTTP 401: bad key".into()))
    );
    assert!(content(&events).is_empty());
}

#[tokio::test]
async fn test_devil_mode_loads_classified_skill_and_keeps_it() {
    let dir = tempdir().unwrap();
    let skills = seed_skills(dir.path());
    let model = Arc::new(ScriptedModel::new());
    let agent = DevilAgent::builder(model.clone(), Arc::new(search_returning(1)))
        .skills(skills)
        .web_search(false)
        .build();

    collect(&agent, "def foo():\n    return eval(input())").await;
    let first = model.system_prompt(0);
    assert!(first.contains("Devil's Advocate mode"));
    assert!(first.contains("CODE CHECKER INSTRUCTIONS"));
    assert!(first.contains("- **logic-auditor**: logic-auditor skill"));
    assert_eq!(
        agent.status().await.active_skill.as_deref(),
        Some("code-checker")
    );

    // Still the code checker: classification only runs with no active skill.
    collect(&agent, "my research proposal").await;
    assert!(model.system_prompt(1).contains("CODE CHECKER INSTRUCTIONS"));
}

#[tokio::test]
async fn test_mode_toggle_forces_reclassification() {
    let dir = tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new());
    let agent = DevilAgent::builder(model.clone(), Arc::new(search_returning(1)))
        .skills(seed_skills(dir.path()))
        .web_search(false)
        .build();

    collect(&agent, "class Widget: pass").await;
    assert_eq!(agent.status().await.active_skill.as_deref(), Some("code-checker"));

    agent.set_mode(true).await;
    agent.set_mode(false).await;
    let status = agent.set_mode(true).await;
    assert!(status.devil_mode);
    assert!(status.active_skill.is_none());

    collect(&agent, "Review my research proposal").await;
    assert!(model.system_prompt(1).contains("LOGIC AUDITOR INSTRUCTIONS"));
}

#[tokio::test]
async fn test_normal_mode_uses_general_prompt() {
    let dir = tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new());
    let agent = DevilAgent::builder(model.clone(), Arc::new(search_returning(1)))
        .skills(seed_skills(dir.path()))
        .devil_mode(false)
        .web_search(false)
        .build();

    collect(&agent, "def foo(): pass").await;

    assert_eq!(model.system_prompt(0), NORMAL_PREAMBLE);
    assert!(agent.status().await.active_skill.is_none());
}

#[tokio::test]
async fn test_missing_skill_uses_placeholder() {
    let model = Arc::new(ScriptedModel::new());
    let agent = DevilAgent::builder(model.clone(), Arc::new(search_returning(1)))
        .web_search(false)
        .build();

    collect(&agent, "anything").await;

    let prompt = model.system_prompt(0);
    assert!(prompt.contains("No skills available"));
    assert!(prompt.contains("No skill loaded"));
}

#[tokio::test]
async fn test_history_resets_every_turn() {
    let model = Arc::new(ScriptedModel::new());
    let agent = DevilAgent::builder(model.clone(), Arc::new(search_returning(1)))
        .web_search(false)
        .build();

    collect(&agent, "first").await;
    collect(&agent, "second").await;

    assert_eq!(agent.status().await.history, 2);
    // The second request carried only the system prompt and the new message.
    let streamed = model.streamed.lock().unwrap();
    assert_eq!(streamed[1].len(), 2);
    assert_eq!(streamed[1][1].text(), "second");
}

#[tokio::test]
async fn test_search_toggle_and_clear() {
    let dir = tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new());
    let agent = DevilAgent::builder(model, Arc::new(search_returning(1)))
        .skills(seed_skills(dir.path()))
        .web_search(false)
        .build();

    collect(&agent, "a paper draft").await;
    let status = agent.set_search(true).await;
    assert!(status.search_enabled);
    assert_eq!(status.active_skill.as_deref(), Some("logic-auditor"));
    assert_eq!(status.skills.len(), 3);

    let status = agent.clear().await;
    assert_eq!(status.history, 0);
    assert!(status.active_skill.is_none());
}

#[tokio::test]
async fn test_concurrent_turns_are_serialised() {
    let model = Arc::new(ScriptedModel::new());
    let agent = DevilAgent::builder(model.clone(), Arc::new(search_returning(1)))
        .web_search(false)
        .build();

    let agent2 = agent.clone();
    let (a, b) = tokio::join!(collect(&agent, "one"), collect(&agent2, "two"));

    for events in [&a, &b] {
        assert_eq!(content(events), format!("Hello, world{OFFLINE_NOTICE}"));
    }
    assert_eq!(model.streamed.lock().unwrap().len(), 2);
    assert_eq!(agent.status().await.history, 2);
}

#[tokio::test]
async fn test_dropped_stream_releases_session() {
    let model = Arc::new(ScriptedModel::new());
    let agent = DevilAgent::builder(model, Arc::new(search_returning(1)))
        .web_search(false)
        .build();

    drop(agent.chat("nobody is listening"));

    let status = tokio::time::timeout(Duration::from_secs(5), agent.set_mode(false))
        .await
        .expect("toggle blocked behind an abandoned turn");
    assert!(!status.devil_mode);
}
