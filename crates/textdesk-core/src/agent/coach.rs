//! Coach: sports coaching conversation.
//!
//! After the name, Coach takes one of three paths on the goal message:
//! a canned quick win, a video link to analyze in the background, or a
//! free-text goal turned into a three-step plan on the spot.

use super::{capture_name, find_url, recover, AgentState, Stage, Step};
use crate::task::{TaskKind, TaskRequest};

const NAME_PROMPT: &str = "What's your first name?";
const MENU: &str = "Reply 1 to start step one today or 2 for a weekly schedule.";
const QUICK_WIN_KEYWORD: &str = "quick";

/// One transition of Coach's conversation.
#[must_use]
pub fn step(state: &AgentState, text: &str) -> Step {
    match state.stage {
        Stage::Init => Step::reply(
            state.at(Stage::AwaitingName),
            format!("Hey, I'm Coach, your training partner. {NAME_PROMPT}"),
        ),
        Stage::AwaitingName => awaiting_name(state, text),
        Stage::AwaitingDetail => awaiting_detail(state, text),
        Stage::Processing => Step::reply(
            state.clone(),
            format!(
                "Still working on it, {}. I'll text you as soon as it's ready.",
                state.display_name()
            ),
        ),
        Stage::Suggesting => suggesting(state, text),
        Stage::Scanning | Stage::Unknown => recover(state, NAME_PROMPT),
    }
}

fn awaiting_name(state: &AgentState, text: &str) -> Step {
    let Some(name) = capture_name(text) else {
        return Step::reply(state.clone(), format!("Sorry, I didn't catch that. {NAME_PROMPT}"));
    };
    let reply = format!(
        "Good to meet you, {name}! What's your fitness goal? You can also send a link to a training video, or say \"quick\" for a quick win."
    );
    Step::reply(
        AgentState {
            stage: Stage::AwaitingDetail,
            name: Some(name),
            ..state.clone()
        },
        reply,
    )
}

fn awaiting_detail(state: &AgentState, text: &str) -> Step {
    let goal = text.trim();
    if goal.is_empty() {
        return Step::reply(
            state.clone(),
            format!("Tell me your goal, {}, or send a video link.", state.display_name()),
        );
    }
    let captured = AgentState {
        detail: Some(goal.to_string()),
        ..state.clone()
    };

    if goal.to_lowercase().contains(QUICK_WIN_KEYWORD) {
        return Step::reply(
            captured.at(Stage::Processing),
            "Quick win: do 10 bodyweight squats every time you get up from your desk today. I'm putting together more for you now.",
        );
    }

    if let Some(url) = find_url(goal) {
        let url = url.to_string();
        return Step::reply(
            captured.at(Stage::Processing),
            format!("Analyzing your video at {url}. I'll text you feedback shortly."),
        )
        .with_effect(TaskKind::AnalyzeMedia, url);
    }

    let reply = plan_for(goal);
    Step::reply(captured.at(Stage::Suggesting), reply)
}

/// Three-step plan built from the sender's own words.
fn plan_for(goal: &str) -> String {
    let goal = goal.trim_end_matches(['.', '!', '?']);
    format!(
        "Here's your 3-step plan for \"{goal}\":\n\
         1. Write down what \"{goal}\" looks like in numbers four weeks from now.\n\
         2. Train three days a week, with one session built around {goal}.\n\
         3. Check in every Sunday and adjust the load.\n\
         {MENU}"
    )
}

fn suggesting(state: &AgentState, text: &str) -> Step {
    let reply = match text.trim() {
        "1" => format!(
            "Let's go, {}! Step one starts today. Text me when it's done.",
            state.display_name()
        ),
        "2" => format!(
            "Weekly schedule coming up, {}. Expect it tonight.",
            state.display_name()
        ),
        _ => format!("Not sure what you meant. {MENU}"),
    };
    Step::reply(state.clone(), reply)
}

/// Out-of-band message for a finished video analysis.
#[must_use]
pub fn completion_reply(request: &TaskRequest, result: &str) -> String {
    format!(
        "Video analysis done, {}!\n{result}\n{MENU}",
        request.display_name()
    )
}
