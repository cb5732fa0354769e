//! Percy: business advisory conversation.
//!
//! Percy asks for a name, then a website, scans the site in the background
//! and offers quick fixes or a growth plan once the scan lands.

use super::{capture_name, find_url, recover, AgentState, Stage, Step};
use crate::task::{TaskKind, TaskRequest};

const NAME_PROMPT: &str = "What's your first name?";
const MENU: &str = "Reply 1 for quick fixes or 2 for a full growth plan.";

/// One transition of Percy's conversation.
#[must_use]
pub fn step(state: &AgentState, text: &str) -> Step {
    match state.stage {
        Stage::Init => Step::reply(
            state.at(Stage::AwaitingName),
            format!("Hey, I'm Percy, your business sidekick. {NAME_PROMPT}"),
        ),
        Stage::AwaitingName => awaiting_name(state, text),
        Stage::AwaitingDetail => awaiting_detail(state, text),
        Stage::Scanning => Step::reply(
            state.clone(),
            format!(
                "Still scanning your site, {}. I'll text you as soon as it's done.",
                state.display_name()
            ),
        ),
        Stage::Suggesting => suggesting(state, text),
        Stage::Processing | Stage::Unknown => recover(state, NAME_PROMPT),
    }
}

fn awaiting_name(state: &AgentState, text: &str) -> Step {
    let Some(name) = capture_name(text) else {
        return Step::reply(state.clone(), format!("Sorry, I didn't catch that. {NAME_PROMPT}"));
    };
    let reply = format!(
        "Nice to meet you, {name}! What's your business website? Send me the link and I'll take a look."
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
    let captured = AgentState {
        detail: Some(text.trim().to_string()),
        ..state.clone()
    };
    let Some(url) = find_url(text) else {
        return Step::reply(
            captured,
            format!(
                "That doesn't look like a link, {}. Send your website address, like https://yourbusiness.com",
                state.display_name()
            ),
        );
    };
    let url = url.to_string();
    Step::reply(
        captured.at(Stage::Scanning),
        format!("Scanning {url} now. I'll text you the results in a few minutes."),
    )
    .with_effect(TaskKind::Scan, url)
}

fn suggesting(state: &AgentState, text: &str) -> Step {
    let reply = match text.trim() {
        "1" => format!(
            "Quick fixes it is, {}! Start with a clear call-to-action at the top of your homepage. I'll send the rest of the list today.",
            state.display_name()
        ),
        "2" => format!(
            "Growth plan it is, {}! I'll put together a 30-day plan covering search, reviews and repeat customers.",
            state.display_name()
        ),
        _ => format!("Not sure what you meant. {MENU}"),
    };
    Step::reply(state.clone(), reply)
}

/// Out-of-band message for a finished site scan.
#[must_use]
pub fn completion_reply(request: &TaskRequest, result: &str) -> String {
    format!(
        "Scan complete for {}, {}!\n{result}\n{MENU}",
        request.payload,
        request.display_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(stage: Stage) -> AgentState {
        AgentState {
            stage,
            name: Some("Alex".to_string()),
            detail: None,
        }
    }

    #[test]
    fn test_init_greets_and_asks_name() {
        let next = step(&AgentState::default(), "Percy, hi");
        assert_eq!(next.state.stage, Stage::AwaitingName);
        assert!(next.reply.contains("Percy"));
        assert!(next.reply.contains("first name"));
        assert!(next.side_effect.is_none());
    }

    #[test]
    fn test_name_is_first_token() {
        let state = AgentState {
            stage: Stage::AwaitingName,
            ..AgentState::default()
        };
        let next = step(&state, "Alex Smith");
        assert_eq!(next.state.stage, Stage::AwaitingDetail);
        assert_eq!(next.state.name.as_deref(), Some("Alex"));
        assert!(next.reply.contains("website"));
    }

    #[test]
    fn test_blank_name_reprompts() {
        let state = AgentState {
            stage: Stage::AwaitingName,
            ..AgentState::default()
        };
        let next = step(&state, "   ");
        assert_eq!(next.state, state);
        assert!(next.reply.contains("first name"));
    }

    #[test]
    fn test_detail_without_url_stays() {
        let next = step(&at(Stage::AwaitingDetail), "we sell bikes");
        assert_eq!(next.state.stage, Stage::AwaitingDetail);
        assert_eq!(next.state.detail.as_deref(), Some("we sell bikes"));
        assert!(next.side_effect.is_none());
        assert!(next.reply.contains("https://"));
    }

    #[test]
    fn test_detail_with_hostless_link_stays() {
        for text in ["https://.", "https://!!!", "www..", "http://)"] {
            let next = step(&at(Stage::AwaitingDetail), text);
            assert_eq!(next.state.stage, Stage::AwaitingDetail, "input {text:?}");
            assert!(next.side_effect.is_none(), "input {text:?}");
            assert!(next.reply.starts_with("That doesn't look like a link"));
        }
    }

    #[test]
    fn test_detail_with_url_schedules_scan() {
        let next = step(&at(Stage::AwaitingDetail), "it's https://example.com!");
        assert_eq!(next.state.stage, Stage::Scanning);
        assert_eq!(next.state.detail.as_deref(), Some("it's https://example.com!"));
        let effect = next.side_effect.expect("scan scheduled");
        assert_eq!(effect.kind, TaskKind::Scan);
        assert_eq!(effect.payload, "https://example.com");
        assert!(next.reply.starts_with("Scanning"));
    }

    #[test]
    fn test_scanning_holds() {
        let next = step(&at(Stage::Scanning), "any news?");
        assert_eq!(next.state.stage, Stage::Scanning);
        assert!(next.reply.starts_with("Still scanning"));
    }

    #[test]
    fn test_suggesting_choices() {
        let state = at(Stage::Suggesting);
        assert!(step(&state, "1").reply.starts_with("Quick fixes"));
        assert!(step(&state, " 2 ").reply.starts_with("Growth plan"));
        let other = step(&state, "3");
        assert!(other.reply.contains(MENU));
        assert_eq!(other.state.stage, Stage::Suggesting);
    }

    #[test]
    fn test_foreign_stage_recovers() {
        let next = step(&at(Stage::Processing), "hello");
        assert_eq!(next.state.stage, Stage::AwaitingName);
        assert_eq!(next.state.name.as_deref(), Some("Alex"));
    }
}
