//! Command parser
//!
//! Turns a raw command string into actions. Parsing never fails: anything
//! that is not a well-formed `sleep(...)` or `one_of(...)` call is spoken as
//! literal text.

use crate::action::Action;
use std::time::Duration;
use tracing::{debug, trace};

/// Ends a step, next step starts after a short pause
pub const NO_WAIT_DELIMITER: &str = "&&";

/// Ends a step, next step starts once playback of this one has finished
pub const WAIT_DELIMITER: &str = "&!";

/// Separates the items of `one_of(...)`
pub const CHOICE_SEPARATOR: char = '|';

const SLEEP_FN: &str = "sleep";
const ONE_OF_FN: &str = "one_of";

/// Parse a command into a non-empty, ordered list of actions
///
/// ```
/// use vs_script::{parse, ActionKind};
///
/// let actions = parse("Hi there&!one_of(Nice to meet you|Pleasure)");
/// assert_eq!(actions.len(), 2);
/// assert!(actions[0].wait_for_reply());
/// assert!(matches!(actions[1].kind(), ActionKind::RandomChoice(items) if items.len() == 2));
/// ```
pub fn parse(command: &str) -> Vec<Action> {
    let chunks = split_chunks(command);
    if chunks.iter().all(|(chunk, _)| chunk.trim().is_empty()) {
        return vec![Action::literal("")];
    }

    // blank chunks stay, each keeps its delimiter's wait
    let actions: Vec<Action> = chunks
        .into_iter()
        .map(|(chunk, wait)| classify(chunk).with_wait(wait))
        .collect();

    trace!(command, steps = actions.len(), "Parsed command");
    actions
}

/// Split on both delimiters, left to right
///
/// Each chunk carries whether its terminating delimiter was the waiting one.
/// The last chunk has no delimiter and never waits.
fn split_chunks(command: &str) -> Vec<(&str, bool)> {
    let mut chunks = Vec::new();
    let mut rest = command;

    while let Some((pos, wait)) = next_delimiter(rest) {
        chunks.push((&rest[..pos], wait));
        rest = &rest[pos + 2..];
    }
    chunks.push((rest, false));

    chunks
}

fn next_delimiter(s: &str) -> Option<(usize, bool)> {
    let bytes = s.as_bytes();
    let mut from = 0;

    while let Some(offset) = s[from..].find('&') {
        let pos = from + offset;
        match bytes.get(pos + 1) {
            Some(b'&') => return Some((pos, false)),
            Some(b'!') => return Some((pos, true)),
            _ => from = pos + 1,
        }
    }

    None
}

/// Classify one chunk: `sleep(...)`, then `one_of(...)`, then literal
fn classify(chunk: &str) -> Action {
    let text = chunk.trim();

    if let Some(duration) = call_argument(text, SLEEP_FN).and_then(parse_seconds) {
        return Action::delay(duration);
    }

    if let Some(argument) = call_argument(text, ONE_OF_FN) {
        let items: Vec<String> = argument
            .split(CHOICE_SEPARATOR)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();

        match Action::choice(items) {
            Some(action) => return action,
            None => debug!(chunk = text, "one_of() without items, speaking it as text"),
        }
    }

    Action::literal(text)
}

/// The text between the parentheses of `name(...)`, if `text` is exactly that call
fn call_argument<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// Non-negative, finite seconds
fn parse_seconds(argument: &str) -> Option<Duration> {
    let seconds: f64 = argument.trim().parse().ok()?;
    if seconds.is_sign_negative() {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    fn kinds(command: &str) -> Vec<ActionKind> {
        parse(command).into_iter().map(|a| a.kind().clone()).collect()
    }

    fn waits(command: &str) -> Vec<bool> {
        parse(command).iter().map(Action::wait_for_reply).collect()
    }

    #[test]
    fn test_empty_input_is_one_empty_literal() {
        assert_eq!(parse(""), vec![Action::literal("")]);
        assert_eq!(parse("   "), vec![Action::literal("")]);
        assert_eq!(parse("&&&!"), vec![Action::literal("")]);
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(parse("  what time is it "), vec![Action::literal("what time is it")]);
    }

    #[test]
    fn test_no_wait_chunks() {
        assert_eq!(
            kinds("turn on the lights&&play jazz&&set volume to 5"),
            vec![
                ActionKind::Literal("turn on the lights".into()),
                ActionKind::Literal("play jazz".into()),
                ActionKind::Literal("set volume to 5".into()),
            ]
        );
        assert_eq!(
            waits("turn on the lights&&play jazz&&set volume to 5"),
            vec![false, false, false]
        );
    }

    #[test]
    fn test_wait_delimiter_marks_the_closed_chunk() {
        assert_eq!(waits("a&!b&&c&!d"), vec![true, false, true, false]);
    }

    #[test]
    fn test_sleep() {
        assert_eq!(kinds("sleep(2.5)"), vec![ActionKind::Delay(Duration::from_secs_f64(2.5))]);
        assert_eq!(kinds("sleep ( 3 )"), vec![ActionKind::Delay(Duration::from_secs(3))]);
        assert_eq!(kinds("sleep(0)"), vec![ActionKind::Delay(Duration::ZERO)]);
    }

    #[test]
    fn test_sleep_then_text() {
        let actions = parse("sleep(2.5)&!say hi");
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].kind(), &ActionKind::Delay(Duration::from_secs_f64(2.5)));
        assert_eq!(actions[1], Action::literal("say hi"));
    }

    #[test]
    fn test_bad_sleep_arguments_are_literal() {
        for command in ["sleep(-1)", "sleep(soon)", "sleep()", "sleep(inf)", "sleep(NaN)", "sleep(2"] {
            assert_eq!(kinds(command), vec![ActionKind::Literal(command.into())], "{command}");
        }
    }

    #[test]
    fn test_one_of() {
        assert_eq!(
            kinds("one_of(a|b|c)"),
            vec![ActionKind::RandomChoice(vec!["a".into(), "b".into(), "c".into()])]
        );
        assert_eq!(
            kinds("one_of( good morning | hello there |)"),
            vec![ActionKind::RandomChoice(vec![
                "good morning".into(),
                "hello there".into()
            ])]
        );
    }

    #[test]
    fn test_empty_one_of_degrades_to_literal() {
        assert_eq!(kinds("one_of()"), vec![ActionKind::Literal("one_of()".into())]);
        assert_eq!(kinds(" one_of( | ) "), vec![ActionKind::Literal("one_of( | )".into())]);
    }

    #[test]
    fn test_nested_calls_are_not_special() {
        assert_eq!(
            kinds("sleep(one_of(1|2))"),
            vec![ActionKind::Literal("sleep(one_of(1|2))".into())]
        );
        assert_eq!(
            kinds("one_of(sleep(1)|b)"),
            vec![ActionKind::RandomChoice(vec!["sleep(1)".into(), "b".into()])]
        );
    }

    #[test]
    fn test_function_names_need_exact_match() {
        assert_eq!(kinds("sleepy(2)"), vec![ActionKind::Literal("sleepy(2)".into())]);
        assert_eq!(kinds("Sleep(2)"), vec![ActionKind::Literal("Sleep(2)".into())]);
        assert_eq!(
            kinds("please sleep(2)"),
            vec![ActionKind::Literal("please sleep(2)".into())]
        );
    }

    #[test]
    fn test_single_ampersand_is_text() {
        assert_eq!(kinds("rock & roll"), vec![ActionKind::Literal("rock & roll".into())]);
        assert_eq!(kinds("a&b&&c"), vec![
            ActionKind::Literal("a&b".into()),
            ActionKind::Literal("c".into()),
        ]);
    }

    #[test]
    fn test_blank_chunks_become_empty_literals() {
        assert_eq!(kinds("a&&&&b"), vec![
            ActionKind::Literal("a".into()),
            ActionKind::Literal(String::new()),
            ActionKind::Literal("b".into()),
        ]);
        assert_eq!(waits("a&! &&b&!"), vec![true, false, true, false]);
        assert_eq!(parse("Hi&!"), vec![Action::literal("Hi").with_wait(true), Action::literal("")]);
    }

    #[test]
    fn test_wait_after_blank_chunk_is_kept() {
        assert_eq!(waits("a&&&!b"), vec![false, true, false]);
        assert_eq!(parse("a&&&!b")[1], Action::literal("").with_wait(true));
    }

    #[test]
    fn test_placeholders_are_kept_verbatim() {
        assert_eq!(parse("remind me to {task}"), vec![Action::literal("remind me to {task}")]);
    }

    #[test]
    fn test_parse_is_total() {
        for command in ["&", "&&", "&!", "!", "((", "one_of(", ")", "\u{1F600}&&\u{1F600}", "&&&", "&!&!&!"] {
            assert!(!parse(command).is_empty(), "{command}");
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::action::ActionKind;
    use proptest::prelude::*;

    /// Text heavy in delimiter and call syntax, with some non-ASCII
    fn arb_command() -> impl Strategy<Value = String> {
        prop_oneof![
            ".*",
            "[&!|() a-z0-9.\\-{}é\u{1F600}]{0,40}",
            prop::collection::vec(
                prop_oneof![
                    Just("&&".to_string()),
                    Just("&!".to_string()),
                    Just("sleep(".to_string()),
                    Just("one_of(".to_string()),
                    Just("|".to_string()),
                    Just(")".to_string()),
                    "[a-z ]{0,6}",
                ],
                0..12,
            )
            .prop_map(|parts| parts.concat()),
        ]
    }

    proptest! {
        #[test]
        fn parse_always_yields_actions(command in arb_command()) {
            prop_assert!(!parse(&command).is_empty());
        }

        #[test]
        fn no_wait_join_keeps_every_literal(chunks in prop::collection::vec("[a-z][a-z ]{0,12}", 1..8)) {
            let actions = parse(&chunks.join(NO_WAIT_DELIMITER));

            prop_assert_eq!(actions.len(), chunks.len());
            for (action, chunk) in actions.iter().zip(&chunks) {
                prop_assert_eq!(action.kind(), &ActionKind::Literal(chunk.trim().to_string()));
                prop_assert!(!action.wait_for_reply());
            }
        }
    }
}
