//! Continuations bridge long-running tasks back into the conversation.
//!
//! A tool that queues a task may attach a [`Continuation`]: the plan context
//! plus a next-steps string.  When the task finishes, the engine first tries
//! to execute the next step deterministically by parsing the literal
//! `Call tool_name({...})` prefix out of the next-steps text; only when that
//! fails (or the task failed) does the LLM get consulted again.  The sentinel
//! prefixes defined here are contract strings shared with the tools and the
//! model; tests assert on them verbatim.

use serde_json::Value;

use crate::blockmind::companion::OwnerId;

/// Tool-result prefix meaning "task queued, do not chain further tool calls".
pub const ASYNC_TASK: &str = "[ASYNC_TASK]";

/// Lead-in for continuation success messages.
pub const TASK_COMPLETE: &str = "[TASK_COMPLETE]";

/// Lead-in for continuation failure messages.
pub const TASK_FAILED: &str = "[TASK_FAILED]";

/// Terminal planner signal: the model must not retry the crafting tool.
pub const CANNOT_CRAFT: &str = "[CANNOT_CRAFT]";

/// A fallback strategy enumerated in failure messages.  Kept as data so the
/// failure text stays consistent and testable.
#[derive(Debug, Clone, Copy)]
pub struct FallbackStrategy {
    pub tool: &'static str,
    pub when: &'static str,
}

/// Strategies offered to the model when a planned task fails.
pub const FALLBACK_STRATEGIES: &[FallbackStrategy] = &[
    FallbackStrategy {
        tool: "strip_mine",
        when: "an ore could not be found on the surface; tunnel at the ore's depth instead",
    },
    FallbackStrategy {
        tool: "find_and_fetch_item",
        when: "the material might already be in a tagged storage container",
    },
    FallbackStrategy {
        tool: "gather_blocks",
        when: "the material is a common surface block that another spot may expose",
    },
    FallbackStrategy {
        tool: "task_status",
        when: "you are unsure what the companion is doing before choosing again",
    },
];

/// Deferred conversation state attached to a queued task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub owner: OwnerId,
    /// Human-readable rendering of the overall plan this task is part of.
    pub plan_context: String,
    /// Next action; when it starts with `Call tool({...})` it executes
    /// deterministically, anything else goes back through the model.
    pub next_steps: String,
}

impl Continuation {
    pub fn new(
        owner: OwnerId,
        plan_context: impl Into<String>,
        next_steps: impl Into<String>,
    ) -> Self {
        Self {
            owner,
            plan_context: plan_context.into(),
            next_steps: next_steps.into(),
        }
    }

    /// Synthetic message injected after the task completed successfully.
    pub fn success_message(&self, description: &str, result: &str) -> String {
        format!(
            "{} {}\nResult: {}\n{}\nNext steps: {}",
            TASK_COMPLETE, description, result, self.plan_context, self.next_steps
        )
    }

    /// Synthetic message injected after the task failed.  Forbids re-invoking
    /// the originating planner tool and enumerates the fallback strategies.
    pub fn failure_message(&self, description: &str, reason: &str) -> String {
        let mut out = format!(
            "{} {} — Reason: {}\n{}\nDo not call craft_item again for this plan. \
             Choose one of these fallback strategies instead:",
            TASK_FAILED, description, reason, self.plan_context
        );
        for (i, strategy) in FALLBACK_STRATEGIES.iter().enumerate() {
            out.push_str(&format!(
                "\n{}. {} — when {}",
                i + 1,
                strategy.tool,
                strategy.when
            ));
        }
        out
    }
}

/// Parse the deterministic-execution prefix of a next-steps string.
///
/// The grammar is `"Call " TOOL_NAME "(" JSON_OBJECT ")"`; anything after the
/// closing paren is commentary.  Returns the tool name and parsed argument
/// object, or `None` when the prefix does not match (callers then fall back
/// to the LLM; parsing failure is never a hard error).
pub fn parse_deterministic_call(next_steps: &str) -> Option<(String, Value)> {
    let rest = next_steps.trim_start().strip_prefix("Call ")?;
    let paren = rest.find('(')?;
    let name = rest[..paren].trim();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    let after_paren = &rest[paren + 1..];
    let brace_start = after_paren.find('{')?;
    // Nothing but whitespace may sit between '(' and '{'.
    if !after_paren[..brace_start].trim().is_empty() {
        return None;
    }
    let json_src = balanced_object(&after_paren[brace_start..])?;
    let args: Value = serde_json::from_str(json_src).ok()?;
    if !args.is_object() {
        return None;
    }
    // The object must be followed by the closing paren of the call.
    let tail = after_paren[brace_start + json_src.len()..].trim_start();
    if !tail.starts_with(')') {
        return None;
    }
    Some((name.to_string(), args))
}

/// Slice out one balanced `{...}` object from the start of `src`, honouring
/// string literals and escapes.
fn balanced_object(src: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in src.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&src[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn parses_simple_call() {
        let (name, args) =
            parse_deterministic_call(r#"Call craft_item({"item":"crafting_table"})"#).unwrap();
        assert_eq!(name, "craft_item");
        assert_eq!(args["item"], "crafting_table");
    }

    #[test]
    fn parses_nested_braces_and_trailing_commentary() {
        let (name, args) = parse_deterministic_call(
            r#"Call strip_mine({"ore":"iron","opts":{"depth":12}}) then report back"#,
        )
        .unwrap();
        assert_eq!(name, "strip_mine");
        assert_eq!(args["opts"]["depth"], 12);
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scan() {
        let (_, args) = parse_deterministic_call(
            r#"Call memory({"action":"remember","value":"base is at {0, 64, 0}"})"#,
        )
        .unwrap();
        assert_eq!(args["value"], "base is at {0, 64, 0}");
    }

    #[test]
    fn malformed_prefixes_fall_back() {
        for bad in [
            "craft the item next",
            "Call ({})",
            "Call craft_item(item)",
            r#"Call craft_item({"item":)"#,
            r#"Call craft_item({"item":"x"}"#,
            r#"Call craft-item({"item":"x"})"#,
        ] {
            assert!(parse_deterministic_call(bad).is_none(), "{}", bad);
        }
    }

    #[test]
    fn failure_message_forbids_replanning_and_enumerates_strategies() {
        let cont = Continuation::new(Uuid::new_v4(), "Plan: mine iron", "Call craft_item({})");
        let msg = cont.failure_message("Mine iron ore", "Could not reach any ore blocks");
        assert!(msg.starts_with(TASK_FAILED));
        assert!(msg.contains("Do not call craft_item again"));
        assert!(msg.contains("1. strip_mine"));
        assert!(msg.contains("Could not reach any ore blocks"));
    }

    #[test]
    fn success_message_embeds_plan_and_next_steps() {
        let cont = Continuation::new(
            Uuid::new_v4(),
            "Plan: 1. gather",
            r#"Call craft_item({"item":"stick"})"#,
        );
        let msg = cont.success_message("Chop trees", "Collected 3 oak logs");
        assert!(msg.starts_with(TASK_COMPLETE));
        assert!(msg.contains("Collected 3 oak logs"));
        assert!(msg.contains("Next steps: Call craft_item"));
    }
}
