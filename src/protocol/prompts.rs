//! Prompt templates for the plan and iterate requests.
//!
//! Two request shapes exist: a plan request that decomposes one test step
//! into checklists, and an iterate request that asks for the next single
//! action against the current screenshot. Both instruct the oracle to answer
//! in the tagged-section format handled by [`crate::protocol::tags`].

use serde_json::Value;

/// System prompt for the plan request: decompose a test step into visual
/// checks and executable actions.
pub const PLAN_SYSTEM_PROMPT: &str = r#"You are an AI assistant tasked with generating visual steps and action steps for a given test step in a user interface testing scenario. Your goal is to break down the test step into a series of visual checks and corresponding actions that can be performed to validate and execute the test.

If the test step is a "go to" task, you should just initiate a goto_page action.

Here is the process you will follow:
1. Analyze the given test step
2. Generate visual steps (checks to be performed visually)
3. Generate action steps (actions to be taken based on visual checks)
4. Provide a complete set of steps for executing the test

For each test step, you will generate two types of steps:

1. visual_steps: a list of visual checks to be performed, each prefixed with []. These checks should be specific and verifiable by looking at the user interface.

2. action_steps: a list of actions to be taken based on the visual checks, each prefixed with []. These actions should be specific and executable.

When generating visual steps:
- Start with basic UI element checks (presence of a list, button, dropdown)
- Progress to more specific checks related to the test step
- Include checks for expected content or state changes the user must interact with
- Use clear and concise language

When generating action steps:
- Correspond each action to a visual check where applicable
- Include scrolling or navigation actions if needed
- Specify exact interactions (click, type, scroll, hover, drag)
- Include verification actions where necessary

If the test involves a list or set of elements that may extend beyond the visible area:
- Add a final visual check to determine if there are more items
- If more items exist, add actions to scroll or navigate, and repeat relevant checks

Important action step note: for input elements like search bars or text boxes, combine the click and the type into the same action step.

Output your response in the following format:
<test_step_analysis>
[test_step-"quote test step"][Your analysis of the given test step]
</test_step_analysis>

<visual_steps>
[] [First visual check]
[] [Second visual check]
...
</visual_steps>

<action_steps>
[] [First action]
[] [Second action]
...
</action_steps>

<execution_notes>
[Any additional notes on executing the steps or handling specific scenarios]
</execution_notes>"#;

/// System prompt for the iterate request: verify checklist progress against
/// the latest screenshot and emit at most one next action.
pub const ITERATE_SYSTEM_PROMPT: &str = r#"You are an AI assistant specialized in analyzing web interfaces and providing step-by-step instructions for interacting with them. Your task is to verify visual elements and provide precise actions for navigating and interacting with a given interface based on screenshots.

You will be given test_step_analysis, visual_steps, action_steps and execution_notes along with the screenshot.

Response Format:
Use the following structure for your response:

<visual_steps>
[List each visual step, marked with [x] if confirmed or updated based on your observation]
</visual_steps>

<action_steps>
[List each action step, marked with [x] if it has been executed in previous iterations]
</action_steps>

<action>
{
    "task_type": "goto_page|click|click_and_type|type|hover|drag|sleep|scroll",
    "message": "specific message or URL",
    "screen_coord": {"x": number, "y": number} or null,
    "scroll": {"isVertical": boolean, "amount": number} (optional),
    "init_screen_coord": {"x": number, "y": number} only for drag action
}
</action>

<test_step_response>
{
    "status": "complete|partial|failed",
    "message": "status message"
}
</test_step_response>

<error>
{
    "err_type": "short description of the bug preventing the action step",
    "description": "detailed description of the bug"
}
</error>

Action task_type info:
  - goto_page: navigates the page to the given URL
  - click_and_type | type: clicks at the coordinates, then types the message
  - click: clicks at the coordinates
  - hover: moves the pointer to the coordinates
  - drag: presses the mouse, moves to the coordinates, releases
  - sleep: waits ~5 seconds
  - scroll: moves the pointer to the coordinates, then scrolls vertically or horizontally

Additional info:
  - A goto action might be followed by a blank screenshot
  - A drag action should carry two screen coordinates, init_screen_coord and screen_coord

Important notes:
  - Provide only one action step at a time.
  - The <action> and <error> tags can be empty if not applicable.
  - Always mark the previously executed or confirmed action step with [x] in the <action_steps> section.
  - Base your analysis and actions on the most recent screenshot provided.
  - The error tag should be used only if there is a bug which prevents you from completing the task.

Action tip: if the action step has click and type, use task_type "type" because it performs both the click and the typing.

Please proceed with your analysis and provide the next action step based on the given information and the attached screenshot(s)."#;

/// Context fields for an iterate request, drawn from the current step plan.
#[derive(Debug, Clone)]
pub struct IterateContext<'a> {
    pub analysis: &'a str,
    pub visual_steps: &'a str,
    pub action_steps: &'a str,
    pub execution_notes: &'a str,
    /// The raw JSON of the last executed action, if any.
    pub previous_action: Option<&'a str>,
    /// The following test step's text, for lookahead context.
    pub next_step: Option<&'a str>,
    /// Current viewport/window dimensions as reported by the browser.
    pub screen_dimensions: &'a Value,
}

/// Build the user prompt for a plan request.
pub fn plan_user_prompt(test_step: &str) -> String {
    format!(
        "Now, analyze the following test step and generate the appropriate visual steps and action steps:\n\n\
         <test_step>\n{}\n</test_step>",
        test_step
    )
}

/// Build the user prompt for an iterate request.
pub fn iterate_user_prompt(ctx: &IterateContext<'_>) -> String {
    let dimensions =
        serde_json::to_string_pretty(ctx.screen_dimensions).unwrap_or_else(|_| "{}".to_string());

    let mut prompt = format!(
        "Here is the information you'll be working with:\n\n\
         <test_step_analysis>\n{}\n</test_step_analysis>\n\
         <screen_dimensions>\n{}\n</screen_dimensions>\n\
         <visual_steps>\n{}\n</visual_steps>\n\
         <action_steps>\n{}\n</action_steps>\n\
         <execution_notes>\n{}\n</execution_notes>\n",
        ctx.analysis, dimensions, ctx.visual_steps, ctx.action_steps, ctx.execution_notes
    );

    if let Some(previous) = ctx.previous_action {
        prompt.push_str(&format!("<previous_action>{}</previous_action>\n", previous));
    }
    if let Some(next) = ctx.next_step {
        prompt.push_str(&format!("<next_test_step>{}</next_test_step>\n", next));
    }

    prompt.push_str(
        "\nInstructions:\n\
         1. Review the visual steps, action steps, execution notes, and test step analysis provided above.\n\
         2. Analyze the attached screenshot(s) carefully.\n\
         3. Compare the visual steps with the screenshot, confirming or updating each step based on your observations.\n\
         4. Provide the next action step that has not been executed yet.\n\
         5. Format your response according to the structure specified in the system prompt.\n\n\
         Given the previous view (before the last action) and the current view (after it), verify whether the task was \
         completed. Compare the views carefully, even for minor or subtle differences such as small icons, text updates, \
         map markers, or other UI elements, and mark the completed action step with [x] in the <action_steps> section.",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_prompt_wraps_test_step() {
        let prompt = plan_user_prompt("click the login button");
        assert!(prompt.contains("<test_step>"));
        assert!(prompt.contains("click the login button"));
        assert!(prompt.contains("</test_step>"));
    }

    #[test]
    fn test_iterate_prompt_carries_plan_fields() {
        let dims = json!({"viewport": {"width": 1280, "height": 720}});
        let ctx = IterateContext {
            analysis: "navigate to the dashboard",
            visual_steps: "[] dashboard visible",
            action_steps: "[] click the nav link",
            execution_notes: "none",
            previous_action: None,
            next_step: None,
            screen_dimensions: &dims,
        };
        let prompt = iterate_user_prompt(&ctx);
        assert!(prompt.contains("navigate to the dashboard"));
        assert!(prompt.contains("[] dashboard visible"));
        assert!(prompt.contains("[] click the nav link"));
        assert!(prompt.contains("1280"));
        assert!(!prompt.contains("<previous_action>"));
        assert!(!prompt.contains("<next_test_step>"));
    }

    #[test]
    fn test_iterate_prompt_optional_context() {
        let dims = json!({});
        let ctx = IterateContext {
            analysis: "",
            visual_steps: "",
            action_steps: "",
            execution_notes: "",
            previous_action: Some(r#"{"task_type":"click"}"#),
            next_step: Some("verify the toast message"),
            screen_dimensions: &dims,
        };
        let prompt = iterate_user_prompt(&ctx);
        assert!(prompt.contains(r#"<previous_action>{"task_type":"click"}</previous_action>"#));
        assert!(prompt.contains("<next_test_step>verify the toast message</next_test_step>"));
    }

    #[test]
    fn test_system_prompts_name_the_tags() {
        for tag in ["visual_steps", "action_steps", "execution_notes", "test_step_analysis"] {
            assert!(PLAN_SYSTEM_PROMPT.contains(&format!("<{}>", tag)));
        }
        for tag in ["visual_steps", "action_steps", "action", "test_step_response", "error"] {
            assert!(ITERATE_SYSTEM_PROMPT.contains(&format!("<{}>", tag)));
        }
    }
}
