//! The closed browser action vocabulary and its executor.
//!
//! Actions arrive as oracle-emitted JSON. The executor is deliberately
//! forgiving: an action missing the fields its kind requires is a no-op,
//! never an error, because the oracle routinely omits fields. Failures from
//! the browser itself do propagate — retrying is the state machine's job,
//! not the executor's.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::browser::{BrowserDriver, BrowserResult};

/// Pause performed by the `sleep` action.
pub const SLEEP_ACTION_DURATION: Duration = Duration::from_secs(5);

/// The action kinds the oracle may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    GotoPage,
    Click,
    ClickAndType,
    #[serde(rename = "type")]
    Type,
    Hover,
    Drag,
    Sleep,
    Scroll,
}

/// A point in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenCoord {
    pub x: f64,
    pub y: f64,
}

/// Wheel scroll descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollSpec {
    #[serde(rename = "isVertical")]
    pub is_vertical: bool,
    /// Scroll distance in pixels. Older oracle prompts called this `px`.
    #[serde(alias = "px")]
    pub amount: f64,
}

/// One structured, executable browser instruction emitted by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub task_type: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_coord: Option<ScreenCoord>,
    /// Start point for a two-point drag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_screen_coord: Option<ScreenCoord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollSpec>,
}

/// Execute a single action against the live page.
///
/// Missing required fields make the action a no-op for its kind. Driver
/// errors propagate untouched.
pub async fn execute_action(driver: &dyn BrowserDriver, action: &ActionSpec) -> BrowserResult<()> {
    match action.task_type {
        ActionKind::GotoPage => {
            if let Some(url) = &action.message {
                driver.navigate(url).await?;
            }
        }
        ActionKind::Click => {
            if let Some(coord) = action.screen_coord {
                driver.mouse_click(coord.x, coord.y).await?;
            }
        }
        ActionKind::Type | ActionKind::ClickAndType => {
            if let (Some(coord), Some(text)) = (action.screen_coord, &action.message) {
                driver.mouse_click(coord.x, coord.y).await?;
                driver.type_text(text).await?;
            }
        }
        ActionKind::Hover => {
            if let Some(coord) = action.screen_coord {
                driver.mouse_move(coord.x, coord.y).await?;
            }
        }
        ActionKind::Drag => {
            if let Some(coord) = action.screen_coord {
                if let Some(start) = action.init_screen_coord {
                    driver.mouse_move(start.x, start.y).await?;
                }
                driver.mouse_down().await?;
                driver.mouse_move(coord.x, coord.y).await?;
                driver.mouse_up().await?;
            }
        }
        ActionKind::Sleep => {
            tokio::time::sleep(SLEEP_ACTION_DURATION).await;
        }
        ActionKind::Scroll => {
            if let (Some(coord), Some(scroll)) = (action.screen_coord, action.scroll) {
                driver.mouse_move(coord.x, coord.y).await?;
                if scroll.is_vertical {
                    driver.wheel(0.0, scroll.amount).await?;
                } else {
                    driver.wheel(scroll.amount, 0.0).await?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{DriverCall, MockDriver};

    fn action(kind: ActionKind) -> ActionSpec {
        ActionSpec {
            task_type: kind,
            message: None,
            screen_coord: None,
            init_screen_coord: None,
            scroll: None,
        }
    }

    #[tokio::test]
    async fn test_goto_page_navigates() {
        let driver = MockDriver::new();
        let mut spec = action(ActionKind::GotoPage);
        spec.message = Some("https://example.com".to_string());
        execute_action(&driver, &spec).await.unwrap();
        assert_eq!(
            driver.calls(),
            vec![DriverCall::Navigate("https://example.com".to_string())]
        );
    }

    #[tokio::test]
    async fn test_click_uses_coordinates() {
        let driver = MockDriver::new();
        let mut spec = action(ActionKind::Click);
        spec.screen_coord = Some(ScreenCoord { x: 100.0, y: 250.0 });
        execute_action(&driver, &spec).await.unwrap();
        assert_eq!(driver.calls(), vec![DriverCall::MouseClick { x: 100.0, y: 250.0 }]);
    }

    #[tokio::test]
    async fn test_type_clicks_then_types() {
        let driver = MockDriver::new();
        let mut spec = action(ActionKind::Type);
        spec.screen_coord = Some(ScreenCoord { x: 10.0, y: 20.0 });
        spec.message = Some("query".to_string());
        execute_action(&driver, &spec).await.unwrap();
        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::MouseClick { x: 10.0, y: 20.0 },
                DriverCall::TypeText("query".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_drag_with_two_points() {
        let driver = MockDriver::new();
        let mut spec = action(ActionKind::Drag);
        spec.init_screen_coord = Some(ScreenCoord { x: 5.0, y: 5.0 });
        spec.screen_coord = Some(ScreenCoord { x: 50.0, y: 60.0 });
        execute_action(&driver, &spec).await.unwrap();
        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::MouseMove { x: 5.0, y: 5.0 },
                DriverCall::MouseDown,
                DriverCall::MouseMove { x: 50.0, y: 60.0 },
                DriverCall::MouseUp,
            ]
        );
    }

    #[tokio::test]
    async fn test_scroll_vertical_axis() {
        let driver = MockDriver::new();
        let mut spec = action(ActionKind::Scroll);
        spec.screen_coord = Some(ScreenCoord { x: 640.0, y: 360.0 });
        spec.scroll = Some(ScrollSpec { is_vertical: true, amount: 300.0 });
        execute_action(&driver, &spec).await.unwrap();
        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::MouseMove { x: 640.0, y: 360.0 },
                DriverCall::Wheel { delta_x: 0.0, delta_y: 300.0 },
            ]
        );
    }

    #[tokio::test]
    async fn test_scroll_horizontal_axis() {
        let driver = MockDriver::new();
        let mut spec = action(ActionKind::Scroll);
        spec.screen_coord = Some(ScreenCoord { x: 640.0, y: 360.0 });
        spec.scroll = Some(ScrollSpec { is_vertical: false, amount: -120.0 });
        execute_action(&driver, &spec).await.unwrap();
        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::MouseMove { x: 640.0, y: 360.0 },
                DriverCall::Wheel { delta_x: -120.0, delta_y: 0.0 },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_fields_are_noops() {
        // Every variant except sleep must do nothing when its required
        // fields are absent.
        for kind in [
            ActionKind::GotoPage,
            ActionKind::Click,
            ActionKind::ClickAndType,
            ActionKind::Type,
            ActionKind::Hover,
            ActionKind::Drag,
            ActionKind::Scroll,
        ] {
            let driver = MockDriver::new();
            execute_action(&driver, &action(kind)).await.unwrap();
            assert!(
                driver.calls().is_empty(),
                "{:?} with missing fields should be a no-op",
                kind
            );
        }
    }

    #[tokio::test]
    async fn test_type_without_message_is_noop() {
        let driver = MockDriver::new();
        let mut spec = action(ActionKind::Type);
        spec.screen_coord = Some(ScreenCoord { x: 1.0, y: 1.0 });
        execute_action(&driver, &spec).await.unwrap();
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn test_action_kind_wire_names() {
        let json = r#"{"task_type":"goto_page","message":"https://example.com"}"#;
        let spec: ActionSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.task_type, ActionKind::GotoPage);

        let json = r#"{"task_type":"type","message":"hi","screen_coord":{"x":1,"y":2}}"#;
        let spec: ActionSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.task_type, ActionKind::Type);

        let json = r#"{"task_type":"click_and_type","message":"hi"}"#;
        let spec: ActionSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.task_type, ActionKind::ClickAndType);
    }

    #[test]
    fn test_scroll_accepts_legacy_px_key() {
        let json = r#"{"task_type":"scroll","screen_coord":{"x":0,"y":0},"scroll":{"isVertical":true,"px":500}}"#;
        let spec: ActionSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.scroll.unwrap().amount, 500.0);
    }

    #[test]
    fn test_unknown_task_type_fails_decoding() {
        let json = r#"{"task_type":"teleport"}"#;
        assert!(serde_json::from_str::<ActionSpec>(json).is_err());
    }

    #[test]
    fn test_null_screen_coord_decodes_as_none() {
        let json = r#"{"task_type":"click","screen_coord":null}"#;
        let spec: ActionSpec = serde_json::from_str(json).unwrap();
        assert!(spec.screen_coord.is_none());
    }
}
