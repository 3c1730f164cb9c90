//! Example: toggle the panel between asleep and awake, as the button does.
//!
//! Run with: `cargo run --example toggle_sleep -- [config.json]`
//!
//! Without an argument a mock display writing to `mock_display_output.png`
//! is used.

use std::sync::Arc;

use inkpanel_core::{
    DisplayError, DisplayManager, InputEvent, InputListener, JsonConfig, PanelController,
    QueuedRefreshTrigger,
};

fn main() -> Result<(), DisplayError> {
    // Initialize logging (optional)
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => JsonConfig::load(path)?,
        None => JsonConfig::from_value(serde_json::json!({
            "display_type": "mock",
            "mock_output_file": "mock_display_output.png",
            "current_image_file": "current_image.png",
        })),
    };
    let config = Arc::new(config);

    let manager = Arc::new(DisplayManager::new(config.clone())?);
    let (trigger, _requests) = QueuedRefreshTrigger::channel();
    let listener = InputListener::new(manager.clone(), config, Arc::new(trigger));

    println!("Asleep: {}", manager.is_asleep());
    println!("Press: {:?}", listener.handle(InputEvent::ButtonPressed));
    println!("Asleep: {}", manager.is_asleep());
    println!("Press: {:?}", listener.handle(InputEvent::ButtonPressed));
    println!("Asleep: {}", manager.is_asleep());

    Ok(())
}
