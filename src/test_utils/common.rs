use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crate::client::NotificationDispatcher;
use crate::diff::DifferRegistry;
use crate::filter::ConfigFilterChain;
use crate::DispatchConfig;
use crate::GroupKey;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

pub fn test_key(data_id: &str) -> GroupKey {
    GroupKey::new(data_id, "DEFAULT_GROUP", "").expect("valid key")
}

/// Dispatcher with the built-in differs and an empty filter chain
pub fn test_dispatcher() -> Arc<NotificationDispatcher> {
    dispatcher_with_filters(ConfigFilterChain::new())
}

pub fn dispatcher_with_filters(filters: ConfigFilterChain) -> Arc<NotificationDispatcher> {
    Arc::new(NotificationDispatcher::new(
        Arc::new(DifferRegistry::new()),
        Arc::new(filters),
        DispatchConfig::default(),
    ))
}

/// Polls `condition` until it holds or `timeout` elapses
pub fn wait_until(
    timeout: Duration,
    condition: impl Fn() -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
