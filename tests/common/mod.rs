use std::sync::Once;

use tracing::Level;

static INIT: Once = Once::new();

/// Installs a log subscriber writing through the test harness
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}
