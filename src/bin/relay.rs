// Hook relay
//
// Configured as a Claude Code hook command. Reads the hook JSON from stdin and
// forwards it to the session engine. Always exits 0 so the CLI is never blocked
// or failed by orchestration.

use std::io::Read;

use kodegen_claude_director::ControlEndpoint;
use kodegen_claude_director::control::relay::{DEFAULT_RELAY_TIMEOUT, deliver};
use kodegen_claude_director::types::options::ENDPOINT_ENV_VAR;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off"))
        .try_init()
        .ok();

    let mut payload = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut payload) {
        log::debug!("Failed to read hook payload: {e}");
        return;
    }

    let endpoint = match std::env::var(ENDPOINT_ENV_VAR) {
        Ok(value) => match value.parse::<ControlEndpoint>() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                log::debug!("Ignoring {ENDPOINT_ENV_VAR}: {e}");
                ControlEndpoint::default_for_platform()
            }
        },
        Err(_) => ControlEndpoint::default_for_platform(),
    };

    let outcome = deliver(&endpoint, &payload, DEFAULT_RELAY_TIMEOUT).await;
    log::debug!("Relay to {endpoint}: {outcome:?}");
}
