use tracing::{debug, info, warn};

use crate::process::executor::{run, CommandExecutor, CommandResult};
use crate::security::input::ValidatedHostname;

/// The lookup tool. Resolved through `PATH`, never through a shell.
pub const NSLOOKUP: &str = "nslookup";

/// Resolve `hostname` with `nslookup <hostname>`.
///
/// The hostname is the one and only argument token. Output is returned
/// verbatim; callers that embed it in markup must escape it themselves.
pub async fn lookup<E: CommandExecutor>(
    executor: &E,
    hostname: &ValidatedHostname,
) -> CommandResult {
    debug!(hostname = %hostname, "Running DNS lookup");

    let result = run(executor, NSLOOKUP, std::slice::from_ref(hostname)).await;
    match &result {
        Ok(output) => info!(hostname = %hostname, bytes = output.len(), "DNS lookup completed"),
        Err(e) => warn!(hostname = %hostname, error = %e, "DNS lookup failed"),
    }
    result
}
