//! Discovery of the builds root URL from a running consumer's debug
//! introspection endpoint, so a CLI invocation doesn't need its own flag
//! pointed at wherever the data plane's build artifacts live.

/// Fetch the consumer's own command-line arguments from its debug
/// introspection endpoint and pull out the value of `--flow.builds-root`.
pub async fn discover(consumer_debug_addr: &str) -> crate::Result<String> {
    let body = http_get(consumer_debug_addr, "/debug/pprof/cmdline").await?;

    for arg in body.split(['\0', '\n', ' ']) {
        if let Some(value) = arg.strip_prefix("--flow.builds-root=") {
            return Ok(value.to_string());
        }
    }

    Err(crate::Error::NotFound(format!(
        "--flow.builds-root not present in {consumer_debug_addr}'s argv"
    )))
}

async fn http_get(addr: &str, path: &str) -> crate::Result<String> {
    let addr = addr
        .trim_start_matches("http://")
        .trim_start_matches("https://");

    let url = format!("http://{addr}{path}");

    let resp = reqwest::get(&url)
        .await
        .map_err(|e| crate::Error::NotFound(format!("fetching {url}: {e}")))?;

    resp.text()
        .await
        .map_err(|e| crate::Error::NotFound(format!("reading response from {url}: {e}")))
}
