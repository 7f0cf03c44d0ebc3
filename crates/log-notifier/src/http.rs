// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use std::time::Duration;
use tracing::error;

/// Builds the HTTP client used for delivery, falling back to a direct connection when the
/// proxy configuration is unusable.
#[must_use]
pub fn get_client(proxy_url: Option<&str>, timeout: Duration) -> reqwest::Client {
    match build_client(proxy_url, timeout) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(None, timeout) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_proxy() {
        assert!(build_client(Some("http://proxy.example:3128"), Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        assert!(build_client(Some("not a url"), Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_get_client_never_fails() {
        let _client = get_client(Some("not a url"), Duration::from_secs(1));
    }
}
