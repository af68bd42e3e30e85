use reqwest::Client;

const DISABLE_SYSTEM_PROXY_ENV: &str = "NOTEWISE_DISABLE_SYSTEM_PROXY";

pub(crate) fn build_http_client() -> Client {
    let builder = if should_disable_system_proxy() {
        Client::builder().no_proxy()
    } else {
        Client::builder()
    };

    // Builder only fails on TLS backend initialisation; fall back to defaults.
    builder.build().unwrap_or_else(|_| Client::new())
}

fn should_disable_system_proxy() -> bool {
    if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() {
        return true;
    }

    cfg!(test)
}
