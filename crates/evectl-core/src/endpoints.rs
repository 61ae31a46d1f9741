//! Server routes used by the device.

pub const LOGIN: &str = "/default.php/login";
pub const LOGIN_CSRF: &str = "/default.php/guard/csrf";
pub const CONTROL: &str = "/tck.php/ticket/control";
pub const CONTROL_CSRF: &str = "/tck.php/ticket/getControlCSRF";
pub const CHECKPOINTS: &str = "/tck.php/ticket/jsonCheckpoints";

/// Join a server base URL and a route.
pub fn url(server: &str, route: &str) -> String {
    format!("{}{}", server.trim_end_matches('/'), route)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_stripped_from_server() {
        assert_eq!(
            url("https://tickets.test/", CONTROL),
            "https://tickets.test/tck.php/ticket/control"
        );
        assert_eq!(
            url("https://tickets.test", LOGIN_CSRF),
            "https://tickets.test/default.php/guard/csrf"
        );
    }
}
