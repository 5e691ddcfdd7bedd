#![allow(dead_code)]


use courier_smtp::{Credentials, SmtpConfig, SmtpTimeouts, TlsVerification};

/// Client settings pointing at a local mock server that presents a
/// self-signed certificate.
pub fn config_for(port: u16) -> SmtpConfig {
    SmtpConfig {
        host: "127.0.0.1".to_string(),
        port,
        helo: "courier.test".to_string(),
        sender: Some("relay@example.com".to_string()),
        credentials: Credentials {
            username: "relay@example.com".to_string(),
            password: "hunter2".to_string(),
        },
        tls: TlsVerification::InsecureSkipVerify,
        timeouts: SmtpTimeouts {
            connect_secs: 2,
            command_secs: 2,
            data_secs: 2,
        },
    }
}
