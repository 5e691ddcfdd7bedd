//! Scripted relay for dispatch tests.
//!
//! Speaks just enough SMTP for a pooled session: EHLO, STARTTLS with a
//! throwaway self-signed certificate, AUTH and a mail transaction. What the
//! relay received is recorded for assertions.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpListener,
    sync::RwLock,
    task::JoinHandle,
};
use tokio_rustls::{
    TlsAcceptor,
    rustls::{
        ServerConfig,
        pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
    },
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const EHLO_REPLY: &[u8] = b"250-relay.example.com\r\n250-STARTTLS\r\n250 AUTH PLAIN\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo,
    StartTls,
    Auth,
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Message content with dot-stuffing undone, excluding the final `.`.
    MessageContent(String),
    Quit,
    Other(String),
}

struct Script {
    tls: TlsAcceptor,
    rejected_recipients: Vec<(String, String)>,
    transaction_delay: Option<Duration>,
}

impl Script {
    fn rcpt_reply(&self, address: &str) -> String {
        self.rejected_recipients
            .iter()
            .find(|(rejected, _)| rejected == address)
            .map_or_else(|| "250 OK\r\n".to_string(), |(_, reply)| format!("{reply}\r\n"))
    }
}

#[derive(Default)]
struct Counters {
    connections: AtomicUsize,
    finished: AtomicUsize,
}

fn path_argument(argument: &str) -> String {
    let argument = argument
        .split_once(':')
        .map_or(argument, |(_, rest)| rest)
        .trim();
    argument
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_string()
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    commands: Arc<RwLock<Vec<SmtpCommand>>>,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder::default()
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands.read().await.clone()
    }

    /// Bodies received so far, in order.
    pub async fn message_contents(&self) -> Vec<String> {
        self.commands
            .read()
            .await
            .iter()
            .filter_map(|command| match command {
                SmtpCommand::MessageContent(content) => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn connections(&self) -> usize {
        self.counters.connections.load(Ordering::SeqCst)
    }

    /// Waits until `count` sessions have ended, giving up after two seconds.
    pub async fn wait_for_finished(&self, count: usize) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);

        while self.counters.finished.load(Ordering::SeqCst) < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        true
    }

    async fn handle_client(
        stream: tokio::net::TcpStream,
        script: Arc<Script>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
    ) -> Result<(), BoxError> {
        let mut reader = BufReader::new(stream);
        reader
            .get_mut()
            .write_all(b"220 relay.example.com ESMTP ready\r\n")
            .await?;

        if let Some(stream) = Self::serve(reader, &script, &commands).await? {
            let tls = script.tls.accept(stream).await?;
            if Self::serve(BufReader::new(tls), &script, &commands)
                .await?
                .is_some()
            {
                return Err("STARTTLS inside TLS".into());
            }
        }

        Ok(())
    }

    /// Serves commands until the session ends, or hands the stream back
    /// when the client asks for STARTTLS.
    async fn serve<S>(
        mut reader: BufReader<S>,
        script: &Script,
        commands: &RwLock<Vec<SmtpCommand>>,
    ) -> Result<Option<S>, BoxError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }

            let command_line = line.trim_end();
            let (verb, argument) = command_line
                .split_once(' ')
                .unwrap_or((command_line, ""));

            let (command, reply) = match verb.to_ascii_uppercase().as_str() {
                "EHLO" => (SmtpCommand::Ehlo, EHLO_REPLY.to_vec()),
                "STARTTLS" => (SmtpCommand::StartTls, b"220 Ready to start TLS\r\n".to_vec()),
                "AUTH" => (
                    SmtpCommand::Auth,
                    b"235 2.7.0 Authentication successful\r\n".to_vec(),
                ),
                "MAIL" => (
                    SmtpCommand::MailFrom(path_argument(argument)),
                    b"250 OK\r\n".to_vec(),
                ),
                "RCPT" => {
                    let address = path_argument(argument);
                    let reply = script.rcpt_reply(&address).into_bytes();
                    (SmtpCommand::RcptTo(address), reply)
                }
                "DATA" => (
                    SmtpCommand::Data,
                    b"354 End data with <CR><LF>.<CR><LF>\r\n".to_vec(),
                ),
                "QUIT" => (SmtpCommand::Quit, b"221 Bye\r\n".to_vec()),
                _ => (
                    SmtpCommand::Other(command_line.to_string()),
                    b"500 Unknown command\r\n".to_vec(),
                ),
            };

            commands.write().await.push(command.clone());

            if let Some(delay) = script.transaction_delay
                && matches!(
                    command,
                    SmtpCommand::MailFrom(_) | SmtpCommand::RcptTo(_) | SmtpCommand::Data
                )
            {
                tokio::time::sleep(delay).await;
            }
            reader.get_mut().write_all(&reply).await?;
            reader.get_mut().flush().await?;

            match command {
                SmtpCommand::Quit => return Ok(None),
                SmtpCommand::StartTls => return Ok(Some(reader.into_inner())),
                SmtpCommand::Data => {
                    let content = Self::read_content(&mut reader).await?;
                    commands
                        .write()
                        .await
                        .push(SmtpCommand::MessageContent(content));

                    reader.get_mut().write_all(b"250 OK: queued\r\n").await?;
                    reader.get_mut().flush().await?;
                }
                _ => {}
            }
        }
    }

    async fn read_content<S>(reader: &mut BufReader<S>) -> Result<String, BoxError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut content = String::new();
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Err("connection closed during DATA".into());
            }

            if line == ".\r\n" {
                return Ok(content);
            }

            content.push_str(line.strip_prefix('.').unwrap_or(&line));
        }
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Default)]
pub struct MockSmtpServerBuilder {
    rejected_recipients: Vec<(String, String)>,
    transaction_delay: Option<Duration>,
}

impl MockSmtpServerBuilder {
    /// Reject RCPT TO for one address only.
    #[must_use]
    pub fn with_rejected_recipient(mut self, address: &str, code: u16, message: &str) -> Self {
        self.rejected_recipients
            .push((address.to_string(), format!("{code} {message}")));
        self
    }

    /// Delay the replies to MAIL FROM, RCPT TO and DATA.
    #[must_use]
    pub const fn with_transaction_delay(mut self, delay: Duration) -> Self {
        self.transaction_delay = Some(delay);
        self
    }

    /// Binds to a random local port and starts serving.
    ///
    /// # Panics
    ///
    /// Panics if the self-signed certificate cannot be generated.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn build(self) -> Result<MockSmtpServer, std::io::Error> {
        let certificate = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("generate self-signed certificate");
        let cert_der = CertificateDer::from(
            certificate
                .serialize_der()
                .expect("serialize self-signed certificate"),
        );
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            certificate.serialize_private_key_der(),
        ));
        let server_config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)
            .expect("build TLS server config");

        let script = Arc::new(Script {
            tls: TlsAcceptor::from(Arc::new(server_config)),
            rejected_recipients: self.rejected_recipients,
            transaction_delay: self.transaction_delay,
        });

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let commands = Arc::new(RwLock::new(Vec::new()));
        let counters = Arc::new(Counters::default());

        let task = {
            let commands = Arc::clone(&commands);
            let counters = Arc::clone(&counters);

            tokio::spawn(async move {
                while let Ok((stream, _peer)) = listener.accept().await {
                    counters.connections.fetch_add(1, Ordering::SeqCst);

                    let script = Arc::clone(&script);
                    let commands = Arc::clone(&commands);
                    let counters = Arc::clone(&counters);

                    tokio::spawn(async move {
                        if let Err(e) =
                            MockSmtpServer::handle_client(stream, script, commands).await
                        {
                            tracing::debug!("Mock relay client error: {e}");
                        }
                        counters.finished.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Ok(MockSmtpServer {
            addr,
            commands,
            counters,
            task,
        })
    }
}
