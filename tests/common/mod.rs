//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use rpc_server::protocol::{
    InputProtocol, Message, MessageType, OutputProtocol, ProtocolError, ProtocolFactory,
};
use rpc_server::server::{
    Server, ServerContext, ServerError, ServerEventHandler, SimpleServer, SimpleServerArgs,
    ThreadedServer, ThreadedServerArgs,
};
use rpc_server::{Processor, ProcessorError, SessionInfo};

pub const WAIT: Duration = Duration::from_secs(5);

/// Replies to calls with their own payload. `fail` ends the session,
/// `sleep` never answers.
pub struct EchoProcessor;

#[async_trait]
impl Processor for EchoProcessor {
    async fn process(&self, request: Message) -> Result<Option<Message>, ProcessorError> {
        match (request.name.as_str(), request.message_type) {
            ("fail", _) => Err(ProcessorError::Internal("requested failure".into())),
            ("sleep", _) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
            (_, MessageType::Oneway) => Ok(None),
            _ => {
                let payload = request.payload.clone();
                Ok(Some(request.reply(payload)))
            }
        }
    }
}

pub fn echo() -> Arc<dyn Processor> {
    Arc::new(EchoProcessor)
}

pub fn call(name: &str, sequence_id: i32, payload: &'static [u8]) -> Message {
    Message::new(name, MessageType::Call, sequence_id, payload)
}

/// Poll `condition` until it holds, panicking after [`WAIT`].
pub async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Await a serve() task, panicking if it does not finish within [`WAIT`].
pub async fn join(handle: JoinHandle<Result<(), ServerError>>) -> Result<(), ServerError> {
    tokio::time::timeout(WAIT, handle)
        .await
        .expect("serve did not return in time")
        .expect("serve task panicked")
}

fn spawn_serve<S: Server + 'static>(server: &Arc<S>) -> JoinHandle<Result<(), ServerError>> {
    let running = Arc::clone(server);
    tokio::spawn(async move { running.serve().await })
}

pub struct Running<S> {
    pub server: Arc<S>,
    pub handle: JoinHandle<Result<(), ServerError>>,
    pub addr: SocketAddr,
}

pub async fn start_threaded(args: ThreadedServerArgs) -> Running<ThreadedServer> {
    let server = Arc::new(ThreadedServer::new(args));
    let handle = spawn_serve(&server);
    wait_for(|| server.is_serving()).await;
    let addr = server.local_addr().expect("serving server has an address");
    Running {
        server,
        handle,
        addr,
    }
}

pub async fn start_simple(args: SimpleServerArgs) -> Running<SimpleServer> {
    let server = Arc::new(SimpleServer::new(args));
    let handle = spawn_serve(&server);
    wait_for(|| server.is_serving()).await;
    let addr = server.local_addr().expect("serving server has an address");
    Running {
        server,
        handle,
        addr,
    }
}

/// Client speaking the same protocol as the server under test.
pub struct Client {
    input: Box<dyn InputProtocol>,
    output: Box<dyn OutputProtocol>,
}

impl Client {
    pub fn over<S>(stream: S, protocol: &dyn ProtocolFactory) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            input: protocol.input_protocol(Box::new(read_half)),
            output: protocol.output_protocol(Box::new(write_half)),
        }
    }

    pub async fn connect(addr: SocketAddr, protocol: &dyn ProtocolFactory) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        Self::over(stream, protocol)
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), ProtocolError> {
        self.output.write_message(message).await?;
        self.output.flush().await
    }

    pub async fn recv(&mut self) -> Result<Option<Message>, ProtocolError> {
        tokio::time::timeout(WAIT, self.input.read_message())
            .await
            .expect("no reply in time")
    }

    pub async fn call(&mut self, message: &Message) -> Result<Option<Message>, ProtocolError> {
        self.send(message).await?;
        self.recv().await
    }
}

/// Counts every event-handler callback. The context of a session is its
/// connection id.
#[derive(Default)]
pub struct CountingHandler {
    pub pre_serve: AtomicUsize,
    pub created: AtomicUsize,
    pub processed: AtomicUsize,
    pub deleted: AtomicUsize,
    pub context_mismatches: AtomicUsize,
}

impl CountingHandler {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn check(&self, context: Option<&ServerContext>, session: &SessionInfo) {
        let matches = context
            .and_then(|c| c.downcast_ref::<u64>())
            .is_some_and(|id| *id == session.id.as_u64());
        if !matches {
            self.context_mismatches.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl ServerEventHandler for CountingHandler {
    fn pre_serve(&self) {
        self.pre_serve.fetch_add(1, Ordering::SeqCst);
    }

    fn create_context(&self, session: &SessionInfo) -> Option<ServerContext> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(session.id.as_u64()))
    }

    fn process_context(&self, context: Option<&ServerContext>, session: &SessionInfo) {
        self.check(context, session);
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    fn delete_context(&self, context: Option<ServerContext>, session: &SessionInfo) {
        self.check(context.as_ref(), session);
        self.deleted.fetch_add(1, Ordering::SeqCst);
    }
}

/// Certificates for TLS tests, written as PEM files into a temp directory.
pub struct TestPki {
    _dir: tempfile::TempDir,
    pub ca_pem: String,
    /// Server certificate followed by its private key.
    pub server_store: PathBuf,
    /// CA certificate, for client verification.
    pub trust_store: PathBuf,
    pub client_cert_pem: String,
    pub client_key_pem: String,
}

impl TestPki {
    pub fn generate() -> Self {
        use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, Issuer, KeyPair, KeyUsagePurpose};

        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.distinguished_name.push(DnType::CommonName, "rpc test ca");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::DigitalSignature];
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();
        let issuer = Issuer::new(ca_params, &ca_key);

        let server_key = KeyPair::generate().unwrap();
        let server_cert = CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .signed_by(&server_key, &issuer)
            .unwrap();

        let client_key = KeyPair::generate().unwrap();
        let client_cert = CertificateParams::new(vec!["client".to_string()])
            .unwrap()
            .signed_by(&client_key, &issuer)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let server_store = write(
            dir.path(),
            "server.pem",
            &format!("{}{}", server_cert.pem(), server_key.serialize_pem()),
        );
        let trust_store = write(dir.path(), "ca.pem", &ca_cert.pem());

        Self {
            _dir: dir,
            ca_pem: ca_cert.pem(),
            server_store,
            trust_store,
            client_cert_pem: client_cert.pem(),
            client_key_pem: client_key.serialize_pem(),
        }
    }

    /// TLS client trusting the test CA, optionally presenting the client
    /// certificate.
    pub fn connector(&self, with_client_cert: bool) -> tokio_rustls::TlsConnector {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut roots = rustls::RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut self.ca_pem.as_bytes()) {
            roots.add(cert.unwrap()).unwrap();
        }

        let builder = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots);

        let config = if with_client_cert {
            let certs = rustls_pemfile::certs(&mut self.client_cert_pem.as_bytes())
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
            let key = rustls_pemfile::private_key(&mut self.client_key_pem.as_bytes())
                .unwrap()
                .unwrap();
            builder.with_client_auth_cert(certs, key).unwrap()
        } else {
            builder.with_no_client_auth()
        };

        tokio_rustls::TlsConnector::from(Arc::new(config))
    }
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Run `f` and fail if it takes longer than [`WAIT`].
pub async fn within<F: Future>(f: F) -> F::Output {
    tokio::time::timeout(WAIT, f).await.expect("timed out")
}
