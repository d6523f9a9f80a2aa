//! Line intake for one client connection.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use encoding_rs::Encoding;
use tracing::{debug, info, warn};

use super::{ConnectionHandler, ConnectionStream, TRANSPORT_TARGET};
use crate::handler::CommandHandler;
use crate::server::ServerLifecycle;
use crate::session::{Session, SessionManager};

/// Upper bound on one blocking socket write before the session retries it.
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Opens a session per connection and feeds its lines to the handler.
pub struct ConsoleConnectionHandler {
    sessions: Arc<SessionManager>,
    handler: Arc<CommandHandler>,
    lifecycle: Arc<ServerLifecycle>,
    charset: &'static Encoding,
    max_line_bytes: usize,
}

impl ConsoleConnectionHandler {
    #[must_use]
    pub fn new(
        sessions: Arc<SessionManager>,
        handler: Arc<CommandHandler>,
        lifecycle: Arc<ServerLifecycle>,
        charset: &'static Encoding,
        max_line_bytes: usize,
    ) -> Self {
        Self {
            sessions,
            handler,
            lifecycle,
            charset,
            max_line_bytes,
        }
    }

    fn converse<R: Read>(&self, reader: R, session: &Arc<Session>) {
        if session
            .write_text(&self.handler.settings().prompt)
            .is_err()
        {
            return;
        }

        let mut reader = BufReader::new(reader);
        let mut conversations: Vec<JoinHandle<()>> = Vec::new();
        loop {
            let bytes = match read_line(&mut reader, self.max_line_bytes) {
                Ok(Line::Text(bytes)) => bytes,
                Ok(Line::Eof) => {
                    debug!(target: TRANSPORT_TARGET, session_id = %session.id(), "client disconnected");
                    break;
                }
                Ok(Line::TooLong) => {
                    warn!(
                        target: TRANSPORT_TARGET,
                        session_id = %session.id(),
                        limit = self.max_line_bytes,
                        "input line too long; closing connection"
                    );
                    break;
                }
                Err(error) => {
                    debug!(
                        target: TRANSPORT_TARGET,
                        session_id = %session.id(),
                        error = %error,
                        "connection read failed"
                    );
                    break;
                }
            };
            if session.is_destroyed() {
                break;
            }

            let line = decode_line(session.charset(), &bytes);
            conversations.retain(|conversation| !conversation.is_finished());
            match self.spawn_conversation(line, session) {
                Ok(conversation) => conversations.push(conversation),
                Err(error) => {
                    warn!(
                        target: TRANSPORT_TARGET,
                        session_id = %session.id(),
                        error = %error,
                        "failed to spawn conversation thread"
                    );
                    break;
                }
            }
        }

        session.destroy();
        for conversation in conversations {
            if conversation.join().is_err() {
                warn!(
                    target: TRANSPORT_TARGET,
                    session_id = %session.id(),
                    "conversation thread panicked"
                );
            }
        }
    }

    fn spawn_conversation(&self, line: String, session: &Arc<Session>) -> io::Result<JoinHandle<()>> {
        let handler = Arc::clone(&self.handler);
        let session = Arc::clone(session);
        thread::Builder::new()
            .name(format!("probe-session-{}", session.id()))
            .spawn(move || handler.execute_line(&line, &session))
    }
}

impl ConnectionHandler for ConsoleConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        if self.lifecycle.is_unbound() {
            debug!(target: TRANSPORT_TARGET, "console unbound; dropping connection");
            return;
        }
        let writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(error) => {
                warn!(
                    target: TRANSPORT_TARGET,
                    error = %error,
                    "failed to clone connection for writing"
                );
                return;
            }
        };
        if let Err(error) = writer.set_write_timeout(Some(WRITE_TIMEOUT)) {
            debug!(target: TRANSPORT_TARGET, error = %error, "failed to set write timeout");
        }

        let session = self.sessions.open(Box::new(writer), self.charset);
        // An unbind racing this accept may already have closed every session.
        if self.lifecycle.is_unbound() {
            self.sessions.remove(session.id());
            session.destroy();
            debug!(
                target: TRANSPORT_TARGET,
                session_id = %session.id(),
                "console unbound while opening session; closing it"
            );
            return;
        }
        info!(target: TRANSPORT_TARGET, session_id = %session.id(), "session opened");
        self.converse(stream, &session);
        self.sessions.remove(session.id());
        session.destroy();
        info!(target: TRANSPORT_TARGET, session_id = %session.id(), "session closed");
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Line {
    Text(Vec<u8>),
    TooLong,
    Eof,
}

/// Reads one `\n`-terminated line of at most `limit` bytes, terminator
/// excluded. A final unterminated line is returned as is.
fn read_line<R: BufRead>(reader: &mut R, limit: usize) -> io::Result<Line> {
    let mut buffer = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let read = reader.by_ref().take(cap).read_until(b'\n', &mut buffer)?;
    if read == 0 {
        return Ok(Line::Eof);
    }
    if buffer.last() == Some(&b'\n') {
        buffer.pop();
    } else if buffer.len() > limit {
        return Ok(Line::TooLong);
    }
    if buffer.last() == Some(&b'\r') {
        buffer.pop();
    }
    Ok(Line::Text(buffer))
}

fn decode_line(charset: &'static Encoding, bytes: &[u8]) -> String {
    let (text, _malformed) = charset.decode_without_bom_handling(bytes);
    text.into_owned()
}
