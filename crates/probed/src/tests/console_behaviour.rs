//! End-to-end behaviour of a console bound to a TCP socket.

use std::cell::RefCell;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use probe_config::{Config, SocketEndpoint};

use crate::command::{BuiltinCommands, ProcessHandle};
use crate::server::{Console, RunningConsole};

const PROMPT: &str = "ga?>";
const READ_TIMEOUT: Duration = Duration::from_secs(2);

struct ConsoleWorld {
    running: Option<RunningConsole>,
    address: Option<SocketAddr>,
    client: Option<TcpStream>,
    pending: Vec<u8>,
}

impl ConsoleWorld {
    fn new() -> Self {
        Self {
            running: None,
            address: None,
            client: None,
            pending: Vec::new(),
        }
    }

    fn start(&mut self) {
        let config = Config {
            listen: SocketEndpoint::tcp("127.0.0.1", 0),
            drain_interval_ms: 20,
            ..Config::default()
        };
        let console = Console::bind(
            &config,
            Arc::new(BuiltinCommands),
            Arc::new(ProcessHandle::current()),
        )
        .expect("bind console");
        let running = console.start().expect("start console");
        self.address = running.local_addr();
        self.running = Some(running);
    }

    fn running(&self) -> &RunningConsole {
        self.running.as_ref().expect("console should be running")
    }

    fn connect(&mut self) {
        let address = self.address.expect("console address");
        let client = TcpStream::connect(address).expect("connect client");
        client
            .set_read_timeout(Some(READ_TIMEOUT))
            .expect("set read timeout");
        self.client = Some(client);
    }

    fn client(&mut self) -> &mut TcpStream {
        self.client.as_mut().expect("client should be connected")
    }

    fn send(&mut self, line: &str) {
        let payload = format!("{line}\n");
        self.client()
            .write_all(payload.as_bytes())
            .expect("send line");
    }

    /// Reads until `len` bytes are pending or the peer closes.
    fn fill(&mut self, len: usize) {
        let mut chunk = [0_u8; 512];
        while self.pending.len() < len {
            match self.client().read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => self.pending.extend_from_slice(&chunk[..read]),
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => panic!("read failed: {error}"),
            }
        }
    }

    fn take_exact(&mut self, expected: &str) {
        self.fill(expected.len());
        let received: Vec<u8> = self
            .pending
            .drain(..expected.len().min(self.pending.len()))
            .collect();
        assert_eq!(String::from_utf8_lossy(&received), expected);
    }

    /// Reads until the prompt arrives and returns everything before it.
    fn take_until_prompt(&mut self) -> String {
        let deadline = Instant::now() + READ_TIMEOUT;
        let mut chunk = [0_u8; 512];
        while !String::from_utf8_lossy(&self.pending).ends_with(PROMPT) {
            assert!(Instant::now() < deadline, "prompt never arrived");
            match self.client().read(&mut chunk) {
                Ok(0) => panic!("connection closed before the prompt"),
                Ok(read) => self.pending.extend_from_slice(&chunk[..read]),
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => panic!("read failed: {error}"),
            }
        }
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }

    fn wait_for_sessions(&self, expected: usize) -> bool {
        let deadline = Instant::now() + READ_TIMEOUT;
        while Instant::now() < deadline {
            if self.running().sessions().len() == expected {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

impl Drop for ConsoleWorld {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown();
            let _ = running.wait();
        }
    }
}

fn unquote(text: &str) -> String {
    text.trim()
        .trim_matches('"')
        .replace("\\n", "\n")
        .replace("\\\"", "\"")
}

#[fixture]
fn world() -> RefCell<ConsoleWorld> {
    RefCell::new(ConsoleWorld::new())
}

#[given("a running console")]
fn given_running_console(world: &RefCell<ConsoleWorld>) {
    world.borrow_mut().start();
}

#[given("a connected client")]
fn given_connected_client(world: &RefCell<ConsoleWorld>) {
    let mut world = world.borrow_mut();
    world.connect();
    world.take_exact(PROMPT);
}

#[when("a client connects")]
fn when_client_connects(world: &RefCell<ConsoleWorld>) {
    world.borrow_mut().connect();
}

#[when("the client sends {line}")]
fn when_client_sends(world: &RefCell<ConsoleWorld>, line: String) {
    world.borrow_mut().send(&unquote(&line));
}

#[then("the client receives {text}")]
fn then_client_receives(world: &RefCell<ConsoleWorld>, text: String) {
    world.borrow_mut().take_exact(&unquote(&text));
}

#[then("the version banner arrives followed by the prompt")]
fn then_version_banner(world: &RefCell<ConsoleWorld>) {
    let expected = format!(
        "{} {}\n{PROMPT}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    assert_eq!(world.borrow_mut().take_until_prompt(), expected);
}

#[then("the client output mentions {text}")]
fn then_output_mentions(world: &RefCell<ConsoleWorld>, text: String) {
    let output = world.borrow_mut().take_until_prompt();
    let needle = unquote(&text);
    assert!(output.contains(&needle), "expected '{needle}' in: {output}");
}

#[then("the connection is closed")]
fn then_connection_closed(world: &RefCell<ConsoleWorld>) {
    let mut world = world.borrow_mut();
    let mut rest = Vec::new();
    let read = world.client().read_to_end(&mut rest).expect("read to eof");
    assert_eq!(read, 0, "unexpected trailing output");
}

#[then("the console tracks {count} session")]
fn then_tracks_session(world: &RefCell<ConsoleWorld>, count: usize) {
    assert!(world.borrow().wait_for_sessions(count));
}

#[then("the console tracks {count} sessions")]
fn then_tracks_sessions(world: &RefCell<ConsoleWorld>, count: usize) {
    assert!(world.borrow().wait_for_sessions(count));
}

#[then("the console stops")]
fn then_console_stops(world: &RefCell<ConsoleWorld>) {
    let running = world.borrow_mut().running.take().expect("running console");
    let waiter = thread::spawn(move || running.wait());
    let deadline = Instant::now() + READ_TIMEOUT;
    while !waiter.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(waiter.is_finished(), "console did not stop after shutdown");
    waiter
        .join()
        .expect("waiter thread")
        .expect("console stopped cleanly");
}

#[then("new connections are refused")]
fn then_connections_refused(world: &RefCell<ConsoleWorld>) {
    let address = world.borrow().address.expect("console address");
    assert!(TcpStream::connect(address).is_err());
}

#[scenario(path = "tests/features/console_socket.feature")]
fn console_over_tcp(#[from(world)] world: RefCell<ConsoleWorld>) {
    drop(world);
}
