//! Tests for the process-level entry point.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ortho_config::{OrthoConfig, OrthoError};

use probe_config::Config;

use super::support::{BrokenShutdown, ManualShutdown};
use crate::bootstrap::{BootstrapError, ConfigLoader, StaticConfigLoader};
use crate::command::BuiltinCommands;
use crate::server::{ServerError, run_server_with};

/// Loads configuration from a file written into a temporary directory.
struct FileConfigLoader {
    _dir: tempfile::TempDir,
    path: PathBuf,
}

impl FileConfigLoader {
    fn with_contents(contents: &str) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("probe.toml");
        fs::write(&path, contents).expect("write config");
        Self { _dir: dir, path }
    }
}

impl ConfigLoader for FileConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("probed"),
            OsString::from("--config-path"),
            self.path.clone().into_os_string(),
        ])
    }
}

fn tcp_config() -> Config {
    Config {
        listen: probe_config::SocketEndpoint::tcp("127.0.0.1", 0),
        log_filter: "off".to_owned(),
        ..Config::default()
    }
}

#[test]
fn invalid_configuration_is_a_bootstrap_error() {
    let loader = FileConfigLoader::with_contents("listen = \"http://127.0.0.1:80\"\n");
    let error = run_server_with(
        &loader,
        Arc::new(BuiltinCommands),
        ManualShutdown::default(),
    )
    .expect_err("configuration should be rejected");
    assert!(matches!(
        error,
        ServerError::Bootstrap {
            source: BootstrapError::Configuration { .. }
        }
    ));
}

#[test]
fn unknown_charset_is_a_bootstrap_error() {
    let loader = StaticConfigLoader::new(Config {
        charset: "klingon".to_owned(),
        ..tcp_config()
    });
    let error = run_server_with(&loader, Arc::new(BuiltinCommands), ManualShutdown::default())
        .expect_err("charset should be rejected");
    assert!(matches!(
        error,
        ServerError::Bootstrap {
            source: BootstrapError::Charset { .. }
        }
    ));
}

#[test]
fn failing_signal_listener_stops_the_console_with_an_error() {
    let loader = StaticConfigLoader::new(tcp_config());
    let error = run_server_with(&loader, Arc::new(BuiltinCommands), BrokenShutdown)
        .expect_err("signal failure should surface");
    assert!(matches!(error, ServerError::Shutdown { .. }));
}

#[cfg(unix)]
#[test]
fn signal_stops_a_console_on_a_unix_socket() {
    use std::io::Read;
    use std::os::unix::net::UnixStream;

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("run").join("probe.sock");
    let loader = StaticConfigLoader::new(Config {
        listen: probe_config::SocketEndpoint::unix(path.to_str().expect("utf8 path")),
        ..tcp_config()
    });
    let shutdown = ManualShutdown::default();
    let trigger = shutdown.clone();
    let server = thread::spawn(move || {
        run_server_with(&loader, Arc::new(BuiltinCommands), shutdown)
    });

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut client = loop {
        match UnixStream::connect(&path) {
            Ok(client) => break client,
            Err(error) => {
                assert!(Instant::now() < deadline, "console never bound: {error}");
                thread::sleep(Duration::from_millis(10));
            }
        }
    };
    let mut prompt = [0_u8; 4];
    client.read_exact(&mut prompt).expect("read prompt");
    assert_eq!(&prompt, b"ga?>");

    trigger.trigger();
    server
        .join()
        .expect("server thread")
        .expect("console stops cleanly");
    assert!(!path.exists(), "socket file should be removed");

    let mut rest = Vec::new();
    client.read_to_end(&mut rest).expect("read to eof");
    assert!(rest.is_empty());
}
