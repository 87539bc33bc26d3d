// src/core/connection.rs

//! Discovers which server, user and client a GUI tool should connect with.

use crate::core::settings::LookupSource;
use crate::models::{CommandLine, ConnectionParams};
use crate::system::process_runner::CommandRunner;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

lazy_static! {
    static ref SET_LINE: Regex =
        Regex::new(r"(?m)^(P4PORT|P4USER|P4CLIENT)=(.*?)\s*$").expect("valid p4 set regex");
    static ref SET_ORIGIN: Regex =
        Regex::new(r"\s+\((?:set(?: -s)?|enviro|config\b[^)]*|noconfig)\)$")
            .expect("valid p4 set origin regex");
    static ref INFO_LINE: Regex = Regex::new(r"(?m)^(?:info\d*: )?([A-Za-z][A-Za-z ]*?): (.*?)\s*$")
        .expect("valid p4 info regex");
}

/// Parses the output of `p4 set`.
///
/// Values may carry an origin annotation such as ` (set)` or ` (config 'p4config.txt')`,
/// which is removed. Returns `None` when none of the three variables is set.
pub fn parse_p4_set(output: &str) -> Option<ConnectionParams> {
    let mut params = ConnectionParams::default();
    for caps in SET_LINE.captures_iter(output) {
        let (Some(name), Some(raw)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let value = SET_ORIGIN.replace(raw.as_str(), "").trim().to_string();
        let slot = match name.as_str() {
            "P4PORT" => &mut params.server,
            "P4USER" => &mut params.user,
            _ => &mut params.client,
        };
        if slot.is_empty() {
            *slot = value;
        }
    }
    (!params.is_empty()).then_some(params)
}

/// Parses the output of `p4 -s info`.
///
/// The server is the broker address if there is one, then the proxy, then the server
/// itself. An `encrypted` connection to that address gets an `ssl:` prefix.
pub fn parse_p4_info(output: &str) -> Option<ConnectionParams> {
    let mut fields: HashMap<&str, &str> = HashMap::new();
    for caps in INFO_LINE.captures_iter(output) {
        if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
            fields.entry(key.as_str()).or_insert(value.as_str());
        }
    }
    let field = |key: &str| fields.get(key).map(|v| v.trim()).unwrap_or_default();

    let mut server = String::new();
    for role in ["Broker", "Proxy", "Server"] {
        let address = field(format!("{} address", role).as_str());
        if address.is_empty() {
            continue;
        }
        let encrypted = field(format!("{} encryption", role).as_str()) == "encrypted";
        server = if encrypted && !address.starts_with("ssl") {
            format!("ssl:{}", address)
        } else {
            address.to_string()
        };
        break;
    }

    let params = ConnectionParams {
        server,
        user: field("User name").to_string(),
        client: field("Client name").to_string(),
    };
    (!params.is_empty()).then_some(params)
}

fn query_p4_set(runner: &dyn CommandRunner, p4: &Path, dir: &Path) -> Option<ConnectionParams> {
    let command = CommandLine::new(p4).arg("set").current_dir(dir);
    match runner.capture(&command, true) {
        Ok(output) => parse_p4_set(&output),
        Err(e) => {
            log::debug!("p4 set failed in '{}': {}", dir.display(), e);
            None
        }
    }
}

fn query_p4_info(runner: &dyn CommandRunner, p4: &Path, dir: &Path) -> Option<ConnectionParams> {
    let command = CommandLine::new(p4)
        .args(["-s", "-L"])
        .arg(dir.to_string_lossy())
        .arg("info")
        .current_dir(dir);
    match runner.capture(&command, true) {
        Ok(output) => parse_p4_info(&output),
        Err(e) => {
            log::debug!("p4 info failed in '{}': {}", dir.display(), e);
            None
        }
    }
}

/// Discovers the connection parameters that apply in `dir`.
///
/// `order` picks the query tried first; the other one is the fallback. When both come
/// back empty the result is empty and the caller runs its command without credentials.
pub fn discover(
    runner: &dyn CommandRunner,
    p4: &Path,
    dir: &Path,
    order: LookupSource,
) -> ConnectionParams {
    let found = match order {
        LookupSource::Set => {
            query_p4_set(runner, p4, dir).or_else(|| query_p4_info(runner, p4, dir))
        }
        LookupSource::Info => {
            query_p4_info(runner, p4, dir).or_else(|| query_p4_set(runner, p4, dir))
        }
    };
    match found {
        Some(params) => {
            log::debug!("Connection for '{}': {}", dir.display(), params);
            params
        }
        None => {
            log::error!(
                "Could not determine the Perforce connection for '{}' from p4 set or p4 info.",
                dir.display()
            );
            ConnectionParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::fake::FakeRunner;

    const P4_SET_OUTPUT: &str = "P4CHARSET=utf8 (set)\n\
P4CONFIG=.p4config (set)\n\
P4EDITOR=C:\\Windows\\system32\\notepad.exe (set)\n\
P4PORT=ssl:example:1666 (config 'c:\\work\\.p4config')\n\
P4USER=alice (set)\n\
P4CLIENT=alice_ws\r\n\
exit: 0\n";

    const P4_INFO_OUTPUT: &str = "info: User name: bob\n\
info: Client name: bob_laptop\n\
info: Client host: laptop\n\
info: Current directory: /work\n\
info: Server address: perforce.example.com:1666\n\
info: Server encryption: encrypted\n\
info: Server version: P4D/LINUX26X86_64/2023.1\n\
exit: 0\n";

    #[test]
    fn test_parse_p4_set_strips_origin_annotations() {
        let params = parse_p4_set(P4_SET_OUTPUT).unwrap();
        assert_eq!(params.to_string(), "-p ssl:example:1666 -u alice -c alice_ws");
    }

    #[test]
    fn test_parse_p4_set_without_connection_variables() {
        assert_eq!(parse_p4_set("P4EDITOR=vim (set)\n"), None);
    }

    #[test]
    fn test_parse_p4_info_adds_ssl_prefix_for_encrypted_server() {
        let params = parse_p4_info(P4_INFO_OUTPUT).unwrap();
        assert_eq!(params.server, "ssl:perforce.example.com:1666");
        assert_eq!(params.user, "bob");
        assert_eq!(params.client, "bob_laptop");
    }

    #[test]
    fn test_parse_p4_info_prefers_broker_address() {
        let output = "info: User name: bob\n\
info: Broker address: broker:1666\n\
info: Server address: ssl:central:1666\n\
info: Server encryption: encrypted\n";
        let params = parse_p4_info(output).unwrap();
        assert_eq!(params.server, "broker:1666");
    }

    #[test]
    fn test_discover_falls_back_to_info() {
        let runner = FakeRunner::new()
            .fail_capture("p4 set")
            .respond("info", P4_INFO_OUTPUT);
        let params = discover(&runner, Path::new("p4"), Path::new("/work"), LookupSource::Set);

        assert_eq!(params.user, "bob");
        assert_eq!(runner.captures().len(), 2);
    }

    #[test]
    fn test_discover_info_first_skips_set_when_it_answers() {
        let runner = FakeRunner::new()
            .respond("p4 set", P4_SET_OUTPUT)
            .respond("info", P4_INFO_OUTPUT);
        let params = discover(&runner, Path::new("p4"), Path::new("/work"), LookupSource::Info);

        assert_eq!(params.user, "bob");
        let captured = runner.captures();
        assert_eq!(captured.len(), 1);
        assert_eq!(
            captured.first().map(|c| c.args.clone()),
            Some(vec![
                "-s".to_string(),
                "-L".to_string(),
                "/work".to_string(),
                "info".to_string()
            ])
        );
    }

    #[test]
    fn test_discover_with_nothing_found_is_empty() {
        let runner = FakeRunner::new();
        let params = discover(&runner, Path::new("p4"), Path::new("/work"), LookupSource::Set);
        assert!(params.is_empty());
    }
}
