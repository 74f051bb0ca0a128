//! Hand-rolled flag parsing, in the style of the teacher's httpd CLIs:
//! a `while i < args.len()` loop over `std::env::args()`, no `clap`.

use std::net::{IpAddr, Ipv4Addr};

pub const MAX_USERS: usize = 10;
pub const DEFAULT_SOCKS_PORT: u16 = 1080;
pub const DEFAULT_MONITOR_PORT: u16 = 8080;

pub struct Args {
    pub socks_addr: IpAddr,
    pub socks_port: u16,
    pub monitor_addr: IpAddr,
    pub monitor_port: u16,
    pub disectors_enabled: bool,
    pub users: Vec<(String, String)>,
    pub admin_token: [u8; 16],
    pub help: bool,
    pub version: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            socks_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            socks_port: DEFAULT_SOCKS_PORT,
            monitor_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            monitor_port: DEFAULT_MONITOR_PORT,
            disectors_enabled: true,
            users: Vec::new(),
            admin_token: [0u8; 16],
            help: false,
            version: false,
        }
    }
}

#[derive(Debug)]
pub enum ArgsError {
    MissingValue(&'static str),
    BadValue(&'static str, String),
    TooManyUsers,
    NoAdminToken,
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingValue(flag) => write!(f, "{flag} requires a value"),
            Self::BadValue(flag, v) => write!(f, "{flag}: invalid value {v:?}"),
            Self::TooManyUsers => write!(f, "-u given more than {MAX_USERS} times"),
            Self::NoAdminToken => write!(f, "no admin token: pass --admin-token or set SOCKS5_ADMIN_TOKEN"),
        }
    }
}

pub const USAGE: &str = "\
socks5-server [-l addr] [-L addr] [-p port] [-P port] [-N] [-u user:pass]... [--admin-token hex32] [-h] [-v]

  -l ADDR           SOCKS bind address (default 0.0.0.0; a v6 listener with IPV6_V6ONLY is always added alongside it)
  -L ADDR           monitor bind address (default 127.0.0.1)
  -p PORT           SOCKS port (default 1080)
  -P PORT           monitor port (default 8080)
  -N                disable protocol disectors (POP3 credential sniffing)
  -u USER:PASS      register a proxy user, repeatable up to 10
  --admin-token HEX 32 hex chars (16 bytes); falls back to SOCKS5_ADMIN_TOKEN
  -h                print this help and exit
  -v                print the version and exit";

pub fn parse(argv: &[String]) -> Result<Args, ArgsError> {
    let mut args = Args::default();
    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "-l" => {
                let v = next(argv, &mut i, "-l")?;
                args.socks_addr = v.parse().map_err(|_| ArgsError::BadValue("-l", v))?;
            }
            "-L" => {
                let v = next(argv, &mut i, "-L")?;
                args.monitor_addr = v.parse().map_err(|_| ArgsError::BadValue("-L", v))?;
            }
            "-p" => {
                let v = next(argv, &mut i, "-p")?;
                args.socks_port = v.parse().map_err(|_| ArgsError::BadValue("-p", v))?;
            }
            "-P" => {
                let v = next(argv, &mut i, "-P")?;
                args.monitor_port = v.parse().map_err(|_| ArgsError::BadValue("-P", v))?;
            }
            "-N" => args.disectors_enabled = false,
            "-u" => {
                if args.users.len() >= MAX_USERS {
                    return Err(ArgsError::TooManyUsers);
                }
                let v = next(argv, &mut i, "-u")?;
                let (user, pass) = v.split_once(':').ok_or_else(|| ArgsError::BadValue("-u", v.clone()))?;
                args.users.push((user.to_string(), pass.to_string()));
            }
            "--admin-token" => {
                let v = next(argv, &mut i, "--admin-token")?;
                args.admin_token = parse_token(&v).ok_or_else(|| ArgsError::BadValue("--admin-token", v))?;
            }
            "-h" | "--help" => args.help = true,
            "-v" | "--version" => args.version = true,
            other => return Err(ArgsError::BadValue("unrecognized flag", other.to_string())),
        }
        i += 1;
    }

    if !args.help && !args.version && args.admin_token == [0u8; 16] {
        match std::env::var("SOCKS5_ADMIN_TOKEN") {
            Ok(v) => args.admin_token = parse_token(&v).ok_or(ArgsError::NoAdminToken)?,
            Err(_) => return Err(ArgsError::NoAdminToken),
        }
    }

    Ok(args)
}

fn next(argv: &[String], i: &mut usize, flag: &'static str) -> Result<String, ArgsError> {
    *i += 1;
    argv.get(*i).cloned().ok_or(ArgsError::MissingValue(flag))
}

fn parse_token(hex: &str) -> Option<[u8; 16]> {
    if hex.len() != 32 {
        return None;
    }
    let mut out = [0u8; 16];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_with_just_a_token() {
        std::env::set_var("SOCKS5_ADMIN_TOKEN", "00112233445566778899aabbccddeeff");
        let args = parse(&argv(&[])).unwrap();
        assert_eq!(args.socks_port, DEFAULT_SOCKS_PORT);
        assert_eq!(args.monitor_port, DEFAULT_MONITOR_PORT);
        assert!(args.disectors_enabled);
        std::env::remove_var("SOCKS5_ADMIN_TOKEN");
    }

    #[test]
    fn rejects_missing_admin_token() {
        std::env::remove_var("SOCKS5_ADMIN_TOKEN");
        assert!(matches!(parse(&argv(&["-p", "1090"])), Err(ArgsError::NoAdminToken)));
    }

    #[test]
    fn parses_repeated_user_flags() {
        let args = parse(&argv(&[
            "-u", "alice:hunter2", "-u", "bob:secret",
            "--admin-token", "00112233445566778899aabbccddeeff",
        ])).unwrap();
        assert_eq!(args.users, vec![("alice".to_string(), "hunter2".to_string()), ("bob".to_string(), "secret".to_string())]);
    }

    #[test]
    fn rejects_malformed_user_flag() {
        let err = parse(&argv(&["-u", "no-colon", "--admin-token", "00112233445566778899aabbccddeeff"]));
        assert!(matches!(err, Err(ArgsError::BadValue("-u", _))));
    }

    #[test]
    fn help_and_version_skip_token_requirement() {
        std::env::remove_var("SOCKS5_ADMIN_TOKEN");
        assert!(parse(&argv(&["-h"])).unwrap().help);
        assert!(parse(&argv(&["-v"])).unwrap().version);
    }

    #[test]
    fn rejects_odd_length_admin_token() {
        let err = parse(&argv(&["--admin-token", "abcd"]));
        assert!(matches!(err, Err(ArgsError::BadValue("--admin-token", _))));
    }
}
