//! socks5-server end-to-end smoke test.
//!
//! Spawns the real `socks5-server` binary (found next to this one in
//! the build's output directory, rather than building it itself) and
//! drives it over loopback TCP exactly as a SOCKS5 client and an admin
//! client would, covering the proxy's end-to-end behavior.
//!
//! Run: ./target/release/socks5-smoke
//! (the release build must already contain a `socks5-server` binary
//! next to this one)

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

const LINE: &str = "────────────────────────────────────────────────────────────";

struct TestRunner {
    total: usize,
    passed: usize,
    failed: usize,
}

impl TestRunner {
    fn new() -> Self {
        Self { total: 0, passed: 0, failed: 0 }
    }

    fn section(&self, name: &str) {
        println!("\n{LINE}");
        println!("  {name}");
        println!("{LINE}");
    }

    fn check(&mut self, name: &str, ok: bool, reason: &str) {
        self.total += 1;
        if ok {
            self.passed += 1;
            println!("  [{:2}] {:<52} PASS", self.total, name);
        } else {
            self.failed += 1;
            println!("  [{:2}] {:<52} FAIL: {}", self.total, name, reason);
        }
    }

    fn summary(&self) {
        println!("\n{LINE}");
        println!("  Total: {}  Passed: {}  Failed: {}", self.total, self.passed, self.failed);
        println!("{LINE}");
    }
}

/// Finds a binary built into the same output directory as this one.
fn sibling_binary(name: &str) -> std::path::PathBuf {
    let mut path = std::env::current_exe().expect("current_exe");
    path.pop();
    path.push(name);
    path
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().unwrap().port()
}

struct Server {
    child: Child,
}

impl Server {
    fn spawn(socks_port: u16, monitor_port: u16, admin_token: &str, extra: &[&str]) -> Self {
        let bin = sibling_binary("socks5-server");
        let mut cmd = Command::new(bin);
        cmd.arg("-p").arg(socks_port.to_string())
            .arg("-P").arg(monitor_port.to_string())
            .arg("-L").arg("127.0.0.1")
            .arg("--admin-token").arg(admin_token)
            .args(extra)
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let child = cmd.spawn().expect("spawn socks5-server (build it first)");
        std::thread::sleep(Duration::from_millis(200));
        Self { child }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn connect_with_retry(port: u16) -> TcpStream {
    for _ in 0..20 {
        if let Ok(s) = TcpStream::connect(("127.0.0.1", port)) {
            return s;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("could not connect to 127.0.0.1:{port}");
}

fn recv_exact(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).expect("recv_exact");
    buf
}

// ── Scenario 1: anonymous connect, IPv4 ──────────────────────────────

fn scenario_anonymous_connect(t: &mut TestRunner) {
    t.section("Scenario 1: anonymous connect, IPv4");

    let origin = TcpListener::bind("127.0.0.1:0").expect("origin listener");
    let origin_port = origin.local_addr().unwrap().port();
    let origin_thread = std::thread::spawn(move || {
        if let Ok((mut s, _)) = origin.accept() {
            let mut buf = [0u8; 5];
            let _ = s.read(&mut buf);
            let _ = s.write_all(b"hello");
        }
    });

    let socks_port = free_port();
    let monitor_port = free_port();
    let server = Server::spawn(socks_port, monitor_port, "00000000000000000000000000000000", &[]);

    let mut client = connect_with_retry(socks_port);
    client.write_all(&[0x05, 0x01, 0x00]).unwrap();
    let hello_reply = recv_exact(&mut client, 2);
    t.check("hello reply selects NO-AUTH", hello_reply == [0x05, 0x00], &format!("{hello_reply:?}"));

    let mut req = vec![0x05, 0x01, 0x00, 0x01];
    req.extend_from_slice(&[127, 0, 0, 1]);
    req.extend_from_slice(&origin_port.to_be_bytes());
    client.write_all(&req).unwrap();
    let reply = recv_exact(&mut client, 10);
    t.check("request reply SUCCEEDED, IPv4 bound addr", reply[1] == 0x00 && reply[3] == 0x01, &format!("{reply:?}"));

    client.write_all(b"world").unwrap();
    let echoed = recv_exact(&mut client, 5);
    t.check("tunnel carries bytes to origin", &echoed == b"hello", &format!("{echoed:?}"));

    drop(client);
    let _ = origin_thread.join();
    drop(server);
}

// ── Scenario 2: authenticated failure ────────────────────────────────

fn scenario_auth_failure(t: &mut TestRunner) {
    t.section("Scenario 2: authenticated failure");

    let socks_port = free_port();
    let monitor_port = free_port();
    let server = Server::spawn(socks_port, monitor_port, "11111111111111111111111111111111", &["-u", "alice:secret"]);

    let mut client = connect_with_retry(socks_port);
    client.write_all(&[0x05, 0x01, 0x02]).unwrap();
    let hello_reply = recv_exact(&mut client, 2);
    t.check("hello reply selects USER/PASS", hello_reply == [0x05, 0x02], &format!("{hello_reply:?}"));

    let mut auth = vec![0x01, 5];
    auth.extend_from_slice(b"alice");
    auth.push(6);
    auth.extend_from_slice(b"wrong!");
    client.write_all(&auth).unwrap();
    let auth_reply = recv_exact(&mut client, 2);
    t.check("auth reply STATUS=failure", auth_reply == [0x01, 0x01], &format!("{auth_reply:?}"));

    let mut probe = [0u8; 1];
    let closed = matches!(client.read(&mut probe), Ok(0) | Err(_));
    t.check("connection closed after auth failure", closed, "still open");

    drop(server);
}

// ── Scenario 4/5/6: monitor protocol ─────────────────────────────────

fn send_monitor_request(stream: &mut TcpStream, token: &[u8; 16], method: u8, target: u8, data: &[u8]) -> (u8, Vec<u8>) {
    let mut req = vec![0x01];
    req.extend_from_slice(token);
    req.push(method);
    req.push(target);
    req.extend_from_slice(&(data.len() as u16).to_be_bytes());
    req.extend_from_slice(data);
    stream.write_all(&req).unwrap();

    let header = recv_exact(stream, 3);
    let dlen = u16::from_be_bytes([header[1], header[2]]) as usize;
    let data = if dlen > 0 { recv_exact(stream, dlen) } else { Vec::new() };
    (header[0], data)
}

fn scenario_monitor_get_and_config(t: &mut TestRunner) {
    t.section("Scenario 4/5/6: monitor GET historic, add-proxy-user, root-delete");

    let socks_port = free_port();
    let monitor_port = free_port();
    let token = [0xABu8; 16];
    let token_hex: String = token.iter().map(|b| format!("{b:02x}")).collect();
    let server = Server::spawn(socks_port, monitor_port, &token_hex, &[]);

    let mut admin = connect_with_retry(monitor_port);

    let (status, data) = send_monitor_request(&mut admin, &token, 0x00, 0x00, &[0x00]);
    t.check("GET historic returns OK with 4-byte counter", status == 0x00 && data.len() == 4, &format!("status={status:#x} data={data:?}"));

    let (status, _) = send_monitor_request(&mut admin, &token, 0x01, 0x01, b"bob\0hunter2");
    t.check("CONFIG add-proxy-user OK", status == 0x00, &format!("status={status:#x}"));

    let (status, data) = send_monitor_request(&mut admin, &token, 0x00, 0x03, &[]);
    let listed = String::from_utf8_lossy(&data);
    t.check("GET proxy-users lists bob", status == 0x00 && listed.split('\0').any(|n| n == "bob"), &format!("{listed:?}"));

    let (status, _) = send_monitor_request(&mut admin, &token, 0x01, 0x04, b"root");
    t.check("CONFIG del-admin on root returns INVALID_DATA", status == 0x04, &format!("status={status:#x}"));

    drop(server);
}

fn main() {
    println!("=== socks5-server End-to-End Smoke Test ===");
    let mut t = TestRunner::new();

    scenario_anonymous_connect(&mut t);
    scenario_auth_failure(&mut t);
    scenario_monitor_get_and_config(&mut t);

    t.summary();
    std::process::exit(if t.failed > 0 { 1 } else { 0 });
}
