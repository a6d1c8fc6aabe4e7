//! RESP command serializer.
//!
//! Encodes command arguments into the RESP bulk string array wire format:
//! `*<N>\r\n$<len>\r\narg1\r\n$<len>\r\narg2\r\n…`

use itoa::Buffer;

/// Encode a command (list of arguments) into RESP wire format.
///
/// Each argument is treated as a binary-safe bulk string.
///
/// # Example
/// ```ignore
/// let bytes = encode_command(&[b"SET", b"key", b"value"]);
/// // → *3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n
/// ```
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    // Pre-calculate capacity for zero (or minimal) reallocation
    let mut cap = 1 + 10 + 2; // '*' + max_digits(usize) + \r\n
    for arg in args {
        cap += 1 + 10 + 2 + arg.len() + 2; // '$' + len + \r\n + data + \r\n
    }

    let mut buf = Vec::with_capacity(cap);
    let mut itoa_buf = Buffer::new();

    // *<N>\r\n
    buf.push(b'*');
    buf.extend_from_slice(itoa_buf.format(args.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");

    for arg in args {
        // $<len>\r\n<data>\r\n
        buf.push(b'$');
        buf.extend_from_slice(itoa_buf.format(arg.len()).as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }

    buf
}

/// Encode a command from string arguments (convenience wrapper).
pub fn encode_command_str(args: &[&str]) -> Vec<u8> {
    let byte_args: Vec<&[u8]> = args.iter().map(|s| s.as_bytes()).collect();
    encode_command(&byte_args)
}

/// Encode multiple commands into a single buffer for pipelined writes.
///
/// This avoids N allocations + N syscalls — everything is concatenated
/// into one contiguous `Vec<u8>` that can be sent in a single `write_all`.
pub fn encode_pipeline(commands: &[Vec<String>]) -> Vec<u8> {
    // Pre-calculate total capacity
    let mut cap = 0;
    for cmd_args in commands {
        cap += 1 + 10 + 2; // *N\r\n
        for arg in cmd_args {
            cap += 1 + 10 + 2 + arg.len() + 2; // $len\r\ndata\r\n
        }
    }

    let mut buf = Vec::with_capacity(cap);
    let mut itoa_buf = Buffer::new();

    for cmd_args in commands {
        // *<N>\r\n
        buf.push(b'*');
        buf.extend_from_slice(itoa_buf.format(cmd_args.len()).as_bytes());
        buf.extend_from_slice(b"\r\n");

        for arg in cmd_args {
            // $<len>\r\n<data>\r\n
            buf.push(b'$');
            buf.extend_from_slice(itoa_buf.format(arg.len()).as_bytes());
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(arg.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
    }

    buf
}

/// Encode a single inline command (for simple commands like PING).
///
/// Format: `COMMAND\r\n`
pub fn encode_inline(cmd: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(cmd.len() + 2);
    buf.extend_from_slice(cmd.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Helper macro for building commands ergonomically.
///
/// Usage:
/// ```ignore
/// let bytes = cmd!("SET", "mykey", "myvalue");
/// let bytes = cmd!("GET", key_var);
/// ```
#[macro_export]
macro_rules! cmd {
    ($($arg:expr),+ $(,)?) => {{
        $crate::resp::writer::encode_command_str(&[$($arg),+])
    }};
}

// ── Tests ──────────────────────────────────────────────────────────
