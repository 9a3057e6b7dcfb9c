//! A producer/consumer pipeline over the byte pipe, printing to stdout.
//!
//! The primary context generates a few lines of text; the spawned context
//! owns the port and prefixes each line with its number, like `nl`.
//!
//! Run with `cargo run --example piped`.

use std::io::Write;

use coop_threads::{SerialPort, ShellCore, Ticker, PIPE_END, TICK_PERIOD};

struct StdoutPort;

impl SerialPort for StdoutPort {
    fn tx_ready(&self) -> bool {
        true
    }

    fn tx(&self, byte: u8) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(&[byte]);
        let _ = out.flush();
    }
}

fn main() {
    let core = ShellCore::new(StdoutPort);
    let _ticker = Ticker::start(core.clone(), TICK_PERIOD).expect("tick driver");

    core.spawn(|c| {
        let mut line = 1u32;
        let mut at_line_start = true;
        let mut byte = c.recv_byte();
        while byte != PIPE_END {
            if at_line_start {
                c.send_all(format!("{:3}  ", line).as_bytes());
                line += 1;
                at_line_start = false;
            }
            c.send_byte(byte);
            if byte == 0x0a {
                at_line_start = true;
            }
            byte = c.recv_byte();
        }
    });

    for word in ["alpha", "bravo", "charlie", "delta", "echo"] {
        core.send_all(word.as_bytes());
        core.send_newline();
        core.sleep_seconds(1);
    }
    core.join();
}
